// rust/pipeline-core/src/data/mod.rs

//! Lazily evaluated, resumable pipeline stages.
//!
//! Every stage implements [`DataSource`]: it pulls elements from the stage it
//! wraps, can be reset to its initial state, and can record and reload its
//! position on a [`Tape`] so that a rebuilt pipeline resumes exactly where a
//! previous one stopped.
//!
//! # Example
//!
//! ```
//! use pipeline_core::data::{
//!     load_position, save_position, DataSource, ListDataSource, PrefetchedDataSource,
//!     ShardedDataSource, SlicedDataSource,
//! };
//!
//! # fn main() -> pipeline_core::Result<()> {
//! let build = || -> pipeline_core::Result<_> {
//!     let source = ListDataSource::new((0..100u64).collect());
//!     let source = ShardedDataSource::new(source, 1, 4)?;
//!     let source = SlicedDataSource::new(source, 0, Some(10), 2)?;
//!     PrefetchedDataSource::new(source, 8)
//! };
//!
//! let mut pipeline = build()?;
//! assert_eq!(pipeline.next()?, Some(1));
//! assert_eq!(pipeline.next()?, Some(9));
//!
//! let mut tape = save_position(&mut pipeline)?;
//!
//! let mut resumed = build()?;
//! load_position(&mut resumed, &mut tape)?;
//! assert_eq!(resumed.next()?, Some(17));
//! # Ok(())
//! # }
//! ```

mod buffer;
mod list;
mod prefetch;
mod sharded;
mod slice;
mod source;
mod tape;

pub use buffer::{PrefetchBuffer, ProducerState, Received};
pub use list::ListDataSource;
pub use prefetch::PrefetchedDataSource;
pub use sharded::ShardedDataSource;
pub use slice::SlicedDataSource;
pub use source::{load_position, save_position, DataSource, DataSourceIter};
pub use tape::{Recordable, Tape, TapeValue};
