// rust/pipeline-core/src/checkpoint/mod.rs

//! Persistence of pipeline positions.
//!
//! A [`Tape`](crate::data::Tape) recorded from a pipeline is written to a
//! checkpoint directory so that a restarted process can rebuild the same
//! pipeline and resume where the previous one stopped. This module provides:
//! - Compression of the encoded tape (none, lz4, zstd)
//! - Integrity verification via XXHash64 checksums
//! - Atomic writes to prevent partial checkpoints
//! - Automatic cleanup of old checkpoints
//!
//! # Example
//!
//! ```no_run
//! use pipeline_core::checkpoint::{PositionCheckpointReader, PositionCheckpointWriter};
//! use pipeline_core::config::CheckpointConfig;
//! use pipeline_core::data::{load_position, save_position, DataSource, ListDataSource};
//!
//! # fn main() -> pipeline_core::Result<()> {
//! let config = CheckpointConfig::default();
//! let writer = PositionCheckpointWriter::new(config.clone())?;
//! let reader = PositionCheckpointReader::new(config.checkpoint_dir);
//!
//! let mut pipeline = ListDataSource::new(vec![1, 2, 3]);
//! pipeline.next()?;
//! writer.write("train", &save_position(&mut pipeline)?)?;
//!
//! let mut restarted = ListDataSource::new(vec![1, 2, 3]);
//! if let Some(mut tape) = reader.read_latest("train")? {
//!     load_position(&mut restarted, &mut tape)?;
//! }
//! assert_eq!(restarted.next()?, Some(2));
//! # Ok(())
//! # }
//! ```

mod format;
mod reader;
mod writer;

pub use format::PositionHeader;
pub use reader::PositionCheckpointReader;
pub use writer::PositionCheckpointWriter;
