// rust/pipeline-core/src/lib.rs

//! Resumable Data Pipeline - Core Library
//!
//! This crate provides lazily evaluated pipeline stages that can be composed,
//! checkpointed and resumed mid-stream: a windowed slice, a round-robin
//! shard for partitioning a stream across parallel workers, and a background
//! prefetch stage that overlaps upstream production with consumption.

pub mod config;
pub mod error;

// Re-export commonly used types for convenience
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};

pub mod data;
pub use data::{
    load_position, save_position, DataSource, ListDataSource, PrefetchedDataSource, Recordable,
    ShardedDataSource, SlicedDataSource, Tape, TapeValue,
};

pub mod checkpoint;
pub use checkpoint::{PositionCheckpointReader, PositionCheckpointWriter, PositionHeader};
