// rust/pipeline-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Shard {shard_index} out of range (total shards: {num_shards})")]
    InvalidShard {
        shard_index: usize,
        num_shards: usize,
    },

    #[error("Stage '{stage}' failed: {message}")]
    Upstream {
        stage: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Position mismatch at tape value {index}: expected {expected}, found {found}")]
    PositionMismatch {
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("Prefetch worker panicked: {message}")]
    WorkerPanicked {
        message: String,
    },

    #[error("Prefetch error: {message}")]
    Prefetch {
        message: String,
    },

    #[error("Checkpoint error: {message}")]
    Checkpoint {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error at '{path}': {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

// Convenience constructors
impl PipelineError {

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn invalid_shard(shard_index: usize, num_shards: usize) -> Self {
        Self::InvalidShard { shard_index, num_shards }
    }

    /// Wraps a failure raised by a stage outside this crate (a reader, a
    /// transform) so it can travel through the pipeline unchanged.
    pub fn upstream(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            stage: stage.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn upstream_with_source(
        stage: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Upstream {
            stage: stage.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn position_mismatch(index: usize, expected: &'static str, found: impl Into<String>) -> Self {
        Self::PositionMismatch {
            index,
            expected,
            found: found.into(),
        }
    }

    pub fn worker_panicked(message: impl Into<String>) -> Self {
        Self::WorkerPanicked {
            message: message.into(),
        }
    }

    pub fn prefetch(message: impl Into<String>) -> Self {
        Self::Prefetch {
            message: message.into(),
        }
    }

    pub fn checkpoint(message: impl Into<String>) -> Self {
        Self::Checkpoint {
            message: message.into(),
            source: None,
        }
    }

    pub fn checkpoint_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Checkpoint {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn io(path: impl Into<PathBuf>, message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}
