// rust/pipeline-core/src/config.rs

//! Configuration for pipeline stages and position checkpoints.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values. Stage
//! constructors validate their own config struct, so invalid parameters are
//! rejected when the pipeline is built.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PipelineError, Result};

// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Windowed slice applied to the source, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice: Option<SliceConfig>,
    /// Round-robin shard this process consumes, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<ShardConfig>,
    pub prefetch: PrefetchConfig,
    pub checkpoint: CheckpointConfig,
}

/// Parameters of a windowed slice stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceConfig {
    /// First upstream index to yield.
    pub start: usize,
    /// Exclusive upper bound on upstream indices, unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<usize>,
    /// Distance between yielded upstream indices.
    pub step: usize,
}

/// Parameters of a round-robin shard stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    pub shard_index: usize,
    pub num_shards: usize,
}

/// Parameters of a prefetch stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    // Number of elements the worker may buffer ahead of the consumer.
    pub look_ahead: usize,
}

// Position checkpoint configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    // Directory for storing position checkpoints.
    pub checkpoint_dir: PathBuf,
    // Compression algorithm: "none", "lz4", or "zstd".
    pub compression: String,
    // Compression level (zstd only).
    pub compression_level: i32,
    // Number of recent checkpoints to keep per name.
    pub keep_last_n: usize,
    // Whether to use atomic writes (write to temp then rename).
    pub atomic_writes: bool,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            start: 0,
            stop: None,
            step: 1,
        }
    }
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            shard_index: 0,
            num_shards: 1,
        }
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self { look_ahead: 2 }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("./checkpoints"),
            compression: "lz4".to_string(),
            compression_level: 1,
            keep_last_n: 3,
            atomic_writes: true,
        }
    }
}

impl SliceConfig {
    pub fn new(start: usize, stop: Option<usize>, step: usize) -> Self {
        Self { start, stop, step }
    }

    pub fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(PipelineError::config("slice.step must be greater than 0"));
        }
        if let Some(stop) = self.stop {
            if stop < self.start {
                return Err(PipelineError::config(format!(
                    "slice.stop ({stop}) must not be less than slice.start ({})",
                    self.start
                )));
            }
        }
        Ok(())
    }
}

impl ShardConfig {
    pub fn new(shard_index: usize, num_shards: usize) -> Self {
        Self {
            shard_index,
            num_shards,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_shards == 0 {
            return Err(PipelineError::config(
                "shard.num_shards must be greater than 0",
            ));
        }
        if self.shard_index >= self.num_shards {
            return Err(PipelineError::invalid_shard(self.shard_index, self.num_shards));
        }
        Ok(())
    }
}

impl PrefetchConfig {
    pub fn new(look_ahead: usize) -> Self {
        Self { look_ahead }
    }

    pub fn validate(&self) -> Result<()> {
        if self.look_ahead == 0 {
            return Err(PipelineError::config(
                "prefetch.look_ahead must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl CheckpointConfig {
    pub fn validate(&self) -> Result<()> {
        let valid_compression = ["none", "lz4", "zstd"];
        if !valid_compression.contains(&self.compression.as_str()) {
            return Err(PipelineError::config(format!(
                "checkpoint.compression must be one of: {}",
                valid_compression.join(", ")
            )));
        }

        if self.keep_last_n == 0 {
            return Err(PipelineError::config(
                "checkpoint.keep_last_n must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl FromStr for PipelineConfig {
    type Err = PipelineError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| PipelineError::config_with_source("failed to parse TOML config", e))
    }
}

impl PipelineConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io(path, "failed to read config file", e))?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `PL_`:
    // - `PL_SLICE_START`, `PL_SLICE_STOP`, `PL_SLICE_STEP` create or update `slice`
    // - `PL_SHARD_INDEX`, `PL_NUM_SHARDS` create or update `shard`
    // - `PL_PREFETCH_LOOK_AHEAD` overrides `prefetch.look_ahead`
    // - `PL_CHECKPOINT_DIR`, `PL_CHECKPOINT_COMPRESSION`, ... override `checkpoint`
    //
    // Values that fail to parse are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Slice overrides
        let slice_vars = ["PL_SLICE_START", "PL_SLICE_STOP", "PL_SLICE_STEP"];
        if slice_vars.iter().any(|var| std::env::var(var).is_ok()) {
            let mut slice = self.slice.take().unwrap_or_default();
            if let Some(v) = parse_env("PL_SLICE_START") {
                slice.start = v;
            }
            if let Some(v) = parse_env("PL_SLICE_STOP") {
                slice.stop = Some(v);
            }
            if let Some(v) = parse_env("PL_SLICE_STEP") {
                slice.step = v;
            }
            self.slice = Some(slice);
        }

        // Shard overrides, usually set per worker by the launcher
        let shard_vars = ["PL_SHARD_INDEX", "PL_NUM_SHARDS"];
        if shard_vars.iter().any(|var| std::env::var(var).is_ok()) {
            let mut shard = self.shard.take().unwrap_or_default();
            if let Some(v) = parse_env("PL_SHARD_INDEX") {
                shard.shard_index = v;
            }
            if let Some(v) = parse_env("PL_NUM_SHARDS") {
                shard.num_shards = v;
            }
            self.shard = Some(shard);
        }

        // Prefetch overrides
        if let Some(v) = parse_env("PL_PREFETCH_LOOK_AHEAD") {
            self.prefetch.look_ahead = v;
        }

        // Checkpoint overrides
        if let Ok(val) = std::env::var("PL_CHECKPOINT_DIR") {
            self.checkpoint.checkpoint_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("PL_CHECKPOINT_COMPRESSION") {
            self.checkpoint.compression = val;
        }
        if let Some(v) = parse_env("PL_CHECKPOINT_COMPRESSION_LEVEL") {
            self.checkpoint.compression_level = v;
        }
        if let Some(v) = parse_env("PL_CHECKPOINT_KEEP_LAST_N") {
            self.checkpoint.keep_last_n = v;
        }
        if let Some(v) = parse_env("PL_CHECKPOINT_ATOMIC_WRITES") {
            self.checkpoint.atomic_writes = v;
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if let Some(slice) = &self.slice {
            slice.validate()?;
        }
        if let Some(shard) = &self.shard {
            shard.validate()?;
        }
        self.prefetch.validate()?;
        self.checkpoint.validate()?;
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();

        assert!(config.slice.is_none());
        assert!(config.shard.is_none());
        assert_eq!(config.prefetch.look_ahead, 2);

        assert_eq!(
            config.checkpoint.checkpoint_dir,
            PathBuf::from("./checkpoints")
        );
        assert_eq!(config.checkpoint.compression, "lz4");
        assert_eq!(config.checkpoint.compression_level, 1);
        assert_eq!(config.checkpoint.keep_last_n, 3);
        assert!(config.checkpoint.atomic_writes);
    }

    #[test]
    fn test_default_validates() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_empty() {
        let config: PipelineConfig = "".parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_stage_sections() {
        let toml = r#"
[slice]
start = 2
stop = 9
step = 3

[shard]
shard_index = 1
num_shards = 3

[prefetch]
look_ahead = 8
"#;
        let config: PipelineConfig = toml.parse().unwrap();

        assert_eq!(config.slice, Some(SliceConfig::new(2, Some(9), 3)));
        assert_eq!(config.shard, Some(ShardConfig::new(1, 3)));
        assert_eq!(config.prefetch.look_ahead, 8);
        // Unspecified sections keep their defaults
        assert_eq!(config.checkpoint.keep_last_n, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: Result<PipelineConfig> = "[[not valid".parse();
        assert!(matches!(result, Err(PipelineError::Config { .. })));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[checkpoint]\ncompression = \"zstd\"\nkeep_last_n = 5").unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.checkpoint.compression, "zstd");
        assert_eq!(config.checkpoint.keep_last_n, 5);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[shard]\nshard_index = 4\nnum_shards = 4").unwrap();

        let result = PipelineConfig::from_file(file.path());
        assert!(matches!(
            result,
            Err(PipelineError::InvalidShard {
                shard_index: 4,
                num_shards: 4
            })
        ));
    }

    #[test]
    fn test_from_file_missing() {
        let result = PipelineConfig::from_file("/nonexistent/pipeline.toml");
        assert!(matches!(result, Err(PipelineError::Io { .. })));
    }

    #[test]
    fn test_slice_validation() {
        assert!(SliceConfig::new(0, None, 1).validate().is_ok());
        assert!(SliceConfig::new(3, Some(3), 2).validate().is_ok());
        assert!(SliceConfig::new(0, None, 0).validate().is_err());
        assert!(SliceConfig::new(5, Some(4), 1).validate().is_err());
    }

    #[test]
    fn test_shard_validation() {
        assert!(ShardConfig::new(0, 1).validate().is_ok());
        assert!(ShardConfig::new(2, 3).validate().is_ok());
        assert!(ShardConfig::new(0, 0).validate().is_err());
        assert!(matches!(
            ShardConfig::new(3, 3).validate(),
            Err(PipelineError::InvalidShard { .. })
        ));
    }

    #[test]
    fn test_prefetch_validation() {
        assert!(PrefetchConfig::new(1).validate().is_ok());
        assert!(PrefetchConfig::new(0).validate().is_err());
    }

    #[test]
    fn test_checkpoint_validation() {
        let mut config = CheckpointConfig::default();
        config.compression = "gzip".to_string();
        assert!(config.validate().is_err());

        let mut config = CheckpointConfig::default();
        config.keep_last_n = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        // Variable names unique to this test so parallel tests are unaffected
        std::env::set_var("PL_SHARD_INDEX", "2");
        std::env::set_var("PL_NUM_SHARDS", "4");
        std::env::set_var("PL_PREFETCH_LOOK_AHEAD", "16");
        std::env::set_var("PL_CHECKPOINT_KEEP_LAST_N", "not-a-number");

        let config = PipelineConfig::default().with_env_overrides();

        std::env::remove_var("PL_SHARD_INDEX");
        std::env::remove_var("PL_NUM_SHARDS");
        std::env::remove_var("PL_PREFETCH_LOOK_AHEAD");
        std::env::remove_var("PL_CHECKPOINT_KEEP_LAST_N");

        assert_eq!(config.shard, Some(ShardConfig::new(2, 4)));
        assert_eq!(config.prefetch.look_ahead, 16);
        // Unparseable values are ignored
        assert_eq!(config.checkpoint.keep_last_n, 3);
        assert!(config.slice.is_none());
    }
}
