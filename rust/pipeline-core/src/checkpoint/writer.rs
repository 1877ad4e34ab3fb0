// rust/pipeline-core/src/checkpoint/writer.rs

//! Position checkpoint writer.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::CheckpointConfig;
use crate::data::Tape;
use crate::error::{PipelineError, Result};

use super::format::{self, PositionHeader};

/// Persists position tapes to a checkpoint directory.
///
/// The `PositionCheckpointWriter` handles:
/// - Compressing the encoded tape (none, lz4, zstd)
/// - Computing checksums for integrity verification
/// - Atomic writes (write to temp file then rename)
/// - Cleanup of old checkpoints
pub struct PositionCheckpointWriter {
    config: CheckpointConfig,
}

impl PositionCheckpointWriter {
    /// Creates a writer after validating `config`.
    pub fn new(config: CheckpointConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.config.checkpoint_dir
    }

    /// Writes `tape` and returns the path of the saved file.
    ///
    /// # Arguments
    ///
    /// * `name` - Base name for the checkpoint (e.g., "train")
    /// * `tape` - Position recorded from a pipeline
    pub fn write(&self, name: &str, tape: &Tape) -> Result<PathBuf> {
        self.write_with_metadata(name, tape, HashMap::new())
    }

    /// Writes `tape` with user-defined metadata stored in the header.
    pub fn write_with_metadata(
        &self,
        name: &str,
        tape: &Tape,
        metadata: HashMap<String, String>,
    ) -> Result<PathBuf> {
        let dir = &self.config.checkpoint_dir;
        fs::create_dir_all(dir)
            .map_err(|e| PipelineError::io(dir, "failed to create checkpoint directory", e))?;

        let encoded = tape.to_bytes()?;
        let checksum = format::checksum(&encoded);
        let compressed = format::compress(
            &encoded,
            &self.config.compression,
            self.config.compression_level,
        )?;

        let header = PositionHeader::new(
            self.config.compression.clone(),
            encoded.len() as u64,
            checksum,
            tape.len() as u64,
        )
        .with_metadata(metadata);

        let header_bytes = bincode::serialize(&header)
            .map_err(|e| PipelineError::checkpoint(format!("failed to serialize header: {e}")))?;

        let header_len = u32::try_from(header_bytes.len())
            .map_err(|_| PipelineError::checkpoint("checkpoint header too large"))?;
        let mut file_data = Vec::with_capacity(4 + header_bytes.len() + compressed.len());
        file_data.extend_from_slice(&header_len.to_le_bytes());
        file_data.extend_from_slice(&header_bytes);
        file_data.extend_from_slice(&compressed);

        let filename = self.generate_filename(name)?;
        let final_path = dir.join(&filename);

        if self.config.atomic_writes {
            let temp_path = dir.join(format!(".{filename}.tmp"));
            write_file(&temp_path, &file_data)?;
            fs::rename(&temp_path, &final_path)
                .map_err(|e| PipelineError::io(&final_path, "failed to rename checkpoint", e))?;
        } else {
            write_file(&final_path, &file_data)?;
        }

        tracing::debug!(
            path = %final_path.display(),
            values = tape.len(),
            bytes = file_data.len(),
            "wrote position checkpoint"
        );

        self.cleanup_old_checkpoints(name)?;

        Ok(final_path)
    }

    /// Names a new checkpoint after the current time in milliseconds. If that
    /// name is already taken (or a newer one exists), the timestamp is bumped
    /// past the newest existing checkpoint so files never collide and stay in
    /// write order.
    fn generate_filename(&self, name: &str) -> Result<String> {
        let mut timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        let dir = &self.config.checkpoint_dir;
        if dir.exists() {
            if let Some(newest) = list_checkpoints(dir, name)?
                .last()
                .and_then(|filename| parse_timestamp(filename, name))
            {
                timestamp = timestamp.max(newest + 1);
            }
        }

        Ok(format!("{name}_{timestamp}.pos"))
    }

    /// Keeps only the most recent `keep_last_n` checkpoints named `name`.
    fn cleanup_old_checkpoints(&self, name: &str) -> Result<()> {
        let mut matching = list_checkpoints(&self.config.checkpoint_dir, name)?;
        if matching.len() <= self.config.keep_last_n {
            return Ok(());
        }

        let to_delete = matching.len() - self.config.keep_last_n;
        for filename in matching.drain(..to_delete) {
            let path = self.config.checkpoint_dir.join(&filename);
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!("failed to remove old checkpoint {}: {}", path.display(), e);
            }
        }

        Ok(())
    }
}

/// Lists checkpoint file names for `name` in `dir`, oldest first.
pub(crate) fn list_checkpoints(dir: &Path, name: &str) -> Result<Vec<String>> {
    let entries =
        fs::read_dir(dir).map_err(|e| PipelineError::io(dir, "failed to list checkpoints", e))?;

    let mut matching = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, "failed to list checkpoints", e))?;
        let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if let Some(timestamp) = parse_timestamp(&filename, name) {
            matching.push((timestamp, filename));
        }
    }

    matching.sort();
    Ok(matching.into_iter().map(|(_, filename)| filename).collect())
}

/// Timestamp of a checkpoint file named `name`. Other names sharing the
/// prefix, e.g. "train_eval_..." for "train", yield `None`.
fn parse_timestamp(filename: &str, name: &str) -> Option<u128> {
    filename
        .strip_prefix(name)?
        .strip_prefix('_')?
        .strip_suffix(".pos")?
        .parse()
        .ok()
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)
        .map_err(|e| PipelineError::io(path, "failed to create checkpoint file", e))?;
    file.write_all(data)
        .map_err(|e| PipelineError::io(path, "failed to write checkpoint data", e))?;
    file.sync_all()
        .map_err(|e| PipelineError::io(path, "failed to sync checkpoint file", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_writer(compression: &str, keep_last_n: usize) -> (PositionCheckpointWriter, TempDir) {
        let temp_dir = TempDir::new().unwrap();

        let config = CheckpointConfig {
            checkpoint_dir: temp_dir.path().join("checkpoints"),
            compression: compression.to_string(),
            compression_level: 1,
            keep_last_n,
            atomic_writes: true,
        };

        (PositionCheckpointWriter::new(config).unwrap(), temp_dir)
    }

    fn sample_tape() -> Tape {
        let mut tape = Tape::new();
        tape.record(&3usize);
        tape.record(&42usize);
        tape
    }

    #[test]
    fn test_write_creates_file() {
        let (writer, _temp) = create_test_writer("none", 3);

        let path = writer.write("train", &sample_tape()).unwrap();

        assert!(path.exists());
        assert!(path.starts_with(writer.checkpoint_dir()));
    }

    #[test]
    fn test_timestamped_filename() {
        let (writer, _temp) = create_test_writer("none", 3);

        let filename = writer.generate_filename("train").unwrap();

        assert!(filename.starts_with("train_"));
        assert!(filename.ends_with(".pos"));
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let (writer, _temp) = create_test_writer("lz4", 3);

        let path = writer.write("atomic", &sample_tape()).unwrap();

        let temp_path = path.with_file_name(format!(
            ".{}.tmp",
            path.file_name().unwrap().to_str().unwrap()
        ));
        assert!(path.exists());
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_cleanup_old_checkpoints() {
        let (writer, _temp) = create_test_writer("none", 2);

        for _ in 0..4 {
            writer.write("train", &sample_tape()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10)); // Ensure different timestamps
        }
        writer.write("train_eval", &sample_tape()).unwrap();

        let remaining = list_checkpoints(writer.checkpoint_dir(), "train").unwrap();
        assert_eq!(remaining.len(), 2);

        // Cleanup of one name leaves other names alone
        let other = list_checkpoints(writer.checkpoint_dir(), "train_eval").unwrap();
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn test_rapid_writes_get_distinct_files() {
        let (writer, _temp) = create_test_writer("none", 10);

        let paths: Vec<PathBuf> = (0..5)
            .map(|_| writer.write("train", &sample_tape()).unwrap())
            .collect();

        let remaining = list_checkpoints(writer.checkpoint_dir(), "train").unwrap();
        assert_eq!(remaining.len(), 5);

        let names: Vec<String> = paths
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, remaining);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CheckpointConfig {
            compression: "brotli".to_string(),
            ..Default::default()
        };
        assert!(PositionCheckpointWriter::new(config).is_err());
    }
}
