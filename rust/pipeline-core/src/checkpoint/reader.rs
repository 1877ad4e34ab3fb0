// rust/pipeline-core/src/checkpoint/reader.rs

//! Position checkpoint reader.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::data::Tape;
use crate::error::{PipelineError, Result};

use super::format::{self, PositionHeader};
use super::writer::list_checkpoints;

/// Reads and verifies position checkpoints.
pub struct PositionCheckpointReader {
    checkpoint_dir: PathBuf,
}

impl PositionCheckpointReader {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
        }
    }

    /// Reads a checkpoint and returns its tape, positioned at the first value.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The magic bytes or version are invalid
    /// - The checksum or size doesn't match
    /// - Decompression or decoding fails
    pub fn read(&self, path: &Path) -> Result<Tape> {
        let file_data =
            fs::read(path).map_err(|e| PipelineError::io(path, "failed to read checkpoint", e))?;

        if file_data.len() < 4 {
            return Err(PipelineError::checkpoint("checkpoint file too small"));
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&file_data[..4]);
        let header_len = u32::from_le_bytes(len_bytes) as usize;

        if file_data.len() < 4 + header_len {
            return Err(PipelineError::checkpoint(
                "checkpoint file truncated: header incomplete",
            ));
        }

        let header = decode_header(&file_data[4..4 + header_len])?;
        validate_header(&header)?;

        let encoded = format::decompress(&file_data[4 + header_len..], &header.compression)?;

        let computed_checksum = format::checksum(&encoded);
        if computed_checksum != header.checksum {
            return Err(PipelineError::checkpoint(format!(
                "checksum mismatch: expected {}, got {}",
                header.checksum, computed_checksum
            )));
        }

        if encoded.len() as u64 != header.uncompressed_size {
            return Err(PipelineError::checkpoint(format!(
                "size mismatch: expected {}, got {}",
                header.uncompressed_size,
                encoded.len()
            )));
        }

        let tape = Tape::from_bytes(&encoded)?;
        if tape.len() as u64 != header.num_values {
            return Err(PipelineError::checkpoint(format!(
                "value count mismatch: expected {}, got {}",
                header.num_values,
                tape.len()
            )));
        }

        Ok(tape)
    }

    /// Reads only the header of a checkpoint.
    pub fn read_header(&self, path: &Path) -> Result<PositionHeader> {
        let mut file =
            fs::File::open(path).map_err(|e| PipelineError::io(path, "failed to open checkpoint", e))?;

        let file_len = file
            .metadata()
            .map_err(|e| PipelineError::io(path, "failed to stat checkpoint", e))?
            .len();

        let mut len_bytes = [0u8; 4];
        file.read_exact(&mut len_bytes)
            .map_err(|e| PipelineError::io(path, "failed to read header length", e))?;
        let header_len = u32::from_le_bytes(len_bytes) as usize;

        if file_len < 4 + header_len as u64 {
            return Err(PipelineError::checkpoint(
                "checkpoint file truncated: header incomplete",
            ));
        }

        let mut header_bytes = vec![0u8; header_len];
        file.read_exact(&mut header_bytes)
            .map_err(|e| PipelineError::io(path, "failed to read header", e))?;

        let header = decode_header(&header_bytes)?;
        validate_header(&header)?;
        Ok(header)
    }

    /// Path of the most recent checkpoint named `name`, if any.
    pub fn latest(&self, name: &str) -> Result<Option<PathBuf>> {
        if !self.checkpoint_dir.exists() {
            return Ok(None);
        }
        let checkpoints = list_checkpoints(&self.checkpoint_dir, name)?;
        Ok(checkpoints
            .last()
            .map(|filename| self.checkpoint_dir.join(filename)))
    }

    /// Reads the most recent checkpoint named `name`, if any.
    pub fn read_latest(&self, name: &str) -> Result<Option<Tape>> {
        match self.latest(name)? {
            Some(path) => self.read(&path).map(Some),
            None => Ok(None),
        }
    }
}

fn decode_header(bytes: &[u8]) -> Result<PositionHeader> {
    bincode::deserialize(bytes)
        .map_err(|e| PipelineError::checkpoint(format!("failed to deserialize header: {e}")))
}

fn validate_header(header: &PositionHeader) -> Result<()> {
    if !header.validate_magic() {
        return Err(PipelineError::checkpoint(format!(
            "invalid magic bytes: expected {:?}, got {:?}",
            PositionHeader::MAGIC,
            header.magic
        )));
    }

    if !header.validate_version() {
        return Err(PipelineError::checkpoint(format!(
            "unsupported version: expected {}, got {}",
            PositionHeader::VERSION,
            header.version
        )));
    }

    Ok(())
}
