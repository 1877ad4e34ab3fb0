// rust/pipeline-core/src/checkpoint/format.rs

//! Position checkpoint file format.
//!
//! ```text
//! +------------------------+
//! | Header Length (4 bytes)|  <- u32 little-endian
//! +------------------------+
//! | Header (bincode)       |  <- PositionHeader
//! +------------------------+
//! | Compressed Tape        |  <- bincode-encoded Tape, compressed per header
//! +------------------------+
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::error::{PipelineError, Result};

/// Header for a position checkpoint file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionHeader {
    /// Magic bytes identifying a position checkpoint ("PLPT")
    pub magic: [u8; 4],
    /// Format version number
    pub version: u32,
    /// Compression algorithm used ("none", "lz4", or "zstd")
    pub compression: String,
    /// Size of the encoded tape before compression
    pub uncompressed_size: u64,
    /// XXHash64 checksum of the encoded tape
    pub checksum: u64,
    /// Number of values on the tape
    pub num_values: u64,
    /// User-defined metadata (epoch, step, ...)
    pub metadata: HashMap<String, String>,
}

impl PositionHeader {
    pub const MAGIC: [u8; 4] = *b"PLPT";

    pub const VERSION: u32 = 1;

    pub fn new(compression: String, uncompressed_size: u64, checksum: u64, num_values: u64) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            compression,
            uncompressed_size,
            checksum,
            num_values,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn validate_magic(&self) -> bool {
        self.magic == Self::MAGIC
    }

    pub fn validate_version(&self) -> bool {
        self.version == Self::VERSION
    }
}

/// XXHash64 checksum with seed 0.
pub(crate) fn checksum(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

pub(crate) fn compress(data: &[u8], compression: &str, level: i32) -> Result<Vec<u8>> {
    match compression {
        "none" => Ok(data.to_vec()),
        "lz4" => Ok(lz4_flex::compress_prepend_size(data)),
        "zstd" => zstd::encode_all(data, level)
            .map_err(|e| PipelineError::checkpoint_with_source("zstd compression failed", e)),
        _ => Err(PipelineError::checkpoint(format!(
            "unknown compression algorithm: {compression}"
        ))),
    }
}

pub(crate) fn decompress(data: &[u8], compression: &str) -> Result<Vec<u8>> {
    match compression {
        "none" => Ok(data.to_vec()),
        "lz4" => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| PipelineError::checkpoint(format!("lz4 decompression failed: {e}"))),
        "zstd" => zstd::decode_all(data)
            .map_err(|e| PipelineError::checkpoint_with_source("zstd decompression failed", e)),
        _ => Err(PipelineError::checkpoint(format!(
            "unknown compression algorithm: {compression}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_new() {
        let header = PositionHeader::new("lz4".to_string(), 1000, 12345, 7);

        assert_eq!(header.magic, PositionHeader::MAGIC);
        assert_eq!(header.version, PositionHeader::VERSION);
        assert_eq!(header.compression, "lz4");
        assert_eq!(header.uncompressed_size, 1000);
        assert_eq!(header.checksum, 12345);
        assert_eq!(header.num_values, 7);
        assert!(header.metadata.is_empty());
    }

    #[test]
    fn test_validate_magic_and_version() {
        let header = PositionHeader::new("none".to_string(), 100, 0, 0);
        assert!(header.validate_magic());
        assert!(header.validate_version());

        let mut invalid = header.clone();
        invalid.magic = *b"DTRC";
        invalid.version = 999;
        assert!(!invalid.validate_magic());
        assert!(!invalid.validate_version());
    }

    #[test]
    fn test_header_serialization() {
        let mut metadata = HashMap::new();
        metadata.insert("step".to_string(), "5000".to_string());
        let header = PositionHeader::new("zstd".to_string(), 64, 99, 3).with_metadata(metadata);

        let encoded = bincode::serialize(&header).unwrap();
        let decoded: PositionHeader = bincode::deserialize(&encoded).unwrap();

        assert_eq!(decoded.compression, "zstd");
        assert_eq!(decoded.num_values, 3);
        assert_eq!(decoded.metadata.get("step"), Some(&"5000".to_string()));
    }

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(checksum(b"hello world"), checksum(b"hello world"));
        assert_ne!(checksum(b"hello world"), checksum(b"different data"));
    }

    #[test]
    fn test_compression_algorithms() {
        let data = b"position tape position tape position tape".repeat(8);
        for algo in ["none", "lz4", "zstd"] {
            let compressed = compress(&data, algo, 3).unwrap();
            assert_eq!(decompress(&compressed, algo).unwrap(), data);
        }
        assert!(compress(&data, "gzip", 1).is_err());
        assert!(decompress(&data, "gzip").is_err());
    }
}
