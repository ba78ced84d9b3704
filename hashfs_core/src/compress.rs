//! DEFLATE compression of data blocks.
//!
//! Blocks are zlib streams (2-byte header, raw DEFLATE, Adler-32 trailer),
//! the same framing zlib's one-shot `compress` produces.

use crate::error::{Error, Result};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;

/// Default zlib compression level.
pub const DEFAULT_LEVEL: u32 = 6;

/// Highest zlib compression level.
pub const MAX_LEVEL: u32 = 9;

/// Worst-case zlib output size for `len` input bytes.
pub fn compress_bound(len: usize) -> usize {
    len + (len >> 12) + (len >> 14) + (len >> 25) + 13
}

/// zlib compressor with a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    level: u32,
}

impl Default for Compressor {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

impl Compressor {
    /// Create a compressor. Levels run from 0 (store) to 9 (best).
    pub fn new(level: u32) -> Result<Self> {
        if level > MAX_LEVEL {
            return Err(Error::compression_error(format!(
                "Invalid compression level {} (expected 0..={})",
                level, MAX_LEVEL
            )));
        }
        Ok(Self { level })
    }

    /// The configured level.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Compress a whole buffer into a zlib stream.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let capacity = compress_bound(data.len());
        let mut encoder =
            ZlibEncoder::new(Vec::with_capacity(capacity), Compression::new(self.level));
        encoder
            .write_all(data)
            .map_err(|e| Error::compression_error(format!("zlib compression failed: {}", e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| Error::compression_error(format!("zlib compression failed: {}", e)))?;

        Ok(compressed)
    }
}
