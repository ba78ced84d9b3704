//! Metadata table records.
//!
//! Each entry points (by ordinal) at one record in the metadata table. A
//! record is a 4-byte kind prefix followed by a 16-byte body:
//!
//! ```text
//! 0x00  4   kind prefix: [128, 0, 0, 0] for plain files
//! 0x04  4   compressed size: low 28 bits, 0x10 in byte 3 = compressed
//! 0x08  4   uncompressed size: low 28 bits
//! 0x0C  4   reserved (u32 LE) = 0
//! 0x10  4   block index (u32 LE) = data offset / 16
//! ```
//!
//! The header stores only the table length, so readers rely on the fixed
//! 20-byte stride.

use crate::error::{Error, Result};
use crate::header::BLOCK_SIZE;

/// Size of the record body in bytes.
pub const METADATA_BODY_SIZE: usize = 16;

/// Size of the kind prefix in bytes.
pub const METADATA_PREFIX_SIZE: usize = 4;

/// Size of a full record in the metadata table.
pub const METADATA_RECORD_SIZE: usize = METADATA_PREFIX_SIZE + METADATA_BODY_SIZE;

/// Largest size storable in a 28-bit size field.
pub const MAX_SIZE: u64 = (1 << 28) - 1;

/// Flag in the fourth byte of the compressed-size field.
const COMPRESSED_FLAG: u8 = 0x10;

/// Metadata record kinds.
///
/// Only plain files are emitted; the tag byte leaves room for other kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// A plain file carrying compressed and uncompressed sizes.
    PlainFile = 128,
}

impl MetadataKind {
    /// Convert to byte representation.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse from byte representation.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            128 => Ok(MetadataKind::PlainFile),
            _ => Err(Error::invalid_record(format!(
                "Invalid metadata kind: {}",
                value
            ))),
        }
    }

    /// The 4-byte prefix written ahead of each record body.
    pub fn prefix(self) -> [u8; METADATA_PREFIX_SIZE] {
        [self.to_u8(), 0, 0, 0]
    }
}

/// Size and location of one packed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Size of the data block in bytes.
    pub compressed_size: u32,
    /// Size of the original file in bytes.
    pub uncompressed_size: u32,
    /// Data block offset divided by [`BLOCK_SIZE`].
    pub block_index: u32,
    /// Whether the data block is compressed.
    pub compressed: bool,
}

impl MetadataRecord {
    /// Create a record, validating that every value fits its field.
    pub fn new(
        compressed_size: u64,
        uncompressed_size: u64,
        data_offset: u64,
        compressed: bool,
    ) -> Result<Self> {
        if compressed_size > MAX_SIZE {
            return Err(Error::size_limit("compressed size", compressed_size, MAX_SIZE));
        }
        if uncompressed_size > MAX_SIZE {
            return Err(Error::size_limit(
                "uncompressed size",
                uncompressed_size,
                MAX_SIZE,
            ));
        }
        if !data_offset.is_multiple_of(BLOCK_SIZE) {
            return Err(Error::misaligned(data_offset, BLOCK_SIZE));
        }

        let block_index = data_offset / BLOCK_SIZE;
        let block_index = u32::try_from(block_index).map_err(|_| {
            Error::size_limit("data offset", data_offset, u32::MAX as u64 * BLOCK_SIZE)
        })?;

        Ok(Self {
            compressed_size: compressed_size as u32,
            uncompressed_size: uncompressed_size as u32,
            block_index,
            compressed,
        })
    }

    /// Absolute byte offset of the data block.
    pub fn data_offset(&self) -> u64 {
        self.block_index as u64 * BLOCK_SIZE
    }

    /// Encode the 16-byte record body.
    pub fn encode(&self) -> [u8; METADATA_BODY_SIZE] {
        let mut buf = [0u8; METADATA_BODY_SIZE];

        buf[0..4].copy_from_slice(&pack_size(self.compressed_size));
        if self.compressed {
            buf[3] |= COMPRESSED_FLAG;
        }
        buf[4..8].copy_from_slice(&pack_size(self.uncompressed_size));

        // buf[8..12] is reserved and stays zero.
        buf[12..16].copy_from_slice(&self.block_index.to_le_bytes());

        buf
    }

    /// Encode the full 20-byte table record, kind prefix included.
    pub fn encode_with_prefix(&self) -> [u8; METADATA_RECORD_SIZE] {
        let mut buf = [0u8; METADATA_RECORD_SIZE];
        buf[..METADATA_PREFIX_SIZE].copy_from_slice(&MetadataKind::PlainFile.prefix());
        buf[METADATA_PREFIX_SIZE..].copy_from_slice(&self.encode());
        buf
    }

    /// Decode a 16-byte record body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < METADATA_BODY_SIZE {
            return Err(Error::invalid_record(format!(
                "Metadata record too short: {} bytes (expected {})",
                buf.len(),
                METADATA_BODY_SIZE
            )));
        }

        let compressed = buf[3] & COMPRESSED_FLAG != 0;
        let compressed_size = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3] & 0x0F]);
        let uncompressed_size = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7] & 0x0F]);
        let block_index = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);

        Ok(Self {
            compressed_size,
            uncompressed_size,
            block_index,
            compressed,
        })
    }
}

/// Encode a plain-file record body from raw values.
pub fn encode_metadata(
    compressed_size: u64,
    uncompressed_size: u64,
    data_offset: u64,
    compressed: bool,
) -> Result<[u8; METADATA_BODY_SIZE]> {
    Ok(MetadataRecord::new(compressed_size, uncompressed_size, data_offset, compressed)?.encode())
}

/// Low 28 bits, little-endian, top nibble clear.
fn pack_size(size: u32) -> [u8; 4] {
    (size & MAX_SIZE as u32).to_le_bytes()
}
