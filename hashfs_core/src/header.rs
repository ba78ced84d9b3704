//! Archive header format and encoding.
//!
//! Every archive starts with a 56-byte header. It is written last, once the
//! position and size of every other section is known:
//!
//! ```text
//! 0x00  4   "SCS#" magic
//! 0x04  2   version (u16 LE) = 2
//! 0x06  2   salt (u16 LE) = 0
//! 0x08  4   hash method = "CITY"
//! 0x0C  4   num_entries (u32 LE)
//! 0x10  4   entry_table_length (u32 LE)
//! 0x14  4   num_metadata_entries (u32 LE)
//! 0x18  4   metadata_table_length (u32 LE)
//! 0x1C  8   entry_table_start (u64 LE)
//! 0x24  8   metadata_table_start (u64 LE)
//! 0x2C  8   security_descriptor_offset (u64 LE) = 0
//! 0x34  4   platform (u32 LE) = 0 (PC)
//! ```

use crate::error::{Error, Result};
use crate::hash::HASH_METHOD;

/// Magic bytes at the start of every archive.
pub const MAGIC: &[u8; 4] = b"SCS#";

/// Archive format version.
pub const VERSION: u16 = 2;

/// Size of the archive header in bytes.
pub const HEADER_SIZE: usize = 56;

/// Alignment unit for data blocks and tables, and the unit of block indices.
pub const BLOCK_SIZE: u64 = 16;

/// Platform tag for PC archives.
pub const PLATFORM_PC: u32 = 0;

/// The 56-byte archive header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Format version.
    pub version: u16,
    /// Hash salt. Always 0.
    pub salt: u16,
    /// Hash method tag.
    pub hash_method: [u8; 4],
    /// Number of entry table records.
    pub num_entries: u32,
    /// Entry table size in bytes.
    pub entry_table_length: u32,
    /// Number of metadata records.
    pub num_metadata_entries: u32,
    /// Metadata table size in bytes.
    pub metadata_table_length: u32,
    /// Absolute offset of the entry table.
    pub entry_table_start: u64,
    /// Absolute offset of the metadata table.
    pub metadata_table_start: u64,
    /// Absolute offset of the security descriptor (0 = absent).
    pub security_descriptor_offset: u64,
    /// Target platform.
    pub platform: u32,
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        Self {
            version: VERSION,
            salt: 0,
            hash_method: *HASH_METHOD,
            num_entries: 0,
            entry_table_length: 0,
            num_metadata_entries: 0,
            metadata_table_length: 0,
            entry_table_start: 0,
            metadata_table_start: 0,
            security_descriptor_offset: 0,
            platform: PLATFORM_PC,
        }
    }
}

impl ArchiveHeader {
    /// Encode the header to a 56-byte array.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.salt.to_le_bytes());
        buf[8..12].copy_from_slice(&self.hash_method);

        buf[12..16].copy_from_slice(&self.num_entries.to_le_bytes());
        buf[16..20].copy_from_slice(&self.entry_table_length.to_le_bytes());
        buf[20..24].copy_from_slice(&self.num_metadata_entries.to_le_bytes());
        buf[24..28].copy_from_slice(&self.metadata_table_length.to_le_bytes());

        buf[28..36].copy_from_slice(&self.entry_table_start.to_le_bytes());
        buf[36..44].copy_from_slice(&self.metadata_table_start.to_le_bytes());
        buf[44..52].copy_from_slice(&self.security_descriptor_offset.to_le_bytes());

        buf[52..56].copy_from_slice(&self.platform.to_le_bytes());

        buf
    }

    /// Decode a header from a byte slice of at least 56 bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::invalid_header(format!(
                "Header too short: {} bytes (expected {})",
                buf.len(),
                HEADER_SIZE
            )));
        }

        if &buf[0..4] != MAGIC {
            return Err(Error::invalid_header(format!(
                "Invalid magic: expected {:?}, got {:?}",
                MAGIC,
                &buf[0..4]
            )));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != VERSION {
            return Err(Error::invalid_header(format!(
                "Unsupported version: {} (expected {})",
                version, VERSION
            )));
        }

        let mut hash_method = [0u8; 4];
        hash_method.copy_from_slice(&buf[8..12]);

        Ok(Self {
            version,
            salt: u16::from_le_bytes([buf[6], buf[7]]),
            hash_method,
            num_entries: read_u32(buf, 12),
            entry_table_length: read_u32(buf, 16),
            num_metadata_entries: read_u32(buf, 20),
            metadata_table_length: read_u32(buf, 24),
            entry_table_start: read_u64(buf, 28),
            metadata_table_start: read_u64(buf, 36),
            security_descriptor_offset: read_u64(buf, 44),
            platform: read_u32(buf, 52),
        })
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArchiveHeader {
        ArchiveHeader {
            num_entries: 3,
            entry_table_length: 48,
            num_metadata_entries: 3,
            metadata_table_length: 60,
            entry_table_start: 0x1_0000_0040,
            metadata_table_start: 0x1_0000_0070,
            ..ArchiveHeader::default()
        }
    }

    #[test]
    fn test_default_header_bytes() {
        let buf = ArchiveHeader::default().encode();
        assert_eq!(&buf[0..4], b"SCS#");
        assert_eq!(&buf[4..6], &[2, 0]);
        assert_eq!(&buf[6..8], &[0, 0]);
        assert_eq!(&buf[8..12], b"CITY");
        assert!(buf[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_field_offsets() {
        let buf = sample().encode();
        assert_eq!(buf.len(), 56);
        assert_eq!(&buf[12..16], &3u32.to_le_bytes());
        assert_eq!(&buf[16..20], &48u32.to_le_bytes());
        assert_eq!(&buf[20..24], &3u32.to_le_bytes());
        assert_eq!(&buf[24..28], &60u32.to_le_bytes());
        assert_eq!(&buf[28..36], &0x1_0000_0040u64.to_le_bytes());
        assert_eq!(&buf[36..44], &0x1_0000_0070u64.to_le_bytes());
        assert_eq!(&buf[44..52], &[0u8; 8]);
        assert_eq!(&buf[52..56], &[0u8; 4]);
    }

    #[test]
    fn test_decode_matches_encode() {
        let header = sample();
        let decoded = ArchiveHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(ArchiveHeader::decode(&[0u8; 10]).is_err());

        let mut buf = sample().encode();
        buf[0] = b'X';
        assert!(ArchiveHeader::decode(&buf).is_err());

        let mut buf = sample().encode();
        buf[4] = 1;
        assert!(ArchiveHeader::decode(&buf).is_err());
    }
}
