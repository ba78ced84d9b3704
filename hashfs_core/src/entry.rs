//! Entry table records and ordering.
//!
//! Each packed file gets one 16-byte entry:
//!
//! ```text
//! 0x00  8   path hash (u64 LE)
//! 0x08  4   metadata index (u32 LE), ordinal into the metadata table
//! 0x0C  2   metadata count (u16 LE) = 1
//! 0x0E  2   flags (u16 LE), 0x4 = compressed
//! ```
//!
//! The table is sorted by hash so readers can binary-search it.

use crate::error::{Error, Result};
use crate::hash::PathHash;

/// Size of an entry table record in bytes.
pub const ENTRY_SIZE: usize = 16;

/// Entry flag bits.
pub mod entry_flags {
    /// The entry's data is compressed.
    pub const COMPRESSED: u16 = 0x4;
}

/// One record of the entry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTableEntry {
    /// Hash of the archive path.
    pub hash: PathHash,
    /// Ordinal of the first metadata record for this entry.
    pub metadata_index: u32,
    /// Number of metadata records for this entry.
    pub metadata_count: u16,
    /// Flag bits (see [`entry_flags`]).
    pub flags: u16,
}

impl EntryTableEntry {
    /// Create an entry with a single metadata record.
    pub fn new(hash: PathHash, metadata_index: u32, compressed: bool) -> Self {
        Self {
            hash,
            metadata_index,
            metadata_count: 1,
            flags: if compressed { entry_flags::COMPRESSED } else { 0 },
        }
    }

    /// Check whether the compressed flag is set.
    pub fn is_compressed(&self) -> bool {
        self.flags & entry_flags::COMPRESSED != 0
    }

    /// Encode to a 16-byte array.
    pub fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[0..8].copy_from_slice(&self.hash.to_le_bytes());
        buf[8..12].copy_from_slice(&self.metadata_index.to_le_bytes());
        buf[12..14].copy_from_slice(&self.metadata_count.to_le_bytes());
        buf[14..16].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }

    /// Decode from a byte slice of at least 16 bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ENTRY_SIZE {
            return Err(Error::invalid_record(format!(
                "Entry too short: {} bytes (expected {})",
                buf.len(),
                ENTRY_SIZE
            )));
        }

        let mut hash = [0u8; 8];
        hash.copy_from_slice(&buf[0..8]);

        Ok(Self {
            hash: PathHash::from_u64(u64::from_le_bytes(hash)),
            metadata_index: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            metadata_count: u16::from_le_bytes([buf[12], buf[13]]),
            flags: u16::from_le_bytes([buf[14], buf[15]]),
        })
    }
}

/// Order entries by ascending hash.
///
/// The sort is stable: entries with equal hashes keep their input order.
pub fn build_entry_table(mut entries: Vec<EntryTableEntry>) -> Vec<EntryTableEntry> {
    entries.sort_by_key(|e| e.hash);
    entries
}

/// Serialize entries back to back.
pub fn encode_entry_table(entries: &[EntryTableEntry]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(entries.len() * ENTRY_SIZE);
    for entry in entries {
        buf.extend_from_slice(&entry.encode());
    }
    buf
}

/// Hashes that occur more than once in a sorted table.
///
/// Readers cannot tell colliding paths apart, so callers report these.
pub fn duplicate_hashes(sorted: &[EntryTableEntry]) -> Vec<PathHash> {
    let mut dups: Vec<PathHash> = sorted
        .windows(2)
        .filter(|w| w[0].hash == w[1].hash)
        .map(|w| w[0].hash)
        .collect();
    dups.dedup();
    dups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hash: u64, index: u32) -> EntryTableEntry {
        EntryTableEntry::new(PathHash::from_u64(hash), index, true)
    }

    #[test]
    fn test_encode_layout() {
        let buf = entry(0x0102_0304_0506_0708, 7).encode();
        assert_eq!(&buf[0..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&buf[8..12], &[7, 0, 0, 0]);
        assert_eq!(&buf[12..14], &[1, 0]);
        assert_eq!(&buf[14..16], &[4, 0]);
    }

    #[test]
    fn test_uncompressed_flags() {
        let e = EntryTableEntry::new(PathHash::from_u64(1), 0, false);
        assert_eq!(e.flags, 0);
        assert!(!e.is_compressed());
        assert!(entry(1, 0).is_compressed());
    }

    #[test]
    fn test_decode() {
        let e = entry(u64::MAX, 42);
        assert_eq!(EntryTableEntry::decode(&e.encode()).unwrap(), e);
        assert!(EntryTableEntry::decode(&[0u8; 15]).is_err());
    }

    #[test]
    fn test_build_sorts_by_hash() {
        let table = build_entry_table(vec![entry(30, 0), entry(10, 1), entry(20, 2)]);
        let hashes: Vec<u64> = table.iter().map(|e| e.hash.as_u64()).collect();
        assert_eq!(hashes, vec![10, 20, 30]);
    }

    #[test]
    fn test_build_sort_is_unsigned() {
        let table = build_entry_table(vec![entry(u64::MAX, 0), entry(1, 1)]);
        assert_eq!(table[0].hash.as_u64(), 1);
    }

    #[test]
    fn test_build_keeps_collision_order() {
        let table = build_entry_table(vec![entry(5, 0), entry(1, 1), entry(5, 2)]);
        assert_eq!(table[1].metadata_index, 0);
        assert_eq!(table[2].metadata_index, 2);
    }

    #[test]
    fn test_encode_entry_table() {
        let table = vec![entry(1, 0), entry(2, 1)];
        let buf = encode_entry_table(&table);
        assert_eq!(buf.len(), 2 * ENTRY_SIZE);
        assert_eq!(&buf[16..32], &table[1].encode());
    }

    #[test]
    fn test_duplicate_hashes() {
        let table = build_entry_table(vec![entry(3, 0), entry(3, 1), entry(3, 2), entry(4, 3)]);
        assert_eq!(duplicate_hashes(&table), vec![PathHash::from_u64(3)]);
        assert!(duplicate_hashes(&[entry(1, 0), entry(2, 1)]).is_empty());
        assert!(duplicate_hashes(&[]).is_empty());
    }

    use proptest::prelude::*;

    proptest! {
        /// Any input order yields a non-decreasing table.
        #[test]
        fn prop_table_sorted(hashes in prop::collection::vec(any::<u64>(), 0..64)) {
            let input = hashes
                .iter()
                .enumerate()
                .map(|(i, &h)| entry(h, i as u32))
                .collect();
            let table = build_entry_table(input);
            prop_assert!(table.windows(2).all(|w| w[0].hash <= w[1].hash));
            prop_assert_eq!(table.len(), hashes.len());
        }
    }
}
