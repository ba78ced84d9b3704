//! Path hashing for HashFS V2 entry lookup.
//!
//! The archive indexes files by a 64-bit fingerprint of their normalized path.
//! Readers compute the same fingerprint and binary-search the entry table, so
//! the function below must stay bit-identical to the `CITY` method they expect,
//! including the fact that a trailing chunk shorter than 8 bytes is never mixed in.

use serde::{Serialize, Serializer};
use std::fmt;

/// Multiplier and seed of the path hash.
pub const HASH_K1: u64 = 0x9ddf_ea08_eb38_2d69;

/// Four-byte tag naming the hash method in the archive header.
pub const HASH_METHOD: &[u8; 4] = b"CITY";

/// Number of bytes folded into the hash per step.
const CHUNK_SIZE: usize = 8;

/// A 64-bit path hash as stored in the entry table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PathHash(u64);

impl PathHash {
    /// Wrap a raw hash value.
    pub fn from_u64(value: u64) -> Self {
        PathHash(value)
    }

    /// Get the raw hash value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Little-endian bytes, as written to the entry table.
    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Convert to hex string (16 characters).
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    /// Hash an archive path.
    ///
    /// The path is normalized first (see [`normalize_path`]), so `"/Def/A.sii"`,
    /// `"def/a.sii"` and `"def\\a.sii"` all produce the same value.
    pub fn of_path(path: &str) -> Self {
        Self::of_normalized(&normalize_path(path))
    }

    /// Hash bytes that are already normalized.
    pub fn of_normalized(bytes: &[u8]) -> Self {
        let mut hash = HASH_K1 ^ bytes.len() as u64;

        for chunk in bytes.chunks_exact(CHUNK_SIZE) {
            let mut word = [0u8; CHUNK_SIZE];
            word.copy_from_slice(chunk);

            let mut k = u64::from_le_bytes(word).wrapping_mul(HASH_K1);
            k ^= k >> 47;
            k = k.wrapping_mul(HASH_K1);

            hash ^= k;
            hash = hash.wrapping_mul(HASH_K1);
        }

        PathHash(hash)
    }
}

/// Normalize an archive path to the byte form that gets hashed.
///
/// Strips one leading separator, lower-cases ASCII letters and turns
/// backslashes into forward slashes. Non-ASCII bytes are left untouched.
pub fn normalize_path(path: &str) -> Vec<u8> {
    let trimmed = path
        .strip_prefix('/')
        .or_else(|| path.strip_prefix('\\'))
        .unwrap_or(path);

    trimmed
        .bytes()
        .map(|b| match b {
            b'\\' => b'/',
            _ => b.to_ascii_lowercase(),
        })
        .collect()
}

impl fmt::Display for PathHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PathHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathHash({})", self.to_hex())
    }
}

impl Serialize for PathHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}
