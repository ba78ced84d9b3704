//! # HashFS Core
//!
//! A packer for HashFS V2 archives (`SCS#` magic, `CITY` path hashing).
//!
//! An archive bundles a directory tree into one file that readers index by a
//! 64-bit hash of each file's path. This crate turns a source directory into
//! such an archive: it hashes every path, compresses each file into a
//! 16-byte aligned data block, and writes the sorted entry table, the
//! metadata table and the header.
//!
//! ## Example
//!
//! ```no_run
//! use hashfs_core::{PackOptions, PathHash, pack};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stats = pack(Path::new("./my-mod"), Path::new("./my-mod.scs"), &PackOptions::default())?;
//! println!("Packed {} files", stats.files_packed);
//!
//! // Readers look files up by this value.
//! println!("{}", PathHash::of_path("/manifest.sii"));
//! # Ok(())
//! # }
//! ```

mod compress;
mod entry;
mod error;
mod hash;
mod header;
mod metadata;
mod walk;
mod writer;

pub use compress::{Compressor, DEFAULT_LEVEL, MAX_LEVEL, compress_bound};
pub use entry::{
    ENTRY_SIZE, EntryTableEntry, build_entry_table, duplicate_hashes, encode_entry_table,
    entry_flags,
};
pub use error::{Error, Result};
pub use hash::{HASH_K1, HASH_METHOD, PathHash, normalize_path};
pub use header::{ArchiveHeader, BLOCK_SIZE, HEADER_SIZE, MAGIC, PLATFORM_PC, VERSION};
pub use metadata::{
    MAX_SIZE, METADATA_BODY_SIZE, METADATA_PREFIX_SIZE, METADATA_RECORD_SIZE, MetadataKind,
    MetadataRecord, encode_metadata,
};
pub use walk::{
    FileRecord, archive_path, collect_files, collect_files_skipping, sort_by_hash,
};
pub use writer::{ArchiveWriter, PackOptions, PackStats, pack};
