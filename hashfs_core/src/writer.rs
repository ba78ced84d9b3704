//! Archive writing.
//!
//! Layout of a finished archive:
//!
//! ```text
//! 0x00            ArchiveHeader (56 bytes, written last)
//! aligned16       data blocks, each starting on a 16-byte boundary
//! aligned16       entry table (16 bytes per entry, sorted by hash)
//! aligned16       metadata table (20 bytes per entry)
//! ```

use crate::compress::{Compressor, DEFAULT_LEVEL};
use crate::entry::{
    ENTRY_SIZE, EntryTableEntry, build_entry_table, duplicate_hashes, encode_entry_table,
};
use crate::error::{Error, Result};
use crate::hash::PathHash;
use crate::header::{ArchiveHeader, BLOCK_SIZE, HEADER_SIZE};
use crate::metadata::{MAX_SIZE, METADATA_RECORD_SIZE, MetadataRecord};
use crate::walk::{collect_files_skipping, sort_by_hash};
use serde::Serialize;
use std::fs;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Options for [`pack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackOptions {
    /// zlib level, 0..=9.
    pub compression_level: u32,
    /// Follow symbolic links while walking the source tree.
    pub follow_links: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_LEVEL,
            follow_links: false,
        }
    }
}

/// Statistics from a finished archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackStats {
    /// Number of files packed.
    pub files_packed: usize,
    /// Total size of the source files.
    pub bytes_in: u64,
    /// Total size of the compressed data blocks.
    pub bytes_compressed: u64,
    /// Size of the archive.
    pub archive_size: u64,
    /// Offset of the entry table.
    pub entry_table_start: u64,
    /// Offset of the metadata table.
    pub metadata_table_start: u64,
    /// Number of hashes shared by more than one file.
    pub duplicate_hashes: usize,
}

/// Streams data blocks to `out` and writes the tables and header on [`finish`].
///
/// [`finish`]: ArchiveWriter::finish
pub struct ArchiveWriter<W: Write + Seek> {
    out: W,
    compressor: Compressor,
    entries: Vec<EntryTableEntry>,
    metadata: Vec<u8>,
    bytes_in: u64,
    bytes_compressed: u64,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Start an archive at the current position of `out`, which must be 0.
    ///
    /// Reserves the header with zero bytes.
    pub fn new(mut out: W, compressor: Compressor) -> Result<Self> {
        let pos = out.stream_position()?;
        if pos != 0 {
            return Err(Error::invalid_header(format!(
                "archive must start at offset 0, writer is at {}",
                pos
            )));
        }
        out.write_all(&[0u8; HEADER_SIZE])?;
        Ok(Self {
            out,
            compressor,
            entries: Vec::new(),
            metadata: Vec::new(),
            bytes_in: 0,
            bytes_compressed: 0,
        })
    }

    /// Number of files added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no files were added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compress `data` and append it as a new data block.
    ///
    /// Metadata records are numbered in call order, so calling this in
    /// ascending hash order keeps the metadata table in entry table order.
    pub fn add_file(&mut self, hash: PathHash, data: &[u8]) -> Result<MetadataRecord> {
        let uncompressed_size = data.len() as u64;
        check_file_size(uncompressed_size)?;

        let metadata_index = u32::try_from(self.entries.len()).map_err(|_| {
            Error::size_limit("entry count", self.entries.len() as u64, u32::MAX as u64)
        })?;

        let compressed = self.compressor.compress(data)?;

        let data_offset = align(&mut self.out)?;
        let record =
            MetadataRecord::new(compressed.len() as u64, uncompressed_size, data_offset, true)?;
        self.out.write_all(&compressed)?;

        self.entries.push(EntryTableEntry::new(hash, metadata_index, true));
        self.metadata.extend_from_slice(&record.encode_with_prefix());

        self.bytes_in += uncompressed_size;
        self.bytes_compressed += compressed.len() as u64;

        Ok(record)
    }

    /// Write the entry table, metadata table and header.
    ///
    /// Returns the underlying writer, positioned just past the header.
    pub fn finish(mut self) -> Result<(W, PackStats)> {
        let entries = build_entry_table(std::mem::take(&mut self.entries));
        let duplicates = duplicate_hashes(&entries);
        for hash in &duplicates {
            log::warn!("hash collision: {} is shared by more than one path", hash);
        }

        let count = u32::try_from(entries.len()).map_err(|_| {
            Error::size_limit("entry count", entries.len() as u64, u32::MAX as u64)
        })?;
        let entry_table_length = table_length("entry table", entries.len() * ENTRY_SIZE)?;
        let metadata_table_length = table_length("metadata table", self.metadata.len())?;
        debug_assert_eq!(self.metadata.len(), entries.len() * METADATA_RECORD_SIZE);

        let entry_table_start = align(&mut self.out)?;
        self.out.write_all(&encode_entry_table(&entries))?;

        let metadata_table_start = align(&mut self.out)?;
        self.out.write_all(&self.metadata)?;

        let archive_size = self.out.stream_position()?;

        let header = ArchiveHeader {
            num_entries: count,
            entry_table_length,
            num_metadata_entries: count,
            metadata_table_length,
            entry_table_start,
            metadata_table_start,
            ..ArchiveHeader::default()
        };

        self.out.seek(SeekFrom::Start(0))?;
        self.out.write_all(&header.encode())?;
        self.out.flush()?;

        let stats = PackStats {
            files_packed: entries.len(),
            bytes_in: self.bytes_in,
            bytes_compressed: self.bytes_compressed,
            archive_size,
            entry_table_start,
            metadata_table_start,
            duplicate_hashes: duplicates.len(),
        };

        Ok((self.out, stats))
    }
}

/// Pack every regular file under `source` into a HashFS V2 archive at `output`.
///
/// The archive is written to a temporary file next to `output` and moved into
/// place only once complete, so a failed run never leaves a partial archive
/// at `output`.
pub fn pack(source: &Path, output: &Path, options: &PackOptions) -> Result<PackStats> {
    let compressor = Compressor::new(options.compression_level)?;

    let out_dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp_file = create_temp_file(out_dir)?;

    // The output may live inside the source tree.
    let skip = [temp_file.path(), output];
    let mut files = collect_files_skipping(source, options.follow_links, &skip)?;
    sort_by_hash(&mut files);
    log::info!("packing {} files from {}", files.len(), source.display());

    let mut writer = ArchiveWriter::new(BufWriter::new(temp_file), compressor)?;

    for file in &files {
        let data = read_source(&file.source)?;

        let record = writer.add_file(file.hash, &data)?;
        log::debug!(
            "{} {} ({} -> {} bytes) at {:#x}",
            file.hash,
            file.archive_path,
            record.uncompressed_size,
            record.compressed_size,
            record.data_offset()
        );
    }

    let (buffered, stats) = writer.finish()?;
    let temp_file = buffered.into_inner().map_err(|e| e.into_error())?;
    temp_file.persist(output)?;

    log::info!(
        "wrote {} ({} entries, {} bytes)",
        output.display(),
        stats.files_packed,
        stats.archive_size
    );

    Ok(stats)
}

/// Reject files too large for the 28-bit size fields.
fn check_file_size(len: u64) -> Result<()> {
    if len > MAX_SIZE {
        return Err(Error::size_limit("uncompressed size", len, MAX_SIZE));
    }
    Ok(())
}

/// Read a source file, checking its size before loading it.
fn read_source(path: &Path) -> Result<Vec<u8>> {
    let io_error = |e: io::Error| Error::Io {
        source: io::Error::new(e.kind(), format!("Failed to read {}: {}", path.display(), e)),
    };

    let mut file = fs::File::open(path).map_err(io_error)?;
    let len = file.metadata().map_err(io_error)?.len();
    check_file_size(len)?;

    let mut data = Vec::with_capacity(len as usize);
    file.read_to_end(&mut data).map_err(io_error)?;
    Ok(data)
}

/// Temporary archive in `dir`, created with the mode a plain
/// `File::create` would get.
fn create_temp_file(dir: &Path) -> io::Result<tempfile::NamedTempFile> {
    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // The process umask still applies.
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

/// Pad `out` with zeros up to the next block boundary and return the position.
fn align<W: Write + Seek>(out: &mut W) -> Result<u64> {
    let pos = out.stream_position()?;
    let padding = padding_for(pos);
    if padding > 0 {
        out.write_all(&[0u8; BLOCK_SIZE as usize][..padding])?;
    }
    Ok(pos + padding as u64)
}

/// Bytes needed to reach the next multiple of [`BLOCK_SIZE`].
fn padding_for(pos: u64) -> usize {
    ((BLOCK_SIZE - pos % BLOCK_SIZE) % BLOCK_SIZE) as usize
}

fn table_length(what: &'static str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::size_limit(what, len as u64, u32::MAX as u64))
}
