//! Error types for hashfs_core.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using hashfs_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while packing an archive.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("Failed to walk {path}: {reason}")]
    Walk { path: PathBuf, reason: String },

    /// The source to pack is missing or not a directory.
    #[error("Invalid source at {path}: {reason}")]
    InvalidSource { path: PathBuf, reason: String },

    /// A size or offset does not fit its on-disk field.
    #[error("{what} of {value} exceeds the limit of {limit}")]
    SizeLimit {
        what: &'static str,
        value: u64,
        limit: u64,
    },

    /// A data offset is not on a block boundary.
    #[error("Offset {offset} is not aligned to {block_size} bytes")]
    Misaligned { offset: u64, block_size: u64 },

    /// The compressor failed.
    #[error("Compression error: {reason}")]
    Compression { reason: String },

    /// Archive header bytes are malformed.
    #[error("Invalid header: {reason}")]
    InvalidHeader { reason: String },

    /// An entry or metadata record is malformed.
    #[error("Invalid record: {reason}")]
    InvalidRecord { reason: String },
}

impl Error {
    /// Create a Walk error.
    pub fn walk(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Walk {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a Walk error for a traversal of `root`.
    ///
    /// Uses the path carried by `err` when there is one, `root` otherwise.
    pub fn from_walk(root: &Path, err: ignore::Error) -> Self {
        let path = walk_error_path(&err).unwrap_or(root).to_path_buf();
        Error::walk(path, err.to_string())
    }

    /// Create an InvalidSource error.
    pub fn invalid_source(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a SizeLimit error.
    pub fn size_limit(what: &'static str, value: u64, limit: u64) -> Self {
        Error::SizeLimit { what, value, limit }
    }

    /// Create a Misaligned error.
    pub fn misaligned(offset: u64, block_size: u64) -> Self {
        Error::Misaligned { offset, block_size }
    }

    /// Create a Compression error.
    pub fn compression_error(reason: impl Into<String>) -> Self {
        Error::Compression {
            reason: reason.into(),
        }
    }

    /// Create an InvalidHeader error.
    pub fn invalid_header(reason: impl Into<String>) -> Self {
        Error::InvalidHeader {
            reason: reason.into(),
        }
    }

    /// Create an InvalidRecord error.
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Error::InvalidRecord {
            reason: reason.into(),
        }
    }
}

// Additional From implementations for external error types

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        let path = walk_error_path(&err).map(Path::to_path_buf).unwrap_or_default();
        Error::walk(path, err.to_string())
    }
}

fn walk_error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        ignore::Error::Partial(errs) => errs.iter().find_map(walk_error_path),
        _ => None,
    }
}
