//! Error types for FozDB operations.

use mediaconv_hash::PayloadHash;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for FozDB operations.
pub type FozResult<T> = Result<T, FozError>;

/// Errors that can occur while operating on a FozDB file.
///
/// The end of a pull reader is not an error: readers signal it by returning
/// `Ok(0)`.
#[derive(Debug, Error)]
pub enum FozError {
    /// The database file could not be opened or created.
    #[error("failed to open {path:?}: {source}")]
    Open {
        /// The path that failed to open.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading from the file or a payload source failed.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// Writing to the file failed.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Repositioning within the file failed.
    #[error("seek failed: {0}")]
    Seek(#[source] io::Error),

    /// The file is not a valid database.
    #[error("corrupt database: {message}")]
    CorruptDatabase {
        /// Description of the corruption.
        message: String,
    },

    /// A payload did not match its stored checksum.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    WrongChecksum {
        /// Checksum stored in the payload header.
        expected: u32,
        /// Checksum computed over the bytes read.
        actual: u32,
    },

    /// No entry exists for the requested key.
    #[error("entry not found: tag {tag}, hash {hash}")]
    EntryNotFound {
        /// The requested tag.
        tag: u32,
        /// The requested hash.
        hash: PayloadHash,
    },

    /// A read-only open was requested for a path that does not exist.
    #[error("path not found: {0:?}")]
    PathNotFound(PathBuf),

    /// A tag outside the configured range.
    #[error("invalid tag {tag}: database has {num_tags} tags")]
    InvalidTag {
        /// The offending tag.
        tag: u32,
        /// Number of tags the database was opened with.
        num_tags: u32,
    },

    /// The payload uses a feature this implementation does not support.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A buffer for a payload could not be allocated.
    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(u64),

    /// The payload does not fit the 32-bit size field.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(u64),

    /// A mutating operation was attempted on a read-only handle.
    #[error("database is read-only")]
    ReadOnly,

    /// The advisory file lock could not be taken.
    #[error("failed to lock database file: {0}")]
    Lock(#[source] io::Error),
}

impl FozError {
    /// Creates a corrupt database error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptDatabase {
            message: message.into(),
        }
    }

    /// Returns true if the error means the key is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound { .. })
    }
}
