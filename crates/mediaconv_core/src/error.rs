//! Error types for the cache protocol.

use mediaconv_fozdb::FozError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by the cache layer.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Storage engine error.
    #[error("database error: {0}")]
    Db(#[from] FozError),

    /// I/O error outside the storage engine.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A required environment variable is missing.
    #[error("environment variable {0} is not set")]
    EnvNotSet(&'static str),

    /// A configured path does not exist.
    #[error("path not found: {0:?}")]
    PathNotFound(PathBuf),

    /// The blank placeholder media could not be loaded.
    #[error("cannot load blank media {path:?}: {source}")]
    BlankMedia {
        /// Configured path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A transcoded audio packet stream is malformed.
    #[error("invalid audio packet: {0}")]
    InvalidPacket(String),

    /// A codec-info record is malformed.
    #[error("invalid codec info: {0}")]
    InvalidCodecInfo(String),

    /// Chunking parameters are out of range.
    #[error("invalid chunk policy: {0}")]
    InvalidChunkPolicy(String),

    /// Splitting the source into chunks failed.
    #[error("chunking failed: {0}")]
    Chunking(String),

    /// A configuration file or value is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The stream hit a hashing failure and no longer accepts data.
    #[error("stream is in the error state")]
    StreamFailed,
}

impl CacheError {
    /// Creates an invalid packet error.
    pub fn invalid_packet(message: impl Into<String>) -> Self {
        Self::InvalidPacket(message.into())
    }

    /// Creates an invalid codec-info error.
    pub fn invalid_codec_info(message: impl Into<String>) -> Self {
        Self::InvalidCodecInfo(message.into())
    }
}
