//! CLI command implementations.
//!
//! Every command writes its report to the writer it is given, so `main`
//! passes stdout and tests pass a buffer.

pub mod discard;
pub mod extract;
pub mod gc;
pub mod hash;
pub mod inspect;
pub mod list;
pub mod verify;

use clap::ValueEnum;
use mediaconv_fozdb::{EntryName, FozDb, NAME_SIZE};
use std::path::Path;
use thiserror::Error;

/// Tag count of both media kinds' databases.
pub const DEFAULT_NUM_TAGS: u32 = 4;

/// Result type of command implementations.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Errors raised by the commands themselves.
#[derive(Debug, Error)]
pub enum CliError {
    /// An entry name argument is malformed.
    #[error("invalid entry name {0:?}: expected 40 hex digits")]
    InvalidName(String),

    /// Some entries failed verification.
    #[error("verification failed: {0} bad entries")]
    VerificationFailed(usize),

    /// A required argument was not given.
    #[error("{0} required")]
    Missing(&'static str),

    /// The database file does not exist.
    #[error("no database found at {0:?}")]
    NoDatabase(std::path::PathBuf),
}

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Opens an existing database without write access.
pub fn open_read_only(path: &Path, num_tags: u32) -> CliResult<FozDb> {
    if !path.exists() {
        return Err(CliError::NoDatabase(path.to_path_buf()).into());
    }
    Ok(FozDb::open(path, true, num_tags)?)
}

/// Parses a 40-digit entry name.
pub fn parse_name(s: &str) -> Result<EntryName, CliError> {
    let bytes: &[u8; NAME_SIZE] = s
        .as_bytes()
        .try_into()
        .map_err(|_| CliError::InvalidName(s.to_string()))?;
    EntryName::decode(bytes).map_err(|_| CliError::InvalidName(s.to_string()))
}

#[cfg(test)]
pub(crate) mod test_util {
    use mediaconv_fozdb::FozDb;
    use mediaconv_hash::PayloadHash;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// A database with three entries over two tags.
    pub fn sample_db() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.foz");
        let mut db = FozDb::open(&path, false, 4).unwrap();
        db.write_entry_bytes(0, PayloadHash::new(1), b"first").unwrap();
        db.write_entry_bytes(0, PayloadHash::new(2), b"second").unwrap();
        db.write_entry_bytes(3, PayloadHash::new(3), b"third!").unwrap();
        (dir, path)
    }

    pub fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }
}
