//! # mediaconv FozDB
//!
//! An append-only, tagged binary key/value store. Every record is keyed by a
//! small integer tag (namespace) and a 128-bit [`PayloadHash`], and carries a
//! CRC32 over its payload.
//!
//! ## File Layout
//!
//! ```text
//! | magic (12) | unused (3) | version (1) |
//! | name (40 hex chars) | size (4) | compression (4) | crc32 (4) | full_size (4) | payload (size) |
//! | name ... (repeated until end of file)
//! ```
//!
//! The name is 8 hex digits of tag followed by 32 hex digits of hash. The
//! four header fields are little-endian.
//!
//! ## Invariants
//!
//! - A `(tag, hash)` pair appears at most once; writes of a known key are no-ops
//! - The write cursor always points at the first free byte
//! - A nonzero CRC must match the payload on every verified read
//! - Only [`FozDb::discard_entries`] ever shrinks the file
//!
//! ## Example
//!
//! ```rust,no_run
//! use mediaconv_fozdb::FozDb;
//! use mediaconv_hash::PayloadHash;
//! use std::path::Path;
//!
//! let mut db = FozDb::open(Path::new("dump.foz"), false, 4).unwrap();
//! let hash = PayloadHash::new(42);
//! db.write_entry_bytes(0, hash, b"payload").unwrap();
//! assert_eq!(db.read_entry(0, hash).unwrap(), b"payload");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod db;
mod discard;
mod error;
mod format;

pub use db::{FozDb, PayloadEntry, WRITE_CHUNK_SIZE};
pub use discard::DiscardStats;
pub use error::{FozError, FozResult};
pub use format::{
    decode_preamble, encode_preamble, Compression, EntryName, FileHeader, PayloadHeader, ENTRY_PREAMBLE_SIZE, FILE_HEADER_SIZE,
    FOZDB_MIN_COMPAT_VERSION, FOZDB_VERSION, MAGIC, NAME_SIZE, PAYLOAD_HEADER_SIZE,
};
pub use mediaconv_hash::PayloadHash;
