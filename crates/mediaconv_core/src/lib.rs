//! # mediaconv core
//!
//! The content-addressable transcode cache built on FozDB.
//!
//! This crate provides:
//! - [`MediaCache`]: the per-process context holding the shared dump database,
//!   the read-only transcoded database and the blank placeholder media
//! - [`StreamConverter`]: per-stream chunking, hashing, loop detection, cache
//!   lookup and dumping, generic over a [`PayloadCodec`]
//! - [`gc`]: purging of dumped streams that have been transcoded
//!
//! ## Flow
//!
//! ```text
//! bytes ──► chunks ──► chunk hashes ──► stream fingerprint
//!                                            │
//!                      transcoded db hit ◄───┴───► miss: placeholder,
//!                      (serve payload)             marker file, dump on finish
//! ```
//!
//! Caching faults never reach playback: a lookup error degrades to the
//! placeholder. Only failing to open the dump database or to load the blank
//! media are hard errors.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
mod error;
pub mod gc;
mod media;
mod placeholder;
mod store;
pub mod stream;

pub use codec::{AudioCodec, AudioPacket, CodecInfo, Payload, PayloadCodec, VideoCodec};
pub use config::{env_vars, MediaConfig};
pub use error::{CacheError, CacheResult};
pub use gc::{GcPlan, GcReport};
pub use media::{tags, MediaKind, TagSet};
pub use placeholder::{create_marker, BlankMedia};
pub use store::{DumpDatabase, MediaCache, TranscodedDatabase};
pub use stream::{ChunkPolicy, DumpOutcome, LoopState, Served, StreamConverter, StreamState};

pub use mediaconv_fozdb::{EntryName, FozDb, FozError};
pub use mediaconv_hash::PayloadHash;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
