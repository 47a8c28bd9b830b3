//! # mediaconv hash
//!
//! Incremental 128-bit MurmurHash3 used for every fingerprint in the
//! transcode cache: per-chunk keys, whole-stream keys and FozDB entry names.
//!
//! Two variants are provided:
//!
//! - [`Murmur3x64`] - the 64-bit-lane `MurmurHash3_x64_128`
//! - [`Murmur3x86`] - the 32-bit-lane `MurmurHash3_x86_128`
//!
//! [`DefaultMurmur3`] picks one by target pointer width. Both variants buffer
//! partial blocks internally, so the result never depends on how the input
//! was split across `update` calls.
//!
//! ## Example
//!
//! ```rust
//! use mediaconv_hash::{DefaultMurmur3, Murmur3, HASH_SEED};
//!
//! let mut state = DefaultMurmur3::with_seed(HASH_SEED);
//! state.update(b"hello ");
//! let partial = state.finish();
//! state.update(b"world");
//!
//! let mut oneshot = DefaultMurmur3::with_seed(HASH_SEED);
//! oneshot.update(b"hello world");
//! assert_eq!(state.finish(), oneshot.finish());
//! assert_ne!(partial, oneshot.finish());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod fingerprint;
mod murmur3;

pub use fingerprint::{ParseHashError, PayloadHash};
pub use murmur3::{full_hash, hash_bytes, hash_reader, Murmur3, Murmur3x64, Murmur3x86, HASH_SEED};

/// The MurmurHash3 variant native to the target's pointer width.
#[cfg(target_pointer_width = "64")]
pub type DefaultMurmur3 = Murmur3x64;

/// The MurmurHash3 variant native to the target's pointer width.
#[cfg(not(target_pointer_width = "64"))]
pub type DefaultMurmur3 = Murmur3x86;
