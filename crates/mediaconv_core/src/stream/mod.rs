//! The stream-chunk cache protocol.
//!
//! A live stream is cut into chunks ([`ChunkPolicy`]), each chunk is hashed
//! and recorded into a [`StreamState`], and a [`StreamConverter`] uses the
//! resulting fingerprint to either serve a cached transcode or record the
//! stream into the dump database for later offline transcoding.

mod chunker;
mod converter;
mod state;

pub use chunker::ChunkPolicy;
pub use converter::{DumpOutcome, Served, StreamConverter};
pub use state::{BufferEntry, LoopState, StreamState};
