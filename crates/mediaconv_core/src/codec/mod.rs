//! Payload codecs.
//!
//! A [`PayloadCodec`] is the per-kind strategy plugged into
//! [`StreamConverter`](crate::StreamConverter): it names the media kind,
//! decides whether loop detection applies, and turns a transcoded payload
//! into something the pipeline can emit.

mod audio;
mod video;

pub use audio::{AudioCodec, AudioPacket, CodecInfo, PacketReader, PacketWriter};
pub use video::VideoCodec;

use crate::error::CacheResult;
use crate::media::MediaKind;
use bytes::Bytes;

/// A transcoded payload ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// One opaque blob (video).
    Blob(Bytes),
    /// Framed sub-packets (audio).
    Packets(Vec<AudioPacket>),
}

impl Payload {
    /// Total number of media bytes, excluding framing.
    #[must_use]
    pub fn data_len(&self) -> usize {
        match self {
            Self::Blob(data) => data.len(),
            Self::Packets(packets) => packets.iter().map(|p| p.data.len()).sum(),
        }
    }

    /// Returns true if the payload carries no media bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_len() == 0
    }
}

/// Kind-specific behavior of a stream converter.
pub trait PayloadCodec: Send + Sync {
    /// Media kind handled by this codec.
    fn kind(&self) -> MediaKind;

    /// Whether repeated chunk runs are collapsed while recording.
    fn detect_loops(&self) -> bool {
        false
    }

    /// Decodes a payload read from the transcoded database under `tag`.
    fn decode(&self, tag: u32, data: Vec<u8>) -> CacheResult<Payload>;
}
