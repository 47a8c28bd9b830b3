use super::{Payload, PayloadCodec};
use crate::error::CacheResult;
use crate::media::MediaKind;
use bytes::Bytes;

/// Video streams: one transcoded blob per stream, no loop detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoCodec;

impl PayloadCodec for VideoCodec {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn decode(&self, _tag: u32, data: Vec<u8>) -> CacheResult<Payload> {
        Ok(Payload::Blob(Bytes::from(data)))
    }
}
