//! Audio payloads: framed sub-packet streams and codec-info records.
//!
//! A transcoded audio payload is a sequence of sub-packets, each a
//! little-endian `u32` header followed by `length` bytes:
//!
//! ```text
//! bits  0..12  length (at most 4095)
//! bits 12..28  padding samples
//! bits 28..32  flags (bit 0: codec header)
//! ```

use super::{Payload, PayloadCodec};
use crate::error::{CacheError, CacheResult};
use crate::media::MediaKind;
use bytes::Bytes;

const LENGTH_BITS: u32 = 12;
const PADDING_BITS: u32 = 16;
const FLAGS_SHIFT: u32 = LENGTH_BITS + PADDING_BITS;
const PACKET_HEADER_SIZE: usize = 4;

/// One sub-packet of a transcoded audio stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPacket {
    /// Four flag bits.
    pub flags: u8,
    /// Number of padding samples.
    pub padding: u16,
    /// Packet body.
    pub data: Bytes,
}

impl AudioPacket {
    /// Marks a packet carrying codec header data.
    pub const FLAG_HEADER: u8 = 0x1;

    /// Largest body a sub-packet can carry.
    pub const MAX_LEN: usize = (1 << LENGTH_BITS) - 1;

    /// Creates a data packet.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            flags: 0,
            padding: 0,
            data: data.into(),
        }
    }

    /// Returns true if the codec header flag is set.
    #[must_use]
    pub const fn is_header(&self) -> bool {
        self.flags & Self::FLAG_HEADER != 0
    }

    fn header_word(&self) -> CacheResult<u32> {
        if self.data.len() > Self::MAX_LEN {
            return Err(CacheError::invalid_packet(format!(
                "packet body of {} bytes exceeds {}",
                self.data.len(),
                Self::MAX_LEN
            )));
        }
        if self.flags > 0xF {
            return Err(CacheError::invalid_packet(format!(
                "flags {:#x} do not fit in four bits",
                self.flags
            )));
        }
        Ok(self.data.len() as u32
            | (u32::from(self.padding) << LENGTH_BITS)
            | (u32::from(self.flags) << FLAGS_SHIFT))
    }
}

/// Iterates over the sub-packets of an encoded payload.
///
/// Yields an error once and then stops if the payload ends inside a packet.
#[derive(Debug)]
pub struct PacketReader {
    data: Bytes,
    pos: usize,
}

impl PacketReader {
    /// Creates a reader over `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl Iterator for PacketReader {
    type Item = CacheResult<AudioPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            return None;
        }
        if remaining < PACKET_HEADER_SIZE {
            self.pos = self.data.len();
            return Some(Err(CacheError::invalid_packet(format!(
                "{remaining} trailing bytes after last packet"
            ))));
        }

        let mut word = [0u8; PACKET_HEADER_SIZE];
        word.copy_from_slice(&self.data[self.pos..self.pos + PACKET_HEADER_SIZE]);
        let header = u32::from_le_bytes(word);
        let len = (header & ((1 << LENGTH_BITS) - 1)) as usize;
        let padding = ((header >> LENGTH_BITS) & ((1 << PADDING_BITS) - 1)) as u16;
        let flags = (header >> FLAGS_SHIFT) as u8;

        let start = self.pos + PACKET_HEADER_SIZE;
        if self.data.len() - start < len {
            self.pos = self.data.len();
            return Some(Err(CacheError::invalid_packet(format!(
                "packet of {len} bytes truncated to {}",
                self.data.len() - start
            ))));
        }
        self.pos = start + len;

        Some(Ok(AudioPacket {
            flags,
            padding,
            data: self.data.slice(start..start + len),
        }))
    }
}

/// Builds an encoded sub-packet stream.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one packet.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidPacket`] if the body or flags do not fit the header.
    pub fn push(&mut self, packet: &AudioPacket) -> CacheResult<()> {
        let header = packet.header_word()?;
        self.buf.extend_from_slice(&header.to_le_bytes());
        self.buf.extend_from_slice(&packet.data);
        Ok(())
    }

    /// Appends `data` split into as many maximal packets as needed.
    pub fn push_data(&mut self, data: &[u8]) {
        for piece in data.chunks(AudioPacket::MAX_LEN) {
            let header = piece.len() as u32;
            self.buf.extend_from_slice(&header.to_le_bytes());
            self.buf.extend_from_slice(piece);
        }
    }

    /// Returns the encoded stream.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Codec parameters of an audio stream, recorded next to its chunks so the
/// offline transcoder can decode them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodecInfo {
    /// Codec version.
    pub version: u32,
    /// Bit rate.
    pub bitrate: u32,
    /// Channel count.
    pub channels: u32,
    /// Sample rate.
    pub rate: u32,
    /// Block alignment.
    pub block_align: u32,
    /// Sample depth.
    pub depth: u32,
    /// Opaque codec-specific data.
    pub codec_data: Bytes,
}

impl CodecInfo {
    /// Size of the fixed part of the record.
    pub const HEADER_SIZE: usize = 7 * 4;

    /// Encodes the record.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_SIZE + self.codec_data.len());
        for word in [
            self.codec_data.len() as u32,
            self.version,
            self.bitrate,
            self.channels,
            self.rate,
            self.block_align,
            self.depth,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(&self.codec_data);
        out
    }

    /// Decodes a record.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidCodecInfo`] if the record is shorter than its
    /// fixed part or than its declared codec data.
    pub fn decode(data: &[u8]) -> CacheResult<Self> {
        if data.len() < Self::HEADER_SIZE {
            return Err(CacheError::invalid_codec_info(format!(
                "record of {} bytes is shorter than {}",
                data.len(),
                Self::HEADER_SIZE
            )));
        }
        let mut words = [0u32; 7];
        for (i, word) in words.iter_mut().enumerate() {
            let mut b = [0u8; 4];
            b.copy_from_slice(&data[i * 4..i * 4 + 4]);
            *word = u32::from_le_bytes(b);
        }
        let [size, version, bitrate, channels, rate, block_align, depth] = words;

        let body = &data[Self::HEADER_SIZE..];
        if body.len() < size as usize {
            return Err(CacheError::invalid_codec_info(format!(
                "declares {size} bytes of codec data, has {}",
                body.len()
            )));
        }

        Ok(Self {
            version,
            bitrate,
            channels,
            rate,
            block_align,
            depth,
            codec_data: Bytes::copy_from_slice(&body[..size as usize]),
        })
    }
}

/// Audio streams: framed packet payloads, loop detection on.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioCodec;

impl PayloadCodec for AudioCodec {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn detect_loops(&self) -> bool {
        true
    }

    fn decode(&self, _tag: u32, data: Vec<u8>) -> CacheResult<Payload> {
        let packets = PacketReader::new(data).collect::<CacheResult<Vec<_>>>()?;
        Ok(Payload::Packets(packets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    #[test]
    fn packet_header_layout() {
        let packet = AudioPacket {
            flags: AudioPacket::FLAG_HEADER,
            padding: 0x1234,
            data: Bytes::from_static(b"abc"),
        };
        let mut writer = PacketWriter::new();
        writer.push(&packet).unwrap();
        let encoded = writer.finish();

        let header = u32::from_le_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
        assert_eq!(header & 0xFFF, 3);
        assert_eq!((header >> 12) & 0xFFFF, 0x1234);
        assert_eq!(header >> 28, 1);
        assert_eq!(&encoded[4..], b"abc");
    }

    #[test]
    fn reader_parses_written_packets() {
        let packets = vec![
            AudioPacket {
                flags: AudioPacket::FLAG_HEADER,
                padding: 0,
                data: Bytes::from_static(b"codec header"),
            },
            AudioPacket {
                flags: 0,
                padding: 960,
                data: Bytes::from(vec![7u8; AudioPacket::MAX_LEN]),
            },
            AudioPacket::new(Vec::<u8>::new()),
        ];
        let mut writer = PacketWriter::new();
        for p in &packets {
            writer.push(p).unwrap();
        }

        let decoded: Vec<_> = PacketReader::new(writer.finish())
            .collect::<CacheResult<_>>()
            .unwrap();
        assert_eq!(decoded, packets);
        assert!(decoded[0].is_header());
        assert!(!decoded[1].is_header());
    }

    #[test]
    fn oversized_packet_rejected() {
        let packet = AudioPacket::new(vec![0u8; AudioPacket::MAX_LEN + 1]);
        let mut writer = PacketWriter::new();
        assert!(matches!(
            writer.push(&packet),
            Err(CacheError::InvalidPacket(_))
        ));
    }

    #[test]
    fn push_data_splits_large_bodies() {
        let mut writer = PacketWriter::new();
        writer.push_data(&vec![1u8; 10_000]);
        let lens: Vec<_> = PacketReader::new(writer.finish())
            .map(|p| p.unwrap().data.len())
            .collect();
        assert_eq!(lens, vec![4095, 4095, 1810]);
    }

    #[test]
    fn truncated_packet_is_an_error() {
        let mut writer = PacketWriter::new();
        writer.push(&AudioPacket::new(b"hello".to_vec())).unwrap();
        let mut encoded = writer.finish();
        encoded.pop();

        let mut reader = PacketReader::new(encoded);
        assert!(matches!(reader.next(), Some(Err(CacheError::InvalidPacket(_)))));
        assert!(reader.next().is_none());

        let mut reader = PacketReader::new(vec![0u8, 0]);
        assert!(matches!(reader.next(), Some(Err(CacheError::InvalidPacket(_)))));
    }

    #[test]
    fn codec_info_layout() {
        let info = CodecInfo {
            version: 2,
            bitrate: 128_000,
            channels: 2,
            rate: 44_100,
            block_align: 2_973,
            depth: 16,
            codec_data: Bytes::from_static(&[0xAA, 0xBB]),
        };
        let encoded = info.encode();
        assert_eq!(encoded.len(), CodecInfo::HEADER_SIZE + 2);
        assert_eq!(&encoded[0..4], &2u32.to_le_bytes());
        assert_eq!(&encoded[12..16], &2u32.to_le_bytes());
        assert_eq!(&encoded[16..20], &44_100u32.to_le_bytes());
        assert_eq!(CodecInfo::decode(&encoded).unwrap(), info);
    }

    #[test]
    fn codec_info_rejects_short_records() {
        assert!(matches!(
            CodecInfo::decode(&[0u8; 10]),
            Err(CacheError::InvalidCodecInfo(_))
        ));

        let mut encoded = CodecInfo {
            codec_data: Bytes::from_static(b"xyz"),
            ..CodecInfo::default()
        }
        .encode();
        encoded.truncate(encoded.len() - 1);
        assert!(matches!(
            CodecInfo::decode(&encoded),
            Err(CacheError::InvalidCodecInfo(_))
        ));
    }

    #[test]
    fn audio_codec_decodes_packets() {
        let mut writer = PacketWriter::new();
        writer.push_data(b"opus");
        let payload = AudioCodec
            .decode(tags::audio::PTNADATA, writer.finish())
            .unwrap();
        assert_eq!(payload, Payload::Packets(vec![AudioPacket::new(&b"opus"[..])]));
        assert!(AudioCodec.detect_loops());
    }
}
