//! On-disk structures: file header, entry names and payload headers.

use crate::error::{FozError, FozResult};
use mediaconv_hash::PayloadHash;
use std::fmt;

/// File magic.
pub const MAGIC: [u8; 12] = [
    0x81, b'F', b'O', b'S', b'S', b'I', b'L', b'I', b'Z', b'E', b'D', b'B',
];

/// Version written to new files.
pub const FOZDB_VERSION: u8 = 6;

/// Oldest version that can still be read and appended to.
pub const FOZDB_MIN_COMPAT_VERSION: u8 = 5;

/// Size of the file header.
pub const FILE_HEADER_SIZE: u64 = 16;

/// Size of an entry name.
pub const NAME_SIZE: usize = 40;

/// Size of a payload header.
pub const PAYLOAD_HEADER_SIZE: usize = 16;

/// Bytes preceding every payload: name plus payload header.
pub const ENTRY_PREAMBLE_SIZE: usize = NAME_SIZE + PAYLOAD_HEADER_SIZE;

/// The 16-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version.
    pub version: u8,
}

impl FileHeader {
    /// Header for a newly created file.
    #[must_use]
    pub const fn current() -> Self {
        Self {
            version: FOZDB_VERSION,
        }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE as usize] {
        let mut buf = [0u8; FILE_HEADER_SIZE as usize];
        buf[..MAGIC.len()].copy_from_slice(&MAGIC);
        buf[15] = self.version;
        buf
    }

    /// Decodes and validates a header.
    pub fn decode(buf: &[u8; FILE_HEADER_SIZE as usize]) -> FozResult<Self> {
        if buf[..MAGIC.len()] != MAGIC {
            return Err(FozError::corrupt("bad magic"));
        }
        let version = buf[15];
        if !(FOZDB_MIN_COMPAT_VERSION..=FOZDB_VERSION).contains(&version) {
            return Err(FozError::corrupt(format!(
                "unsupported version {version}, expected {FOZDB_MIN_COMPAT_VERSION}..={FOZDB_VERSION}"
            )));
        }
        Ok(Self { version })
    }
}

/// Payload compression.
///
/// Deflate is part of the format but is never produced by this crate and
/// cannot be read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Raw payload bytes.
    None,
    /// zlib deflate stream.
    Deflate,
    /// Any other value found on disk.
    Unknown(u32),
}

impl Compression {
    /// Returns the on-disk value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::None => 1,
            Self::Deflate => 2,
            Self::Unknown(v) => v,
        }
    }

    /// Parses an on-disk value.
    #[must_use]
    pub const fn from_u32(v: u32) -> Self {
        match v {
            1 => Self::None,
            2 => Self::Deflate,
            other => Self::Unknown(other),
        }
    }
}

/// The 16-byte header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Stored payload size in bytes.
    pub size: u32,
    /// Payload compression.
    pub compression: Compression,
    /// CRC32 of the stored payload; zero means "not checked".
    pub crc: u32,
    /// Uncompressed size.
    pub full_size: u32,
}

impl PayloadHeader {
    /// Header written before a payload's size and CRC are known.
    #[must_use]
    pub const fn provisional() -> Self {
        Self {
            size: 0,
            compression: Compression::None,
            crc: 0,
            full_size: 0,
        }
    }

    /// Header for an uncompressed payload.
    #[must_use]
    pub const fn uncompressed(size: u32, crc: u32) -> Self {
        Self {
            size,
            compression: Compression::None,
            crc,
            full_size: size,
        }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; PAYLOAD_HEADER_SIZE] {
        let mut buf = [0u8; PAYLOAD_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.compression.as_u32().to_le_bytes());
        buf[8..12].copy_from_slice(&self.crc.to_le_bytes());
        buf[12..16].copy_from_slice(&self.full_size.to_le_bytes());
        buf
    }

    /// Decodes a header.
    #[must_use]
    pub fn decode(buf: &[u8; PAYLOAD_HEADER_SIZE]) -> Self {
        let word = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        Self {
            size: word(0),
            compression: Compression::from_u32(word(4)),
            crc: word(8),
            full_size: word(12),
        }
    }
}

/// A `(tag, hash)` pair: the key of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryName {
    /// Namespace.
    pub tag: u32,
    /// Content hash.
    pub hash: PayloadHash,
}

impl EntryName {
    /// Creates a name.
    #[must_use]
    pub const fn new(tag: u32, hash: PayloadHash) -> Self {
        Self { tag, hash }
    }

    /// Encodes the name as 40 lowercase hex characters.
    #[must_use]
    pub fn encode(&self) -> [u8; NAME_SIZE] {
        let mut buf = [0u8; NAME_SIZE];
        buf.copy_from_slice(self.to_string().as_bytes());
        buf
    }

    /// Decodes a 40-character hex name.
    pub fn decode(buf: &[u8; NAME_SIZE]) -> FozResult<Self> {
        let text = std::str::from_utf8(buf)
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| FozError::corrupt("entry name is not hex"))?;

        let tag = u32::from_str_radix(&text[..8], 16)
            .map_err(|_| FozError::corrupt("entry tag is not hex"))?;
        let hash = u128::from_str_radix(&text[8..], 16)
            .map_err(|_| FozError::corrupt("entry hash is not hex"))?;

        Ok(Self {
            tag,
            hash: PayloadHash::new(hash),
        })
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}{}", self.tag, self.hash)
    }
}

/// Encodes the name and payload header that precede a payload.
#[must_use]
pub fn encode_preamble(name: &EntryName, header: &PayloadHeader) -> [u8; ENTRY_PREAMBLE_SIZE] {
    let mut buf = [0u8; ENTRY_PREAMBLE_SIZE];
    buf[..NAME_SIZE].copy_from_slice(&name.encode());
    buf[NAME_SIZE..].copy_from_slice(&header.encode());
    buf
}

/// Decodes the name and payload header that precede a payload.
pub fn decode_preamble(buf: &[u8; ENTRY_PREAMBLE_SIZE]) -> FozResult<(EntryName, PayloadHeader)> {
    let mut name = [0u8; NAME_SIZE];
    name.copy_from_slice(&buf[..NAME_SIZE]);
    let mut header = [0u8; PAYLOAD_HEADER_SIZE];
    header.copy_from_slice(&buf[NAME_SIZE..]);
    Ok((EntryName::decode(&name)?, PayloadHeader::decode(&header)))
}
