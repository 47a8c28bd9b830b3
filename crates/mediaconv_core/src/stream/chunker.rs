//! Chunk boundaries.

use crate::error::{CacheError, CacheResult};
use crate::media::MediaKind;
use bytes::Bytes;
use fastcdc::v2020::StreamCDC;
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::ops::RangeInclusive;

const CDC_MIN_RANGE: RangeInclusive<u32> = 64..=1024 * 1024;
const CDC_AVG_RANGE: RangeInclusive<u32> = 256..=4 * 1024 * 1024;
const CDC_MAX_RANGE: RangeInclusive<u32> = 1024..=16 * 1024 * 1024;

/// How a source is cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ChunkPolicy {
    /// The application delivers chunks. Sources read through
    /// [`ChunkPolicy::split`] are cut into blocks of `max_size` bytes.
    Delivered {
        /// Block size for reader sources.
        max_size: usize,
    },
    /// FastCDC content-defined chunking.
    ContentDefined {
        /// Minimum chunk size.
        min_size: u32,
        /// Target chunk size.
        avg_size: u32,
        /// Maximum chunk size.
        max_size: u32,
    },
}

impl ChunkPolicy {
    /// Default block size for delivered chunks read from a source.
    pub const DELIVERED_BLOCK_SIZE: usize = 16 * 1024;

    /// Default policy of a media kind.
    #[must_use]
    pub const fn default_for(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => Self::Delivered {
                max_size: Self::DELIVERED_BLOCK_SIZE,
            },
            MediaKind::Video => Self::ContentDefined {
                min_size: 1024 * 1024,
                avg_size: 4 * 1024 * 1024,
                max_size: 16 * 1024 * 1024,
            },
        }
    }

    /// Checks the sizes.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidChunkPolicy`] for a zero block size, content-defined
    /// sizes outside what FastCDC accepts, or sizes out of order.
    pub fn validate(&self) -> CacheResult<()> {
        match *self {
            Self::Delivered { max_size } => {
                if max_size == 0 {
                    return Err(CacheError::InvalidChunkPolicy(
                        "block size must be nonzero".into(),
                    ));
                }
            }
            Self::ContentDefined {
                min_size,
                avg_size,
                max_size,
            } => {
                for (name, value, range) in [
                    ("min_size", min_size, CDC_MIN_RANGE),
                    ("avg_size", avg_size, CDC_AVG_RANGE),
                    ("max_size", max_size, CDC_MAX_RANGE),
                ] {
                    if !range.contains(&value) {
                        return Err(CacheError::InvalidChunkPolicy(format!(
                            "{name} {value} outside {}..={}",
                            range.start(),
                            range.end()
                        )));
                    }
                }
                if !(min_size <= avg_size && avg_size <= max_size) {
                    return Err(CacheError::InvalidChunkPolicy(format!(
                        "sizes out of order: {min_size} / {avg_size} / {max_size}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Cuts everything `source` yields into chunks and hands them to `sink`
    /// in order. Returns the number of source bytes consumed.
    ///
    /// # Errors
    ///
    /// Fails on an invalid policy, a read error ([`CacheError::Io`] or
    /// [`CacheError::Chunking`]) or the first error returned by `sink`.
    pub fn split<R, F>(&self, source: R, mut sink: F) -> CacheResult<u64>
    where
        R: Read,
        F: FnMut(Bytes) -> CacheResult<()>,
    {
        self.validate()?;
        let mut total = 0u64;
        match *self {
            Self::Delivered { max_size } => {
                let mut source = source;
                loop {
                    let block = read_block(&mut source, max_size)?;
                    if block.is_empty() {
                        break;
                    }
                    total += block.len() as u64;
                    sink(Bytes::from(block))?;
                }
            }
            Self::ContentDefined {
                min_size,
                avg_size,
                max_size,
            } => {
                for chunk in StreamCDC::new(source, min_size, avg_size, max_size) {
                    let chunk = chunk.map_err(|e| CacheError::Chunking(e.to_string()))?;
                    if chunk.data.is_empty() {
                        continue;
                    }
                    total += chunk.data.len() as u64;
                    sink(Bytes::from(chunk.data))?;
                }
            }
        }
        Ok(total)
    }
}

/// Reads until `size` bytes are collected or the source ends.
fn read_block<R: Read>(source: &mut R, size: usize) -> io::Result<Vec<u8>> {
    let mut block = Vec::with_capacity(size);
    source.take(size as u64).read_to_end(&mut block)?;
    Ok(block)
}
