//! Placeholder media served on a cache miss.

use crate::error::{CacheError, CacheResult};
use crate::media::MediaKind;
use bytes::Bytes;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Blank media bytes, served looped over whatever range is requested.
#[derive(Debug, Clone)]
pub struct BlankMedia {
    path: PathBuf,
    data: Bytes,
}

impl BlankMedia {
    /// Loads the blank media file.
    ///
    /// # Errors
    ///
    /// [`CacheError::BlankMedia`] if the file cannot be read or is empty.
    pub fn load(path: &Path) -> CacheResult<Self> {
        let data = fs::read(path).map_err(|source| CacheError::BlankMedia {
            path: path.to_path_buf(),
            source,
        })?;
        if data.is_empty() {
            return Err(CacheError::BlankMedia {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidData, "blank media file is empty"),
            });
        }
        debug!(path = %path.display(), bytes = data.len(), "loaded blank media");
        Ok(Self {
            path: path.to_path_buf(),
            data: Bytes::from(data),
        })
    }

    /// Wraps in-memory bytes.
    pub fn from_bytes(path: impl Into<PathBuf>, data: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }

    /// Source path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of one repetition.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if there are no bytes to serve.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One repetition of the media.
    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Fills `buf` with the media looped from `offset`. Returns the number of
    /// bytes written: `buf.len()`, or zero for empty media.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        if self.data.is_empty() {
            return 0;
        }
        let len = self.data.len();
        let mut pos = (offset % len as u64) as usize;
        let mut written = 0;
        while written < buf.len() {
            let n = (len - pos).min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&self.data[pos..pos + n]);
            written += n;
            pos = (pos + n) % len;
        }
        written
    }

    /// Returns `len` bytes of the looped media starting at `offset`.
    #[must_use]
    pub fn range(&self, offset: u64, len: usize) -> Bytes {
        let mut buf = vec![0u8; len];
        let n = self.read_at(offset, &mut buf);
        buf.truncate(n);
        Bytes::from(buf)
    }
}

/// Creates the zero-byte marker recording that a placeholder of `kind` was
/// served. Returns the marker path.
pub fn create_marker(dir: &Path, kind: MediaKind) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(kind.marker_name());
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)?;
    Ok(path)
}
