//! The database handle.

use crate::discard::{apply, plan, DiscardStats};
use crate::error::{FozError, FozResult};
use crate::format::{
    decode_preamble, encode_preamble, Compression, EntryName, FileHeader, PayloadHeader,
    ENTRY_PREAMBLE_SIZE, FILE_HEADER_SIZE, FOZDB_VERSION, NAME_SIZE,
};
use fs2::FileExt;
use mediaconv_hash::PayloadHash;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Upper bound on the bytes pulled from a payload source per step.
pub const WRITE_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// An indexed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadEntry {
    /// Content hash.
    pub hash: PayloadHash,
    /// Payload header as stored on disk.
    pub header: PayloadHeader,
    /// File offset of the first payload byte.
    pub offset: u64,
}

impl PayloadEntry {
    /// File offset of the entry name.
    #[must_use]
    pub fn entry_offset(&self) -> u64 {
        self.offset - ENTRY_PREAMBLE_SIZE as u64
    }

    /// Total on-disk length: name, header and payload.
    #[must_use]
    pub fn entry_len(&self) -> u64 {
        ENTRY_PREAMBLE_SIZE as u64 + u64::from(self.header.size)
    }
}

type TagIndex = HashMap<PayloadHash, PayloadEntry>;

/// An open FozDB file.
///
/// Lookups are served from a per-tag in-memory index built when the file is
/// opened. Reads take `&self` and serialize only around the file cursor;
/// writes and discards take `&mut self`, so sharing a writable handle
/// between threads requires an outer lock.
///
/// Writable handles hold an advisory exclusive lock on the file for the
/// duration of each mutating operation. Under that lock a handle whose cached
/// write cursor no longer matches the file length re-indexes the file first,
/// so handles sharing one file append after each other's entries.
pub struct FozDb {
    path: PathBuf,
    file: Mutex<File>,
    read_only: bool,
    num_tags: u32,
    version: u8,
    write_cursor: u64,
    index: Vec<TagIndex>,
}

/// Advisory lock on the database file, released on drop.
struct FileLock<'a>(&'a File);

impl<'a> FileLock<'a> {
    fn exclusive(file: &'a File) -> FozResult<Self> {
        file.lock_exclusive().map_err(FozError::Lock)?;
        Ok(Self(file))
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(self.0) {
            warn!(error = %e, "failed to release database file lock");
        }
    }
}

/// Result of scanning a file from the start.
struct Scan {
    version: u8,
    write_cursor: u64,
    index: Vec<TagIndex>,
}

fn empty_index(num_tags: u32) -> Vec<TagIndex> {
    (0..num_tags).map(|_| HashMap::new()).collect()
}

/// Reads the header and indexes every entry.
///
/// An empty writable file gets a fresh header. The caller holds the file lock
/// for writable handles.
fn scan(file: &File, read_only: bool, num_tags: u32) -> FozResult<Scan> {
    let mut index = empty_index(num_tags);
    let len = file.metadata().map_err(FozError::Read)?.len();

    if len == 0 {
        if read_only {
            return Ok(Scan {
                version: FOZDB_VERSION,
                write_cursor: 0,
                index,
            });
        }
        let mut out = file;
        out.seek(SeekFrom::Start(0)).map_err(FozError::Seek)?;
        out.write_all(&FileHeader::current().encode())
            .map_err(FozError::Write)?;
        out.flush().map_err(FozError::Write)?;
        return Ok(Scan {
            version: FOZDB_VERSION,
            write_cursor: FILE_HEADER_SIZE,
            index,
        });
    }

    if len < FILE_HEADER_SIZE {
        return Err(FozError::corrupt(format!(
            "file is {len} bytes, shorter than the header"
        )));
    }

    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(0)).map_err(FozError::Seek)?;
    let mut raw = [0u8; FILE_HEADER_SIZE as usize];
    reader.read_exact(&mut raw).map_err(FozError::Read)?;
    let header = FileHeader::decode(&raw)?;

    let mut offset = FILE_HEADER_SIZE;
    while offset < len {
        if len - offset < ENTRY_PREAMBLE_SIZE as u64 {
            return Err(FozError::corrupt(format!(
                "truncated entry header at offset {offset}"
            )));
        }

        let mut preamble = [0u8; ENTRY_PREAMBLE_SIZE];
        reader.read_exact(&mut preamble).map_err(FozError::Read)?;
        let (name, payload) = decode_preamble(&preamble)?;

        let payload_offset = offset + ENTRY_PREAMBLE_SIZE as u64;
        let end = payload_offset + u64::from(payload.size);
        if end > len {
            return Err(FozError::corrupt(format!(
                "payload of {name} at offset {offset} runs past end of file"
            )));
        }

        if name.tag >= num_tags {
            if !read_only {
                return Err(FozError::InvalidTag {
                    tag: name.tag,
                    num_tags,
                });
            }
            warn!(tag = name.tag, num_tags, offset, "skipping entry with unknown tag");
        } else {
            index[name.tag as usize]
                .entry(name.hash)
                .or_insert(PayloadEntry {
                    hash: name.hash,
                    header: payload,
                    offset: payload_offset,
                });
        }

        reader
            .seek_relative(i64::from(payload.size))
            .map_err(FozError::Seek)?;
        offset = end;
    }

    Ok(Scan {
        version: header.version,
        write_cursor: offset,
        index,
    })
}

/// Re-scans `file` if its length no longer matches `write_cursor`.
///
/// Another writable handle on the same file has appended or compacted since
/// this handle last indexed it. The caller holds the file lock.
fn refresh(file: &File, write_cursor: u64, num_tags: u32) -> FozResult<Option<Scan>> {
    let len = file.metadata().map_err(FozError::Read)?.len();
    if len == write_cursor {
        return Ok(None);
    }
    debug!(len, write_cursor, "database file changed by another handle, re-indexing");
    scan(file, false, num_tags).map(Some)
}

/// Appends one entry at `start` and returns its index record.
fn append_entry<R: Read>(
    file: &File,
    start: u64,
    name: EntryName,
    mut source: R,
) -> FozResult<PayloadEntry> {
    let mut out = file;
    out.seek(SeekFrom::Start(start)).map_err(FozError::Seek)?;
    out.write_all(&encode_preamble(&name, &PayloadHeader::provisional()))
        .map_err(FozError::Write)?;

    let mut crc = crc32fast::Hasher::new();
    let mut size = 0u64;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = source
            .by_ref()
            .take(WRITE_CHUNK_SIZE)
            .read_to_end(&mut buf)
            .map_err(FozError::Read)?;
        if n == 0 {
            break;
        }
        size += n as u64;
        if size > u64::from(u32::MAX) {
            return Err(FozError::PayloadTooLarge(size));
        }
        crc.update(&buf);
        out.write_all(&buf).map_err(FozError::Write)?;
    }

    let header = PayloadHeader::uncompressed(size as u32, crc.finalize());
    out.seek(SeekFrom::Start(start + NAME_SIZE as u64))
        .map_err(FozError::Seek)?;
    out.write_all(&header.encode()).map_err(FozError::Write)?;
    out.flush().map_err(FozError::Write)?;

    Ok(PayloadEntry {
        hash: name.hash,
        header,
        offset: start + ENTRY_PREAMBLE_SIZE as u64,
    })
}

impl FozDb {
    /// Opens a database file.
    ///
    /// A writable open creates the file if needed and initializes an empty
    /// file with a fresh header. A read-only open of a missing path fails with
    /// [`FozError::PathNotFound`]; an empty read-only file is an empty
    /// database.
    ///
    /// # Errors
    ///
    /// - [`FozError::CorruptDatabase`] if the header or any entry is malformed
    /// - [`FozError::InvalidTag`] if a writable open finds a tag `>= num_tags`
    ///   (read-only opens skip such entries)
    pub fn open(path: &Path, read_only: bool, num_tags: u32) -> FozResult<Self> {
        let file = if read_only {
            if !path.exists() {
                return Err(FozError::PathNotFound(path.to_path_buf()));
            }
            OpenOptions::new().read(true).open(path)
        } else {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
        }
        .map_err(|source| FozError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let scanned = if read_only {
            scan(&file, true, num_tags)?
        } else {
            let _lock = FileLock::exclusive(&file)?;
            scan(&file, false, num_tags)?
        };

        let db = Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            read_only,
            num_tags,
            version: scanned.version,
            write_cursor: scanned.write_cursor,
            index: scanned.index,
        };
        debug!(
            path = %db.path.display(),
            read_only,
            entries = db.len(),
            bytes = db.write_cursor,
            "opened database"
        );
        Ok(db)
    }

    /// Returns the path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether the handle is read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the number of tags the database was opened with.
    #[must_use]
    pub fn num_tags(&self) -> u32 {
        self.num_tags
    }

    /// Returns the file format version.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Offset of the first free byte.
    #[must_use]
    pub fn write_cursor(&self) -> u64 {
        self.write_cursor
    }

    /// Total number of indexed entries across all tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.iter().map(HashMap::len).sum()
    }

    /// Returns true if no entries are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.iter().all(HashMap::is_empty)
    }

    fn check_tag(&self, tag: u32) -> FozResult<()> {
        if tag >= self.num_tags {
            return Err(FozError::InvalidTag {
                tag,
                num_tags: self.num_tags,
            });
        }
        Ok(())
    }

    fn lookup(&self, tag: u32, hash: PayloadHash) -> FozResult<&PayloadEntry> {
        self.check_tag(tag)?;
        self.index[tag as usize]
            .get(&hash)
            .ok_or(FozError::EntryNotFound { tag, hash })
    }

    /// Returns true if `(tag, hash)` is indexed.
    #[must_use]
    pub fn has_entry(&self, tag: u32, hash: PayloadHash) -> bool {
        self.index
            .get(tag as usize)
            .is_some_and(|index| index.contains_key(&hash))
    }

    /// Returns the index record for `(tag, hash)`.
    #[must_use]
    pub fn entry(&self, tag: u32, hash: PayloadHash) -> Option<&PayloadEntry> {
        self.index.get(tag as usize)?.get(&hash)
    }

    /// Returns the stored payload size of `(tag, hash)`.
    pub fn entry_size(&self, tag: u32, hash: PayloadHash) -> FozResult<u64> {
        Ok(u64::from(self.lookup(tag, hash)?.header.size))
    }

    /// Iterates over the entries of one tag, in no particular order.
    ///
    /// Yields nothing for an out-of-range tag.
    pub fn entries(&self, tag: u32) -> impl Iterator<Item = &PayloadEntry> + '_ {
        self.index.get(tag as usize).into_iter().flat_map(HashMap::values)
    }

    /// Collects the hashes of one tag.
    #[must_use]
    pub fn hashes(&self, tag: u32) -> Vec<PayloadHash> {
        self.entries(tag).map(|e| e.hash).collect()
    }

    /// Reads up to `buf.len()` payload bytes starting `offset` bytes into the
    /// payload of `(tag, hash)`. Returns the number of bytes read, zero at or
    /// past the end of the payload.
    ///
    /// With `with_crc` and a nonzero stored CRC, the CRC32 of exactly the
    /// bytes read must match the stored value, so verified reads should cover
    /// the whole payload.
    ///
    /// # Errors
    ///
    /// - [`FozError::EntryNotFound`] if the key is absent
    /// - [`FozError::WrongChecksum`] on CRC mismatch
    /// - [`FozError::NotImplemented`] for compressed payloads
    pub fn read_entry_data(
        &self,
        tag: u32,
        hash: PayloadHash,
        offset: u64,
        buf: &mut [u8],
        with_crc: bool,
    ) -> FozResult<usize> {
        let entry = *self.lookup(tag, hash)?;
        if entry.header.compression != Compression::None {
            return Err(FozError::NotImplemented(format!(
                "payload compression {:?}",
                entry.header.compression
            )));
        }

        let size = u64::from(entry.header.size);
        if offset >= size {
            return Ok(0);
        }
        let n = (size - offset).min(buf.len() as u64) as usize;

        {
            let file = self.file.lock();
            let mut reader: &File = &file;
            reader
                .seek(SeekFrom::Start(entry.offset + offset))
                .map_err(FozError::Seek)?;
            reader.read_exact(&mut buf[..n]).map_err(FozError::Read)?;
        }

        if with_crc && entry.header.crc != 0 {
            let actual = crc32fast::hash(&buf[..n]);
            if actual != entry.header.crc {
                return Err(FozError::WrongChecksum {
                    expected: entry.header.crc,
                    actual,
                });
            }
        }

        Ok(n)
    }

    /// Reads and verifies the whole payload of `(tag, hash)`.
    pub fn read_entry(&self, tag: u32, hash: PayloadHash) -> FozResult<Vec<u8>> {
        let size = self.entry_size(tag, hash)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(size as usize)
            .map_err(|_| FozError::OutOfMemory(size))?;
        buf.resize(size as usize, 0);
        let n = self.read_entry_data(tag, hash, 0, &mut buf, true)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Appends the payload pulled from `source` under `(tag, hash)`.
    ///
    /// Does nothing if the key is already indexed: under content addressing
    /// the stored bytes are the same. The source is drained in steps of at
    /// most [`WRITE_CHUNK_SIZE`] bytes until it returns `Ok(0)`.
    ///
    /// On failure the file is truncated back to its previous end and the index
    /// is left unchanged.
    ///
    /// # Errors
    ///
    /// - [`FozError::ReadOnly`] on a read-only handle
    /// - [`FozError::PayloadTooLarge`] for payloads of 4 GiB or more
    pub fn write_entry<R: Read>(
        &mut self,
        tag: u32,
        hash: PayloadHash,
        source: R,
    ) -> FozResult<()> {
        if self.read_only {
            return Err(FozError::ReadOnly);
        }
        self.check_tag(tag)?;

        let file: &File = self.file.get_mut();
        let _lock = FileLock::exclusive(file)?;
        if let Some(scanned) = refresh(file, self.write_cursor, self.num_tags)? {
            self.version = scanned.version;
            self.write_cursor = scanned.write_cursor;
            self.index = scanned.index;
        }
        if self.index[tag as usize].contains_key(&hash) {
            debug!(tag, %hash, "entry already present, skipping write");
            return Ok(());
        }

        let start = self.write_cursor;
        let entry = match append_entry(file, start, EntryName::new(tag, hash), source) {
            Ok(entry) => entry,
            Err(e) => {
                if let Err(rollback) = file.set_len(start) {
                    warn!(error = %rollback, "failed to roll back partial entry");
                }
                return Err(e);
            }
        };

        self.write_cursor = entry.offset + u64::from(entry.header.size);
        self.index[tag as usize].insert(hash, entry);
        Ok(())
    }

    /// Appends `data` under `(tag, hash)`.
    pub fn write_entry_bytes(&mut self, tag: u32, hash: PayloadHash, data: &[u8]) -> FozResult<()> {
        self.write_entry(tag, hash, data)
    }

    /// Removes the named entries by compacting the file in place.
    ///
    /// Surviving entries keep their bytes and CRCs; entries after the first
    /// discarded one are moved backward to close the gaps, then the file is
    /// truncated and re-indexed. Names that are not present are ignored.
    ///
    /// A malformed entry fails the call before anything is moved, leaving the
    /// file and the index as they were. A failure while moving entries can
    /// leave a partially rewritten file; the index is then rebuilt from
    /// whatever the file holds.
    pub fn discard_entries<I>(&mut self, names: I) -> FozResult<DiscardStats>
    where
        I: IntoIterator<Item = EntryName>,
    {
        if self.read_only {
            return Err(FozError::ReadOnly);
        }

        let names: HashSet<EntryName> = names.into_iter().collect();
        if names.is_empty() {
            return Ok(DiscardStats {
                entries_before: self.len(),
                entries_discarded: 0,
                bytes_before: self.write_cursor,
                bytes_after: self.write_cursor,
            });
        }

        let file: &File = self.file.get_mut();
        let _lock = FileLock::exclusive(file)?;
        if let Some(scanned) = refresh(file, self.write_cursor, self.num_tags)? {
            self.version = scanned.version;
            self.write_cursor = scanned.write_cursor;
            self.index = scanned.index;
        }

        let entries_before: usize = self.index.iter().map(HashMap::len).sum();
        let bytes_before = self.write_cursor;
        let layout = plan(file, bytes_before, &names)?;

        if let Err(e) = apply(file, &layout) {
            match scan(file, false, self.num_tags) {
                Ok(scanned) => {
                    self.write_cursor = scanned.write_cursor;
                    self.index = scanned.index;
                }
                Err(rescan) => {
                    warn!(error = %rescan, "cannot re-index database after failed compaction");
                }
            }
            return Err(e);
        }

        let scanned = scan(file, false, self.num_tags)?;
        self.index = scanned.index;
        self.write_cursor = scanned.write_cursor;

        let stats = DiscardStats {
            entries_before,
            entries_discarded: layout.discarded,
            bytes_before,
            bytes_after: layout.new_len,
        };
        debug!(
            path = %self.path.display(),
            discarded = stats.entries_discarded,
            bytes_before,
            bytes_after = stats.bytes_after,
            "compacted database"
        );
        Ok(stats)
    }

    /// Flushes file data and metadata to durable storage.
    pub fn sync(&self) -> FozResult<()> {
        self.file.lock().sync_all().map_err(FozError::Write)
    }
}

impl std::fmt::Debug for FozDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FozDb")
            .field("path", &self.path)
            .field("read_only", &self.read_only)
            .field("num_tags", &self.num_tags)
            .field("version", &self.version)
            .field("write_cursor", &self.write_cursor)
            .field("entries", &self.len())
            .finish()
    }
}
