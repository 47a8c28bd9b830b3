//! Cache context: the databases and placeholder shared by every stream.

use crate::codec::{Payload, PayloadCodec};
use crate::config::MediaConfig;
use crate::error::{CacheError, CacheResult};
use crate::gc::{self, GcReport};
use crate::media::{MediaKind, TagSet};
use crate::placeholder::BlankMedia;
use crate::stream::StreamConverter;
use mediaconv_fozdb::{FozDb, FozError};
use mediaconv_hash::PayloadHash;
use parking_lot::{Mutex, MutexGuard};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The writable database receiving recorded streams.
///
/// Shared by every converter of one kind. All mutations go through
/// [`lock`](Self::lock) and hold it for their whole duration.
pub struct DumpDatabase {
    kind: MediaKind,
    path: PathBuf,
    db: Mutex<FozDb>,
    gc_ran: AtomicBool,
}

impl DumpDatabase {
    /// Opens or creates the dump database at `path`.
    pub fn open(path: &Path, kind: MediaKind) -> CacheResult<Arc<Self>> {
        let db = FozDb::open(path, false, kind.tags().num_tags)?;
        debug!(path = %path.display(), %kind, entries = db.len(), "opened dump database");
        Ok(Arc::new(Self {
            kind,
            path: path.to_path_buf(),
            db: Mutex::new(db),
            gc_ran: AtomicBool::new(false),
        }))
    }

    /// Media kind of the recorded streams.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locks the database for exclusive use.
    pub fn lock(&self) -> MutexGuard<'_, FozDb> {
        self.db.lock()
    }

    /// Claims the single garbage collection pass of this handle. Returns
    /// false if it was already claimed.
    pub fn try_begin_gc(&self) -> bool {
        !self.gc_ran.swap(true, Ordering::AcqRel)
    }

    /// Whether garbage collection has been claimed.
    #[must_use]
    pub fn gc_ran(&self) -> bool {
        self.gc_ran.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for DumpDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpDatabase")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("gc_ran", &self.gc_ran())
            .finish_non_exhaustive()
    }
}

/// The read-only database of transcoded outputs.
#[derive(Debug)]
pub struct TranscodedDatabase {
    kind: MediaKind,
    db: FozDb,
}

impl TranscodedDatabase {
    /// Opens the transcoded database at `path` read-only.
    ///
    /// # Errors
    ///
    /// - [`CacheError::PathNotFound`] if the file does not exist
    /// - [`CacheError::Db`] if it cannot be read or is corrupt
    pub fn open(path: &Path, kind: MediaKind) -> CacheResult<Self> {
        let db = FozDb::open(path, true, kind.tags().num_tags).map_err(|e| match e {
            FozError::PathNotFound(path) => CacheError::PathNotFound(path),
            other => CacheError::from(other),
        })?;
        debug!(path = %path.display(), %kind, entries = db.len(), "opened transcoded database");
        Ok(Self { kind, db })
    }

    /// Media kind of the outputs.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Underlying database.
    #[must_use]
    pub fn db(&self) -> &FozDb {
        &self.db
    }

    /// First output tag holding `hash`, in preference order.
    #[must_use]
    pub fn find(&self, hash: PayloadHash) -> Option<u32> {
        self.kind
            .tags()
            .outputs
            .iter()
            .copied()
            .find(|&tag| self.db.has_entry(tag, hash))
    }

    /// Returns true if any output tag holds `hash`.
    #[must_use]
    pub fn contains(&self, hash: PayloadHash) -> bool {
        self.find(hash).is_some()
    }

    /// Reads and verifies one output payload.
    pub fn read(&self, tag: u32, hash: PayloadHash) -> CacheResult<Vec<u8>> {
        Ok(self.db.read_entry(tag, hash)?)
    }

    /// Looks up `hash` and decodes the payload with `codec`.
    pub fn lookup<C: PayloadCodec>(
        &self,
        codec: &C,
        hash: PayloadHash,
    ) -> CacheResult<Option<(u32, Payload)>> {
        let Some(tag) = self.find(hash) else {
            return Ok(None);
        };
        let data = self.read(tag, hash)?;
        Ok(Some((tag, codec.decode(tag, data)?)))
    }
}

/// Per-process cache context for one media kind.
///
/// Created once with [`MediaCache::init`] and shared by every
/// [`StreamConverter`] through an `Arc`.
#[derive(Debug)]
pub struct MediaCache {
    config: MediaConfig,
    dump: Option<Arc<DumpDatabase>>,
    transcoded: Option<Arc<TranscodedDatabase>>,
    blank: BlankMedia,
}

impl MediaCache {
    /// Opens the databases and loads the blank media described by `config`.
    ///
    /// A missing or unreadable transcoded database only disables lookups.
    /// When the dump database already existed and a transcoded database is
    /// available, one garbage collection pass runs before returning; its
    /// failure is logged and ignored.
    ///
    /// # Errors
    ///
    /// Fails if the chunk policy is invalid, the dump database cannot be
    /// opened, or the blank media cannot be loaded.
    pub fn init(config: MediaConfig) -> CacheResult<Arc<Self>> {
        config.effective_chunk_policy().validate()?;

        let mut dump_existed = false;
        let dump = if config.dump_disabled {
            None
        } else {
            let path = config
                .dump_path
                .as_deref()
                .ok_or_else(|| CacheError::Config("dump database path not set".into()))?;
            dump_existed = std::fs::metadata(path).is_ok_and(|m| m.len() > 0);
            Some(DumpDatabase::open(path, config.kind)?)
        };

        let transcoded = config.transcoded_path.as_deref().and_then(|path| {
            match TranscodedDatabase::open(path, config.kind) {
                Ok(db) => Some(Arc::new(db)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "transcoded database unavailable");
                    None
                }
            }
        });

        let blank = BlankMedia::load(&config.blank_path)?;

        let cache = Arc::new(Self {
            config,
            dump,
            transcoded,
            blank,
        });

        if !cache.config.discard_disabled && dump_existed {
            if let Err(e) = cache.run_gc() {
                warn!(error = %e, "garbage collection failed");
            }
        }

        info!(
            kind = %cache.kind(),
            dump = cache.dump.is_some(),
            transcoded = cache.transcoded.is_some(),
            "media cache ready"
        );
        Ok(cache)
    }

    /// Builds a cache from already opened parts.
    ///
    /// Lets several caches share one [`DumpDatabase`]. No garbage collection
    /// is run.
    pub fn from_parts(
        config: MediaConfig,
        dump: Option<Arc<DumpDatabase>>,
        transcoded: Option<Arc<TranscodedDatabase>>,
        blank: BlankMedia,
    ) -> CacheResult<Arc<Self>> {
        config.effective_chunk_policy().validate()?;
        for kind in dump
            .iter()
            .map(|d| d.kind())
            .chain(transcoded.iter().map(|t| t.kind()))
        {
            if kind != config.kind {
                return Err(CacheError::Config(format!(
                    "{kind} database given to a {} cache",
                    config.kind
                )));
            }
        }
        Ok(Arc::new(Self {
            config,
            dump,
            transcoded,
            blank,
        }))
    }

    /// Media kind.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.config.kind
    }

    /// Tag layout of the kind.
    #[must_use]
    pub fn tags(&self) -> TagSet {
        self.config.kind.tags()
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Dump database, unless dumping is disabled.
    #[must_use]
    pub fn dump(&self) -> Option<&Arc<DumpDatabase>> {
        self.dump.as_ref()
    }

    /// Transcoded database, if one was opened.
    #[must_use]
    pub fn transcoded(&self) -> Option<&Arc<TranscodedDatabase>> {
        self.transcoded.as_ref()
    }

    /// Placeholder media.
    #[must_use]
    pub fn blank(&self) -> &BlankMedia {
        &self.blank
    }

    /// Creates a converter for one stream.
    ///
    /// # Errors
    ///
    /// [`CacheError::Config`] if `codec` handles another media kind.
    pub fn converter<C: PayloadCodec>(self: &Arc<Self>, codec: C) -> CacheResult<StreamConverter<C>> {
        if codec.kind() != self.kind() {
            return Err(CacheError::Config(format!(
                "{} codec used with a {} cache",
                codec.kind(),
                self.kind()
            )));
        }
        Ok(StreamConverter::new(Arc::clone(self), codec))
    }

    /// Runs the garbage collection pass of the dump database if it has not
    /// run yet. Returns `None` when there is nothing to do: no dump or
    /// transcoded database, or the pass already ran.
    pub fn run_gc(&self) -> CacheResult<Option<GcReport>> {
        match (&self.dump, &self.transcoded) {
            (Some(dump), Some(transcoded)) => gc::run_once(dump, transcoded),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AudioCodec, VideoCodec};
    use crate::tags;
    use tempfile::tempdir;

    fn blank_file(dir: &Path) -> PathBuf {
        let path = dir.join("blank");
        std::fs::write(&path, b"blank").unwrap();
        path
    }

    #[test]
    fn init_creates_dump_database() {
        let dir = tempdir().unwrap();
        let dump_path = dir.path().join("dump.foz");
        let config = MediaConfig::new(MediaKind::Video, blank_file(dir.path())).dump_path(&dump_path);

        let cache = MediaCache::init(config).unwrap();
        assert!(dump_path.exists());
        assert!(cache.dump().is_some());
        assert!(cache.transcoded().is_none());
        assert_eq!(cache.blank().bytes().as_ref(), b"blank");
    }

    #[test]
    fn missing_transcoded_database_is_soft() {
        let dir = tempdir().unwrap();
        let config = MediaConfig::new(MediaKind::Audio, blank_file(dir.path()))
            .dump_path(dir.path().join("dump.foz"))
            .transcoded_path(dir.path().join("missing.foz"));

        let cache = MediaCache::init(config).unwrap();
        assert!(cache.transcoded().is_none());
    }

    #[test]
    fn transcoded_open_reports_missing_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.foz");
        match TranscodedDatabase::open(&path, MediaKind::Video) {
            Err(CacheError::PathNotFound(p)) => assert_eq!(p, path),
            other => panic!("expected PathNotFound, got {other:?}"),
        }
    }

    #[test]
    fn missing_blank_media_is_hard() {
        let dir = tempdir().unwrap();
        let config = MediaConfig::new(MediaKind::Audio, dir.path().join("nope"))
            .dump_path(dir.path().join("dump.foz"));
        assert!(matches!(
            MediaCache::init(config),
            Err(CacheError::BlankMedia { .. })
        ));
    }

    #[test]
    fn dump_path_required_unless_disabled() {
        let dir = tempdir().unwrap();
        let config = MediaConfig::new(MediaKind::Video, blank_file(dir.path()));
        assert!(matches!(
            MediaCache::init(config.clone()),
            Err(CacheError::Config(_))
        ));

        let cache = MediaCache::init(config.dump_disabled(true)).unwrap();
        assert!(cache.dump().is_none());
    }

    #[test]
    fn converter_checks_kind() {
        let dir = tempdir().unwrap();
        let config = MediaConfig::new(MediaKind::Video, blank_file(dir.path())).dump_disabled(true);
        let cache = MediaCache::init(config).unwrap();

        assert!(cache.converter(VideoCodec).is_ok());
        assert!(matches!(
            cache.converter(AudioCodec),
            Err(CacheError::Config(_))
        ));
    }

    #[test]
    fn transcoded_find_prefers_mkv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transcoded.foz");
        let hash = PayloadHash::new(42);
        {
            let mut db = FozDb::open(&path, false, tags::video::NUM_TAGS).unwrap();
            db.write_entry_bytes(tags::video::OGVDATA, hash, b"ogv").unwrap();
            db.write_entry_bytes(tags::video::MKVDATA, hash, b"mkv").unwrap();
            db.write_entry_bytes(tags::video::OGVDATA, PayloadHash::new(7), b"ogv only")
                .unwrap();
        }

        let transcoded = TranscodedDatabase::open(&path, MediaKind::Video).unwrap();
        assert_eq!(transcoded.find(hash), Some(tags::video::MKVDATA));
        assert_eq!(transcoded.find(PayloadHash::new(7)), Some(tags::video::OGVDATA));
        assert!(!transcoded.contains(PayloadHash::new(8)));

        let (tag, payload) = transcoded.lookup(&VideoCodec, hash).unwrap().unwrap();
        assert_eq!(tag, tags::video::MKVDATA);
        assert_eq!(payload, Payload::Blob(bytes::Bytes::from_static(b"mkv")));
    }

    #[test]
    fn gc_claimed_once() {
        let dir = tempdir().unwrap();
        let dump = DumpDatabase::open(&dir.path().join("dump.foz"), MediaKind::Audio).unwrap();
        assert!(!dump.gc_ran());
        assert!(dump.try_begin_gc());
        assert!(!dump.try_begin_gc());
        assert!(dump.gc_ran());
    }
}
