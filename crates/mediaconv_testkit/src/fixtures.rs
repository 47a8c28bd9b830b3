//! Test fixtures and cache helpers.
//!
//! A [`CacheFixture`] owns a temporary directory laid out the way a cache
//! deployment is: a dump database, a transcoded database written by the
//! test in place of the offline transcoder, a blank media file and a marker
//! directory.

use mediaconv_core::{MediaCache, MediaConfig, MediaKind};
use mediaconv_fozdb::FozDb;
use mediaconv_hash::PayloadHash;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Contents of the blank media file written by fixtures.
pub const BLANK_MEDIA: &[u8] = b"blank placeholder media";

/// A temporary cache deployment with automatic cleanup.
pub struct CacheFixture {
    kind: MediaKind,
    temp_dir: TempDir,
}

impl CacheFixture {
    /// Creates a fixture for `kind` with the blank media in place.
    pub fn new(kind: MediaKind) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(temp_dir.path().join(blank_name(kind)), BLANK_MEDIA)
            .expect("Failed to write blank media");
        Self { kind, temp_dir }
    }

    /// Media kind.
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Dump database path.
    pub fn dump_path(&self) -> PathBuf {
        self.root().join(format!("{}-dump.foz", self.kind))
    }

    /// Transcoded database path.
    pub fn transcoded_path(&self) -> PathBuf {
        self.root().join(format!("{}-transcoded.foz", self.kind))
    }

    /// Blank media path.
    pub fn blank_path(&self) -> PathBuf {
        self.root().join(blank_name(self.kind))
    }

    /// Marker directory.
    pub fn marker_dir(&self) -> PathBuf {
        self.root().join("markers")
    }

    /// Marker file created when a placeholder is served.
    pub fn marker_path(&self) -> PathBuf {
        self.marker_dir().join(self.kind.marker_name())
    }

    /// Configuration pointing at every fixture path.
    pub fn config(&self) -> MediaConfig {
        MediaConfig::new(self.kind, self.blank_path())
            .dump_path(self.dump_path())
            .transcoded_path(self.transcoded_path())
            .marker_dir(self.marker_dir())
    }

    /// Initializes a cache from [`config`](Self::config).
    pub fn cache(&self) -> Arc<MediaCache> {
        self.cache_with(self.config())
    }

    /// Initializes a cache from a custom configuration.
    pub fn cache_with(&self, config: MediaConfig) -> Arc<MediaCache> {
        MediaCache::init(config).expect("Failed to initialize media cache")
    }

    /// Writes transcoded outputs, as the offline transcoder would.
    pub fn write_transcoded(&self, tag: u32, entries: &[(PayloadHash, &[u8])]) {
        let mut db = FozDb::open(&self.transcoded_path(), false, self.kind.tags().num_tags)
            .expect("Failed to open transcoded database");
        for (hash, data) in entries {
            db.write_entry_bytes(tag, *hash, data)
                .expect("Failed to write transcoded entry");
        }
    }

    /// Opens the dump database read-only for assertions.
    pub fn open_dump(&self) -> FozDb {
        FozDb::open(&self.dump_path(), true, self.kind.tags().num_tags)
            .expect("Failed to open dump database")
    }

    /// Decoded chunk lists of every STREAM entry in the dump, sorted.
    pub fn dumped_streams(&self) -> Vec<(PayloadHash, Vec<PayloadHash>)> {
        let db = self.open_dump();
        let tag = self.kind.tags().stream;
        let mut streams: Vec<_> = db
            .hashes(tag)
            .into_iter()
            .map(|hash| {
                let data = db.read_entry(tag, hash).expect("Failed to read stream entry");
                let chunks =
                    PayloadHash::list_from_bytes(&data).expect("Malformed stream entry");
                (hash, chunks)
            })
            .collect();
        streams.sort();
        streams
    }
}

fn blank_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => "blank-audio.ptna",
        MediaKind::Video => "blank-video.mkv",
    }
}

/// Runs a test with a fresh fixture.
pub fn with_fixture<F, R>(kind: MediaKind, f: F) -> R
where
    F: FnOnce(&CacheFixture) -> R,
{
    let fixture = CacheFixture::new(kind);
    f(&fixture)
}

/// Creates a writable database at a temporary path.
pub fn temp_db(num_tags: u32) -> (TempDir, FozDb) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db = FozDb::open(&temp_dir.path().join("test.foz"), false, num_tags)
        .expect("Failed to open database");
    (temp_dir, db)
}
