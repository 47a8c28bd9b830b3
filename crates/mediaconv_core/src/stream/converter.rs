//! Per-stream lookup, placeholder serving and dumping.

use super::chunker::ChunkPolicy;
use super::state::{LoopState, StreamState};
use crate::codec::{CodecInfo, Payload, PayloadCodec};
use crate::error::{CacheError, CacheResult};
use crate::placeholder::{create_marker, BlankMedia};
use crate::store::{DumpDatabase, MediaCache};
use bytes::Bytes;
use mediaconv_fozdb::{EntryName, FozDb};
use mediaconv_hash::PayloadHash;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What [`StreamConverter::serve`] hands to the pipeline.
#[derive(Debug, Clone)]
pub enum Served {
    /// A cached transcode.
    Transcoded {
        /// Output tag the payload was found under.
        tag: u32,
        /// Stream fingerprint.
        hash: PayloadHash,
        /// Decoded payload.
        payload: Payload,
    },
    /// No transcode is available; play the blank media instead.
    Placeholder(BlankMedia),
}

impl Served {
    /// Returns true for a cache hit.
    #[must_use]
    pub fn is_transcoded(&self) -> bool {
        matches!(self, Self::Transcoded { .. })
    }
}

/// Result of [`StreamConverter::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpOutcome {
    /// The stream was not marked for dumping, or recorded nothing.
    NotNeeded,
    /// An existing recording already covers this stream.
    Suppressed {
        /// Stream fingerprint.
        stream: PayloadHash,
    },
    /// The stream was recorded.
    Written {
        /// Stream fingerprint.
        stream: PayloadHash,
        /// Chunks in the recording.
        chunks: usize,
        /// Shorter recordings of the same stream that were replaced.
        superseded: usize,
    },
}

/// Drives the cache protocol for one stream.
///
/// Feed the stream with [`push_chunk`](Self::push_chunk) or
/// [`ingest`](Self::ingest), call [`serve`](Self::serve) to obtain what to
/// play, and [`finish`](Self::finish) at teardown. Dropping a converter that
/// still needs a dump finishes it, logging any failure.
pub struct StreamConverter<C: PayloadCodec> {
    cache: Arc<MediaCache>,
    codec: C,
    policy: ChunkPolicy,
    state: StreamState,
}

impl<C: PayloadCodec> StreamConverter<C> {
    pub(crate) fn new(cache: Arc<MediaCache>, codec: C) -> Self {
        let policy = cache.config().effective_chunk_policy();
        let state = StreamState::new(codec.detect_loops());
        Self {
            cache,
            codec,
            policy,
            state,
        }
    }

    /// The codec.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Recording state.
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Records one chunk delivered by the application.
    ///
    /// # Errors
    ///
    /// [`CacheError::StreamFailed`] once the stream is in the error state.
    pub fn push_chunk(&mut self, data: impl Into<Bytes>) -> CacheResult<LoopState> {
        self.state.record(data.into())
    }

    /// Records the codec parameters. Only the first call has an effect.
    pub fn set_codec_info(&mut self, info: CodecInfo) -> bool {
        self.state.set_codec_info(info)
    }

    /// Cuts everything `source` yields into chunks per the configured policy
    /// and records them. Returns the number of bytes consumed.
    ///
    /// A read or chunking failure moves the stream to the error state.
    pub fn ingest<R: Read>(&mut self, source: R) -> CacheResult<u64> {
        let policy = self.policy;
        let state = &mut self.state;
        let result = policy.split(source, |chunk| state.record(chunk).map(|_| ()));
        if let Err(e) = &result {
            if !matches!(e, CacheError::StreamFailed) {
                warn!(error = %e, "reading stream failed");
                self.state.fail();
            }
        }
        result
    }

    /// Fingerprint of the data recorded so far.
    pub fn fingerprint(&self) -> PayloadHash {
        self.state.stream_hash()
    }

    /// Looks up the stream in the transcoded database.
    ///
    /// On a miss the stream is marked for dumping (unless dumping is
    /// disabled), a marker file is created, and the blank media is returned.
    /// Lookup failures are logged and treated as misses.
    pub fn serve(&mut self) -> Served {
        let hash = self.fingerprint();

        if self.state.loop_state() != LoopState::Error {
            if let Some(transcoded) = self.cache.transcoded() {
                match transcoded.lookup(&self.codec, hash) {
                    Ok(Some((tag, payload))) => {
                        debug!(%hash, tag, "serving transcoded stream");
                        return Served::Transcoded { tag, hash, payload };
                    }
                    Ok(None) => {}
                    Err(e) => warn!(%hash, error = %e, "transcoded lookup failed"),
                }
            }

            if self.cache.dump().is_some() && !self.state.is_empty() {
                self.state.mark_needs_dump();
            }
        }

        if let Some(dir) = self.cache.config().marker_dir.as_deref() {
            if let Err(e) = create_marker(dir, self.codec.kind()) {
                warn!(dir = %dir.display(), error = %e, "failed to create marker file");
            }
        }

        info!(%hash, kind = %self.codec.kind(), "no transcode available, serving placeholder");
        Served::Placeholder(self.cache.blank().clone())
    }

    /// Writes the recording to the dump database if the stream needs it.
    ///
    /// Chunk data, codec info and the STREAM entry are written under one
    /// lock. A recording that is a prefix of an existing one is skipped;
    /// existing recordings that are a strict prefix of this one are
    /// discarded.
    ///
    /// # Errors
    ///
    /// [`CacheError::StreamFailed`] if the stream is in the error state, or
    /// any database error.
    pub fn finish(&mut self) -> CacheResult<DumpOutcome> {
        if !self.state.needs_dump() {
            return Ok(DumpOutcome::NotNeeded);
        }
        self.state.clear_needs_dump();

        if self.state.loop_state() == LoopState::Error {
            return Err(CacheError::StreamFailed);
        }
        let Some(dump) = self.cache.dump() else {
            return Ok(DumpOutcome::NotNeeded);
        };
        if self.state.history().is_empty() {
            return Ok(DumpOutcome::NotNeeded);
        }

        let result = dump_stream(dump, &self.state);
        if let Err(e) = &result {
            // Keep the recording so a later attempt can retry.
            self.state.mark_needs_dump();
            warn!(error = %e, "failed to dump stream");
        }
        result
    }

    /// Finishes the current stream and starts a new one, as on a flush or
    /// end-of-stream restart.
    pub fn flush_and_reset(&mut self) -> CacheResult<DumpOutcome> {
        let outcome = self.finish();
        self.state.reset();
        outcome
    }
}

impl<C: PayloadCodec> Drop for StreamConverter<C> {
    fn drop(&mut self) {
        if self.state.needs_dump() {
            if let Err(e) = self.finish() {
                warn!(error = %e, "dropping stream without dumping it");
            }
        }
    }
}

impl<C: PayloadCodec + std::fmt::Debug> std::fmt::Debug for StreamConverter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConverter")
            .field("codec", &self.codec)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn dump_stream(dump: &DumpDatabase, state: &StreamState) -> CacheResult<DumpOutcome> {
    let tags = dump.kind().tags();
    let stream = state.stream_hash();
    let chunks = state.chunk_hashes();
    let list = PayloadHash::list_to_bytes(&chunks);

    let mut db = dump.lock();

    let mut superseded = Vec::new();
    for existing in db.hashes(tags.stream) {
        let Some(data) = read_stream_list(&db, tags.stream, existing) else {
            continue;
        };
        if data.starts_with(&list) {
            debug!(%stream, %existing, "stream already covered by an existing recording");
            return Ok(DumpOutcome::Suppressed { stream });
        }
        if list.starts_with(&data) {
            superseded.push(EntryName::new(tags.stream, existing));
        }
    }

    let codec_info = match (tags.codec_info, state.codec_info()) {
        (Some(tag), Some(info)) => Some((tag, info.encode())),
        _ => None,
    };
    for entry in state.history() {
        db.write_entry_bytes(tags.chunk, entry.hash, &entry.data)?;
        if let Some((tag, info)) = &codec_info {
            db.write_entry_bytes(*tag, entry.hash, info)?;
        }
    }
    db.write_entry_bytes(tags.stream, stream, &list)?;

    if !superseded.is_empty() {
        db.discard_entries(superseded.iter().copied())?;
    }

    info!(
        %stream,
        chunks = chunks.len(),
        superseded = superseded.len(),
        "recorded stream for transcoding"
    );
    Ok(DumpOutcome::Written {
        stream,
        chunks: chunks.len(),
        superseded: superseded.len(),
    })
}

fn read_stream_list(db: &FozDb, tag: u32, hash: PayloadHash) -> Option<Vec<u8>> {
    match db.read_entry(tag, hash) {
        Ok(data) if data.len() % PayloadHash::SIZE == 0 => Some(data),
        Ok(data) => {
            warn!(%hash, len = data.len(), "ignoring malformed stream entry");
            None
        }
        Err(e) => {
            warn!(%hash, error = %e, "ignoring unreadable stream entry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AudioCodec, PacketWriter, VideoCodec};
    use crate::config::MediaConfig;
    use crate::media::{tags, MediaKind};
    use mediaconv_hash::{hash_bytes, HASH_SEED};
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    struct Env {
        dir: TempDir,
    }

    impl Env {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            std::fs::write(dir.path().join("blank"), b"BLANK").unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn config(&self, kind: MediaKind) -> MediaConfig {
            MediaConfig::new(kind, self.path("blank"))
                .dump_path(self.path("dump.foz"))
                .transcoded_path(self.path("transcoded.foz"))
                .marker_dir(self.path("markers"))
                .discard_disabled(true)
        }

        fn cache(&self, kind: MediaKind) -> Arc<MediaCache> {
            MediaCache::init(self.config(kind)).unwrap()
        }

        fn write_transcoded(&self, tag: u32, hash: PayloadHash, data: &[u8]) {
            let mut db = FozDb::open(&self.path("transcoded.foz"), false, 4).unwrap();
            db.write_entry_bytes(tag, hash, data).unwrap();
        }

        fn dump(&self, kind: MediaKind) -> FozDb {
            FozDb::open(&self.path("dump.foz"), true, kind.tags().num_tags).unwrap()
        }
    }

    fn stream_list(db: &FozDb, tag: u32, stream: PayloadHash) -> Vec<PayloadHash> {
        PayloadHash::list_from_bytes(&db.read_entry(tag, stream).unwrap()).unwrap()
    }

    fn h(data: &str) -> PayloadHash {
        hash_bytes(data.as_bytes(), HASH_SEED)
    }

    fn play(cache: &Arc<MediaCache>, chunks: &[&'static str]) -> DumpOutcome {
        let mut conv = cache.converter(VideoCodec).unwrap();
        for c in chunks {
            conv.push_chunk(c.as_bytes()).unwrap();
        }
        assert!(!conv.serve().is_transcoded());
        conv.finish().unwrap()
    }

    #[test]
    fn cold_cache_serves_placeholder_and_dumps() {
        let env = Env::new();
        let cache = env.cache(MediaKind::Video);
        let mut conv = cache.converter(VideoCodec).unwrap();
        conv.push_chunk("one").unwrap();
        conv.push_chunk("two").unwrap();

        let served = conv.serve();
        let Served::Placeholder(blank) = served else {
            panic!("expected placeholder");
        };
        assert_eq!(blank.bytes().as_ref(), b"BLANK");
        assert!(conv.state().needs_dump());
        assert!(env.path("markers").join("placeholder-video-used").exists());

        let stream = conv.fingerprint();
        assert_eq!(stream, hash_bytes(b"onetwo", HASH_SEED));
        assert_eq!(
            conv.finish().unwrap(),
            DumpOutcome::Written {
                stream,
                chunks: 2,
                superseded: 0
            }
        );
        assert_eq!(conv.finish().unwrap(), DumpOutcome::NotNeeded);
        drop(conv);

        let db = env.dump(MediaKind::Video);
        assert_eq!(
            stream_list(&db, tags::video::STREAM, stream),
            vec![h("one"), h("two")]
        );
        assert_eq!(db.read_entry(tags::video::VIDEODATA, h("two")).unwrap(), b"two");
    }

    #[test]
    fn warm_cache_serves_transcode_without_side_effects() {
        let env = Env::new();
        let stream = hash_bytes(b"onetwo", HASH_SEED);
        env.write_transcoded(tags::video::MKVDATA, stream, b"transcoded");

        let cache = env.cache(MediaKind::Video);
        let mut conv = cache.converter(VideoCodec).unwrap();
        conv.push_chunk("one").unwrap();
        conv.push_chunk("two").unwrap();

        match conv.serve() {
            Served::Transcoded { tag, hash, payload } => {
                assert_eq!(tag, tags::video::MKVDATA);
                assert_eq!(hash, stream);
                assert_eq!(payload, Payload::Blob(Bytes::from_static(b"transcoded")));
            }
            Served::Placeholder(_) => panic!("expected a cache hit"),
        }
        assert!(!conv.state().needs_dump());
        assert_eq!(conv.finish().unwrap(), DumpOutcome::NotNeeded);
        assert!(!env.path("markers").exists());
        assert!(env.dump(MediaKind::Video).is_empty());
    }

    #[test]
    fn audio_hit_decodes_packets() {
        let env = Env::new();
        let mut writer = PacketWriter::new();
        writer.push_data(b"opus frames");
        let stream = hash_bytes(b"wma", HASH_SEED);
        env.write_transcoded(tags::audio::PTNADATA, stream, &writer.finish());

        let cache = env.cache(MediaKind::Audio);
        let mut conv = cache.converter(AudioCodec).unwrap();
        conv.push_chunk("wma").unwrap();
        let Served::Transcoded { payload, .. } = conv.serve() else {
            panic!("expected a cache hit");
        };
        let Payload::Packets(packets) = payload else {
            panic!("expected packets");
        };
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data.as_ref(), b"opus frames");
    }

    #[test]
    fn audio_dump_writes_codec_info_per_chunk() {
        let env = Env::new();
        let cache = env.cache(MediaKind::Audio);
        let info = CodecInfo {
            version: 2,
            rate: 48_000,
            codec_data: Bytes::from_static(b"cd"),
            ..CodecInfo::default()
        };

        let mut conv = cache.converter(AudioCodec).unwrap();
        conv.set_codec_info(info.clone());
        for c in ["A", "B", "A", "B", "A"] {
            conv.push_chunk(c).unwrap();
        }
        conv.serve();
        let outcome = conv.finish().unwrap();
        let DumpOutcome::Written { stream, chunks, .. } = outcome else {
            panic!("expected a write, got {outcome:?}");
        };
        assert_eq!(chunks, 2);
        drop(conv);

        let db = env.dump(MediaKind::Audio);
        assert_eq!(stream_list(&db, tags::audio::STREAM, stream), vec![h("A"), h("B")]);
        for chunk in [h("A"), h("B")] {
            let stored = db.read_entry(tags::audio::CODECINFO, chunk).unwrap();
            assert_eq!(CodecInfo::decode(&stored).unwrap(), info);
        }
    }

    #[test]
    fn prefix_of_existing_recording_is_suppressed() {
        let env = Env::new();
        let cache = env.cache(MediaKind::Video);

        assert!(matches!(play(&cache, &["A", "B", "C"]), DumpOutcome::Written { .. }));
        let outcome = play(&cache, &["A", "B"]);
        assert!(matches!(outcome, DumpOutcome::Suppressed { .. }));

        let db = cache.dump().unwrap().lock();
        assert_eq!(db.entries(tags::video::STREAM).count(), 1);
    }

    #[test]
    fn longer_recording_supersedes_prefix() {
        let env = Env::new();
        let cache = env.cache(MediaKind::Video);

        play(&cache, &["A", "B"]);
        let outcome = play(&cache, &["A", "B", "C"]);
        assert!(matches!(outcome, DumpOutcome::Written { superseded: 1, .. }));

        let db = cache.dump().unwrap().lock();
        let streams = db.hashes(tags::video::STREAM);
        assert_eq!(streams.len(), 1);
        assert_eq!(
            stream_list(&db, tags::video::STREAM, streams[0]),
            vec![h("A"), h("B"), h("C")]
        );
        assert!(db.has_entry(tags::video::VIDEODATA, h("A")));
    }

    #[test]
    fn identical_recording_is_suppressed() {
        let env = Env::new();
        let cache = env.cache(MediaKind::Video);
        play(&cache, &["A", "B"]);
        let size = cache.dump().unwrap().lock().write_cursor();

        assert!(matches!(play(&cache, &["A", "B"]), DumpOutcome::Suppressed { .. }));
        assert_eq!(cache.dump().unwrap().lock().write_cursor(), size);
    }

    #[test]
    fn diverging_recordings_are_both_kept() {
        let env = Env::new();
        let cache = env.cache(MediaKind::Video);
        play(&cache, &["A", "B"]);
        play(&cache, &["A", "C"]);
        assert_eq!(cache.dump().unwrap().lock().entries(tags::video::STREAM).count(), 2);
    }

    #[test]
    fn dump_disabled_never_marks() {
        let env = Env::new();
        let cache = MediaCache::init(env.config(MediaKind::Video).dump_disabled(true)).unwrap();
        let mut conv = cache.converter(VideoCodec).unwrap();
        conv.push_chunk("A").unwrap();
        assert!(!conv.serve().is_transcoded());
        assert!(!conv.state().needs_dump());
        assert_eq!(conv.finish().unwrap(), DumpOutcome::NotNeeded);
        assert!(!env.path("dump.foz").exists());
    }

    #[test]
    fn drop_dumps_pending_stream() {
        let env = Env::new();
        let cache = env.cache(MediaKind::Video);
        {
            let mut conv = cache.converter(VideoCodec).unwrap();
            conv.push_chunk("A").unwrap();
            conv.serve();
        }
        assert!(cache
            .dump()
            .unwrap()
            .lock()
            .has_entry(tags::video::STREAM, hash_bytes(b"A", HASH_SEED)));
    }

    #[test]
    fn flush_and_reset_starts_a_new_stream() {
        let env = Env::new();
        let cache = env.cache(MediaKind::Video);
        let mut conv = cache.converter(VideoCodec).unwrap();
        conv.push_chunk("A").unwrap();
        conv.serve();

        assert!(matches!(conv.flush_and_reset().unwrap(), DumpOutcome::Written { .. }));
        assert!(conv.state().is_empty());
        assert!(!conv.state().needs_dump());
        conv.push_chunk("B").unwrap();
        assert_eq!(conv.fingerprint(), hash_bytes(b"B", HASH_SEED));
    }

    #[test]
    fn ingest_chunks_reader_source() {
        let env = Env::new();
        let config = env
            .config(MediaKind::Video)
            .chunk_policy(ChunkPolicy::Delivered { max_size: 4 });
        let cache = MediaCache::init(config).unwrap();
        let mut conv = cache.converter(VideoCodec).unwrap();

        let source = b"0123456789".to_vec();
        assert_eq!(conv.ingest(&source[..]).unwrap(), 10);
        assert_eq!(conv.state().history().len(), 3);
        assert_eq!(conv.fingerprint(), hash_bytes(&source, HASH_SEED));
    }

    #[test]
    fn read_failure_moves_stream_to_error_state() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "device gone"))
            }
        }

        let env = Env::new();
        let cache = env.cache(MediaKind::Video);
        let mut conv = cache.converter(VideoCodec).unwrap();
        conv.push_chunk("A").unwrap();
        conv.serve();

        assert!(conv.ingest(Broken).is_err());
        assert_eq!(conv.state().loop_state(), LoopState::Error);
        assert!(matches!(conv.push_chunk("B"), Err(CacheError::StreamFailed)));
        assert!(matches!(conv.finish(), Err(CacheError::StreamFailed)));
        assert!(!conv.state().needs_dump());
    }
}
