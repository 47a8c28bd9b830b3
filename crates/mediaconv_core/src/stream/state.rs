//! Per-stream recording state and loop detection.
//!
//! Sources that loop (background music, idle animations) would otherwise
//! grow the recording without bound. When loop detection is on, a chunk equal
//! to the next expected history chunk is staged instead of appended; a staged
//! run that reaches the full history length is one complete repetition and is
//! dropped. A mismatch flushes the staged run into the history.

use crate::codec::CodecInfo;
use crate::error::{CacheError, CacheResult};
use bytes::Bytes;
use mediaconv_hash::{hash_bytes, DefaultMurmur3, Murmur3, PayloadHash, HASH_SEED};
use tracing::{debug, trace};

/// Loop-detection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// New data is being appended to the history.
    Accumulating,
    /// Chunks repeat the start of the history and are being staged.
    Looping,
    /// A full repetition was just dropped.
    LoopJustEnded,
    /// Recording failed; the stream accepts no more data.
    Error,
}

/// One recorded chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferEntry {
    /// Chunk hash.
    pub hash: PayloadHash,
    /// Chunk bytes.
    pub data: Bytes,
}

/// Recording of one live stream.
#[derive(Debug, Clone)]
pub struct StreamState {
    history: Vec<BufferEntry>,
    candidates: Vec<BufferEntry>,
    stream_hash: DefaultMurmur3,
    codec_info: Option<CodecInfo>,
    loop_state: LoopState,
    detect_loops: bool,
    needs_dump: bool,
}

impl StreamState {
    /// Creates an empty recording.
    #[must_use]
    pub fn new(detect_loops: bool) -> Self {
        Self {
            history: Vec::new(),
            candidates: Vec::new(),
            stream_hash: DefaultMurmur3::with_seed(HASH_SEED),
            codec_info: None,
            loop_state: LoopState::Accumulating,
            detect_loops,
            needs_dump: false,
        }
    }

    /// Records one chunk and returns the resulting loop state.
    ///
    /// # Errors
    ///
    /// [`CacheError::StreamFailed`] once the stream is in the error state.
    pub fn record(&mut self, data: Bytes) -> CacheResult<LoopState> {
        if self.loop_state == LoopState::Error {
            return Err(CacheError::StreamFailed);
        }

        let entry = BufferEntry {
            hash: hash_bytes(&data, HASH_SEED),
            data,
        };

        let expected = self.history.get(self.candidates.len()).map(|e| e.hash);
        if self.detect_loops && expected == Some(entry.hash) {
            self.candidates.push(entry);
            if self.candidates.len() == self.history.len() {
                debug!(chunks = self.history.len(), "dropped one loop repetition");
                self.candidates.clear();
                self.loop_state = LoopState::LoopJustEnded;
            } else {
                self.loop_state = LoopState::Looping;
            }
        } else {
            if !self.candidates.is_empty() {
                trace!(chunks = self.candidates.len(), "partial repetition kept");
                for staged in std::mem::take(&mut self.candidates) {
                    self.append(staged);
                }
            }
            self.append(entry);
            self.loop_state = LoopState::Accumulating;
        }

        Ok(self.loop_state)
    }

    fn append(&mut self, entry: BufferEntry) {
        self.stream_hash.update(&entry.data);
        self.history.push(entry);
    }

    /// Fingerprint of the recorded history.
    #[must_use]
    pub fn stream_hash(&self) -> PayloadHash {
        self.stream_hash.finish()
    }

    /// Chunk hashes of the history, in order.
    #[must_use]
    pub fn chunk_hashes(&self) -> Vec<PayloadHash> {
        self.history.iter().map(|e| e.hash).collect()
    }

    /// Recorded chunks.
    #[must_use]
    pub fn history(&self) -> &[BufferEntry] {
        &self.history
    }

    /// Chunks staged as a possible repetition.
    #[must_use]
    pub fn candidates(&self) -> &[BufferEntry] {
        &self.candidates
    }

    /// Bytes in the history.
    #[must_use]
    pub fn recorded_bytes(&self) -> u64 {
        self.stream_hash.processed()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.candidates.is_empty()
    }

    /// Current loop state.
    #[must_use]
    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    /// Records the codec parameters. Only the first call has an effect;
    /// returns whether this call stored them.
    pub fn set_codec_info(&mut self, info: CodecInfo) -> bool {
        if self.codec_info.is_some() {
            return false;
        }
        self.codec_info = Some(info);
        true
    }

    /// Recorded codec parameters.
    #[must_use]
    pub fn codec_info(&self) -> Option<&CodecInfo> {
        self.codec_info.as_ref()
    }

    /// Whether the stream must be written to the dump database.
    #[must_use]
    pub fn needs_dump(&self) -> bool {
        self.needs_dump
    }

    pub(crate) fn mark_needs_dump(&mut self) {
        self.needs_dump = true;
    }

    pub(crate) fn clear_needs_dump(&mut self) {
        self.needs_dump = false;
    }

    /// Moves the stream to the terminal error state.
    pub fn fail(&mut self) {
        self.loop_state = LoopState::Error;
    }

    /// Clears everything, including the error state.
    pub fn reset(&mut self) {
        self.history.clear();
        self.candidates.clear();
        self.stream_hash.reset();
        self.codec_info = None;
        self.loop_state = LoopState::Accumulating;
        self.needs_dump = false;
    }
}
