//! Garbage collection of transcoded streams.
//!
//! Recorded streams stay in the dump database until the offline transcoder
//! has produced their outputs. A stream is complete when the transcoded
//! database holds an output under the stream hash, or under every one of its
//! chunk hashes. Complete streams lose their STREAM entry, chunk data and
//! codec info; chunks still referenced by an incomplete stream are kept.

use crate::error::{CacheError, CacheResult};
use crate::store::{DumpDatabase, TranscodedDatabase};
use mediaconv_fozdb::{DiscardStats, EntryName, FozDb};
use mediaconv_hash::PayloadHash;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// Entries selected for removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcPlan {
    /// STREAM entries examined.
    pub streams: usize,
    /// Streams found complete.
    pub complete_streams: usize,
    /// Chunk hashes kept because an incomplete stream references them.
    pub protected: usize,
    /// Names to discard, sorted.
    pub discard: Vec<EntryName>,
}

impl GcPlan {
    /// Returns true if nothing would be discarded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.discard.is_empty()
    }
}

/// Outcome of a collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    /// STREAM entries examined.
    pub streams: usize,
    /// Streams found complete.
    pub complete_streams: usize,
    /// Entries discarded, or that would be on a dry run.
    pub discarded: usize,
    /// Chunk hashes kept because an incomplete stream references them.
    pub protected: usize,
    /// Whether the database was left untouched.
    pub dry_run: bool,
    /// Bytes before compaction.
    pub bytes_before: u64,
    /// Bytes after compaction.
    pub bytes_after: u64,
}

impl GcReport {
    fn new(plan: &GcPlan, dry_run: bool, stats: Option<DiscardStats>, size: u64) -> Self {
        Self {
            streams: plan.streams,
            complete_streams: plan.complete_streams,
            discarded: stats.map_or(plan.discard.len(), |s| s.entries_discarded),
            protected: plan.protected,
            dry_run,
            bytes_before: stats.map_or(size, |s| s.bytes_before),
            bytes_after: stats.map_or(size, |s| s.bytes_after),
        }
    }
}

/// Selects the entries of `dump` made obsolete by `transcoded`.
///
/// STREAM entries that cannot be read or decoded are skipped with a warning.
pub fn plan(dump: &FozDb, transcoded: &TranscodedDatabase) -> GcPlan {
    let tags = transcoded.kind().tags();
    let mut plan = GcPlan::default();
    let mut candidates = BTreeSet::new();
    let mut protected = HashSet::new();

    for stream in dump.hashes(tags.stream) {
        let chunks = match read_stream(dump, tags.stream, stream) {
            Some(chunks) => chunks,
            None => continue,
        };
        plan.streams += 1;

        let complete = transcoded.contains(stream)
            || (!chunks.is_empty() && chunks.iter().all(|&c| transcoded.contains(c)));

        if complete {
            plan.complete_streams += 1;
            candidates.insert(EntryName::new(tags.stream, stream));
            for &chunk in &chunks {
                candidates.insert(EntryName::new(tags.chunk, chunk));
                if let Some(codec_tag) = tags.codec_info {
                    candidates.insert(EntryName::new(codec_tag, chunk));
                }
            }
        } else {
            protected.extend(chunks);
        }
    }

    plan.protected = protected.len();
    plan.discard = candidates
        .into_iter()
        .filter(|name| name.tag == tags.stream || !protected.contains(&name.hash))
        .filter(|name| dump.has_entry(name.tag, name.hash))
        .collect();
    plan
}

fn read_stream(dump: &FozDb, tag: u32, stream: PayloadHash) -> Option<Vec<PayloadHash>> {
    let data = match dump.read_entry(tag, stream) {
        Ok(data) => data,
        Err(e) => {
            warn!(%stream, error = %e, "skipping unreadable stream entry");
            return None;
        }
    };
    let chunks = PayloadHash::list_from_bytes(&data);
    if chunks.is_none() {
        warn!(%stream, len = data.len(), "skipping malformed stream entry");
    }
    chunks
}

/// Plans and, unless `dry_run`, applies a collection pass.
///
/// The dump database stays locked for the whole pass.
///
/// # Errors
///
/// [`CacheError::Config`] if the databases hold different media kinds, or
/// any error from compaction.
pub fn collect_garbage(
    dump: &DumpDatabase,
    transcoded: &TranscodedDatabase,
    dry_run: bool,
) -> CacheResult<GcReport> {
    if dump.kind() != transcoded.kind() {
        return Err(CacheError::Config(format!(
            "{} dump database with {} transcoded database",
            dump.kind(),
            transcoded.kind()
        )));
    }

    let mut db = dump.lock();
    let plan = plan(&db, transcoded);
    debug!(
        streams = plan.streams,
        complete = plan.complete_streams,
        discard = plan.discard.len(),
        "planned garbage collection"
    );

    if dry_run || plan.is_empty() {
        return Ok(GcReport::new(&plan, dry_run, None, db.write_cursor()));
    }

    let stats = db.discard_entries(plan.discard.iter().copied())?;
    let report = GcReport::new(&plan, false, Some(stats), db.write_cursor());
    info!(
        path = %dump.path().display(),
        discarded = report.discarded,
        bytes_saved = stats.bytes_saved(),
        "garbage collected dump database"
    );
    Ok(report)
}

/// Runs [`collect_garbage`] unless this dump handle already did.
pub fn run_once(dump: &DumpDatabase, transcoded: &TranscodedDatabase) -> CacheResult<Option<GcReport>> {
    if !dump.try_begin_gc() {
        return Ok(None);
    }
    collect_garbage(dump, transcoded, false).map(Some)
}
