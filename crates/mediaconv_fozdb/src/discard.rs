//! In-place compaction.
//!
//! Entries are replayed from the first one. A discarded entry opens a gap;
//! every surviving entry after it is copied backward over the gap. Surviving
//! entries before the first discard are never touched. The file is then
//! truncated to the end of the last survivor.
//!
//! The whole layout is planned by a read-only pass before the first move.

use crate::error::{FozError, FozResult};
use crate::format::{decode_preamble, EntryName, ENTRY_PREAMBLE_SIZE, FILE_HEADER_SIZE};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

const COPY_CHUNK_SIZE: u64 = 1024 * 1024;

/// Outcome of [`FozDb::discard_entries`](crate::FozDb::discard_entries).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscardStats {
    /// Indexed entries before compaction.
    pub entries_before: usize,
    /// Entries removed from the file.
    pub entries_discarded: usize,
    /// File size before compaction.
    pub bytes_before: u64,
    /// File size after compaction.
    pub bytes_after: u64,
}

impl DiscardStats {
    /// Bytes reclaimed.
    #[must_use]
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Layout of a compacted file, computed before any byte moves.
pub(crate) struct Compaction {
    pub(crate) discarded: usize,
    pub(crate) new_len: u64,
    moves: Vec<Move>,
}

struct Move {
    from: u64,
    to: u64,
    len: u64,
}

/// Walks `file` up to `end` and lays out the survivors of discarding `names`.
///
/// Only reads; a malformed entry fails here with the file untouched.
pub(crate) fn plan(file: &File, end: u64, names: &HashSet<EntryName>) -> FozResult<Compaction> {
    let mut io = file;
    let mut read_pos = FILE_HEADER_SIZE;
    let mut write_pos = FILE_HEADER_SIZE;
    let mut discarded = 0;
    let mut moves = Vec::new();

    while read_pos < end {
        io.seek(SeekFrom::Start(read_pos)).map_err(FozError::Seek)?;
        let mut preamble = [0u8; ENTRY_PREAMBLE_SIZE];
        io.read_exact(&mut preamble).map_err(FozError::Read)?;
        let (name, header) = decode_preamble(&preamble)?;

        let len = ENTRY_PREAMBLE_SIZE as u64 + u64::from(header.size);
        if read_pos + len > end {
            return Err(FozError::corrupt(format!(
                "entry {name} at offset {read_pos} runs past end of file"
            )));
        }

        if names.contains(&name) {
            discarded += 1;
        } else {
            if write_pos != read_pos {
                moves.push(Move {
                    from: read_pos,
                    to: write_pos,
                    len,
                });
            }
            write_pos += len;
        }
        read_pos += len;
    }

    Ok(Compaction {
        discarded,
        new_len: write_pos,
        moves,
    })
}

/// Moves the survivors of `layout` backward and truncates the file.
///
/// A failure part way through can leave a partially rewritten file.
pub(crate) fn apply(file: &File, layout: &Compaction) -> FozResult<()> {
    let mut copy_buf = Vec::new();
    for m in &layout.moves {
        move_back(file, m.from, m.to, m.len, &mut copy_buf)?;
    }
    file.set_len(layout.new_len).map_err(FozError::Write)?;
    file.sync_all().map_err(FozError::Write)?;
    Ok(())
}

/// Copies `len` bytes from `from` to the lower offset `to`.
///
/// Chunks are copied front to back, so a chunk is always read before any
/// write can reach it.
fn move_back(file: &File, from: u64, to: u64, len: u64, buf: &mut Vec<u8>) -> FozResult<()> {
    debug_assert!(to < from);
    let mut io = file;
    let mut done = 0u64;
    while done < len {
        let n = (len - done).min(COPY_CHUNK_SIZE) as usize;
        buf.resize(n, 0);
        io.seek(SeekFrom::Start(from + done)).map_err(FozError::Seek)?;
        io.read_exact(&mut buf[..n]).map_err(FozError::Read)?;
        io.seek(SeekFrom::Start(to + done)).map_err(FozError::Seek)?;
        io.write_all(&buf[..n]).map_err(FozError::Write)?;
        done += n as u64;
    }
    Ok(())
}
