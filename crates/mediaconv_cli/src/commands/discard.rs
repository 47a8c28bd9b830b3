//! Discard command implementation.

use super::{parse_name, CliError, CliResult};
use mediaconv_fozdb::{DiscardStats, FozDb};
use std::io::Write;
use std::path::Path;

/// Removes the named entries from the database at `path`.
pub fn discard(path: &Path, num_tags: u32, names: &[String]) -> CliResult<DiscardStats> {
    if !path.exists() {
        return Err(CliError::NoDatabase(path.to_path_buf()).into());
    }
    let names = names
        .iter()
        .map(|n| parse_name(n))
        .collect::<Result<Vec<_>, _>>()?;
    let mut db = FozDb::open(path, false, num_tags)?;
    let stats = db.discard_entries(names)?;
    db.sync()?;
    Ok(stats)
}

/// Runs the discard command.
pub fn run(path: &Path, num_tags: u32, names: &[String], out: &mut dyn Write) -> CliResult<()> {
    writeln!(out, "Discarding {} entries from {}", names.len(), path.display())?;
    let stats = discard(path, num_tags, names)?;

    writeln!(out, "  Entries before:    {}", stats.entries_before)?;
    writeln!(out, "  Entries discarded: {}", stats.entries_discarded)?;
    writeln!(out, "  Size before: {} bytes", stats.bytes_before)?;
    writeln!(out, "  Size after:  {} bytes", stats.bytes_after)?;
    writeln!(out, "  Space saved: {} bytes", stats.bytes_saved())?;
    Ok(())
}
