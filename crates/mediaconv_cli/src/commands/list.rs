//! List command implementation.

use super::{open_read_only, CliResult, OutputFormat};
use mediaconv_fozdb::EntryName;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// One listed entry.
#[derive(Debug, Serialize)]
pub struct EntryRow {
    /// Full 40-digit entry name.
    pub name: String,
    /// Tag.
    pub tag: u32,
    /// Hash, 32 hex digits.
    pub hash: String,
    /// Payload size in bytes.
    pub size: u32,
    /// Stored CRC32, zero if none.
    pub crc: u32,
    /// File offset of the payload.
    pub offset: u64,
}

/// Collects the entries of one tag, or of all tags, in file order.
pub fn list(path: &Path, num_tags: u32, tag: Option<u32>) -> CliResult<Vec<EntryRow>> {
    let db = open_read_only(path, num_tags)?;
    let tags: Vec<u32> = match tag {
        Some(tag) => vec![tag],
        None => (0..num_tags).collect(),
    };

    let mut rows: Vec<EntryRow> = tags
        .into_iter()
        .flat_map(|tag| db.entries(tag).map(move |e| (tag, *e)))
        .map(|(tag, e)| EntryRow {
            name: EntryName::new(tag, e.hash).to_string(),
            tag,
            hash: e.hash.to_string(),
            size: e.header.size,
            crc: e.header.crc,
            offset: e.offset,
        })
        .collect();
    rows.sort_by_key(|r| r.offset);
    Ok(rows)
}

/// Runs the list command.
pub fn run(
    path: &Path,
    num_tags: u32,
    tag: Option<u32>,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    let rows = list(path, num_tags, tag)?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?,
        OutputFormat::Text => {
            for row in &rows {
                writeln!(out, "{}  {:>10}  {:08x}", row.name, row.size, row.crc)?;
            }
            writeln!(out, "{} entries", rows.len())?;
        }
    }
    Ok(())
}
