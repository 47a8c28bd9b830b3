//! Inspect command implementation.

use super::{open_read_only, CliResult, OutputFormat};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// Format version from the file header.
    pub version: u8,
    /// File size in bytes.
    pub file_size: u64,
    /// Number of entries.
    pub entry_count: usize,
    /// Per-tag statistics.
    pub tags: Vec<TagStats>,
}

/// Statistics for a single tag.
#[derive(Debug, Serialize)]
pub struct TagStats {
    /// Tag number.
    pub tag: u32,
    /// Number of entries.
    pub entries: usize,
    /// Total payload size in bytes.
    pub payload_bytes: u64,
}

/// Collects the inspection result.
pub fn inspect(path: &Path, num_tags: u32) -> CliResult<InspectResult> {
    let db = open_read_only(path, num_tags)?;
    let tags = (0..num_tags)
        .map(|tag| TagStats {
            tag,
            entries: db.entries(tag).count(),
            payload_bytes: db.entries(tag).map(|e| u64::from(e.header.size)).sum(),
        })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        version: db.version(),
        file_size: db.write_cursor(),
        entry_count: db.len(),
        tags,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, num_tags: u32, format: OutputFormat, out: &mut dyn Write) -> CliResult<()> {
    let result = inspect(path, num_tags)?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        OutputFormat::Text => print_text_output(&result, out)?,
    }
    Ok(())
}

fn print_text_output(result: &InspectResult, out: &mut dyn Write) -> CliResult<()> {
    writeln!(out, "Database: {}", result.path)?;
    writeln!(out, "  Version:   {}", result.version)?;
    writeln!(out, "  File size: {} bytes", result.file_size)?;
    writeln!(out, "  Entries:   {}", result.entry_count)?;
    writeln!(out)?;
    writeln!(out, "  {:>4}  {:>8}  {:>14}", "tag", "entries", "payload bytes")?;
    for stats in &result.tags {
        writeln!(
            out,
            "  {:>4}  {:>8}  {:>14}",
            stats.tag, stats.entries, stats.payload_bytes
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::{output, sample_db};

    #[test]
    fn counts_entries_per_tag() {
        let (_dir, path) = sample_db();
        let result = inspect(&path, 4).unwrap();
        assert_eq!(result.version, 6);
        assert_eq!(result.entry_count, 3);
        assert_eq!(result.tags[0].entries, 2);
        assert_eq!(result.tags[0].payload_bytes, 11);
        assert_eq!(result.tags[3].entries, 1);
        assert_eq!(result.file_size, std::fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn json_output() {
        let (_dir, path) = sample_db();
        let mut buf = Vec::new();
        run(&path, 4, OutputFormat::Json, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output(buf)).unwrap();
        assert_eq!(value["entry_count"], 3);
        assert_eq!(value["tags"][3]["payload_bytes"], 6);
    }

    #[test]
    fn text_output() {
        let (_dir, path) = sample_db();
        let mut buf = Vec::new();
        run(&path, 4, OutputFormat::Text, &mut buf).unwrap();
        assert!(output(buf).contains("Entries:   3"));
    }
}
