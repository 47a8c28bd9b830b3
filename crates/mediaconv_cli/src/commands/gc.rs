//! Garbage collection command implementation.

use super::{CliError, CliResult, OutputFormat};
use mediaconv_core::gc::collect_garbage;
use mediaconv_core::{DumpDatabase, GcReport, MediaConfig, MediaKind, TranscodedDatabase};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Databases a collection pass runs over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcTarget {
    /// Media kind.
    pub kind: MediaKind,
    /// Dump database.
    pub dump: PathBuf,
    /// Transcoded database.
    pub transcoded: PathBuf,
}

impl GcTarget {
    /// Combines command-line values with an optional JSON configuration
    /// file. Command-line values win.
    pub fn resolve(
        dump: Option<PathBuf>,
        kind: Option<MediaKind>,
        transcoded: Option<PathBuf>,
        config: Option<PathBuf>,
    ) -> CliResult<Self> {
        let config = config.map(|path| load_config(&path)).transpose()?;
        let from_config = config.as_ref();

        let kind = kind
            .or_else(|| from_config.map(|c| c.kind))
            .ok_or(CliError::Missing("--kind"))?;
        let dump = dump
            .or_else(|| from_config.and_then(|c| c.dump_path.clone()))
            .ok_or(CliError::Missing("Dump database path"))?;
        let transcoded = transcoded
            .or_else(|| from_config.and_then(|c| c.transcoded_path.clone()))
            .ok_or(CliError::Missing("--transcoded"))?;

        Ok(Self {
            kind,
            dump,
            transcoded,
        })
    }
}

fn load_config(path: &Path) -> CliResult<MediaConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Runs one collection pass over `target`.
pub fn collect(target: &GcTarget, dry_run: bool) -> CliResult<GcReport> {
    if !target.dump.exists() {
        return Err(CliError::NoDatabase(target.dump.clone()).into());
    }
    let dump = DumpDatabase::open(&target.dump, target.kind)?;
    let transcoded = TranscodedDatabase::open(&target.transcoded, target.kind)?;
    Ok(collect_garbage(&dump, &transcoded, dry_run)?)
}

/// Runs the gc command.
pub fn run(target: &GcTarget, dry_run: bool, format: OutputFormat, out: &mut dyn Write) -> CliResult<()> {
    let report = collect(target, dry_run)?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?,
        OutputFormat::Text => {
            writeln!(out, "Garbage collecting {}", target.dump.display())?;
            if report.dry_run {
                writeln!(out, "(dry run - no changes will be made)")?;
            }
            writeln!(out, "  Streams:          {}", report.streams)?;
            writeln!(out, "  Complete streams: {}", report.complete_streams)?;
            writeln!(out, "  Protected chunks: {}", report.protected)?;
            writeln!(
                out,
                "  {} entries:  {}",
                if report.dry_run { "Discardable" } else { "Discarded" },
                report.discarded
            )?;
            writeln!(out, "  Size before: {} bytes", report.bytes_before)?;
            writeln!(out, "  Size after:  {} bytes", report.bytes_after)?;
        }
    }
    Ok(())
}
