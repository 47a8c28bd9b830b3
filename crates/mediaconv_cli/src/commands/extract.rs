//! Extract command implementation.

use super::{open_read_only, CliResult};
use mediaconv_hash::PayloadHash;
use std::io::Write;
use std::path::Path;

/// Runs the extract command. The payload goes to `output` if given, to
/// `out` otherwise.
pub fn run(
    path: &Path,
    num_tags: u32,
    tag: u32,
    hash: PayloadHash,
    output: Option<&Path>,
    out: &mut dyn Write,
) -> CliResult<()> {
    let db = open_read_only(path, num_tags)?;
    let data = db.read_entry(tag, hash)?;

    match output {
        Some(file) => {
            std::fs::write(file, &data)?;
            tracing::info!(bytes = data.len(), file = %file.display(), "extracted payload");
        }
        None => out.write_all(&data)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::sample_db;

    #[test]
    fn extracts_to_writer() {
        let (_dir, path) = sample_db();
        let mut buf = Vec::new();
        run(&path, 4, 0, PayloadHash::new(2), None, &mut buf).unwrap();
        assert_eq!(buf, b"second");
    }

    #[test]
    fn extracts_to_file() {
        let (dir, path) = sample_db();
        let target = dir.path().join("payload.bin");
        let mut buf = Vec::new();
        run(&path, 4, 3, PayloadHash::new(3), Some(&target), &mut buf).unwrap();
        assert!(buf.is_empty());
        assert_eq!(std::fs::read(&target).unwrap(), b"third!");
    }

    #[test]
    fn missing_entry_is_an_error() {
        let (_dir, path) = sample_db();
        let mut buf = Vec::new();
        let err = run(&path, 4, 1, PayloadHash::new(2), None, &mut buf).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
