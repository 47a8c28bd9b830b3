//! Verify command implementation.

use super::{open_read_only, CliError, CliResult};
use mediaconv_fozdb::EntryName;
use std::io::Write;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of entries checked.
    pub entries_checked: usize,
    /// Number of entries whose payload matched its CRC.
    pub valid_entries: usize,
    /// Failures, one line per bad entry.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Reads every entry with CRC verification.
pub fn verify(path: &Path, num_tags: u32) -> CliResult<VerifyResult> {
    let db = open_read_only(path, num_tags)?;
    let mut result = VerifyResult::default();

    for tag in 0..num_tags {
        let mut hashes = db.hashes(tag);
        hashes.sort();
        for hash in hashes {
            result.entries_checked += 1;
            match db.read_entry(tag, hash) {
                Ok(_) => result.valid_entries += 1,
                Err(e) => result
                    .errors
                    .push(format!("{}: {}", EntryName::new(tag, hash), e)),
            }
        }
    }

    Ok(result)
}

/// Runs the verify command.
pub fn run(path: &Path, num_tags: u32, out: &mut dyn Write) -> CliResult<()> {
    writeln!(out, "Verifying database at {}", path.display())?;
    let result = verify(path, num_tags)?;

    writeln!(out, "  Entries checked: {}", result.entries_checked)?;
    writeln!(out, "  Valid entries:   {}", result.valid_entries)?;
    for error in &result.errors {
        writeln!(out, "  ERROR: {error}")?;
    }

    writeln!(out)?;
    if result.is_ok() {
        writeln!(out, "✓ Database verification passed")?;
        Ok(())
    } else {
        writeln!(out, "✗ Database verification failed")?;
        Err(CliError::VerificationFailed(result.errors.len()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::{output, sample_db};
    use mediaconv_fozdb::FozDb;
    use mediaconv_hash::PayloadHash;
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom};

    #[test]
    fn clean_database_passes() {
        let (_dir, path) = sample_db();
        let mut buf = Vec::new();
        run(&path, 4, &mut buf).unwrap();
        let text = output(buf);
        assert!(text.contains("Entries checked: 3"));
        assert!(text.contains("passed"));
    }

    #[test]
    fn flipped_byte_fails() {
        let (_dir, path) = sample_db();
        let offset = {
            let db = FozDb::open(&path, true, 4).unwrap();
            db.entry(3, PayloadHash::new(3)).unwrap().offset
        };
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(offset)).unwrap();
        file.write_all(b"X").unwrap();
        drop(file);

        let result = verify(&path, 4).unwrap();
        assert_eq!(result.entries_checked, 3);
        assert_eq!(result.valid_entries, 2);
        assert_eq!(result.errors.len(), 1);

        let mut buf = Vec::new();
        assert!(run(&path, 4, &mut buf).is_err());
        assert!(output(buf).contains("failed"));
    }
}
