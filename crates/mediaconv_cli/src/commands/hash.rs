//! Hash command implementation.
//!
//! Prints the fingerprint a media file is cached under, for looking it up in
//! a transcoded database with `extract`.

use super::{CliResult, OutputFormat};
use clap::ValueEnum;
use mediaconv_hash::{
    full_hash, hash_reader, Murmur3, Murmur3x64, Murmur3x86, PayloadHash, HASH_SEED,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

/// MurmurHash3 variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HashVariant {
    /// The variant the cache uses on this machine
    Native,
    /// 64-bit lanes
    X64,
    /// 32-bit lanes
    X86,
}

/// Fingerprint of one file.
#[derive(Debug, Serialize)]
pub struct HashResult {
    /// File path.
    pub path: String,
    /// Fingerprint, 32 hex digits.
    pub hash: String,
    /// Bytes hashed.
    pub bytes: u64,
}

/// Hashes the whole of `file`.
pub fn fingerprint(file: &Path, variant: HashVariant) -> CliResult<HashResult> {
    let reader = BufReader::new(File::open(file)?);
    let (hash, bytes) = match variant {
        HashVariant::Native => {
            let bytes = std::fs::metadata(file)?.len();
            (full_hash(reader, HASH_SEED)?, bytes)
        }
        HashVariant::X64 => digest::<Murmur3x64>(reader)?,
        HashVariant::X86 => digest::<Murmur3x86>(reader)?,
    };

    Ok(HashResult {
        path: file.display().to_string(),
        hash: hash.to_string(),
        bytes,
    })
}

fn digest<H: Murmur3>(reader: impl Read) -> io::Result<(PayloadHash, u64)> {
    let mut state = H::with_seed(HASH_SEED);
    let bytes = hash_reader(&mut state, reader)?;
    Ok((state.finish(), bytes))
}

/// Runs the hash command.
pub fn run(
    file: &Path,
    variant: HashVariant,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    let result = fingerprint(file, variant)?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        OutputFormat::Text => writeln!(out, "{}  {}", result.hash, result.path)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::output;
    use mediaconv_hash::hash_bytes;

    const FOX: &[u8] = b"The quick brown fox jumps over the lazy dog";

    fn media_file() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mkv");
        std::fs::write(&path, FOX).unwrap();
        (dir, path)
    }

    #[test]
    fn native_matches_cache_fingerprint() {
        let (_dir, path) = media_file();
        let result = fingerprint(&path, HashVariant::Native).unwrap();
        assert_eq!(result.hash, hash_bytes(FOX, HASH_SEED).to_string());
        assert_eq!(result.bytes, FOX.len() as u64);
    }

    #[test]
    fn explicit_variants() {
        let (_dir, path) = media_file();
        for variant in [HashVariant::X64, HashVariant::X86] {
            let result = fingerprint(&path, variant).unwrap();
            let expected = match variant {
                HashVariant::X64 => digest::<Murmur3x64>(FOX).unwrap().0,
                _ => digest::<Murmur3x86>(FOX).unwrap().0,
            };
            assert_eq!(result.hash, expected.to_string());
            assert_eq!(result.bytes, FOX.len() as u64);
        }
        assert_ne!(
            fingerprint(&path, HashVariant::X64).unwrap().hash,
            fingerprint(&path, HashVariant::X86).unwrap().hash
        );
    }

    #[test]
    fn text_output_names_file() {
        let (_dir, path) = media_file();
        let mut buf = Vec::new();
        run(&path, HashVariant::Native, OutputFormat::Text, &mut buf).unwrap();
        let text = output(buf);
        assert!(text.starts_with(&hash_bytes(FOX, HASH_SEED).to_string()));
        assert!(text.trim_end().ends_with("clip.mkv"));
    }

    #[test]
    fn json_output() {
        let (_dir, path) = media_file();
        let mut buf = Vec::new();
        run(&path, HashVariant::X64, OutputFormat::Json, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output(buf)).unwrap();
        assert_eq!(value["bytes"], FOX.len() as u64);
        assert_eq!(value["hash"].as_str().unwrap().len(), PayloadHash::HEX_LEN);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(fingerprint(&dir.path().join("nope"), HashVariant::Native).is_err());
    }
}
