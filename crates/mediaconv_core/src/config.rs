//! Cache configuration.
//!
//! The cache is configured at the process boundary, normally from
//! environment variables (see [`env_vars`]). The same settings can be built
//! in code or deserialized from a file.

use crate::error::{CacheError, CacheResult};
use crate::media::MediaKind;
use crate::stream::ChunkPolicy;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable names.
pub mod env_vars {
    /// Dump database for audio streams.
    pub const AUDIO_DUMP_FILE: &str = "MEDIACONV_AUDIO_DUMP_FILE";
    /// Dump database for video streams.
    pub const VIDEO_DUMP_FILE: &str = "MEDIACONV_VIDEO_DUMP_FILE";
    /// Transcoded database for audio streams.
    pub const AUDIO_TRANSCODED_FILE: &str = "MEDIACONV_AUDIO_TRANSCODED_FILE";
    /// Transcoded database for video streams.
    pub const VIDEO_TRANSCODED_FILE: &str = "MEDIACONV_VIDEO_TRANSCODED_FILE";
    /// Blank audio served on a miss.
    pub const BLANK_AUDIO_FILE: &str = "MEDIACONV_BLANK_AUDIO_FILE";
    /// Blank video served on a miss.
    pub const BLANK_VIDEO_FILE: &str = "MEDIACONV_BLANK_VIDEO_FILE";
    /// Directory for placeholder marker files.
    pub const MARKER_DIR: &str = "MEDIACONV_MARKER_DIR";
    /// Disables dumping of unknown streams.
    pub const DISABLE_DUMP: &str = "MEDIACONV_DISABLE_DUMP";
    /// Disables garbage collection of transcoded streams.
    pub const DISABLE_DISCARD: &str = "MEDIACONV_DISABLE_DISCARD";
}

/// Configuration of one [`MediaCache`](crate::MediaCache).
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Media kind served by the cache.
    pub kind: MediaKind,
    /// Dump database path. Required unless dumping is disabled.
    #[serde(default)]
    pub dump_path: Option<PathBuf>,
    /// Read-only transcoded database path.
    #[serde(default)]
    pub transcoded_path: Option<PathBuf>,
    /// Blank media served when no transcode exists.
    pub blank_path: PathBuf,
    /// Directory receiving zero-byte marker files.
    #[serde(default)]
    pub marker_dir: Option<PathBuf>,
    /// Never record unknown streams.
    #[serde(default)]
    pub dump_disabled: bool,
    /// Never purge transcoded streams from the dump database.
    #[serde(default)]
    pub discard_disabled: bool,
    /// Overrides the kind's default chunking.
    #[serde(default)]
    pub chunk_policy: Option<ChunkPolicy>,
}

impl MediaConfig {
    /// Creates a configuration with only the blank media set.
    pub fn new(kind: MediaKind, blank_path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            dump_path: None,
            transcoded_path: None,
            blank_path: blank_path.into(),
            marker_dir: None,
            dump_disabled: false,
            discard_disabled: false,
            chunk_policy: None,
        }
    }

    /// Sets the dump database path.
    #[must_use]
    pub fn dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_path = Some(path.into());
        self
    }

    /// Sets the transcoded database path.
    #[must_use]
    pub fn transcoded_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcoded_path = Some(path.into());
        self
    }

    /// Sets the marker directory.
    #[must_use]
    pub fn marker_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.marker_dir = Some(path.into());
        self
    }

    /// Sets whether dumping is disabled.
    #[must_use]
    pub const fn dump_disabled(mut self, value: bool) -> Self {
        self.dump_disabled = value;
        self
    }

    /// Sets whether garbage collection is disabled.
    #[must_use]
    pub const fn discard_disabled(mut self, value: bool) -> Self {
        self.discard_disabled = value;
        self
    }

    /// Overrides the chunking policy.
    #[must_use]
    pub const fn chunk_policy(mut self, policy: ChunkPolicy) -> Self {
        self.chunk_policy = Some(policy);
        self
    }

    /// Chunking to use: the override if set, the kind's default otherwise.
    #[must_use]
    pub fn effective_chunk_policy(&self) -> ChunkPolicy {
        self.chunk_policy
            .unwrap_or_else(|| ChunkPolicy::default_for(self.kind))
    }

    /// Reads the configuration from the process environment.
    pub fn from_env(kind: MediaKind) -> CacheResult<Self> {
        Self::from_lookup(kind, |name| std::env::var_os(name).map(PathBuf::from))
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// [`CacheError::EnvNotSet`] if the blank media variable is missing, or the
    /// dump database variable is missing while dumping is enabled.
    pub fn from_lookup<F>(kind: MediaKind, lookup: F) -> CacheResult<Self>
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let (dump_var, transcoded_var, blank_var) = match kind {
            MediaKind::Audio => (
                env_vars::AUDIO_DUMP_FILE,
                env_vars::AUDIO_TRANSCODED_FILE,
                env_vars::BLANK_AUDIO_FILE,
            ),
            MediaKind::Video => (
                env_vars::VIDEO_DUMP_FILE,
                env_vars::VIDEO_TRANSCODED_FILE,
                env_vars::BLANK_VIDEO_FILE,
            ),
        };

        let flag = |name: &str| {
            lookup(name).is_some_and(|v| {
                matches!(
                    v.to_string_lossy().trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
        };
        let dump_disabled = flag(env_vars::DISABLE_DUMP);
        let discard_disabled = flag(env_vars::DISABLE_DISCARD);

        let blank_path = lookup(blank_var).ok_or(CacheError::EnvNotSet(blank_var))?;
        let dump_path = lookup(dump_var);
        if dump_path.is_none() && !dump_disabled {
            return Err(CacheError::EnvNotSet(dump_var));
        }

        Ok(Self {
            kind,
            dump_path,
            transcoded_path: lookup(transcoded_var),
            blank_path,
            marker_dir: lookup(env_vars::MARKER_DIR),
            dump_disabled,
            discard_disabled,
            chunk_policy: None,
        })
    }
}
