//! Media kinds and their tag layouts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag constants for each media kind.
pub mod tags {
    /// Audio database tags.
    pub mod audio {
        /// Ordered chunk-hash list of one stream, keyed by stream hash.
        pub const STREAM: u32 = 0;
        /// Codec parameters, keyed by chunk hash.
        pub const CODECINFO: u32 = 1;
        /// Raw source chunk, keyed by chunk hash.
        pub const AUDIODATA: u32 = 2;
        /// Transcoded packet stream.
        pub const PTNADATA: u32 = 3;
        /// Number of tags.
        pub const NUM_TAGS: u32 = 4;
    }

    /// Video database tags.
    pub mod video {
        /// Raw source chunk, keyed by chunk hash.
        pub const VIDEODATA: u32 = 0;
        /// Transcoded Ogg/Theora output.
        pub const OGVDATA: u32 = 1;
        /// Ordered chunk-hash list of one stream, keyed by stream hash.
        pub const STREAM: u32 = 2;
        /// Transcoded Matroska output.
        pub const MKVDATA: u32 = 3;
        /// Number of tags.
        pub const NUM_TAGS: u32 = 4;
    }
}

/// Which element family a cache serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio streams, cached as framed packet streams.
    Audio,
    /// Video streams, cached as single blobs.
    Video,
}

/// Tag layout of one media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSet {
    /// Tag of STREAM entries.
    pub stream: u32,
    /// Tag of raw chunk entries.
    pub chunk: u32,
    /// Tag of codec-info entries, if the kind records them.
    pub codec_info: Option<u32>,
    /// Transcoded output tags, in lookup order.
    pub outputs: &'static [u32],
    /// Number of tags in databases of this kind.
    pub num_tags: u32,
}

const AUDIO_TAGS: TagSet = TagSet {
    stream: tags::audio::STREAM,
    chunk: tags::audio::AUDIODATA,
    codec_info: Some(tags::audio::CODECINFO),
    outputs: &[tags::audio::PTNADATA],
    num_tags: tags::audio::NUM_TAGS,
};

const VIDEO_TAGS: TagSet = TagSet {
    stream: tags::video::STREAM,
    chunk: tags::video::VIDEODATA,
    codec_info: None,
    outputs: &[tags::video::MKVDATA, tags::video::OGVDATA],
    num_tags: tags::video::NUM_TAGS,
};

impl MediaKind {
    /// Returns the tag layout.
    #[must_use]
    pub const fn tags(self) -> TagSet {
        match self {
            Self::Audio => AUDIO_TAGS,
            Self::Video => VIDEO_TAGS,
        }
    }

    /// Name of the marker file created when a placeholder is served.
    #[must_use]
    pub const fn marker_name(self) -> &'static str {
        match self {
            Self::Audio => "placeholder-audio-used",
            Self::Video => "placeholder-video-used",
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(format!("unknown media kind {other:?}")),
        }
    }
}
