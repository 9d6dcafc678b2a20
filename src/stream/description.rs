//! Media description announced by a source

use std::fmt;

/// Kind of a media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Application,
}

/// A single media of a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub kind: MediaKind,
    /// Codec name (e.g., "H264", "MPEG-4 Audio")
    pub codec: String,
}

impl Media {
    /// Create a video media
    pub fn video(codec: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Video,
            codec: codec.into(),
        }
    }

    /// Create an audio media
    pub fn audio(codec: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Audio,
            codec: codec.into(),
        }
    }
}

/// Session description of a stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaDescription {
    pub medias: Vec<Media>,
}

impl MediaDescription {
    pub fn new(medias: Vec<Media>) -> Self {
        Self { medias }
    }

    /// Codec names in media order
    pub fn codecs(&self) -> Vec<String> {
        self.medias.iter().map(|m| m.codec.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.medias.is_empty()
    }
}

impl fmt::Display for MediaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.medias.len();
        write!(
            f,
            "{} {} ({})",
            n,
            if n == 1 { "track" } else { "tracks" },
            self.codecs().join(", ")
        )
    }
}
