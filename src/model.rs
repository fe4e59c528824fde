use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Fields decoded from one tag block. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTag {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub comment: Option<String>,
    pub artwork: Option<Vec<u8>>,
}

impl ParsedTag {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.album_artist.is_none()
            && self.genre.is_none()
            && self.year.is_none()
            && self.comment.is_none()
            && self.artwork.is_none()
    }

    /// Trimmed text fields in a fixed order, skipping absent and blank values.
    pub fn text_fields(&self) -> impl Iterator<Item = (Field, &str)> {
        [
            (Field::Title, self.title.as_deref()),
            (Field::Artist, self.artist.as_deref()),
            (Field::Album, self.album.as_deref()),
            (Field::AlbumArtist, self.album_artist.as_deref()),
            (Field::Genre, self.genre.as_deref()),
            (Field::Year, self.year.as_deref()),
            (Field::Comment, self.comment.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            let value = value?.trim();
            (!value.is_empty()).then_some((field, value))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Genre,
    Year,
    Comment,
}

/// Which provider produced a [`SourceRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Container-level metadata read by the native extractor.
    Native,
    /// A dedicated tag-reading library.
    TagLibrary,
    /// The built-in ID3v2 frame decoder.
    FrameDecoder,
}

impl SourceKind {
    /// Lower rank wins during reconciliation.
    pub fn rank(self) -> u8 {
        match self {
            Self::Native => 0,
            Self::TagLibrary => 1,
            Self::FrameDecoder => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::TagLibrary => "tag-library",
            Self::FrameDecoder => "frame-decoder",
        }
    }
}

/// One provider's view of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub kind: SourceKind,
    pub tag: ParsedTag,
    pub duration_secs: Option<f64>,
}

impl SourceRecord {
    pub fn new(kind: SourceKind, tag: ParsedTag) -> Self {
        Self {
            kind,
            tag,
            duration_secs: None,
        }
    }

    pub fn with_duration(mut self, duration_secs: Option<f64>) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    pub fn rank(&self) -> u8 {
        self.kind.rank()
    }
}

/// Content-derived track identifier. Survives rescans, renames and moves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(String);

impl StableId {
    pub(crate) fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The merged record handed back to the library manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub comment: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork: Option<Vec<u8>>,
    pub stable_id: StableId,
}

/// A file the scanner processed successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedTrack {
    pub path: PathBuf,
    /// Reconciled title, or the file stem when the tags carry none.
    pub display_title: String,
    pub metadata: ReconciledMetadata,
    pub file_size: u64,
    #[serde(default)]
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}
