use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a recording was sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    Soundboard,
    Audience,
    Matrix,
    Fm,
    Remaster,
    Unknown,
}

impl SourceType {
    /// Classify a free-text source label from the archive.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "SBD" | "SOUNDBOARD" => Self::Soundboard,
            "AUD" | "AUDIENCE" => Self::Audience,
            "MATRIX" | "MTX" => Self::Matrix,
            "FM" | "BROADCAST" => Self::Fm,
            "REMASTER" | "REMASTERED" => Self::Remaster,
            _ => Self::Unknown,
        }
    }

    /// The short label stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Soundboard => "SBD",
            Self::Audience => "AUD",
            Self::Matrix => "MATRIX",
            Self::Fm => "FM",
            Self::Remaster => "REMASTER",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file rendition of a track.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackFile {
    pub format: String,
    pub filename: String,
}

/// A track within a recording.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Track {
    /// Track position label (e.g. "01", "d1t03").
    pub track: String,
    pub title: String,
    /// Duration in seconds.
    pub duration: f64,
    pub files: Vec<TrackFile>,
}

/// A recording attributed to one show.
///
/// The same archive recording produces one row per show that lists it, so
/// `(identifier, show_id)` is the key, not `identifier` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingRecord {
    pub identifier: String,
    pub show_id: String,
    pub source_type: SourceType,
    pub rating: f64,
    pub review_count: u32,
    pub raw_rating: f64,
    pub taper: Option<String>,
    pub source: Option<String>,
    pub lineage: Option<String>,
    pub transferer: Option<String>,
    pub tracks: Vec<Track>,
    pub collected_at: DateTime<Utc>,
}

impl RecordingRecord {
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        show_id: impl Into<String>,
        collected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            show_id: show_id.into(),
            source_type: SourceType::Unknown,
            rating: 0.0,
            review_count: 0,
            raw_rating: 0.0,
            taper: None,
            source: None,
            lineage: None,
            transferer: None,
            tracks: Vec::new(),
            collected_at,
        }
    }

    #[must_use]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Sum of all track durations, in seconds.
    #[must_use]
    pub fn total_duration(&self) -> f64 {
        self.tracks.iter().map(|t| t.duration).sum()
    }
}
