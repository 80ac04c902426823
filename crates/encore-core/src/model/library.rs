use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A show the user has saved. Owned by the user, never by the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub show_id: String,
    pub added_at: DateTime<Utc>,
    pub is_pinned: bool,
    pub notes: Option<String>,

    /// Recording the user prefers over the show's best recording.
    pub preferred_recording_id: Option<String>,

    /// Recording downloaded for offline playback, if any.
    pub downloaded_recording_id: Option<String>,
    pub downloaded_format: Option<String>,
}

impl LibraryEntry {
    #[must_use]
    pub fn new(show_id: impl Into<String>, added_at: DateTime<Utc>) -> Self {
        Self {
            show_id: show_id.into(),
            added_at,
            is_pinned: false,
            notes: None,
            preferred_recording_id: None,
            downloaded_recording_id: None,
            downloaded_format: None,
        }
    }

    #[must_use]
    pub fn pinned(mut self) -> Self {
        self.is_pinned = true;
        self
    }

    #[must_use]
    pub fn with_preferred_recording(mut self, recording_id: impl Into<String>) -> Self {
        self.preferred_recording_id = Some(recording_id.into());
        self
    }
}

/// A playback history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentPlay {
    pub show_id: String,
    pub recording_id: Option<String>,
    pub played_at: DateTime<Utc>,
}
