use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A performer listed in a show's lineup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineupMember {
    pub name: String,
    #[serde(default)]
    pub instruments: Vec<String>,
}

/// A normalized concert, keyed by `show_id`.
///
/// `show_id` is the join key for recordings, library entries, and recent
/// plays; deleting a show removes all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowRecord {
    pub show_id: String,
    pub band: String,
    pub venue: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,

    /// Location exactly as it appears in the archive.
    pub location_raw: Option<String>,

    /// Canonical `YYYY-MM-DD` date.
    pub date: String,

    /// Year parsed from `date`, or 0 when the date is unusable.
    pub year: i32,

    /// Month parsed from `date`, or 0 when the date is unusable.
    pub month: u32,

    /// `YYYY-MM`, or the raw date when it could not be split.
    pub year_month: String,

    /// Setlist payload as published; its shape varies between shows.
    pub setlist: Option<serde_json::Value>,

    /// Song names flattened out of `setlist`.
    pub songs: Vec<String>,

    pub lineup: Vec<LineupMember>,

    /// Member names flattened out of `lineup`.
    pub members: Vec<String>,

    pub recording_ids: Vec<String>,
    pub best_recording_id: Option<String>,
    pub recording_count: u32,
    pub avg_rating: f64,
    pub review_count: u32,

    /// Recording count per source label (e.g. `SBD`, `AUD`).
    pub source_types: BTreeMap<String, u32>,

    pub cover_image_url: Option<String>,

    // --- User state, carried across re-imports ---
    pub is_in_library: bool,
    pub library_added_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShowRecord {
    /// Create a show with every derived and optional field empty.
    #[must_use]
    pub fn new(show_id: impl Into<String>, date: impl Into<String>, now: DateTime<Utc>) -> Self {
        let date = date.into();
        Self {
            show_id: show_id.into(),
            band: String::new(),
            venue: String::new(),
            city: None,
            state: None,
            country: None,
            location_raw: None,
            year_month: date.clone(),
            date,
            year: 0,
            month: 0,
            setlist: None,
            songs: Vec::new(),
            lineup: Vec::new(),
            members: Vec::new(),
            recording_ids: Vec::new(),
            best_recording_id: None,
            recording_count: 0,
            avg_rating: 0.0,
            review_count: 0,
            source_types: BTreeMap::new(),
            cover_image_url: None,
            is_in_library: false,
            library_added_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = venue.into();
        self
    }

    #[must_use]
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    #[must_use]
    pub fn with_recordings(mut self, recording_ids: Vec<String>) -> Self {
        self.recording_count = u32::try_from(recording_ids.len()).unwrap_or(u32::MAX);
        self.recording_ids = recording_ids;
        self
    }
}

/// The full-text search surrogate for one show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub show_id: String,
    pub search_text: String,
}

impl SearchRecord {
    #[must_use]
    pub fn new(show_id: impl Into<String>, search_text: impl Into<String>) -> Self {
        Self {
            show_id: show_id.into(),
            search_text: search_text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_new_defaults() {
        let show = ShowRecord::new("gd1977-05-08", "1977-05-08", Utc::now());
        assert_eq!(show.show_id, "gd1977-05-08");
        assert_eq!(show.year_month, "1977-05-08");
        assert!(show.songs.is_empty());
        assert!(!show.is_in_library);
    }

    #[test]
    fn test_show_builder() {
        let show = ShowRecord::new("a", "1977-05-08", Utc::now())
            .with_venue("Barton Hall")
            .with_year(1977)
            .with_recordings(vec!["r1".to_string(), "r2".to_string()]);

        assert_eq!(show.venue, "Barton Hall");
        assert_eq!(show.year, 1977);
        assert_eq!(show.recording_count, 2);
    }
}
