//! Recording attribution.
//!
//! Recording files are keyed by recording identifier while shows list the
//! recordings they own, so the two file sets are joined through a
//! [`RecordingIndex`] built once from the parsed shows.

use chrono::{DateTime, Utc};
use encore_core::model::{RecordingRecord, SourceType, Track, TrackFile};
use std::collections::HashMap;

use crate::document::{RecordingDocument, ShowDocument};

/// Reverse index from recording identifier to the shows that list it.
#[derive(Debug, Default)]
pub struct RecordingIndex {
    owners: HashMap<String, Vec<String>>,
}

impl RecordingIndex {
    /// Build the index in one pass over every show's `recordings` list.
    ///
    /// A recording listed by several shows maps to all of them, in the
    /// order the shows are given. A show listing the same recording twice
    /// is recorded once.
    pub fn from_shows<'a>(shows: impl IntoIterator<Item = &'a ShowDocument>) -> Self {
        let mut owners: HashMap<String, Vec<String>> = HashMap::new();
        for show in shows {
            for recording_id in &show.recordings {
                let show_ids = owners.entry(recording_id.clone()).or_default();
                if !show_ids.contains(&show.show_id) {
                    show_ids.push(show.show_id.clone());
                }
            }
        }
        Self { owners }
    }

    /// Shows owning `recording_id`, if any.
    #[must_use]
    pub fn owners(&self, recording_id: &str) -> Option<&[String]> {
        self.owners
            .get(recording_id)
            .map(Vec::as_slice)
            .filter(|ids| !ids.is_empty())
    }

    #[must_use]
    pub fn contains(&self, recording_id: &str) -> bool {
        self.owners(recording_id).is_some()
    }

    /// Number of distinct recordings referenced by at least one show.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Expand one recording document into one record per owning show.
#[must_use]
pub fn build_recording_records(
    identifier: &str,
    doc: &RecordingDocument,
    show_ids: &[String],
    now: DateTime<Utc>,
) -> Vec<RecordingRecord> {
    let source_type = doc
        .source_type
        .as_deref()
        .map(SourceType::from_label)
        .unwrap_or(SourceType::Unknown);
    let tracks: Vec<Track> = doc
        .tracks
        .iter()
        .map(|entry| Track {
            track: entry.track.clone(),
            title: entry.title.clone(),
            duration: entry.duration.max(0.0),
            files: entry
                .files
                .iter()
                .filter(|f| !f.filename.is_empty())
                .map(|f| TrackFile {
                    format: f.format.clone(),
                    filename: f.filename.clone(),
                })
                .collect(),
        })
        .collect();

    show_ids
        .iter()
        .map(|show_id| {
            let mut record = RecordingRecord::new(identifier, show_id.as_str(), now);
            record.source_type = source_type;
            record.rating = doc.rating;
            record.review_count = doc.review_count;
            record.raw_rating = doc.raw_rating;
            record.taper = doc.taper.clone();
            record.source = doc.source.clone();
            record.lineage = doc.lineage.clone();
            record.transferer = doc.transferer.clone();
            record.tracks = tracks.clone();
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn show(id: &str, recordings: &[&str]) -> ShowDocument {
        serde_json::from_value(json!({
            "show_id": id,
            "date": "1977-05-08",
            "recordings": recordings,
        }))
        .unwrap()
    }

    #[test]
    fn test_index_maps_recordings_to_shows() {
        let shows = vec![
            show("a", &["r1", "r2"]),
            show("b", &["r2", "r3"]),
            show("c", &[]),
        ];
        let index = RecordingIndex::from_shows(&shows);

        assert_eq!(index.len(), 3);
        assert_eq!(index.owners("r1").unwrap(), ["a"]);
        assert_eq!(index.owners("r2").unwrap(), ["a", "b"]);
        assert_eq!(index.owners("r3").unwrap(), ["b"]);
        assert!(index.owners("r4").is_none());
        assert!(!index.contains("r4"));
    }

    #[test]
    fn test_index_ignores_duplicate_listing() {
        let shows = vec![show("a", &["r1", "r1"])];
        let index = RecordingIndex::from_shows(&shows);
        assert_eq!(index.owners("r1").unwrap(), ["a"]);
    }

    #[test]
    fn test_build_recording_fans_out() {
        let doc: RecordingDocument = serde_json::from_value(json!({
            "source_type": "SBD",
            "rating": 4.5,
            "review_count": 12,
            "taper": "Betty Cantor-Jackson",
            "tracks": [
                {"track": "01", "title": "Bertha", "duration": 372.5,
                 "files": [{"format": "VBR MP3", "filename": "gd01.mp3"}, {"format": "Flac", "filename": ""}]},
                {"track": "02", "title": "Sugaree", "duration": "n/a"}
            ]
        }))
        .unwrap();
        let owners = vec!["a".to_string(), "b".to_string()];

        let records = build_recording_records("r1", &doc, &owners, Utc::now());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].show_id, "a");
        assert_eq!(records[1].show_id, "b");
        assert!(records.iter().all(|r| r.identifier == "r1"));
        assert_eq!(records[0].source_type, SourceType::Soundboard);
        assert_eq!(records[0].taper.as_deref(), Some("Betty Cantor-Jackson"));
        assert_eq!(records[0].tracks.len(), 2);
        assert_eq!(records[0].tracks[0].files.len(), 1);
        assert!(records[0].tracks[1].duration.abs() < f64::EPSILON);
    }

    #[test]
    fn test_build_recording_without_owners() {
        let records =
            build_recording_records("r1", &RecordingDocument::default(), &[], Utc::now());
        assert!(records.is_empty());
    }
}
