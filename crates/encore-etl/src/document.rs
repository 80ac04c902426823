//! Raw archive documents, as published.
//!
//! The archive schema is loosely typed. Every optional field is read
//! leniently: missing, `null`, or wrongly shaped values fall back to their
//! default instead of rejecting the whole document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ImportError, ImportResult};

/// Deserialize a field, substituting `T::default()` for any value that does
/// not fit `T`.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Read and parse one JSON document from disk.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> ImportResult<T> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|source| ImportError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// The polymorphic `setlist` field.
///
/// Shows carry a plain string, a list of sets, or a keyed object depending
/// on how the archive was curated. Any other JSON value lands in `Other`.
/// The payload is kept as-is; only [`Setlist::song_names`] interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setlist {
    Text(String),
    Sets(Vec<serde_json::Value>),
    Keyed(serde_json::Map<String, serde_json::Value>),
    Other(serde_json::Value),
}

impl Setlist {
    /// Song names from a `[{songs: [{name}]}]` payload, in order.
    ///
    /// Any other shape yields no songs. Entries without a string `name` are
    /// skipped.
    #[must_use]
    pub fn song_names(&self) -> Vec<String> {
        let Self::Sets(sets) = self else {
            return Vec::new();
        };

        sets.iter()
            .filter_map(|set| set.get("songs")?.as_array())
            .flatten()
            .filter_map(|song| song.get("name")?.as_str())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect()
    }

    /// The payload as an opaque JSON value.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Text(text) => serde_json::Value::String(text.clone()),
            Self::Sets(sets) => serde_json::Value::Array(sets.clone()),
            Self::Keyed(map) => serde_json::Value::Object(map.clone()),
            Self::Other(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineupEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub instruments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketImage {
    #[serde(default, deserialize_with = "lenient")]
    pub url: String,
    /// `front`, `back`, or `unknown`.
    #[serde(default, deserialize_with = "lenient")]
    pub side: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    #[serde(default, deserialize_with = "lenient")]
    pub url: String,
}

/// One `shows/<show_id>.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowDocument {
    pub show_id: String,
    pub date: String,

    #[serde(default, deserialize_with = "lenient")]
    pub band: String,
    #[serde(default, deserialize_with = "lenient")]
    pub venue: String,
    #[serde(default, deserialize_with = "lenient")]
    pub location_raw: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub country: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub setlist: Option<Setlist>,
    #[serde(default, deserialize_with = "lenient")]
    pub lineup: Vec<LineupEntry>,

    #[serde(default, deserialize_with = "lenient")]
    pub recordings: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub best_recording: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub recording_count: Option<u32>,

    #[serde(default, deserialize_with = "lenient")]
    pub avg_rating: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub review_count: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub source_types: BTreeMap<String, u32>,

    #[serde(default, deserialize_with = "lenient")]
    pub ticket_images: Vec<TicketImage>,
    #[serde(default, deserialize_with = "lenient")]
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackFileEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub format: String,
    #[serde(default, deserialize_with = "lenient")]
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub track: String,
    #[serde(default, deserialize_with = "lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub duration: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub files: Vec<TrackFileEntry>,
}

/// One `recordings/<identifier>.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingDocument {
    #[serde(default, deserialize_with = "lenient")]
    pub identifier: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub source_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub rating: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub review_count: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub raw_rating: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub taper: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub lineage: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub transferer: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub tracks: Vec<TrackEntry>,
}

/// An inclusive `YYYY-MM-DD` date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Declarative membership rules for a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowSelector {
    #[serde(default, deserialize_with = "lenient")]
    pub show_ids: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub dates: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ranges: Vec<DateRange>,
    #[serde(default, deserialize_with = "lenient")]
    pub range: Option<DateRange>,
    #[serde(default, deserialize_with = "lenient")]
    pub exclusion_ranges: Vec<DateRange>,
    #[serde(default, deserialize_with = "lenient")]
    pub exclusion_dates: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub venues: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub years: Vec<i32>,
}

/// One entry of `collections.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDocument {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub show_selector: Option<ShowSelector>,
}

/// `collections.json`. Entries stay raw so one bad entry cannot sink the rest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionsFile {
    #[serde(default, deserialize_with = "lenient")]
    pub collections: Vec<serde_json::Value>,
}

/// `manifest.json`, if the archive has one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "lenient")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub git_commit: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub build_timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_show_document_minimal() {
        let doc: ShowDocument =
            serde_json::from_value(json!({"show_id": "a", "date": "1977-05-08"})).unwrap();
        assert_eq!(doc.show_id, "a");
        assert!(doc.recordings.is_empty());
        assert!(doc.setlist.is_none());
        assert_eq!(doc.review_count, 0);
    }

    #[test]
    fn test_show_document_requires_id_and_date() {
        assert!(serde_json::from_value::<ShowDocument>(json!({"date": "1977-05-08"})).is_err());
        assert!(serde_json::from_value::<ShowDocument>(json!({"show_id": "a"})).is_err());
    }

    #[test]
    fn test_show_document_malformed_optionals_default() {
        let doc: ShowDocument = serde_json::from_value(json!({
            "show_id": "a",
            "date": "1977-05-08",
            "venue": null,
            "lineup": "Jerry, Bob",
            "recordings": {"not": "a list"},
            "avg_rating": "high",
            "review_count": -3,
            "source_types": [1, 2],
            "ticket_images": 7,
            "setlist": 42
        }))
        .unwrap();

        assert_eq!(doc.venue, "");
        assert!(doc.lineup.is_empty());
        assert!(doc.recordings.is_empty());
        assert!(doc.avg_rating.abs() < f64::EPSILON);
        assert_eq!(doc.review_count, 0);
        assert!(doc.source_types.is_empty());
        assert!(doc.ticket_images.is_empty());
        assert_eq!(doc.setlist, Some(Setlist::Other(json!(42))));
    }

    #[test]
    fn test_setlist_shapes() {
        let sets: Setlist = serde_json::from_value(json!([
            {"set": "Set 1", "songs": [{"name": "Bertha"}, {"name": " Good Lovin' "}]},
            {"set": "Encore", "songs": [{"name": "One More Saturday Night"}, {"title": "x"}]}
        ]))
        .unwrap();
        assert_eq!(
            sets.song_names(),
            vec!["Bertha", "Good Lovin'", "One More Saturday Night"]
        );

        let text: Setlist = serde_json::from_value(json!("Bertha > Good Lovin'")).unwrap();
        assert!(matches!(text, Setlist::Text(_)));
        assert!(text.song_names().is_empty());

        let keyed: Setlist =
            serde_json::from_value(json!({"set1": [{"name": "Bertha"}]})).unwrap();
        assert!(matches!(keyed, Setlist::Keyed(_)));
        assert!(keyed.song_names().is_empty());

        let odd: Setlist = serde_json::from_value(json!([["Bertha"], "Sugaree"])).unwrap();
        assert!(odd.song_names().is_empty());
    }

    #[test]
    fn test_setlist_to_value_preserves_payload() {
        let payload = json!({"set1": ["Bertha"]});
        let setlist: Setlist = serde_json::from_value(payload.clone()).unwrap();
        assert_eq!(setlist.to_value(), payload);
    }

    #[test]
    fn test_scalar_setlist_is_kept() {
        for payload in [json!(1977), json!(true), json!(4.5)] {
            let doc: ShowDocument = serde_json::from_value(json!({
                "show_id": "a",
                "date": "1977-05-08",
                "setlist": payload.clone()
            }))
            .unwrap();
            let setlist = doc.setlist.unwrap();
            assert!(matches!(setlist, Setlist::Other(_)));
            assert!(setlist.song_names().is_empty());
            assert_eq!(setlist.to_value(), payload);
        }

        let doc: ShowDocument =
            serde_json::from_value(json!({"show_id": "a", "date": "1977-05-08", "setlist": null}))
                .unwrap();
        assert!(doc.setlist.is_none());
    }

    #[test]
    fn test_selector_partial() {
        let doc: CollectionDocument = serde_json::from_value(json!({
            "id": "cornell",
            "name": "Cornell",
            "show_selector": {"dates": ["1977-05-08"], "years": "oops"}
        }))
        .unwrap();
        let selector = doc.show_selector.unwrap();
        assert_eq!(selector.dates, vec!["1977-05-08"]);
        assert!(selector.years.is_empty());
        assert!(selector.range.is_none());
    }

    #[test]
    fn test_read_document_reports_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_document::<ShowDocument>(&path).unwrap_err();
        assert!(matches!(err, ImportError::Parse { .. }));
        assert!(err.to_string().contains("bad.json"));
    }
}
