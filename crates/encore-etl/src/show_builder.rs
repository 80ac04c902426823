//! Show normalization and search-text synthesis.
//!
//! [`build_show`] turns one raw [`ShowDocument`] into a [`ShowRecord`] and
//! its [`SearchRecord`]. It never fails: anything unusable degrades to an
//! empty or zero value.

use chrono::{DateTime, Utc};
use encore_core::model::{LineupMember, SearchRecord, ShowRecord};

use crate::document::{Photo, ShowDocument, TicketImage};

/// Average rating at or above which a show is tagged `top-rated`.
pub const TOP_RATED_MIN_RATING: f64 = 4.0;

/// Review count a show needs before `top-rated` applies.
pub const TOP_RATED_MIN_REVIEWS: u32 = 10;

/// Review count at which a show is tagged `popular`.
pub const POPULAR_MIN_REVIEWS: u32 = 50;

const DATE_DELIMITERS: [char; 3] = ['-', '/', '.'];

/// Year, month, and `yearMonth` derived from a show date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParts {
    pub year: i32,
    pub month: u32,
    pub year_month: String,
}

/// Split a `YYYY-MM-DD` date.
///
/// With fewer than two components the result is `year = 0`, `month = 0`,
/// and `year_month` set to the raw date.
#[must_use]
pub fn parse_date_parts(date: &str) -> DateParts {
    let parts: Vec<&str> = date.split('-').collect();
    if parts.len() < 2 {
        return DateParts {
            year: 0,
            month: 0,
            year_month: date.to_string(),
        };
    }

    DateParts {
        year: parts[0].parse().unwrap_or(0),
        month: parts[1].parse().unwrap_or(0),
        year_month: format!("{}-{}", parts[0], parts[1]),
    }
}

/// Pick the cover image: front ticket, then unknown-side ticket, then the
/// first photo.
#[must_use]
pub fn resolve_cover_image(tickets: &[TicketImage], photos: &[Photo]) -> Option<String> {
    let ticket_with_side = |side: &str| {
        tickets
            .iter()
            .find(|t| t.side.eq_ignore_ascii_case(side) && !t.url.is_empty())
            .map(|t| t.url.clone())
    };

    ticket_with_side("front")
        .or_else(|| ticket_with_side("unknown"))
        .or_else(|| {
            photos
                .iter()
                .find(|p| !p.url.is_empty())
                .map(|p| p.url.clone())
        })
}

/// Normalize one show document.
#[must_use]
pub fn build_show(doc: &ShowDocument, now: DateTime<Utc>) -> (ShowRecord, SearchRecord) {
    let date_parts = parse_date_parts(&doc.date);
    let songs = doc
        .setlist
        .as_ref()
        .map(|setlist| setlist.song_names())
        .unwrap_or_default();
    let lineup: Vec<LineupMember> = doc
        .lineup
        .iter()
        .filter(|entry| !entry.name.trim().is_empty())
        .map(|entry| LineupMember {
            name: entry.name.trim().to_string(),
            instruments: entry.instruments.clone(),
        })
        .collect();
    let members: Vec<String> = lineup.iter().map(|m| m.name.clone()).collect();

    let recording_count = doc
        .recording_count
        .unwrap_or_else(|| u32::try_from(doc.recordings.len()).unwrap_or(u32::MAX));

    let mut show = ShowRecord::new(doc.show_id.as_str(), doc.date.as_str(), now);
    show.band = doc.band.clone();
    show.venue = doc.venue.clone();
    show.city = doc.city.clone();
    show.state = doc.state.clone();
    show.country = doc.country.clone();
    show.location_raw = doc.location_raw.clone();
    show.year = date_parts.year;
    show.month = date_parts.month;
    show.year_month = date_parts.year_month;
    show.setlist = doc.setlist.as_ref().map(|s| s.to_value());
    show.songs = songs;
    show.lineup = lineup;
    show.members = members;
    show.recording_ids = doc.recordings.clone();
    show.best_recording_id = doc.best_recording.clone();
    show.recording_count = recording_count;
    show.avg_rating = doc.avg_rating;
    show.review_count = doc.review_count;
    show.source_types = doc.source_types.clone();
    show.cover_image_url = resolve_cover_image(&doc.ticket_images, &doc.photos);

    let search = SearchRecord::new(doc.show_id.as_str(), search_text(&show));
    (show, search)
}

/// Build the denormalized search blob for a show.
///
/// Dates are expanded into the spellings people type (`5-8-77`,
/// `05/08/1977`, `1977.5.8`, `5-77`, ...) so plain substring matching
/// finds them.
#[must_use]
pub fn search_text(show: &ShowRecord) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.extend(date_variants(&show.date));
    parts.push(show.venue.clone());
    if let Some(location) = &show.location_raw {
        parts.push(location.clone());
    }
    parts.push(show.members.join(" "));
    parts.push(show.songs.join(" "));

    let has_source = |key: &str| show.source_types.keys().any(|k| k.eq_ignore_ascii_case(key));
    if has_source("SBD") {
        parts.push("soundboard sbd".to_string());
    }
    if has_source("AUD") {
        parts.push("audience aud".to_string());
    }
    if has_source("MATRIX") {
        parts.push("matrix".to_string());
    }

    if show.avg_rating >= TOP_RATED_MIN_RATING && show.review_count >= TOP_RATED_MIN_REVIEWS {
        parts.push("top-rated".to_string());
    }
    if show.review_count >= POPULAR_MIN_REVIEWS {
        parts.push("popular".to_string());
    }

    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every searchable spelling of a `YYYY-MM-DD` date, canonical form first.
fn date_variants(date: &str) -> Vec<String> {
    let mut variants = vec![date.to_string()];

    let parts: Vec<&str> = date.split('-').collect();
    let [yyyy, mm, dd] = parts.as_slice() else {
        return variants;
    };
    if yyyy.len() != 4 || !yyyy.chars().all(|c| c.is_ascii_digit()) {
        return variants;
    }
    let (Ok(month), Ok(day)) = (mm.parse::<u32>(), dd.parse::<u32>()) else {
        return variants;
    };

    let yy = &yyyy[2..];
    let decade = &yyyy[..3];
    variants.push((*yyyy).to_string());
    variants.push(yy.to_string());
    variants.push(decade.to_string());

    for d in DATE_DELIMITERS {
        variants.push(format!("{month}{d}{day}{d}{yy}"));
        variants.push(format!("{mm}{d}{dd}{d}{yyyy}"));
        variants.push(format!("{yyyy}{d}{month}{d}{day}"));
        variants.push(format!("{month}{d}{yy}"));
        variants.push(format!("{yyyy}{d}{mm}"));
        variants.push(format!("{yyyy}{d}{month}"));
        variants.push(format!("{yy}{d}{month}"));
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LineupEntry;
    use serde_json::json;

    fn cornell() -> ShowDocument {
        serde_json::from_value(json!({
            "show_id": "gd1977-05-08",
            "band": "Grateful Dead",
            "venue": "Barton Hall",
            "location_raw": "Ithaca, NY",
            "city": "Ithaca",
            "state": "NY",
            "country": "USA",
            "date": "1977-05-08",
            "setlist": [
                {"set": "Set 1", "songs": [{"name": "New Minglewood Blues"}, {"name": "Loser"}]},
                {"set": "Set 2", "songs": [{"name": "Scarlet Begonias"}, {"name": "Fire on the Mountain"}]}
            ],
            "lineup": [
                {"name": "Jerry Garcia", "instruments": ["guitar", "vocals"]},
                {"name": "Bob Weir", "instruments": ["guitar"]}
            ],
            "recordings": ["gd77-05-08.sbd.hicks", "gd77-05-08.aud.vernon"],
            "best_recording": "gd77-05-08.sbd.hicks",
            "avg_rating": 4.8,
            "review_count": 120,
            "source_types": {"SBD": 1, "AUD": 1},
            "ticket_images": [
                {"url": "https://img/back.jpg", "side": "back"},
                {"url": "https://img/front.jpg", "side": "front"}
            ],
            "photos": [{"url": "https://img/photo.jpg"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_date_parts() {
        assert_eq!(
            parse_date_parts("1977-05-08"),
            DateParts {
                year: 1977,
                month: 5,
                year_month: "1977-05".to_string()
            }
        );
        assert_eq!(
            parse_date_parts("1977"),
            DateParts {
                year: 0,
                month: 0,
                year_month: "1977".to_string()
            }
        );
        let odd = parse_date_parts("19xx-05");
        assert_eq!(odd.year, 0);
        assert_eq!(odd.month, 5);
        assert_eq!(odd.year_month, "19xx-05");
    }

    #[test]
    fn test_cover_image_resolution_order() {
        let front = TicketImage {
            url: "front".to_string(),
            side: "front".to_string(),
        };
        let unknown = TicketImage {
            url: "unknown".to_string(),
            side: "unknown".to_string(),
        };
        let back = TicketImage {
            url: "back".to_string(),
            side: "back".to_string(),
        };
        let photo = Photo {
            url: "photo".to_string(),
        };

        assert_eq!(
            resolve_cover_image(&[unknown.clone(), front], &[photo.clone()]).as_deref(),
            Some("front")
        );
        assert_eq!(
            resolve_cover_image(&[back.clone(), unknown], &[photo.clone()]).as_deref(),
            Some("unknown")
        );
        assert_eq!(
            resolve_cover_image(&[back], &[photo]).as_deref(),
            Some("photo")
        );
        assert_eq!(resolve_cover_image(&[], &[]), None);
    }

    #[test]
    fn test_build_show_fields() {
        let (show, search) = build_show(&cornell(), Utc::now());

        assert_eq!(show.year, 1977);
        assert_eq!(show.month, 5);
        assert_eq!(show.year_month, "1977-05");
        assert_eq!(
            show.songs,
            vec![
                "New Minglewood Blues",
                "Loser",
                "Scarlet Begonias",
                "Fire on the Mountain"
            ]
        );
        assert_eq!(show.members, vec!["Jerry Garcia", "Bob Weir"]);
        assert_eq!(show.recording_count, 2);
        assert_eq!(show.cover_image_url.as_deref(), Some("https://img/front.jpg"));
        assert!(show.setlist.is_some());
        assert!(!show.is_in_library);
        assert_eq!(search.show_id, "gd1977-05-08");
    }

    #[test]
    fn test_search_text_contains_date_spellings() {
        let (_, search) = build_show(&cornell(), Utc::now());
        let text = search.search_text;

        for expected in [
            "1977-05-08",
            "1977",
            "77",
            "5-8-77",
            "05-08-1977",
            "Barton Hall",
            "5/8/77",
            "05.08.1977",
            "1977/5/8",
            "5-77",
            "1977-05",
            "1977.5",
            "77/5",
            "197",
            "Ithaca, NY",
            "Jerry Garcia Bob Weir",
            "Scarlet Begonias",
            "soundboard sbd",
            "audience aud",
            "top-rated",
            "popular",
        ] {
            assert!(text.contains(expected), "missing {expected:?} in {text:?}");
        }
        assert!(!text.contains("matrix"));
        assert!(!text.contains("  "));
    }

    #[test]
    fn test_search_text_rating_thresholds() {
        let mut doc = cornell();
        doc.avg_rating = 4.0;
        doc.review_count = 10;
        let (_, search) = build_show(&doc, Utc::now());
        assert!(search.search_text.contains("top-rated"));
        assert!(!search.search_text.contains("popular"));

        doc.review_count = 9;
        let (_, search) = build_show(&doc, Utc::now());
        assert!(!search.search_text.contains("top-rated"));

        doc.avg_rating = 3.9;
        doc.review_count = 50;
        let (_, search) = build_show(&doc, Utc::now());
        assert!(!search.search_text.contains("top-rated"));
        assert!(search.search_text.contains("popular"));
    }

    #[test]
    fn test_search_text_matrix_tag() {
        let mut doc = cornell();
        doc.source_types.clear();
        doc.source_types.insert("matrix".to_string(), 2);
        let (_, search) = build_show(&doc, Utc::now());
        assert!(search.search_text.contains("matrix"));
        assert!(!search.search_text.contains("sbd"));
    }

    #[test]
    fn test_build_show_sparse_document() {
        let doc: ShowDocument =
            serde_json::from_value(json!({"show_id": "x", "date": "unknown"})).unwrap();
        let (show, search) = build_show(&doc, Utc::now());

        assert_eq!(show.year, 0);
        assert_eq!(show.month, 0);
        assert_eq!(show.year_month, "unknown");
        assert!(show.songs.is_empty());
        assert!(show.cover_image_url.is_none());
        assert_eq!(search.search_text, "unknown");
    }

    #[test]
    fn test_build_show_skips_blank_lineup_names() {
        let mut doc = cornell();
        doc.lineup.push(LineupEntry {
            name: "  ".to_string(),
            instruments: Vec::new(),
        });
        let (show, _) = build_show(&doc, Utc::now());
        assert_eq!(show.members.len(), 2);
    }

    #[test]
    fn test_explicit_recording_count_wins() {
        let mut doc = cornell();
        doc.recording_count = Some(7);
        let (show, _) = build_show(&doc, Utc::now());
        assert_eq!(show.recording_count, 7);
    }

    #[test]
    fn test_scalar_setlist_stored_verbatim() {
        let doc: ShowDocument =
            serde_json::from_value(json!({"show_id": "x", "date": "1977-05-08", "setlist": 42}))
                .unwrap();
        let (show, _) = build_show(&doc, Utc::now());
        assert_eq!(show.setlist, Some(json!(42)));
        assert!(show.songs.is_empty());
    }
}
