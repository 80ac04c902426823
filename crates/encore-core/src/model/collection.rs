use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A curated grouping of shows, fully derived from a selector at import time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,

    /// First tag, used for grouping in listings.
    pub primary_tag: Option<String>,

    /// Member show IDs, sorted and unique.
    pub show_ids: Vec<String>,

    pub total_shows: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollectionRecord {
    /// Build a collection; `show_ids` is sorted and deduplicated here.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        tags: Vec<String>,
        mut show_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        show_ids.sort();
        show_ids.dedup();
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            primary_tag: tags.first().cloned(),
            tags,
            total_shows: u32::try_from(show_ids.len()).unwrap_or(u32::MAX),
            show_ids,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}
