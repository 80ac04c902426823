//! Collection resolution.
//!
//! Collections are published as selector rules rather than show lists. The
//! [`CollectionResolver`] evaluates them against the shows already in the
//! store. Resolution never fails: a rule whose lookup errors contributes
//! nothing, and an unreadable collection is skipped.

use chrono::{DateTime, Utc};
use encore_core::model::CollectionRecord;
use encore_core::RecordStore;
use std::collections::BTreeSet;
use std::path::Path;

use crate::document::{read_document, CollectionDocument, CollectionsFile, ShowSelector};

/// Name of the collections file at the archive root.
pub const COLLECTIONS_FILE: &str = "collections.json";

/// Resolves collection selectors against a [`RecordStore`].
#[derive(Debug)]
pub struct CollectionResolver<'a, S: RecordStore> {
    store: &'a S,
}

impl<'a, S: RecordStore> CollectionResolver<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Evaluate a selector to a sorted, duplicate-free list of show IDs.
    ///
    /// Rules are unioned in a fixed order: explicit IDs, dates, ranges, the
    /// single range minus its exclusions, venues, then years.
    #[must_use]
    pub fn resolve_show_ids(&self, selector: &ShowSelector) -> Vec<String> {
        let mut result: BTreeSet<String> = BTreeSet::new();

        result.extend(
            selector
                .show_ids
                .iter()
                .filter(|id| !id.trim().is_empty())
                .cloned(),
        );

        for date in &selector.dates {
            result.extend(self.lookup("date", || self.store.show_ids_on_date(date)));
        }

        for range in &selector.ranges {
            result.extend(self.lookup("range", || {
                self.store.show_ids_between(&range.start, &range.end)
            }));
        }

        if let Some(range) = &selector.range {
            let mut in_range: BTreeSet<String> = self
                .lookup("range", || self.store.show_ids_between(&range.start, &range.end))
                .into_iter()
                .collect();

            for excluded in &selector.exclusion_ranges {
                for id in self.lookup("exclusion range", || {
                    self.store.show_ids_between(&excluded.start, &excluded.end)
                }) {
                    in_range.remove(&id);
                }
            }
            for date in &selector.exclusion_dates {
                for id in self.lookup("exclusion date", || self.store.show_ids_on_date(date)) {
                    in_range.remove(&id);
                }
            }

            result.extend(in_range);
        }

        for venue in selector.venues.iter().filter(|v| !v.trim().is_empty()) {
            result.extend(self.lookup("venue", || self.store.show_ids_at_venue(venue.trim())));
        }

        for year in &selector.years {
            result.extend(self.lookup("year", || self.store.show_ids_in_year(*year)));
        }

        result.into_iter().collect()
    }

    /// Read `collections.json` under `root` and resolve every collection.
    ///
    /// A missing or unreadable file yields no collections.
    #[must_use]
    pub fn import_collections(&self, root: &Path, now: DateTime<Utc>) -> Vec<CollectionRecord> {
        let path = root.join(COLLECTIONS_FILE);
        if !path.is_file() {
            log::info!("No {} in archive, skipping collections", COLLECTIONS_FILE);
            return Vec::new();
        }

        let file: CollectionsFile = match read_document(&path) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Skipping collections: {}", e);
                return Vec::new();
            }
        };

        file.collections
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<CollectionDocument>(raw) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    log::warn!("Skipping malformed collection: {}", e);
                    None
                }
            })
            .map(|doc| self.build_collection(doc, now))
            .collect()
    }

    fn build_collection(&self, doc: CollectionDocument, now: DateTime<Utc>) -> CollectionRecord {
        let show_ids = doc
            .show_selector
            .as_ref()
            .map(|selector| self.resolve_show_ids(selector))
            .unwrap_or_default();

        log::debug!("Collection {}: {} shows", doc.id, show_ids.len());

        CollectionRecord::new(doc.id, doc.name, doc.tags, show_ids, now)
            .with_description(doc.description)
    }

    fn lookup(
        &self,
        rule: &str,
        query: impl FnOnce() -> encore_core::Result<Vec<String>>,
    ) -> Vec<String> {
        query().unwrap_or_else(|e| {
            log::warn!("Collection {} lookup failed: {}", rule, e);
            Vec::new()
        })
    }
}
