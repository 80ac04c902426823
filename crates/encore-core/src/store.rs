//! The record store contract the import pipeline writes through.

use crate::error::Result;
use crate::model::{
    CollectionRecord, LibraryEntry, RecordingRecord, SearchRecord, ShowRecord, VersionRecord,
};

/// Batched persistence for imported records.
///
/// Implementations must cascade deletes from a show to its recordings,
/// search row, library entry, and recent plays. Each batch insert is
/// expected to be all-or-nothing.
pub trait RecordStore {
    /// The record of the last completed import, if any.
    fn version(&self) -> Result<Option<VersionRecord>>;

    /// Replace the version record.
    fn upsert_version(&self, version: &VersionRecord) -> Result<()>;

    /// Every library entry currently stored.
    fn library_entries(&self) -> Result<Vec<LibraryEntry>>;

    /// Insert (or replace) library entries. Their shows must exist.
    fn insert_library_entries(&self, entries: &[LibraryEntry]) -> Result<()>;

    /// Delete all archive-derived data and the version record.
    ///
    /// Library entries cascade away with their shows; callers that want to
    /// keep them must snapshot first.
    fn clear_catalog(&self) -> Result<()>;

    fn insert_shows(&self, shows: &[ShowRecord]) -> Result<()>;

    fn insert_search_records(&self, records: &[SearchRecord]) -> Result<()>;

    fn insert_recordings(&self, recordings: &[RecordingRecord]) -> Result<()>;

    fn insert_collections(&self, collections: &[CollectionRecord]) -> Result<()>;

    /// Shows played on exactly `date` (`YYYY-MM-DD`).
    fn show_ids_on_date(&self, date: &str) -> Result<Vec<String>>;

    /// Shows dated within `[start, end]`, both inclusive.
    fn show_ids_between(&self, start: &str, end: &str) -> Result<Vec<String>>;

    /// Shows whose venue contains `fragment`, ignoring case.
    fn show_ids_at_venue(&self, fragment: &str) -> Result<Vec<String>>;

    fn show_ids_in_year(&self, year: i32) -> Result<Vec<String>>;

    fn count_shows(&self) -> Result<u32>;

    fn count_recordings(&self) -> Result<u32>;
}
