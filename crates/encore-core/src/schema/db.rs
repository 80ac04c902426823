use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{
    CollectionRecord, LibraryEntry, RecentPlay, RecordingRecord, SearchRecord, ShowRecord,
    SourceType, VersionRecord,
};
use crate::store::RecordStore;

use super::migrations::MIGRATIONS;

const SHOW_COLUMNS: &str = "s.show_id, s.band, s.venue, s.city, s.state, s.country,
    s.location_raw, s.date, s.year, s.month, s.year_month, s.setlist_json,
    s.songs_json, s.lineup_json, s.members_json, s.recording_ids_json,
    s.best_recording_id, s.recording_count, s.avg_rating, s.review_count,
    s.source_types_json, s.cover_image_url, s.is_in_library, s.library_added_at,
    s.created_at, s.updated_at";

const LIBRARY_COLUMNS: &str = "show_id, added_at, is_pinned, notes, preferred_recording_id,
    downloaded_recording_id, downloaded_format";

/// A SQLite-backed [`RecordStore`].
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn init(conn: Connection) -> Result<Self> {
        // Cascades depend on this; it is per-connection, not per-file.
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }

    fn query_ids<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map(params, |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn count(&self, table: &'static str) -> Result<u32> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        u32::try_from(count).map_err(|_| Error::InvalidData(format!("{table} count {count}")))
    }
}

// Shows
impl Database {
    /// Fetch one show by ID.
    pub fn get_show(&self, show_id: &str) -> Result<Option<ShowRecord>> {
        let show = self
            .conn
            .query_row(
                &format!("SELECT {SHOW_COLUMNS} FROM shows s WHERE s.show_id = ?1"),
                [show_id],
                row_to_show,
            )
            .optional()?;
        Ok(show)
    }

    /// Shows whose search text contains `query`, ordered by date.
    pub fn search_shows(&self, query: &str, limit: u32) -> Result<Vec<ShowRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SHOW_COLUMNS}
             FROM shows s
             JOIN show_search ss ON ss.show_id = s.show_id
             WHERE ss.search_text LIKE '%' || ?1 || '%' ESCAPE '\\'
             ORDER BY s.date, s.show_id
             LIMIT ?2"
        ))?;

        let shows = stmt
            .query_map(rusqlite::params![escape_like(query), limit], row_to_show)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(shows)
    }

    /// The search text stored for a show.
    pub fn search_text(&self, show_id: &str) -> Result<Option<String>> {
        let text = self
            .conn
            .query_row(
                "SELECT search_text FROM show_search WHERE show_id = ?1",
                [show_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(text)
    }

    pub fn count_search_records(&self) -> Result<u32> {
        self.count("show_search")
    }
}

// Recordings
impl Database {
    /// All recordings attributed to a show, by identifier.
    pub fn recordings_for_show(&self, show_id: &str) -> Result<Vec<RecordingRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT identifier, show_id, source_type, rating, review_count, raw_rating,
                    taper, source, lineage, transferer, tracks_json, collected_at
             FROM recordings
             WHERE show_id = ?1
             ORDER BY identifier",
        )?;

        let recordings = stmt
            .query_map([show_id], row_to_recording)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(recordings)
    }

    /// Every `(identifier, show_id)` pair, sorted.
    pub fn recording_pairs(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT identifier, show_id FROM recordings ORDER BY identifier, show_id")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs)
    }
}

// Collections
impl Database {
    pub fn list_collections(&self) -> Result<Vec<CollectionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, tags_json, primary_tag, show_ids_json,
                    total_shows, created_at, updated_at
             FROM collections
             ORDER BY total_shows DESC, name",
        )?;

        let collections = stmt
            .query_map([], |row| {
                Ok(CollectionRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    tags: json_column(row, 3)?,
                    primary_tag: row.get(4)?,
                    show_ids: json_column(row, 5)?,
                    total_shows: row.get(6)?,
                    created_at: timestamp_column(row, 7)?,
                    updated_at: timestamp_column(row, 8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(collections)
    }

    pub fn count_collections(&self) -> Result<u32> {
        self.count("collections")
    }
}

// Library and playback history
impl Database {
    /// Library entries, pinned first, then most recently added.
    pub fn list_library(&self) -> Result<Vec<LibraryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LIBRARY_COLUMNS} FROM library_entries
             ORDER BY is_pinned DESC, added_at DESC"
        ))?;
        let entries = stmt
            .query_map([], row_to_library_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Remove a show from the library and clear its user-state flags.
    pub fn remove_library_entry(&self, show_id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM library_entries WHERE show_id = ?1", [show_id])?;
        if removed == 0 {
            return Err(Error::NotFound {
                entity: "library entry",
                id: show_id.to_string(),
            });
        }
        tx.execute(
            "UPDATE shows SET is_in_library = 0, library_added_at = NULL WHERE show_id = ?1",
            [show_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn record_play(&self, play: &RecentPlay) -> Result<()> {
        self.conn.execute(
            "INSERT INTO recent_plays (show_id, recording_id, played_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![play.show_id, play.recording_id, play.played_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Most recent plays first.
    pub fn recent_plays(&self, limit: u32) -> Result<Vec<RecentPlay>> {
        let mut stmt = self.conn.prepare(
            "SELECT show_id, recording_id, played_at FROM recent_plays
             ORDER BY played_at DESC, id DESC
             LIMIT ?1",
        )?;
        let plays = stmt
            .query_map([limit], |row| {
                Ok(RecentPlay {
                    show_id: row.get(0)?,
                    recording_id: row.get(1)?,
                    played_at: timestamp_column(row, 2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(plays)
    }
}

impl RecordStore for Database {
    fn version(&self) -> Result<Option<VersionRecord>> {
        let version = self
            .conn
            .query_row(
                "SELECT data_version, release_tag, git_commit, build_timestamp,
                        show_count, recording_count, collection_count, imported_at
                 FROM data_version WHERE id = 1",
                [],
                |row| {
                    Ok(VersionRecord {
                        data_version: row.get(0)?,
                        release_tag: row.get(1)?,
                        git_commit: row.get(2)?,
                        build_timestamp: row.get(3)?,
                        show_count: row.get(4)?,
                        recording_count: row.get(5)?,
                        collection_count: row.get(6)?,
                        imported_at: timestamp_column(row, 7)?,
                    })
                },
            )
            .optional()?;
        Ok(version)
    }

    fn upsert_version(&self, version: &VersionRecord) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO data_version (
                id, data_version, release_tag, git_commit, build_timestamp,
                show_count, recording_count, collection_count, imported_at
            ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                version.data_version,
                version.release_tag,
                version.git_commit,
                version.build_timestamp,
                version.show_count,
                version.recording_count,
                version.collection_count,
                version.imported_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn library_entries(&self) -> Result<Vec<LibraryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LIBRARY_COLUMNS} FROM library_entries ORDER BY show_id"
        ))?;
        let entries = stmt
            .query_map([], row_to_library_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn insert_library_entries(&self, entries: &[LibraryEntry]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT OR REPLACE INTO library_entries (
                    show_id, added_at, is_pinned, notes, preferred_recording_id,
                    downloaded_recording_id, downloaded_format
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut mark = tx.prepare_cached(
                "UPDATE shows SET is_in_library = 1, library_added_at = ?2 WHERE show_id = ?1",
            )?;
            for entry in entries {
                let added_at = entry.added_at.to_rfc3339();
                insert.execute(rusqlite::params![
                    entry.show_id,
                    added_at,
                    entry.is_pinned,
                    entry.notes,
                    entry.preferred_recording_id,
                    entry.downloaded_recording_id,
                    entry.downloaded_format,
                ])?;
                mark.execute(rusqlite::params![entry.show_id, added_at])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_catalog(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM recordings;
             DELETE FROM show_search;
             DELETE FROM shows;
             DELETE FROM collections;
             DELETE FROM data_version;",
        )?;
        tx.commit()?;
        Ok(())
    }

    fn insert_shows(&self, shows: &[ShowRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO shows (
                    show_id, band, venue, city, state, country, location_raw,
                    date, year, month, year_month, setlist_json, songs_json,
                    lineup_json, members_json, recording_ids_json, best_recording_id,
                    recording_count, avg_rating, review_count, source_types_json,
                    cover_image_url, is_in_library, library_added_at, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                          ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
            )?;
            for show in shows {
                let setlist_json = show
                    .setlist
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                stmt.execute(rusqlite::params![
                    show.show_id,
                    show.band,
                    show.venue,
                    show.city,
                    show.state,
                    show.country,
                    show.location_raw,
                    show.date,
                    show.year,
                    show.month,
                    show.year_month,
                    setlist_json,
                    serde_json::to_string(&show.songs)?,
                    serde_json::to_string(&show.lineup)?,
                    serde_json::to_string(&show.members)?,
                    serde_json::to_string(&show.recording_ids)?,
                    show.best_recording_id,
                    show.recording_count,
                    show.avg_rating,
                    show.review_count,
                    serde_json::to_string(&show.source_types)?,
                    show.cover_image_url,
                    show.is_in_library,
                    show.library_added_at.map(|t| t.to_rfc3339()),
                    show.created_at.to_rfc3339(),
                    show.updated_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_search_records(&self, records: &[SearchRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO show_search (show_id, search_text) VALUES (?1, ?2)",
            )?;
            for record in records {
                stmt.execute(rusqlite::params![record.show_id, record.search_text])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_recordings(&self, recordings: &[RecordingRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO recordings (
                    identifier, show_id, source_type, rating, review_count, raw_rating,
                    taper, source, lineage, transferer, tracks_json, track_count,
                    total_duration, collected_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;
            for recording in recordings {
                stmt.execute(rusqlite::params![
                    recording.identifier,
                    recording.show_id,
                    recording.source_type.as_str(),
                    recording.rating,
                    recording.review_count,
                    recording.raw_rating,
                    recording.taper,
                    recording.source,
                    recording.lineage,
                    recording.transferer,
                    serde_json::to_string(&recording.tracks)?,
                    i64::try_from(recording.track_count()).unwrap_or(i64::MAX),
                    recording.total_duration(),
                    recording.collected_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_collections(&self, collections: &[CollectionRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO collections (
                    id, name, description, tags_json, primary_tag, show_ids_json,
                    total_shows, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for collection in collections {
                stmt.execute(rusqlite::params![
                    collection.id,
                    collection.name,
                    collection.description,
                    serde_json::to_string(&collection.tags)?,
                    collection.primary_tag,
                    serde_json::to_string(&collection.show_ids)?,
                    collection.total_shows,
                    collection.created_at.to_rfc3339(),
                    collection.updated_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn show_ids_on_date(&self, date: &str) -> Result<Vec<String>> {
        self.query_ids(
            "SELECT show_id FROM shows WHERE date = ?1 ORDER BY show_id",
            [date],
        )
    }

    fn show_ids_between(&self, start: &str, end: &str) -> Result<Vec<String>> {
        self.query_ids(
            "SELECT show_id FROM shows WHERE date >= ?1 AND date <= ?2 ORDER BY show_id",
            [start, end],
        )
    }

    fn show_ids_at_venue(&self, fragment: &str) -> Result<Vec<String>> {
        self.query_ids(
            "SELECT show_id FROM shows
             WHERE venue LIKE '%' || ?1 || '%' ESCAPE '\\'
             ORDER BY show_id",
            [escape_like(fragment)],
        )
    }

    fn show_ids_in_year(&self, year: i32) -> Result<Vec<String>> {
        self.query_ids(
            "SELECT show_id FROM shows WHERE year = ?1 ORDER BY show_id",
            [year],
        )
    }

    fn count_shows(&self) -> Result<u32> {
        self.count("shows")
    }

    fn count_recordings(&self) -> Result<u32> {
        self.count("recordings")
    }
}

/// Escape `%`, `_`, and `\` so user text matches literally inside `LIKE`.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn optional_timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        DateTime::parse_from_rfc3339(&t)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn row_to_show(row: &Row) -> rusqlite::Result<ShowRecord> {
    let setlist_json: Option<String> = row.get(11)?;
    let setlist = setlist_json
        .map(|text| serde_json::from_str(&text).map_err(|e| conversion_error(11, e)))
        .transpose()?;

    Ok(ShowRecord {
        show_id: row.get(0)?,
        band: row.get(1)?,
        venue: row.get(2)?,
        city: row.get(3)?,
        state: row.get(4)?,
        country: row.get(5)?,
        location_raw: row.get(6)?,
        date: row.get(7)?,
        year: row.get(8)?,
        month: row.get(9)?,
        year_month: row.get(10)?,
        setlist,
        songs: json_column(row, 12)?,
        lineup: json_column(row, 13)?,
        members: json_column(row, 14)?,
        recording_ids: json_column(row, 15)?,
        best_recording_id: row.get(16)?,
        recording_count: row.get(17)?,
        avg_rating: row.get(18)?,
        review_count: row.get(19)?,
        source_types: json_column(row, 20)?,
        cover_image_url: row.get(21)?,
        is_in_library: row.get(22)?,
        library_added_at: optional_timestamp_column(row, 23)?,
        created_at: timestamp_column(row, 24)?,
        updated_at: timestamp_column(row, 25)?,
    })
}

fn row_to_recording(row: &Row) -> rusqlite::Result<RecordingRecord> {
    let source_type: String = row.get(2)?;
    Ok(RecordingRecord {
        identifier: row.get(0)?,
        show_id: row.get(1)?,
        source_type: SourceType::from_label(&source_type),
        rating: row.get(3)?,
        review_count: row.get(4)?,
        raw_rating: row.get(5)?,
        taper: row.get(6)?,
        source: row.get(7)?,
        lineage: row.get(8)?,
        transferer: row.get(9)?,
        tracks: json_column(row, 10)?,
        collected_at: timestamp_column(row, 11)?,
    })
}

fn row_to_library_entry(row: &Row) -> rusqlite::Result<LibraryEntry> {
    Ok(LibraryEntry {
        show_id: row.get(0)?,
        added_at: timestamp_column(row, 1)?,
        is_pinned: row.get(2)?,
        notes: row.get(3)?,
        preferred_recording_id: row.get(4)?,
        downloaded_recording_id: row.get(5)?,
        downloaded_format: row.get(6)?,
    })
}
