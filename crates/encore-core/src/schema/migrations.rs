/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Shows (one row per concert)
CREATE TABLE IF NOT EXISTS shows (
    show_id TEXT PRIMARY KEY,
    band TEXT NOT NULL,
    venue TEXT NOT NULL,
    city TEXT,
    state TEXT,
    country TEXT,
    location_raw TEXT,
    date TEXT NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    year_month TEXT NOT NULL,
    setlist_json TEXT,
    songs_json TEXT NOT NULL,
    lineup_json TEXT NOT NULL,
    members_json TEXT NOT NULL,
    recording_ids_json TEXT NOT NULL,
    best_recording_id TEXT,
    recording_count INTEGER NOT NULL,
    avg_rating REAL NOT NULL,
    review_count INTEGER NOT NULL,
    source_types_json TEXT NOT NULL,
    cover_image_url TEXT,
    is_in_library INTEGER NOT NULL DEFAULT 0,
    library_added_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_shows_date ON shows(date);
CREATE INDEX IF NOT EXISTS idx_shows_year ON shows(year);
CREATE INDEX IF NOT EXISTS idx_shows_year_month ON shows(year_month);
CREATE INDEX IF NOT EXISTS idx_shows_venue ON shows(venue);

-- Search surrogate (exactly one row per show)
CREATE TABLE IF NOT EXISTS show_search (
    show_id TEXT PRIMARY KEY REFERENCES shows(show_id) ON DELETE CASCADE,
    search_text TEXT NOT NULL
);

-- Recordings (one row per recording per owning show)
CREATE TABLE IF NOT EXISTS recordings (
    identifier TEXT NOT NULL,
    show_id TEXT NOT NULL REFERENCES shows(show_id) ON DELETE CASCADE,
    source_type TEXT NOT NULL,
    rating REAL NOT NULL,
    review_count INTEGER NOT NULL,
    raw_rating REAL NOT NULL,
    taper TEXT,
    source TEXT,
    lineage TEXT,
    transferer TEXT,
    tracks_json TEXT NOT NULL,
    track_count INTEGER NOT NULL,
    total_duration REAL NOT NULL,
    collected_at TEXT NOT NULL,
    PRIMARY KEY (identifier, show_id)
);

CREATE INDEX IF NOT EXISTS idx_recordings_show_id ON recordings(show_id);

-- Curated collections (derived from selectors)
CREATE TABLE IF NOT EXISTS collections (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    tags_json TEXT NOT NULL,
    primary_tag TEXT,
    show_ids_json TEXT NOT NULL,
    total_shows INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- User library (not derived from the archive)
CREATE TABLE IF NOT EXISTS library_entries (
    show_id TEXT PRIMARY KEY REFERENCES shows(show_id) ON DELETE CASCADE,
    added_at TEXT NOT NULL,
    is_pinned INTEGER NOT NULL DEFAULT 0,
    notes TEXT,
    preferred_recording_id TEXT,
    downloaded_recording_id TEXT,
    downloaded_format TEXT
);

-- Playback history
CREATE TABLE IF NOT EXISTS recent_plays (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    show_id TEXT NOT NULL REFERENCES shows(show_id) ON DELETE CASCADE,
    recording_id TEXT,
    played_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_recent_plays_played_at ON recent_plays(played_at);

-- Last completed import (singleton)
CREATE TABLE IF NOT EXISTS data_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    data_version TEXT NOT NULL,
    release_tag TEXT NOT NULL,
    git_commit TEXT,
    build_timestamp TEXT,
    show_count INTEGER NOT NULL,
    recording_count INTEGER NOT NULL,
    collection_count INTEGER NOT NULL,
    imported_at TEXT NOT NULL
);
"#;

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: MIGRATION_001,
}];
