use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The singleton record describing the last successful import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Manifest version if the archive carried one, otherwise the release tag.
    pub data_version: String,
    pub release_tag: String,
    pub git_commit: Option<String>,
    pub build_timestamp: Option<String>,
    pub show_count: u32,
    pub recording_count: u32,
    pub collection_count: u32,
    pub imported_at: DateTime<Utc>,
}
