pub mod collection;
pub mod library;
pub mod recording;
pub mod show;
pub mod version;

pub use collection::CollectionRecord;
pub use library::{LibraryEntry, RecentPlay};
pub use recording::{RecordingRecord, SourceType, Track, TrackFile};
pub use show::{LineupMember, SearchRecord, ShowRecord};
pub use version::VersionRecord;
