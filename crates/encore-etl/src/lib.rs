//! Archive import pipeline for encore.
//!
//! Downloads a published data release, unpacks it, and reloads the local
//! catalog from its show, recording, and collection documents while keeping
//! the user's library intact. [`ImportOrchestrator::run`] drives a run and
//! reports on a [`ProgressStream`].

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod archive;
pub mod collections;
pub mod config;
pub mod document;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod recording_builder;
pub mod release;
pub mod show_builder;

pub use archive::{resolve_data_root, ArchiveExtractor, ZipExtractor};
pub use collections::CollectionResolver;
pub use config::Config;
pub use error::{ImportError, ImportResult};
pub use orchestrator::{ImportOptions, ImportOrchestrator, ImportSummary};
pub use progress::{ImportPhase, ImportProgress, ProgressStream};
pub use recording_builder::{build_recording_records, RecordingIndex};
pub use release::{GithubReleaseClient, ReleaseAsset, ReleaseClient, ReleaseMetadata};
pub use show_builder::{build_show, search_text};
