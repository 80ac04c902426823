//! The import pipeline driver.
//!
//! An [`ImportOrchestrator`] performs one run: it checks the installed data
//! version, downloads and unpacks the newest release, reloads the catalog
//! in batches, restores the user's library, resolves collections, and
//! records the new version. Progress is reported on a [`ProgressStream`].
//!
//! Store calls run on the blocking pool, one closure per batch.

use chrono::{DateTime, Utc};
use encore_core::model::{LibraryEntry, VersionRecord};
use encore_core::RecordStore;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::archive::{
    file_key, json_files, resolve_data_root, ArchiveExtractor, MANIFEST_FILE, RECORDINGS_DIR,
    SHOWS_DIR,
};
use crate::collections::CollectionResolver;
use crate::document::{read_document, Manifest, RecordingDocument, ShowDocument};
use crate::error::{ImportError, ImportResult};
use crate::progress::{ImportPhase, ImportProgress, ProgressSink, ProgressStream};
use crate::recording_builder::{build_recording_records, RecordingIndex};
use crate::release::{ReleaseAsset, ReleaseClient, ReleaseMetadata};
use crate::show_builder::build_show;

/// Tunables for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Rows written per store flush.
    pub batch_size: usize,
    pub asset_prefix: String,
    pub asset_suffix: String,
    /// Show documents read between two reading-shows events.
    pub progress_interval: usize,
    /// Parent of the run's scratch directory. `None` uses the system temp
    /// directory.
    pub work_dir: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            asset_prefix: "data".to_string(),
            asset_suffix: ".zip".to_string(),
            progress_interval: 100,
            work_dir: None,
        }
    }
}

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub shows: usize,
    pub skipped_shows: usize,
    pub recordings: usize,
    pub skipped_recordings: usize,
    pub collections: usize,
    pub restored_library_entries: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shows, {} recordings, {} collections, {} library entries restored",
            self.shows, self.recordings, self.collections, self.restored_library_entries
        )?;
        if self.skipped_shows > 0 || self.skipped_recordings > 0 {
            write!(
                f,
                " ({} show files and {} recording files skipped)",
                self.skipped_shows, self.skipped_recordings
            )?;
        }
        Ok(())
    }
}

/// Drives one import run against a [`RecordStore`].
///
/// The store is shared so the caller can keep inspecting it once the run
/// has finished. Only one run should use a store at a time.
pub struct ImportOrchestrator<S> {
    store: Arc<Mutex<S>>,
    client: Arc<dyn ReleaseClient>,
    extractor: Arc<dyn ArchiveExtractor>,
    options: ImportOptions,
}

impl<S> fmt::Debug for ImportOrchestrator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportOrchestrator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The unpacked archive, alive for as long as its scratch directory is.
struct Unpacked {
    _scratch: TempDir,
    root: PathBuf,
    release: ReleaseMetadata,
}

impl<S: RecordStore + Send + 'static> ImportOrchestrator<S> {
    pub fn new(
        store: Arc<Mutex<S>>,
        client: Arc<dyn ReleaseClient>,
        extractor: Arc<dyn ArchiveExtractor>,
        options: ImportOptions,
    ) -> Self {
        Self {
            store,
            client,
            extractor,
            options,
        }
    }

    /// Start the run in the background and return its progress.
    ///
    /// With `force` unset, an existing version record ends the run right
    /// away. The stream always finishes with exactly one `Completed` or
    /// `Failed` event unless it is dropped first, which cancels the run.
    pub fn run(self, force: bool) -> ProgressStream {
        ProgressStream::spawn(move |sink| async move {
            let terminal = match self.execute(force, &sink).await {
                Ok(message) => ImportProgress::indeterminate(ImportPhase::Completed, message),
                Err(ImportError::Cancelled) => {
                    log::info!("Import cancelled by consumer");
                    return;
                }
                Err(e) => {
                    log::error!("Import failed: {}", e);
                    ImportProgress::indeterminate(
                        ImportPhase::Failed,
                        format!("Import failed: {e}"),
                    )
                }
            };
            if sink.emit(terminal).await.is_err() {
                log::debug!("Progress consumer gone before the final event");
            }
        })
    }

    async fn execute(&self, force: bool, sink: &ProgressSink) -> ImportResult<String> {
        let now = Utc::now();

        sink.emit(ImportProgress::indeterminate(
            ImportPhase::Checking,
            "Checking installed data version",
        ))
        .await?;
        if let Some(installed) = self.with_store(S::version).await? {
            if !force {
                log::info!(
                    "Data version {} already installed, skipping import",
                    installed.data_version
                );
                return Ok(format!(
                    "Data version {} already installed, skipped",
                    installed.data_version
                ));
            }
            log::info!(
                "Forcing re-import over data version {}",
                installed.data_version
            );
        }

        let unpacked = self.download_and_extract(sink).await?;
        let root = unpacked.root.as_path();
        let mut summary = ImportSummary::default();

        let shows = self.read_shows(root, sink, &mut summary).await?;
        let manifest = read_manifest(root);

        let snapshot = self.snapshot_library().await;
        let mut imported_ids = HashSet::with_capacity(shows.len());
        let reloaded = self
            .import_shows(&shows, &snapshot, now, sink, &mut imported_ids)
            .await;
        // Runs on every exit from the show reload, cancellation included.
        summary.restored_library_entries = self.restore_library(snapshot, &imported_ids).await;
        reloaded?;
        summary.shows = imported_ids.len();

        let index = RecordingIndex::from_shows(&shows);
        drop(shows);
        self.import_recordings(root, &index, now, sink, &mut summary)
            .await?;

        summary.collections = self.import_collections(root, now, sink).await?;

        sink.ensure_open()?;
        sink.emit(ImportProgress::indeterminate(
            ImportPhase::Finalizing,
            "Recording data version",
        ))
        .await?;

        let (show_count, recording_count) = self
            .with_store(|s| Ok((s.count_shows()?, s.count_recordings()?)))
            .await?;
        let version = VersionRecord {
            data_version: manifest
                .version
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| unpacked.release.tag_name.clone()),
            release_tag: unpacked.release.tag_name.clone(),
            git_commit: manifest.git_commit,
            build_timestamp: manifest.build_timestamp,
            show_count,
            recording_count,
            collection_count: u32::try_from(summary.collections).unwrap_or(u32::MAX),
            imported_at: now,
        };
        let installed = version.clone();
        self.with_store(move |s| s.upsert_version(&installed))
            .await?;

        log::info!("Imported data version {}: {}", version.data_version, summary);
        Ok(format!(
            "Imported data version {}: {}",
            version.data_version, summary
        ))
    }

    async fn download_and_extract(&self, sink: &ProgressSink) -> ImportResult<Unpacked> {
        sink.emit(ImportProgress::indeterminate(
            ImportPhase::Downloading,
            "Looking up latest release",
        ))
        .await?;
        let release = self.client.fetch_latest_release().await?;
        sink.ensure_open()?;
        let asset: ReleaseAsset = release
            .select_data_asset(&self.options.asset_prefix, &self.options.asset_suffix)
            .cloned()
            .ok_or_else(|| ImportError::MissingAsset {
                tag: release.tag_name.clone(),
                prefix: self.options.asset_prefix.clone(),
                suffix: self.options.asset_suffix.clone(),
            })?;

        let scratch = self.scratch_dir()?;
        sink.emit(ImportProgress::new(
            ImportPhase::Downloading,
            0,
            asset.size,
            format!("Downloading {}", asset.name),
        ))
        .await?;
        let archive = self.client.download(&asset, scratch.path()).await?;
        sink.emit(ImportProgress::new(
            ImportPhase::Downloading,
            asset.size,
            asset.size,
            format!("Downloaded {}", asset.name),
        ))
        .await?;

        sink.emit(ImportProgress::indeterminate(
            ImportPhase::Extracting,
            format!("Extracting {}", asset.name),
        ))
        .await?;
        sink.ensure_open()?;
        let dest = scratch.path().join("extracted");
        std::fs::create_dir_all(&dest)?;
        let extractor = Arc::clone(&self.extractor);
        let archive_path = archive.clone();
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&archive_path, &dest))
            .await
            .map_err(|e| ImportError::Io(std::io::Error::other(e)))??;
        if let Err(e) = std::fs::remove_file(&archive) {
            log::debug!("Could not remove {}: {}", archive.display(), e);
        }

        let root = resolve_data_root(&extracted);
        log::info!("Archive root: {}", root.display());
        Ok(Unpacked {
            _scratch: scratch,
            root,
            release,
        })
    }

    fn scratch_dir(&self) -> ImportResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("encore-import-");
        let dir = match &self.options.work_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        log::debug!("Scratch directory {}", dir.path().display());
        Ok(dir)
    }

    async fn read_shows(
        &self,
        root: &Path,
        sink: &ProgressSink,
        summary: &mut ImportSummary,
    ) -> ImportResult<Vec<ShowDocument>> {
        let files = json_files(&root.join(SHOWS_DIR));
        let total = files.len() as u64;
        let interval = self.options.progress_interval.max(1);
        let mut shows = Vec::with_capacity(files.len());

        for (i, path) in files.iter().enumerate() {
            match read_document::<ShowDocument>(path) {
                Ok(doc) => shows.push(doc),
                Err(e) => {
                    log::warn!("Skipping show document: {}", e);
                    summary.skipped_shows += 1;
                }
            }
            let read = i + 1;
            if read % interval == 0 && read < files.len() {
                sink.emit(ImportProgress::new(
                    ImportPhase::ReadingShows,
                    read as u64,
                    total,
                    "Reading shows",
                ))
                .await?;
            }
        }

        sink.emit(ImportProgress::new(
            ImportPhase::ReadingShows,
            total,
            total,
            format!("Read {} shows", shows.len()),
        ))
        .await?;
        log::info!(
            "Read {} show documents ({} skipped)",
            shows.len(),
            summary.skipped_shows
        );
        Ok(shows)
    }

    /// Library entries before the catalog is cleared. A failed read leaves
    /// the library unrestored rather than failing the import.
    async fn snapshot_library(&self) -> Vec<LibraryEntry> {
        match self.with_store(S::library_entries).await {
            Ok(entries) => {
                log::debug!("Snapshotted {} library entries", entries.len());
                entries
            }
            Err(e) => {
                log::warn!("Could not snapshot library, it will not be restored: {}", e);
                Vec::new()
            }
        }
    }

    /// Clear the catalog and insert every show, adding each stored ID to
    /// `imported` as its batch commits.
    async fn import_shows(
        &self,
        shows: &[ShowDocument],
        library: &[LibraryEntry],
        now: DateTime<Utc>,
        sink: &ProgressSink,
        imported: &mut HashSet<String>,
    ) -> ImportResult<()> {
        let added: HashMap<&str, DateTime<Utc>> = library
            .iter()
            .map(|entry| (entry.show_id.as_str(), entry.added_at))
            .collect();
        let total = shows.len() as u64;
        let mut processed: u64 = 0;

        sink.emit(ImportProgress::new(
            ImportPhase::ImportingShows,
            0,
            total,
            "Clearing catalog",
        ))
        .await?;
        sink.ensure_open()?;
        self.with_store(S::clear_catalog).await?;

        for chunk in shows.chunks(self.options.batch_size.max(1)) {
            sink.ensure_open()?;
            let (records, search): (Vec<_>, Vec<_>) = chunk
                .iter()
                .map(|doc| {
                    let (mut show, search) = build_show(doc, now);
                    if let Some(added_at) = added.get(show.show_id.as_str()) {
                        show.is_in_library = true;
                        show.library_added_at = Some(*added_at);
                    }
                    (show, search)
                })
                .unzip();

            let ids: Vec<String> = records.iter().map(|show| show.show_id.clone()).collect();
            self.with_store(move |s| {
                s.insert_shows(&records)?;
                s.insert_search_records(&search)
            })
            .await?;
            imported.extend(ids);

            processed += chunk.len() as u64;
            sink.emit(ImportProgress::new(
                ImportPhase::ImportingShows,
                processed,
                total,
                "Importing shows",
            ))
            .await?;
        }

        log::info!("Imported {} shows", imported.len());
        Ok(())
    }

    /// Stream recording documents one at a time, fanning each out to the
    /// shows that list it. Files no show lists are not counted.
    async fn import_recordings(
        &self,
        root: &Path,
        index: &RecordingIndex,
        now: DateTime<Utc>,
        sink: &ProgressSink,
        summary: &mut ImportSummary,
    ) -> ImportResult<()> {
        let files: Vec<PathBuf> = json_files(&root.join(RECORDINGS_DIR))
            .into_iter()
            .filter(|path| file_key(path).is_some_and(|key| index.contains(key)))
            .collect();
        let total = files.len() as u64;
        let batch_size = self.options.batch_size.max(1);
        let mut processed: u64 = 0;
        let mut batch = Vec::with_capacity(batch_size);

        sink.emit(ImportProgress::new(
            ImportPhase::ImportingRecordings,
            0,
            total,
            "Importing recordings",
        ))
        .await?;

        for path in &files {
            sink.ensure_open()?;
            processed += 1;
            let Some(identifier) = file_key(path) else {
                continue;
            };
            let Some(owners) = index.owners(identifier) else {
                continue;
            };

            match read_document::<RecordingDocument>(path) {
                Ok(doc) => {
                    batch.extend(build_recording_records(identifier, &doc, owners, now));
                }
                Err(e) => {
                    log::warn!("Skipping recording document: {}", e);
                    summary.skipped_recordings += 1;
                }
            }

            if batch.len() >= batch_size {
                summary.recordings += self.flush_recordings(&mut batch).await?;
                sink.emit(ImportProgress::new(
                    ImportPhase::ImportingRecordings,
                    processed,
                    total,
                    "Importing recordings",
                ))
                .await?;
            }
        }

        sink.ensure_open()?;
        summary.recordings += self.flush_recordings(&mut batch).await?;
        sink.emit(ImportProgress::new(
            ImportPhase::ImportingRecordings,
            processed,
            total,
            format!("Imported {} recordings", summary.recordings),
        ))
        .await?;

        log::info!(
            "Imported {} recordings from {} files ({} skipped)",
            summary.recordings,
            total,
            summary.skipped_recordings
        );
        Ok(())
    }

    async fn flush_recordings(
        &self,
        batch: &mut Vec<encore_core::model::RecordingRecord>,
    ) -> ImportResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let records = std::mem::take(batch);
        let written = records.len();
        self.with_store(move |s| s.insert_recordings(&records))
            .await?;
        log::debug!("Flushed {} recordings", written);
        Ok(written)
    }

    async fn import_collections(
        &self,
        root: &Path,
        now: DateTime<Utc>,
        sink: &ProgressSink,
    ) -> ImportResult<usize> {
        sink.emit(ImportProgress::indeterminate(
            ImportPhase::ImportingCollections,
            "Resolving collections",
        ))
        .await?;
        sink.ensure_open()?;

        let root = root.to_path_buf();
        let collections = self
            .with_store(move |s| {
                let collections = CollectionResolver::new(s).import_collections(&root, now);
                s.insert_collections(&collections)?;
                Ok(collections)
            })
            .await?;

        let total = collections.len() as u64;
        sink.emit(ImportProgress::new(
            ImportPhase::ImportingCollections,
            total,
            total,
            format!("Imported {} collections", collections.len()),
        ))
        .await?;
        Ok(collections.len())
    }

    /// Re-insert snapshotted entries whose show is back in the store.
    /// Failures are logged and reported as nothing restored.
    async fn restore_library(
        &self,
        snapshot: Vec<LibraryEntry>,
        imported: &HashSet<String>,
    ) -> usize {
        let before = snapshot.len();
        let kept: Vec<LibraryEntry> = snapshot
            .into_iter()
            .filter(|entry| imported.contains(&entry.show_id))
            .collect();
        if kept.len() < before {
            log::info!(
                "Dropping {} library entries for shows no longer in the archive",
                before - kept.len()
            );
        }
        if kept.is_empty() {
            return 0;
        }

        let restored = kept.len();
        match self
            .with_store(move |s| s.insert_library_entries(&kept))
            .await
        {
            Ok(()) => {
                log::debug!("Restored {} library entries", restored);
                restored
            }
            Err(e) => {
                log::warn!("Could not restore library entries: {}", e);
                0
            }
        }
    }

    /// Run `f` against the locked store on the blocking pool.
    async fn with_store<T, F>(&self, f: F) -> ImportResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> encore_core::Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || -> ImportResult<T> {
            let store = store.lock().map_err(|_| ImportError::StoreUnavailable)?;
            Ok(f(&store)?)
        })
        .await
        .map_err(|e| ImportError::Io(std::io::Error::other(e)))?
    }
}

/// `manifest.json`, or an empty manifest if it is absent or unreadable.
fn read_manifest(root: &Path) -> Manifest {
    let path = root.join(MANIFEST_FILE);
    if !path.is_file() {
        return Manifest::default();
    }
    read_document(&path).unwrap_or_else(|e| {
        log::warn!("Ignoring manifest: {}", e);
        Manifest::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use encore_core::Database;
    use serde_json::json;

    /// Serves one release whose archive is a directory tree, not a file.
    struct DirectoryRelease {
        tag: String,
        asset_name: String,
    }

    #[async_trait]
    impl ReleaseClient for DirectoryRelease {
        async fn fetch_latest_release(&self) -> ImportResult<ReleaseMetadata> {
            Ok(ReleaseMetadata {
                tag_name: self.tag.clone(),
                name: None,
                published_at: None,
                assets: vec![ReleaseAsset {
                    name: self.asset_name.clone(),
                    size: 3,
                    download_url: "memory://archive".to_string(),
                }],
            })
        }

        async fn download(&self, asset: &ReleaseAsset, dest: &Path) -> ImportResult<PathBuf> {
            let path = dest.join(&asset.name);
            std::fs::write(&path, b"zip")?;
            Ok(path)
        }
    }

    /// Writes a fixed layout instead of unpacking anything.
    struct FixtureExtractor {
        files: Vec<(String, String)>,
    }

    impl ArchiveExtractor for FixtureExtractor {
        fn extract(&self, _archive: &Path, dest: &Path) -> ImportResult<PathBuf> {
            for (name, body) in &self.files {
                let path = dest.join(name);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, body)?;
            }
            Ok(dest.to_path_buf())
        }
    }

    fn orchestrator(
        store: &Arc<Mutex<Database>>,
        asset_name: &str,
        files: Vec<(String, String)>,
    ) -> ImportOrchestrator<Database> {
        ImportOrchestrator::new(
            Arc::clone(store),
            Arc::new(DirectoryRelease {
                tag: "v1.0.0".to_string(),
                asset_name: asset_name.to_string(),
            }),
            Arc::new(FixtureExtractor { files }),
            ImportOptions {
                batch_size: 2,
                ..ImportOptions::default()
            },
        )
    }

    fn small_archive() -> Vec<(String, String)> {
        vec![
            (
                "shows/a.json".to_string(),
                json!({"show_id": "a", "date": "1977-05-08", "venue": "Barton Hall", "recordings": ["r1"]})
                    .to_string(),
            ),
            (
                "recordings/r1.json".to_string(),
                json!({"source_type": "SBD", "tracks": []}).to_string(),
            ),
        ]
    }

    #[tokio::test]
    async fn test_run_emits_phases_in_order() {
        let store = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let events = orchestrator(&store, "data.zip", small_archive())
            .run(false)
            .collect()
            .await;

        let mut phases: Vec<ImportPhase> = events.iter().map(|e| e.phase).collect();
        phases.dedup();
        assert_eq!(
            phases,
            vec![
                ImportPhase::Checking,
                ImportPhase::Downloading,
                ImportPhase::Extracting,
                ImportPhase::ReadingShows,
                ImportPhase::ImportingShows,
                ImportPhase::ImportingRecordings,
                ImportPhase::ImportingCollections,
                ImportPhase::Finalizing,
                ImportPhase::Completed,
            ]
        );

        let db = store.lock().unwrap();
        let version = db.version().unwrap().unwrap();
        assert_eq!(version.data_version, "v1.0.0");
        assert_eq!(version.show_count, 1);
        assert_eq!(version.recording_count, 1);
    }

    #[tokio::test]
    async fn test_missing_asset_fails_once() {
        let store = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let events = orchestrator(&store, "source.tar.gz", small_archive())
            .run(false)
            .collect()
            .await;

        let last = events.last().unwrap();
        assert_eq!(last.phase, ImportPhase::Failed);
        assert!(last.message.starts_with("Import failed:"));
        assert_eq!(
            events.iter().filter(|e| e.phase.is_terminal()).count(),
            1
        );
        assert!(store.lock().unwrap().version().unwrap().is_none());
    }

    #[test]
    fn test_summary_display() {
        let summary = ImportSummary {
            shows: 9,
            skipped_shows: 1,
            recordings: 20,
            ..ImportSummary::default()
        };
        assert_eq!(
            summary.to_string(),
            "9 shows, 20 recordings, 0 collections, 0 library entries restored \
             (1 show files and 0 recording files skipped)"
        );
    }

    #[test]
    fn test_read_manifest_tolerates_garbage() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_manifest(dir.path()), Manifest::default());

        std::fs::write(dir.path().join(MANIFEST_FILE), "not json").unwrap();
        assert_eq!(read_manifest(dir.path()), Manifest::default());

        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            json!({"version": "2.1.0", "git_commit": "abc123"}).to_string(),
        )
        .unwrap();
        let manifest = read_manifest(dir.path());
        assert_eq!(manifest.version.as_deref(), Some("2.1.0"));
        assert_eq!(manifest.git_commit.as_deref(), Some("abc123"));
    }
}
