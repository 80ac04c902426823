//! Archive extraction and layout discovery.

use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ImportResult;

/// Directory holding one document per show.
pub const SHOWS_DIR: &str = "shows";
/// Directory holding one document per recording.
pub const RECORDINGS_DIR: &str = "recordings";
/// Optional build metadata at the archive root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Unpacks a downloaded archive.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into `dest` and return the extraction root.
    ///
    /// # Errors
    /// Returns an error if the archive cannot be read or written out.
    fn extract(&self, archive: &Path, dest: &Path) -> ImportResult<PathBuf>;
}

/// [`ArchiveExtractor`] for ZIP files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> ImportResult<PathBuf> {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file)?;
        log::info!("Extracting {} entries to {}", zip.len(), dest.display());
        zip.extract(dest)?;
        Ok(dest.to_path_buf())
    }
}

/// Locate the directory that holds `shows/`.
///
/// Archives are sometimes packed with a single wrapper directory. If `shows/`
/// is not directly under `dir`, the one child directory that contains it is
/// used instead. Anything else falls back to `dir`.
pub fn resolve_data_root(dir: &Path) -> PathBuf {
    if dir.join(SHOWS_DIR).is_dir() {
        return dir.to_path_buf();
    }

    let candidates: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(walkdir::DirEntry::into_path)
        .filter(|child| child.join(SHOWS_DIR).is_dir())
        .collect();

    match candidates.as_slice() {
        [root] => {
            log::debug!("Using wrapper directory {}", root.display());
            root.clone()
        }
        _ => {
            log::warn!(
                "No {}/ directory found under {}, using it as-is",
                SHOWS_DIR,
                dir.display()
            );
            dir.to_path_buf()
        }
    }
}

/// JSON files directly inside `dir`, sorted by path. A missing directory has
/// no files.
pub fn json_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();
    files
}

/// The file name without its extension, used as a document key.
pub fn file_key(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|stem| stem.to_str())
}
