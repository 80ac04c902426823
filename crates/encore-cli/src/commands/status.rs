use anyhow::Result;
use encore_core::{Database, RecordStore};
use std::path::Path;

pub fn show_status(db_path: &Path) -> Result<()> {
    let db = Database::open(db_path)?;

    println!("\n📊 Encore Status\n");
    println!("  Database: {}", db_path.display());

    match db.version()? {
        Some(version) => {
            println!("  Data version: {}", version.data_version);
            println!("  Release: {}", version.release_tag);
            if let Some(commit) = &version.git_commit {
                println!("  Commit: {commit}");
            }
            println!("  Imported: {}", version.imported_at.format("%Y-%m-%d %H:%M UTC"));
        }
        None => {
            println!("  Data version: <none>");
            println!("\n  Run `encore import` to load the catalog");
        }
    }

    println!();
    println!("  Shows: {}", db.count_shows()?);
    println!("  Recordings: {}", db.count_recordings()?);
    println!("  Collections: {}", db.count_collections()?);
    println!("  Library: {}", db.list_library()?.len());

    Ok(())
}
