use anyhow::Result;
use encore_core::Database;
use std::path::Path;

pub fn run_search(db_path: &Path, query: &str, limit: u32) -> Result<()> {
    let db = Database::open(db_path)?;
    let shows = db.search_shows(query, limit)?;

    if shows.is_empty() {
        println!("No shows match \"{query}\"");
        return Ok(());
    }

    for show in &shows {
        let marker = if show.is_in_library { "★" } else { " " };
        let location = show.location_raw.as_deref().unwrap_or("");
        println!(
            "{marker} {}  {}  {}  ({} recordings)",
            show.date, show.venue, location, show.recording_count
        );
    }
    println!("\n{} result(s)", shows.len());

    Ok(())
}
