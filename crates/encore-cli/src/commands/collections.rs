use anyhow::Result;
use encore_core::Database;
use std::path::Path;

pub fn list_collections(db_path: &Path) -> Result<()> {
    let db = Database::open(db_path)?;
    let collections = db.list_collections()?;

    if collections.is_empty() {
        println!("No collections imported");
        return Ok(());
    }

    for collection in &collections {
        let tag = collection.primary_tag.as_deref().unwrap_or("-");
        println!(
            "{:>5}  {}  [{}]  {}",
            collection.total_shows, collection.id, tag, collection.name
        );
    }

    Ok(())
}
