use anyhow::{Context, Result};
use encore_core::Database;
use encore_etl::{Config, GithubReleaseClient, ImportOrchestrator, ImportPhase, ZipExtractor};
use std::sync::{Arc, Mutex};

pub async fn run_import(config: &Config, force: bool) -> Result<()> {
    log::info!(
        "Importing from {} into {}",
        config.release_repository,
        config.database_path.display()
    );

    let db = Database::open(&config.database_path).context("Failed to open database")?;
    let client = GithubReleaseClient::new(&config.api_base_url, &config.release_repository)
        .context("Failed to create release client")?;

    let orchestrator = ImportOrchestrator::new(
        Arc::new(Mutex::new(db)),
        Arc::new(client),
        Arc::new(ZipExtractor),
        config.import_options(),
    );

    let mut progress = orchestrator.run(force);
    let mut failure = None;
    while let Some(event) = progress.next().await {
        match event.phase {
            ImportPhase::Completed => println!("  ✓ {}", event.message),
            ImportPhase::Failed => {
                eprintln!("  ✗ {}", event.message);
                failure = Some(event.message);
            }
            _ => match event.fraction() {
                Some(fraction) => println!("  ⏳ {event} ({:.0}%)", fraction * 100.0),
                None => println!("  ⏳ {event}"),
            },
        }
    }

    if let Some(message) = failure {
        anyhow::bail!(message);
    }
    Ok(())
}
