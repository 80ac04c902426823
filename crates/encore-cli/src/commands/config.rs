use anyhow::Result;
use encore_etl::{config, Config};

/// Show the current effective configuration.
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!(
        "File exists: {}\n",
        if exists { "yes" } else { "no (using defaults)" }
    );

    println!("Settings:");
    println!("  database_path: {}", config.database_path.display());
    println!("  release_repository: {}", config.release_repository);
    println!("  api_base_url: {}", config.api_base_url);
    println!("  asset_prefix: {}", config.asset_prefix);
    println!("  asset_suffix: {}", config.asset_suffix);
    println!("  batch_size: {}", config.batch_size);
    println!(
        "  work_dir: {}",
        config
            .work_dir
            .as_ref()
            .map_or_else(|| "<system temp>".to_string(), |d| d.display().to_string())
    );

    println!("\nPriority: CLI args > ENV vars (ENCORE_*) > Config file > Defaults");

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure encore.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
