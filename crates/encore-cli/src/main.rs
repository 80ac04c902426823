use anyhow::Result;
use clap::Parser;
use encore_etl::Config;
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "encore", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/encore/encore.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Import the latest published data release
    ///
    /// Downloads the newest data archive, unpacks it to a scratch directory,
    /// and reloads every show, recording, and collection from it:
    ///
    /// - Shows are rebuilt along with their search text
    /// - Recordings are attributed to every show that lists them
    /// - Collections are resolved from their selector rules
    /// - Library entries survive for shows still in the archive
    ///
    /// When a data version is already installed the import is skipped
    /// unless --force is given. A forced import replaces the catalog.
    Import {
        /// Re-import even if a data version is already installed
        #[arg(long)]
        force: bool,
    },
    /// Show the installed data version and catalog counts
    Status,
    /// Search shows by date, venue, song, member, or tag
    Search {
        /// Text to look for, e.g. "5-8-77" or "Barton Hall"
        query: String,

        /// Maximum number of results
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// List imported collections
    Collections,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the current effective configuration
    Show,
    /// Create a config file with defaults
    Init,
    /// Show the config file path
    Path,
}

/// Install the subscriber. `log` records from the library crates are
/// forwarded to it.
fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();

    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => commands::config::show_config(),
            ConfigAction::Init => commands::config::init_config(),
            ConfigAction::Path => commands::config::show_path(),
        };
    }

    let config = Config::load_with_db_path(cli.db)?;

    // Ensure database directory exists
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match cli.command {
        Commands::Import { force } => {
            commands::run_import(&config, force).await?;
        }
        Commands::Status => {
            commands::show_status(&config.database_path)?;
        }
        Commands::Search { query, limit } => {
            commands::run_search(&config.database_path, &query, limit)?;
        }
        Commands::Collections => {
            commands::list_collections(&config.database_path)?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}
