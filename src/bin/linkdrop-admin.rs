use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use linkdrop::config::Config;
use linkdrop::registry::Registry;
use linkdrop::storage::{SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "linkdrop-admin")]
#[command(about = "linkdrop admin management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete all links whose expiry has passed
    Sweep,
    /// Delete a link by slug
    DeleteLink { slug: String },
    /// Delete a file by slug
    DeleteFile { slug: String },
    /// Show click count and unique visitors for a link
    Stats { slug: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database_url, config.db_max_connections).await?,
    );
    storage.init().await?;

    let registry = Registry::new(Arc::clone(&storage));

    match cli.command {
        Commands::Sweep => {
            let removed = registry.sweep_expired().await?;
            println!("Removed {} expired links", removed);
        }
        Commands::DeleteLink { slug } => {
            registry.delete_link(&slug).await?;
            println!("Deleted link '{}'", slug);
        }
        Commands::DeleteFile { slug } => {
            registry.delete_file(&slug).await?;
            println!("Deleted file '{}'", slug);
        }
        Commands::Stats { slug } => {
            let link = registry.resolve_link(&slug).await?;
            let events = storage.count_click_events(&slug).await?;
            println!("Slug:            {}", link.slug);
            println!("Original URL:    {}", link.original_url);
            println!("Clicks:          {}", link.clicks);
            println!("Unique visitors: {}", link.analytics.unique_visitors());
            println!("Detail events:   {}", events);
        }
    }

    Ok(())
}
