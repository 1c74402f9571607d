//! Assetgrep main entry point
//!
//! This is the command-line interface for the Assetgrep harvester and search server.

use anyhow::Context;
use assetgrep::config::{load_config_with_hash, Config, IndexSource};
use assetgrep::crawler::Harvester;
use assetgrep::search::SearchCache;
use assetgrep::storage::{DurableStore, SqliteStore};
use assetgrep::web::{self, AppState};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Assetgrep: a searchable mirror of a paginated asset listing
///
/// Assetgrep harvests a rate-limited, paginated listing into a local corpus
/// and serves it through paginated browsing and ranked fuzzy search.
#[derive(Parser, Debug)]
#[command(name = "assetgrep")]
#[command(version)]
#[command(about = "A searchable mirror of a paginated asset listing", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API, refreshing the cache from the store first
    Serve,

    /// Run one crawl, persist the corpus and index archive, then exit
    Harvest,

    /// Validate the configuration and print a summary
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    match cli.command {
        Command::Serve => handle_serve(config).await,
        Command::Harvest => handle_harvest(config).await,
        Command::CheckConfig => {
            print_config_summary(&config, &hash);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("assetgrep=info,warn"),
            1 => EnvFilter::new("assetgrep=debug,info"),
            2 => EnvFilter::new("assetgrep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_durable_store(config: &Config) -> anyhow::Result<Arc<dyn DurableStore>> {
    let path = Path::new(&config.storage.database_path);
    let store = SqliteStore::new(path)
        .with_context(|| format!("opening store at {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Handles `serve`: initial refresh, then the HTTP surface
async fn handle_serve(config: Config) -> anyhow::Result<()> {
    let store = open_durable_store(&config)?;
    std::fs::create_dir_all(&config.storage.scratch_dir)
        .with_context(|| format!("creating scratch dir {}", config.storage.scratch_dir))?;

    let cache = Arc::new(SearchCache::new(
        store.clone(),
        config.cache.clone(),
        PathBuf::from(&config.storage.scratch_dir),
    ));
    if let Err(e) = cache.refresh().await {
        tracing::error!("Initial cache refresh failed, serving an empty snapshot: {}", e);
    }

    let harvester = Arc::new(Harvester::from_config(&config, store)?);
    let state = Arc::new(AppState { cache, harvester });

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    web::serve(listener, state).await?;

    Ok(())
}

/// Handles `harvest`: one synchronous crawl and persist cycle
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    let store = open_durable_store(&config)?;
    std::fs::create_dir_all(&config.storage.scratch_dir)
        .with_context(|| format!("creating scratch dir {}", config.storage.scratch_dir))?;

    let harvester = Harvester::from_config(&config, store)?;
    match harvester.harvest().await {
        Ok(report) => {
            tracing::info!(
                "Harvest completed: {} assets from {} pages ({} failed)",
                report.assets,
                report.pages,
                report.failed_pages.len()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

fn print_config_summary(config: &Config, hash: &str) {
    println!("=== Assetgrep Configuration ===\n");

    println!("Source:");
    println!("  Base URL: {}", config.source.base_url);
    println!("  Listing path: {}", config.source.listing_path);
    println!("  Count selector: {}", config.source.count_selector);
    println!(
        "  Retries: {} attempts, base {}ms, growth {}",
        config.source.max_attempts, config.source.base_delay_ms, config.source.growth_factor
    );

    println!("\nUser Agent:");
    println!(
        "  {}/{} (+{}; {})",
        config.user_agent.crawler_name,
        config.user_agent.crawler_version,
        config.user_agent.contact_url,
        config.user_agent.contact_email
    );

    println!("\nCrawler:");
    println!("  Spread divisor: {}", config.crawler.spread_divisor);
    match config.crawler.max_concurrent_fetches {
        0 => println!("  Concurrent fetches: unbounded"),
        n => println!("  Concurrent fetches: {}", n),
    }

    println!("\nCache:");
    println!("  Page size: {}", config.cache.page_size);
    println!("  Lifetime: {}h", config.cache.lifetime_hours);
    let source = match config.cache.index_source {
        IndexSource::Rebuild => "rebuild",
        IndexSource::Archive => "archive",
    };
    println!("  Index source: {} ({})", source, config.cache.index_archive_name);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Scratch dir: {}", config.storage.scratch_dir);

    println!("\nServer:");
    println!("  Bind: {}", config.server.bind);

    println!("\n✓ Configuration is valid (hash: {})", hash);
}
