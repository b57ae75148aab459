//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest ingester.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::output::{self, load_statistics, print_run_summary, print_statistics};
use catalog_harvest::query::run_query;
use catalog_harvest::state::{CheckpointStore, JsonCheckpointStore};
use catalog_harvest::storage::{SqliteStorage, Storage};
use catalog_harvest::{Controller, RunSummary};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a resumable two-provider catalog ingester
///
/// Walks the master list, pulls ownership statistics and store details for
/// each item under a daily store request budget, and merges the results
/// into SQLite. Runs resume from the saved checkpoint.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable two-provider catalog ingester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discard the checkpoint and start from the top of the master list
    #[arg(long)]
    fresh: bool,

    /// Fetch the master list again even if a cached copy exists
    #[arg(long)]
    refresh_master_list: bool,

    /// Validate config and show what a run would do without fetching anything
    #[arg(long, group = "mode")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, group = "mode")]
    stats: bool,

    /// Re-run ingestion for every recorded failure
    #[arg(long, group = "mode")]
    repair: bool,

    /// Remove relation rows that point at missing items or lookups
    #[arg(long, group = "mode")]
    prune: bool,

    /// Write the failure and ineligible logs as JSON into DIR
    #[arg(long, value_name = "DIR", group = "mode")]
    freeze: Option<PathBuf>,

    /// Restore the failure and ineligible logs from JSON in DIR
    #[arg(long, value_name = "DIR", group = "mode")]
    thaw: Option<PathBuf>,

    /// Query merged items, e.g. "tags=1,2&order_by=rating:desc&limit=5"
    #[arg(long, value_name = "QUERY", group = "mode")]
    query: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.prune {
        handle_prune(&config)?;
    } else if let Some(dir) = &cli.freeze {
        let storage = open_storage(&config)?;
        let counts = output::freeze(&storage, dir)?;
        println!(
            "✓ Froze {} failed requests and {} ineligible ids into {}",
            counts.failed_requests,
            counts.ineligible,
            dir.display()
        );
    } else if let Some(dir) = &cli.thaw {
        let mut storage = open_storage(&config)?;
        let counts = output::thaw(&mut storage, dir)?;
        println!(
            "✓ Thawed {} failed requests and {} ineligible ids from {}",
            counts.failed_requests,
            counts.ineligible,
            dir.display()
        );
    } else if let Some(query) = &cli.query {
        handle_query(&config, query)?;
    } else {
        handle_ingest(config, config_hash, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
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

fn open_storage(config: &Config) -> anyhow::Result<SqliteStorage> {
    SqliteStorage::new(Path::new(&config.output.database_path))
        .with_context(|| format!("opening database {}", config.output.database_path))
}

/// Handles the --dry-run mode: validates config and shows where a run would start
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Providers:");
    println!("  Master list: {}", config.providers.master_list_url);
    println!("  Stats: {}", config.providers.stats_url);
    println!("  Store: {}", config.providers.store_url);

    println!("\nIngest:");
    println!("  Store request budget: {}", config.ingest.store_request_budget);
    println!("  Owner ceiling: {}", config.ingest.owner_ceiling);
    println!("  Checkpoint interval: {}", config.ingest.checkpoint_interval);
    println!("  Expected type: {}", config.ingest.expected_type);

    println!("\nFetch:");
    println!("  Request delay: {}ms", config.fetch.request_delay_ms);
    println!(
        "  Timeout: {}ms x {} attempts",
        config.fetch.timeout_ms, config.fetch.timeout_attempts
    );
    println!(
        "  Rate limit cooldown: {}ms x {} attempts",
        config.fetch.rate_limit_cooldown_ms, config.fetch.rate_limit_attempts
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.client_name);
    println!("  Version: {}", config.user_agent.client_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Checkpoint: {}", config.output.checkpoint_path);
    if !config.output.diagnostic_log_path.is_empty() {
        println!("  Diagnostic log: {}", config.output.diagnostic_log_path);
    }

    let checkpoint = JsonCheckpointStore::new(&config.output.checkpoint_path).load()?;
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would resume at master list index {} with {} store requests already used",
        checkpoint.last_processed_index, checkpoint.store_request_count
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(config)?;
    let checkpoint = JsonCheckpointStore::new(&config.output.checkpoint_path).load()?;
    let stats = load_statistics(&storage, checkpoint)?;
    print_statistics(&stats);

    Ok(())
}

fn handle_prune(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;
    let removed = storage.prune_orphan_relations()?;
    println!("✓ Removed {} orphaned relation rows", removed);
    Ok(())
}

fn handle_query(config: &Config, query: &str) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let items = run_query(&storage, query)?;
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}

/// Handles the ingestion run and the repair pass
async fn handle_ingest(config: Config, config_hash: String, cli: &Cli) -> anyhow::Result<()> {
    if cli.fresh {
        tracing::info!("Starting fresh (discarding checkpoint)");
        JsonCheckpointStore::new(&config.output.checkpoint_path).remove()?;
    }

    let mut controller =
        Controller::open(config, config_hash)?.with_refresh_master_list(cli.refresh_master_list);

    let (label, result) = if cli.repair {
        ("Repair Summary", controller.repair_until(shutdown_signal()).await)
    } else {
        ("Run Summary", controller.run_until(shutdown_signal()).await)
    };

    match result {
        Ok(summary) => {
            report(label, &summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Ingestion failed: {}", e);
            Err(e.into())
        }
    }
}

fn report(label: &str, summary: &RunSummary) {
    tracing::info!("Run stopped: {}", summary.stop_reason);
    print_run_summary(label, summary);
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested, abandoning current item; it will be retried");
}
