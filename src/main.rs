//! Gallery-Sweep main entry point
//!
//! This is the command-line interface for the Gallery-Sweep crawler.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use gallery_sweep::config::{load_config_with_hash, Config};
use gallery_sweep::crawler::run_crawl;
use gallery_sweep::output::{export_json_array, load_report, print_report, require_checkpoint};
use gallery_sweep::state::CrawlPhase;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Gallery-Sweep: exhaustive crawls of a capped gallery API
///
/// Gallery-Sweep drains a search or feed of the gallery API into a JSON Lines
/// file, splitting the query into time windows whenever the platform would
/// otherwise truncate it. Interrupted crawls resume from their checkpoint.
#[derive(Parser, Debug)]
#[command(name = "gallery-sweep")]
#[command(version = "1.0.0")]
#[command(about = "Exhaustive crawls of a capped gallery API", long_about = None)]
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

    /// Resume an existing crawl; fails when there is no checkpoint to resume
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, discarding previous records and checkpoint
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_json"])]
    dry_run: bool,

    /// Show the report stored in the checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_json"])]
    stats: bool,

    /// Convert the records file into a single JSON array at PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export_json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export_json {
        handle_export_json(&config, path)?;
    } else {
        handle_crawl(&config, cli.resume, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gallery_sweep=info,warn"),
            1 => EnvFilter::new("gallery_sweep=debug,info"),
            2 => EnvFilter::new("gallery_sweep=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let query = config.query.to_query(Utc::now())?;

    println!("=== Gallery-Sweep Dry Run ===\n");

    println!("Query:");
    println!("  {}", query);
    match query.time_window() {
        Some(range) => println!("  Window: {} ({}s)", range, range.duration().num_seconds()),
        None => println!("  Window: unbounded"),
    }
    println!("  Fingerprint: {}", query.fingerprint());

    let crawler = &config.crawler;
    println!("\nCrawler Configuration:");
    println!("  Platform cap: {}", crawler.platform_cap_threshold);
    println!("  Page size: {}", crawler.page_size);
    println!("  Probe page size: {}", crawler.effective_probe_page_size());
    println!(
        "  Minimum window granularity: {}s",
        crawler.min_window_granularity_secs
    );
    println!("  Partition fan-out: {}", crawler.partition_fanout);
    println!(
        "  Max concurrent windows: {}",
        crawler.max_concurrent_windows
    );
    println!(
        "  Rate limit: {} request(s) per {}ms (backoff up to {}ms)",
        crawler.rate_limiter_budget, crawler.rate_limiter_interval_ms, crawler.max_backoff_ms
    );
    println!("  Max retries: {}", crawler.max_retries);
    println!("  Request timeout: {}ms", crawler.request_timeout_ms);
    println!(
        "  On window failure: {}",
        if crawler.abort_on_window_failure {
            "abort"
        } else {
            "skip and continue"
        }
    );

    println!("\nAPI:");
    println!("  Endpoint: {}", config.api.endpoint);
    println!("  Connection field: {}", config.api.connection_field);
    println!(
        "  Auth token: {}",
        if config.api.auth_token.is_some() {
            "set"
        } else {
            "none"
        }
    );

    println!("\nOutput:");
    println!("  Records: {}", config.output.records_path);
    println!("  Checkpoint: {}", config.output.checkpoint_path);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows the report stored in the checkpoint
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Checkpoint: {}\n", config.output.checkpoint_path);

    match load_report(Path::new(&config.output.checkpoint_path))? {
        Some(report) => print_report(&report),
        None => println!("No crawl has been checkpointed yet"),
    }

    Ok(())
}

/// Handles the --export-json mode: writes the records as one JSON array
fn handle_export_json(config: &Config, out_path: &Path) -> anyhow::Result<()> {
    println!("=== Exporting Records ===\n");
    println!("Records: {}", config.output.records_path);
    println!("Output: {}", out_path.display());
    println!();

    let count = export_json_array(Path::new(&config.output.records_path), out_path)
        .with_context(|| format!("failed to export {}", config.output.records_path))?;

    println!("✓ Exported {} records to: {}", count, out_path.display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, resume: bool, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (discarding previous state)");
    } else if resume {
        let stored = require_checkpoint(Path::new(&config.output.checkpoint_path))?;
        tracing::info!(
            "Resuming crawl from {} ({} records so far)",
            config.output.checkpoint_path,
            stored.total_emitted
        );
    } else {
        tracing::info!("Starting crawl (will resume if a checkpoint exists)");
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            signal_token.cancel();
        }
    });

    let report = match run_crawl(config, fresh, shutdown).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    print_report(&report);

    if report.phase == CrawlPhase::Failed {
        bail!("crawl aborted after a window failure");
    }

    Ok(())
}
