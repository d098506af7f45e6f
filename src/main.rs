//! Quota-Harvester main entry point
//!
//! This is the command-line interface for the quota-harvester.

use anyhow::Context;
use clap::Parser;
use quota_harvester::config::{load_config_with_hash, Config};
use quota_harvester::harvest::{run_harvest, StopSignal};
use quota_harvester::output::{load_statistics, print_statistics, print_summary};
use quota_harvester::sink::SqliteRunLog;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Quota-Harvester: a resilient multi-key API harvester
///
/// Quota-Harvester resolves a channel, lists its uploads, and collects video
/// details and comments into SQLite. Calls rotate across API keys when quota
/// runs out, and an interrupted run resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "quota-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A resilient multi-key API harvester", long_about = None)]
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

    /// Resource to harvest, overriding the config file
    #[arg(long)]
    resource: Option<String>,

    /// Discard previously harvested data and collect everything again
    #[arg(long)]
    fresh: bool,

    /// Also collect children whose comment counter is missing
    #[arg(long)]
    include_ambiguous: bool,

    /// Stop after video details; do not collect comments
    #[arg(long)]
    no_comments: bool,

    /// Stop cleanly after this many seconds
    #[arg(long, value_name = "SECS")]
    deadline_secs: Option<u64>,

    /// Validate config and show what would be harvested without calling the API
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::from(1);
        }
    };

    apply_overrides(&mut config, &cli);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
        ExitCode::SUCCESS
    } else if cli.stats {
        match handle_stats(&config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("{:#}", e);
                ExitCode::from(1)
            }
        }
    } else {
        handle_harvest(&config, &config_hash, cli.deadline_secs).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quota_harvester=info,warn"),
            1 => EnvFilter::new("quota_harvester=debug,info"),
            2 => EnvFilter::new("quota_harvester=trace,debug"),
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

/// Applies command-line flags on top of the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(resource) = cli.resource.as_deref().map(str::trim) {
        if resource.is_empty() {
            tracing::warn!("Ignoring empty --resource override");
        } else {
            config.harvest.resource = resource.to_string();
        }
    }
    if cli.fresh {
        config.harvest.overwrite = true;
    }
    if cli.include_ambiguous {
        config.harvest.include_ambiguous = true;
    }
    if cli.no_comments {
        config.harvest.comments = false;
    }
}

/// Handles the --dry-run mode: shows what would be harvested
fn handle_dry_run(config: &Config) {
    println!("=== Quota-Harvester Dry Run ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Key parameter: {}", config.api.key_param);
    println!("  Timeout: {}s", config.api.timeout_secs);
    println!("  Page size: {}", config.api.page_size);

    println!("\nRetry:");
    println!("  Base delay: {}ms", config.retry.base_delay_ms);
    println!("  Max delay: {}ms", config.retry.max_delay_ms);
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Jitter: {:.0}%", config.retry.jitter * 100.0);
    match config.retry.quota_cooldown_secs {
        Some(secs) => println!("  Quota cooldown: {}s", secs),
        None => println!("  Quota cooldown: until end of run"),
    }

    println!("\nKeys ({}):", config.keys.len());
    for key in &config.keys {
        println!("  - {} (token redacted)", key.label);
    }

    println!("\nHarvest:");
    println!("  Resource: {}", config.harvest.resource);
    let strategies: Vec<&str> = config.harvest.strategies.iter().map(|s| s.name()).collect();
    println!("  Strategies: {}", strategies.join(" -> "));
    println!("  Overwrite: {}", config.harvest.overwrite);
    println!("  Comments: {}", config.harvest.comments);
    println!("  Include ambiguous: {}", config.harvest.include_ambiguous);
    if let Some(pages) = config.harvest.max_comment_pages {
        println!("  Max comment pages: {}", pages);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let log = SqliteRunLog::open(Path::new(&config.output.database_path))
        .with_context(|| format!("opening {}", config.output.database_path))?;
    let stats = load_statistics(&log).context("loading statistics")?;

    print_statistics(&stats);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, config_hash: &str, deadline_secs: Option<u64>) -> ExitCode {
    if config.harvest.overwrite {
        tracing::info!("Starting fresh harvest (previous data will be discarded)");
    } else {
        tracing::info!("Starting harvest (completed items will be skipped)");
    }

    let mut stop = StopSignal::new();
    if let Some(secs) = deadline_secs {
        tracing::info!("Harvest will stop after {}s", secs);
        stop = stop.with_deadline(Duration::from_secs(secs));
    }

    let handle = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current item");
            handle.stop();
        }
    });

    match run_harvest(config, config_hash, stop).await {
        Ok(summary) => {
            print_summary(&summary);
            if summary.interrupted {
                ExitCode::from(130)
            } else {
                tracing::info!("Harvest completed successfully");
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
