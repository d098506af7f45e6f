//! Harvest module - resource-level orchestration
//!
//! This module ties the key pool, executor, collector and sinks together:
//! - Resolving a resource string to a channel id
//! - Enumerating and partitioning child items
//! - Collecting per-child data with soft skips
//! - Run bookkeeping and cooperative cancellation

mod cancel;
mod enumerate;
mod orchestrator;
mod resolver;
mod state;
mod summary;

pub use cancel::StopSignal;
pub use enumerate::{
    collect_comments, comment_counter, enumerate_children, fetch_details, uploads_listing_id,
    CommentThreads, Partition, DETAILS_BATCH_SIZE,
};
pub use orchestrator::{HarvestSettings, Orchestrator};
pub use resolver::{resolve, ResolveStrategy, Resolved};
pub use state::{Phase, PhaseTracker, Stage};
pub use summary::{HarvestSummary, SkipRecord};

use crate::client::{BackoffPolicy, DataSource, Executor, HttpSource};
use crate::config::Config;
use crate::keys::KeyPool;
use crate::sink::{SqliteRunLog, SqliteSink, CHANNELS, COMMENTS, VIDEOS};
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Builds the executor described by `config`, using `source` for calls
pub fn build_executor(config: &Config, source: Arc<dyn DataSource>) -> Executor {
    Executor::new(
        KeyPool::from_config(&config.keys),
        source,
        BackoffPolicy::from_config(&config.retry),
    )
    .with_default_cooldown(config.retry.quota_cooldown_secs.map(Duration::from_secs))
}

/// Runs a complete harvest over HTTP into the configured SQLite database
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `config_hash` - Hash of the configuration file, recorded with the run
/// * `stop` - Signal that interrupts the run between items
pub async fn run_harvest(
    config: &Config,
    config_hash: &str,
    stop: StopSignal,
) -> Result<HarvestSummary, HarvestError> {
    let source: Arc<dyn DataSource> = Arc::new(HttpSource::from_config(&config.api)?);
    let executor = build_executor(config, source);

    let db_path = Path::new(&config.output.database_path);
    tracing::info!(
        "Harvesting '{}' with {} keys into {}",
        config.harvest.resource,
        config.keys.len(),
        db_path.display()
    );

    let mut orchestrator = Orchestrator::new(
        executor,
        SqliteSink::open(db_path, CHANNELS)?,
        SqliteSink::open(db_path, VIDEOS)?,
        SqliteSink::open(db_path, COMMENTS)?,
        SqliteRunLog::open(db_path)?,
        HarvestSettings::from_config(config, config_hash),
        stop,
    )?;

    orchestrator.run().await
}
