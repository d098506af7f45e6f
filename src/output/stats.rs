//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the run log.

use crate::harvest::HarvestSummary;
use crate::sink::{RunLog, RunRecord, SinkResult, SkipRow};

/// Row counts of one sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkCounts {
    pub name: String,
    /// Rows, markers included
    pub rows: u64,
    /// Distinct identifiers, i.e. the size of the completion ledger
    pub identifiers: u64,
}

/// Database-wide harvest statistics
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    pub sinks: Vec<SinkCounts>,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Skips recorded by the most recent run
    pub skips: Vec<SkipRow>,
}

/// Loads statistics from the run log
///
/// # Arguments
///
/// * `log` - The run log to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(SinkError)` - Failed to query statistics
pub fn load_statistics(log: &dyn RunLog) -> SinkResult<HarvestStatistics> {
    let sinks = log
        .sink_names()?
        .into_iter()
        .map(|name| {
            Ok(SinkCounts {
                rows: log.count_records(&name)?,
                identifiers: log.count_identifiers(&name)?,
                name,
            })
        })
        .collect::<SinkResult<Vec<_>>>()?;

    let latest_run = log.get_latest_run()?;
    let skips = match &latest_run {
        Some(run) => log.get_skips(run.id)?,
        None => Vec::new(),
    };

    Ok(HarvestStatistics {
        sinks,
        latest_run,
        skips,
    })
}

/// Seconds between two RFC 3339 timestamps
fn duration_seconds(started_at: &str, finished_at: Option<&str>) -> Option<i64> {
    let started = chrono::DateTime::parse_from_rfc3339(started_at).ok()?;
    let finished = chrono::DateTime::parse_from_rfc3339(finished_at?).ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Sinks:");
    if stats.sinks.is_empty() {
        println!("  (empty)");
    }
    for sink in &stats.sinks {
        println!(
            "  {}: {} rows, {} identifiers",
            sink.name, sink.rows, sink.identifiers
        );
    }
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Resource: {}", run.resource);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            if let Some(seconds) = duration_seconds(&run.started_at, run.finished_at.as_deref()) {
                println!("  Duration: {}s", seconds);
            }
            println!("  Config hash: {}", run.config_hash);
            println!();
        }
        None => println!("No runs recorded\n"),
    }

    if !stats.skips.is_empty() {
        println!("Skipped Items ({}):", stats.skips.len());
        for skip in &stats.skips {
            println!("  - [{}] {}: {}", skip.sink, skip.identifier, skip.reason);
        }
    }
}

/// Prints the summary of a finished run
pub fn print_summary(summary: &HarvestSummary) {
    println!("\n=== Harvest Summary ===");
    println!("Resource: {}", summary.resource);
    if let (Some(channel_id), Some(strategy)) = (&summary.channel_id, &summary.strategy) {
        println!("Channel: {} (resolved via {})", channel_id, strategy);
    }
    println!("Children: {}", summary.children);
    println!(
        "Details: {} written, {} reused",
        summary.details_written, summary.details_reused
    );
    println!(
        "Partition: {} with comments, {} empty, {} ambiguous",
        summary.has_data, summary.empty, summary.ambiguous
    );
    println!(
        "Comments: {} children collected ({} rows), {} already done",
        summary.comments_collected, summary.comment_rows, summary.already_done
    );
    if summary.comments_capped > 0 {
        println!(
            "Comment page limit reached for {} children",
            summary.comments_capped
        );
    }
    println!(
        "Requests: {} calls, {} retries, {} key rotations",
        summary.stats.calls, summary.stats.retries, summary.stats.rotations
    );

    if !summary.skipped.is_empty() {
        println!("Skipped ({}):", summary.skipped.len());
        for skip in &summary.skipped {
            println!("  - [{}] {}: {}", skip.sink, skip.identifier, skip.reason);
        }
    }

    if summary.interrupted {
        println!("Run interrupted; rerun to resume");
    }
}
