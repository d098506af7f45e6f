//! Sink traits and error types
//!
//! This module defines the interfaces the harvester needs from durable storage
//! and the associated error types.

use crate::sink::{HarvestRecord, RunRecord, RunStatus, SkipRow};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during sink operations
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Record for '{identifier}' cannot be written in group '{group}'")]
    GroupMismatch { group: String, identifier: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// An append-only table addressable by an identifier column
///
/// Appends must be durable when the call returns.
pub trait TabularSink {
    /// Name of the destination, used in logs and skip records
    fn name(&self) -> &str;

    /// Creates the destination if it does not exist yet
    fn create(&mut self) -> SinkResult<()>;

    /// Removes every row of this destination
    fn truncate(&mut self) -> SinkResult<()>;

    /// Distinct values of the identifier column
    fn read_identifiers(&self) -> SinkResult<HashSet<String>>;

    /// Appends one row
    fn append_row(&mut self, record: &HarvestRecord) -> SinkResult<()>;

    /// Appends several rows atomically: either all of them land or none
    fn append_rows(&mut self, records: &[HarvestRecord]) -> SinkResult<()>;

    /// Stored payloads for one identifier, in write order, markers excluded
    fn read_payloads(&self, identifier: &str) -> SinkResult<Vec<Value>>;

    /// Number of rows, markers included
    fn count_rows(&self) -> SinkResult<u64>;
}

/// Run bookkeeping and database-wide statistics
pub trait RunLog {
    // ===== Run Management =====

    /// Creates a new run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    /// * `resource` - The resource being harvested
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, resource: &str) -> SinkResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> SinkResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> SinkResult<Option<RunRecord>>;

    /// Sets the final status and finish timestamp of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> SinkResult<()>;

    // ===== Skips =====

    /// Records a soft skip for one child item
    fn record_skip(
        &mut self,
        run_id: i64,
        sink: &str,
        identifier: &str,
        reason: &str,
    ) -> SinkResult<()>;

    /// Gets the skips recorded for a run
    fn get_skips(&self, run_id: i64) -> SinkResult<Vec<SkipRow>>;

    // ===== Statistics =====

    /// Names of all sinks that hold at least one row
    fn sink_names(&self) -> SinkResult<Vec<String>>;

    /// Row count of one sink
    fn count_records(&self, sink: &str) -> SinkResult<u64>;

    /// Distinct identifier count of one sink
    fn count_identifiers(&self, sink: &str) -> SinkResult<u64>;
}
