//! Sink module for persisting harvest results
//!
//! This module handles all durable state for the harvester, including:
//! - SQLite database initialization and schema management
//! - Row-by-row appends of harvested records
//! - Completion ledgers derived from already-written identifiers
//! - Run tracking and soft-skip bookkeeping

mod schema;
mod sqlite;
mod traits;
mod writer;

pub use sqlite::{open_connection, SqliteRunLog, SqliteSink};
pub use traits::{RunLog, SinkError, SinkResult, TabularSink};
pub use writer::ResumableWriter;

use serde_json::Value;

/// Sink holding resolved channel records
pub const CHANNELS: &str = "channels";

/// Sink holding per-video detail records
pub const VIDEOS: &str = "videos";

/// Sink holding comment threads, grouped by video
pub const COMMENTS: &str = "comments";

/// One row headed for a sink
///
/// `identifier` is the ledger key. `payload` is stored as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestRecord {
    pub identifier: String,
    pub item_id: Option<String>,
    pub payload: Value,
}

impl HarvestRecord {
    pub fn new(identifier: impl Into<String>, payload: Value) -> Self {
        Self {
            identifier: identifier.into(),
            item_id: None,
            payload,
        }
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    /// Placeholder row that marks an item complete without any data
    pub fn marker(identifier: impl Into<String>) -> Self {
        Self::new(identifier, Value::Null)
    }

    pub fn is_marker(&self) -> bool {
        self.payload.is_null()
    }
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub resource: String,
    pub status: RunStatus,
}

/// A child item skipped during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRow {
    pub run_id: i64,
    pub sink: String,
    pub identifier: String,
    pub reason: String,
    pub skipped_at: String,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_marker_record() {
        let marker = HarvestRecord::marker("vid1");
        assert!(marker.is_marker());
        assert!(!HarvestRecord::new("vid1", serde_json::json!({})).is_marker());
    }
}
