//! Quota-Harvester: a resilient multi-key API harvester
//!
//! This crate harvests paginated, quota-limited data (channel metadata, video
//! listings, comments) from a remote JSON API. Calls rotate across several API
//! keys when quota runs out, retry transient failures with jittered backoff, and
//! stream results into a SQLite sink so an interrupted run can resume without
//! re-fetching completed work.

pub mod client;
pub mod collector;
pub mod config;
pub mod harvest;
pub mod keys;
pub mod output;
pub mod sink;

use thiserror::Error;

pub use client::RejectKind;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("All {keys} API keys are exhausted")]
    QuotaExhausted { keys: usize },

    #[error("Request {operation} failed after {attempts} attempts: {reason}")]
    RequestFailed {
        operation: String,
        reason: String,
        attempts: u32,
    },

    #[error("Request {operation} rejected ({kind}): {reason}")]
    Rejected {
        operation: String,
        kind: RejectKind,
        reason: String,
    },

    #[error("Malformed response for {operation}: {reason}")]
    MalformedResponse { operation: String, reason: String },

    #[error("Pagination error for {operation}: cursor '{cursor}' was issued twice")]
    PaginationError { operation: String, cursor: String },

    #[error("Resource '{resource}' not found (tried: {tried})")]
    NotFound { resource: String, tried: String },

    #[error("Skipped {identifier}: {reason}")]
    SoftSkip { identifier: String, reason: String },

    #[error("Harvest cancelled")]
    Cancelled,

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: harvest::Phase,
        to: harvest::Phase,
    },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: harvest::Stage,
        #[source]
        source: Box<HarvestError>,
    },

    #[error("Sink error: {0}")]
    Sink(#[from] sink::SinkError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns the innermost error, looking through stage wrappers
    pub fn root(&self) -> &HarvestError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Tags the error with the harvest stage it escaped from
    ///
    /// Errors that already carry a stage keep the original one.
    pub fn at(self, stage: harvest::Stage) -> Self {
        match self {
            staged @ Self::Stage { .. } => staged,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Returns the stage this error was tagged with, if any
    pub fn stage(&self) -> Option<harvest::Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Returns true if this error must abort the whole run when it happens
    /// while collecting a single child item.
    ///
    /// Everything else is recorded as a soft skip and the run moves on.
    pub fn is_fatal_for_child(&self) -> bool {
        match self.root() {
            Self::QuotaExhausted { .. }
            | Self::Cancelled
            | Self::Config(_)
            | Self::Sink(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::InvalidTransition { .. } => true,
            Self::RequestFailed { .. }
            | Self::Rejected { .. }
            | Self::MalformedResponse { .. }
            | Self::PaginationError { .. }
            | Self::NotFound { .. }
            | Self::SoftSkip { .. }
            | Self::Reqwest(_)
            | Self::Json(_)
            | Self::Stage { .. } => false,
        }
    }

    /// Process exit status for a run that ended with this error
    pub fn exit_code(&self) -> u8 {
        match self.root() {
            Self::QuotaExhausted { .. } => 2,
            Self::NotFound { .. } => 3,
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use client::{Executor, Operation};
pub use collector::{Cursor, Paginator};
pub use config::Config;
pub use harvest::{HarvestSummary, Orchestrator, StopSignal};
pub use keys::{Credential, KeyPool};
pub use sink::{HarvestRecord, ResumableWriter};
