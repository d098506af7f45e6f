use crate::client::ExecutorStats;
use crate::harvest::ResolveStrategy;

/// A child item that was skipped without aborting the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRecord {
    pub sink: String,
    pub identifier: String,
    pub reason: String,
}

/// What one harvest run did
#[derive(Debug, Clone, Default)]
pub struct HarvestSummary {
    pub run_id: Option<i64>,
    pub resource: String,
    pub channel_id: Option<String>,
    pub strategy: Option<ResolveStrategy>,

    // ===== Enumeration =====
    pub children: usize,
    pub details_written: usize,
    pub details_reused: usize,

    // ===== Partition =====
    pub has_data: usize,
    pub empty: usize,
    pub ambiguous: usize,

    // ===== Comments =====
    /// Children whose comments were written in this run
    pub comments_collected: usize,
    /// Comment rows written in this run
    pub comment_rows: usize,
    /// Children whose comments stopped at the page limit
    pub comments_capped: usize,
    /// Children skipped because an earlier run already collected them
    pub already_done: usize,

    pub skipped: Vec<SkipRecord>,
    pub interrupted: bool,
    pub stats: ExecutorStats,
}

impl HarvestSummary {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Self::default()
        }
    }

    /// One-line description of durable progress, for logs
    pub fn progress(&self) -> String {
        format!(
            "{} children, {} detail records written, {} comment groups written ({} rows), {} skipped",
            self.children,
            self.details_written,
            self.comments_collected,
            self.comment_rows,
            self.skipped.len()
        )
    }
}
