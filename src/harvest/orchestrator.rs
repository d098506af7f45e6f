//! Harvest orchestrator - main harvest logic
//!
//! This module drives one resource through the whole pipeline:
//! - Resolving the resource string to a channel id
//! - Enumerating child ids through the uploads listing
//! - Fetching detail records in batches and partitioning by comment counter
//! - Collecting comments per child, recording soft skips
//! - Honouring the stop signal between items

use crate::client::Executor;
use crate::config::{Config, Endpoints};
use crate::harvest::enumerate::{
    collect_comments, comment_counter, enumerate_children, fetch_details, uploads_listing_id,
    Partition, DETAILS_BATCH_SIZE,
};
use crate::harvest::resolver::{resolve, ResolveStrategy};
use crate::harvest::state::{Phase, PhaseTracker, Stage};
use crate::harvest::summary::{HarvestSummary, SkipRecord};
use crate::harvest::StopSignal;
use crate::sink::{
    HarvestRecord, ResumableWriter, RunLog, RunStatus, TabularSink, CHANNELS, COMMENTS, VIDEOS,
};
use crate::HarvestError;
use std::collections::HashMap;

/// What to harvest and how
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub resource: String,
    pub overwrite: bool,
    pub include_ambiguous: bool,
    pub comments: bool,
    pub strategies: Vec<ResolveStrategy>,
    pub max_comment_pages: Option<usize>,
    pub page_size: u32,
    pub endpoints: Endpoints,
    pub config_hash: String,
}

impl HarvestSettings {
    /// Settings with default behaviour for `resource`
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            overwrite: false,
            include_ambiguous: false,
            comments: true,
            strategies: ResolveStrategy::default_order(),
            max_comment_pages: None,
            page_size: 50,
            endpoints: Endpoints::default(),
            config_hash: String::new(),
        }
    }

    pub fn from_config(config: &Config, config_hash: &str) -> Self {
        Self {
            resource: config.harvest.resource.clone(),
            overwrite: config.harvest.overwrite,
            include_ambiguous: config.harvest.include_ambiguous,
            comments: config.harvest.comments,
            strategies: config.harvest.strategies.clone(),
            max_comment_pages: config.harvest.max_comment_pages,
            page_size: config.api.page_size,
            endpoints: config.api.endpoints.clone(),
            config_hash: config_hash.to_string(),
        }
    }
}

/// Drives one harvest run
pub struct Orchestrator<S: TabularSink, L: RunLog> {
    executor: Executor,
    channels: ResumableWriter<S>,
    videos: ResumableWriter<S>,
    comments: ResumableWriter<S>,
    run_log: L,
    settings: HarvestSettings,
    stop: StopSignal,
    tracker: PhaseTracker,
    summary: HarvestSummary,
}

impl<S: TabularSink, L: RunLog> Orchestrator<S, L> {
    /// Creates an orchestrator and opens the three sinks
    ///
    /// With `settings.overwrite` every sink is truncated here.
    ///
    /// # Arguments
    ///
    /// * `executor` - Executor owning the key pool for the run
    /// * `channels`, `videos`, `comments` - Destinations for each record kind
    /// * `run_log` - Run and skip bookkeeping
    /// * `settings` - What to harvest
    /// * `stop` - Signal checked between items
    pub fn new(
        executor: Executor,
        channels: S,
        videos: S,
        comments: S,
        run_log: L,
        settings: HarvestSettings,
        stop: StopSignal,
    ) -> Result<Self, HarvestError> {
        let overwrite = settings.overwrite;
        if overwrite {
            tracing::info!("Overwrite requested, truncating sinks");
        }

        Ok(Self {
            executor,
            channels: ResumableWriter::open(channels, overwrite)?,
            videos: ResumableWriter::open(videos, overwrite)?,
            comments: ResumableWriter::open(comments, overwrite)?,
            run_log,
            summary: HarvestSummary::new(settings.resource.clone()),
            settings,
            stop,
            tracker: PhaseTracker::new(),
        })
    }

    pub fn run_log(&self) -> &L {
        &self.run_log
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn phase(&self) -> Phase {
        self.tracker.current()
    }

    /// Runs the harvest to completion, interruption or fatal error
    ///
    /// An interrupted run returns `Ok` with `interrupted` set. A fatal error
    /// is returned tagged with the stage it escaped from, after the run has
    /// been marked failed.
    pub async fn run(&mut self) -> Result<HarvestSummary, HarvestError> {
        let run_id = self
            .run_log
            .create_run(&self.settings.config_hash, &self.settings.resource)?;
        self.summary.run_id = Some(run_id);
        tracing::info!("Starting run {} for '{}'", run_id, self.settings.resource);

        let outcome = self.harvest(run_id).await;
        self.summary.stats = self.executor.stats();

        match outcome {
            Ok(()) => {
                self.run_log.finish_run(run_id, RunStatus::Completed)?;
                tracing::info!("Run {} completed: {}", run_id, self.summary.progress());
                Ok(self.summary.clone())
            }
            Err(err) if matches!(err.root(), HarvestError::Cancelled) => {
                if !self.tracker.current().is_terminal() {
                    self.tracker.advance(Phase::Skipped)?;
                }
                self.summary.interrupted = true;
                self.run_log.finish_run(run_id, RunStatus::Interrupted)?;
                tracing::warn!(
                    "Run {} interrupted during {}: {}",
                    run_id,
                    err.stage().map_or("startup".to_string(), |s| s.to_string()),
                    self.summary.progress()
                );
                Ok(self.summary.clone())
            }
            Err(err) => {
                tracing::error!(
                    "Run {} failed in {} stage: {}",
                    run_id,
                    err.stage().map_or("unknown".to_string(), |s| s.to_string()),
                    err.root()
                );
                tracing::error!("Durable progress: {}", self.summary.progress());
                if let Err(log_err) = self.run_log.finish_run(run_id, RunStatus::Failed) {
                    tracing::warn!("Could not mark run {} failed: {}", run_id, log_err);
                }
                Err(err)
            }
        }
    }

    async fn harvest(&mut self, run_id: i64) -> Result<(), HarvestError> {
        self.ensure_running()?;

        let (channel_id, channel_record) = self
            .resolve_stage()
            .await
            .map_err(|e| e.at(Stage::Resolve))?;

        self.ensure_running()?;
        let children = self
            .enumerate_stage(&channel_id, &channel_record)
            .await
            .map_err(|e| e.at(Stage::Enumerate))?;

        self.tracker.advance(Phase::Collecting)?;
        let counters = self
            .details_stage(run_id, &children)
            .await
            .map_err(|e| e.at(Stage::Details))?;

        let partition = Partition::from_counters(counters);
        self.summary.has_data = partition.has_data.len();
        self.summary.empty = partition.empty.len();
        self.summary.ambiguous = partition.ambiguous.len();
        tracing::info!(
            "Partitioned children: {} with comments, {} empty, {} ambiguous",
            partition.has_data.len(),
            partition.empty.len(),
            partition.ambiguous.len()
        );

        if self.settings.comments {
            let targets = partition.selected(self.settings.include_ambiguous);
            self.comments_stage(run_id, &targets)
                .await
                .map_err(|e| e.at(Stage::Comments))?;
        }

        self.tracker.advance(Phase::Done)?;
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), HarvestError> {
        if self.stop.is_stopped() {
            return Err(HarvestError::Cancelled);
        }
        Ok(())
    }

    async fn resolve_stage(&mut self) -> Result<(String, serde_json::Value), HarvestError> {
        let resolved = resolve(
            &mut self.executor,
            &self.settings.endpoints,
            &self.settings.resource,
            &self.settings.strategies,
        )
        .await?;

        self.tracker.advance(Phase::Resolved)?;
        self.summary.channel_id = Some(resolved.channel_id.clone());
        self.summary.strategy = Some(resolved.strategy);

        if !self.channels.already_done(&resolved.channel_id) {
            self.channels.write(HarvestRecord::new(
                resolved.channel_id.clone(),
                resolved.record.clone(),
            ))?;
        }

        Ok((resolved.channel_id, resolved.record))
    }

    async fn enumerate_stage(
        &mut self,
        channel_id: &str,
        channel_record: &serde_json::Value,
    ) -> Result<Vec<String>, HarvestError> {
        let listing_id = uploads_listing_id(channel_record, channel_id).ok_or_else(|| {
            HarvestError::MalformedResponse {
                operation: self.settings.endpoints.channels.clone(),
                reason: format!("no uploads listing for channel {}", channel_id),
            }
        })?;

        let children = enumerate_children(
            &mut self.executor,
            &self.settings.endpoints,
            &listing_id,
            self.settings.page_size,
        )
        .await?;

        self.tracker.advance(Phase::Enumerated)?;
        self.summary.children = children.len();
        Ok(children)
    }

    /// Makes sure every child has a detail record and returns its counter
    ///
    /// Children whose detail lookup failed are skipped and left out of the
    /// result. Children the server omitted get no counter.
    async fn details_stage(
        &mut self,
        run_id: i64,
        children: &[String],
    ) -> Result<Vec<(String, Option<u64>)>, HarvestError> {
        let mut counters: HashMap<String, Option<u64>> = HashMap::new();
        let mut pending = Vec::new();

        for id in children {
            if self.videos.already_done(id) {
                let stored = self.videos.stored_payloads(id)?;
                counters.insert(id.clone(), stored.first().and_then(comment_counter));
                self.summary.details_reused += 1;
            } else {
                pending.push(id.clone());
            }
        }

        tracing::info!(
            "Fetching details for {} children ({} already stored)",
            pending.len(),
            self.summary.details_reused
        );

        let mut failed = Vec::new();
        for batch in pending.chunks(DETAILS_BATCH_SIZE) {
            self.ensure_running()?;

            let records =
                match fetch_details(&mut self.executor, &self.settings.endpoints, batch).await {
                    Ok(records) => records,
                    Err(err) if err.is_fatal_for_child() => return Err(err),
                    Err(err) => {
                        for id in batch {
                            self.soft_skip(run_id, VIDEOS, id, &err)?;
                            failed.push(id.clone());
                        }
                        continue;
                    }
                };

            for record in records {
                let id = match record.get("id").and_then(|v| v.as_str()) {
                    Some(id) => id.to_string(),
                    None => {
                        tracing::warn!("Detail record without id ignored");
                        continue;
                    }
                };
                counters.insert(id.clone(), comment_counter(&record));
                self.videos.write(HarvestRecord::new(id, record))?;
                self.summary.details_written += 1;
            }

            for id in batch {
                if !counters.contains_key(id) {
                    tracing::debug!("No detail record returned for {}", id);
                }
            }
        }

        Ok(children
            .iter()
            .filter(|id| !failed.contains(id))
            .map(|id| (id.clone(), counters.get(id).copied().flatten()))
            .collect())
    }

    async fn comments_stage(&mut self, run_id: i64, targets: &[String]) -> Result<(), HarvestError> {
        tracing::info!("Collecting comments for {} children", targets.len());

        for (index, video_id) in targets.iter().enumerate() {
            self.ensure_running()?;

            if self.comments.already_done(video_id) {
                self.summary.already_done += 1;
                continue;
            }

            let threads = match collect_comments(
                &mut self.executor,
                &self.settings.endpoints,
                video_id,
                self.settings.max_comment_pages,
            )
            .await
            {
                Ok(threads) => threads,
                Err(err) if err.is_fatal_for_child() => return Err(err),
                Err(err) => {
                    self.soft_skip(run_id, COMMENTS, video_id, &err)?;
                    continue;
                }
            };

            if threads.capped {
                self.summary.comments_capped += 1;
                tracing::info!(
                    "Comments for {} capped at {} pages; stored as complete",
                    video_id,
                    self.settings.max_comment_pages.unwrap_or_default()
                );
            }

            let records = threads
                .items
                .into_iter()
                .map(|item| {
                    let item_id = item.get("id").and_then(|v| v.as_str()).map(str::to_string);
                    let record = HarvestRecord::new(video_id.clone(), item);
                    match item_id {
                        Some(item_id) => record.with_item_id(item_id),
                        None => record,
                    }
                })
                .collect();

            let rows = self.comments.write_group(video_id, records)?;
            self.summary.comments_collected += 1;
            self.summary.comment_rows += rows;
            tracing::debug!(
                "Comments for {} written ({} rows, {}/{})",
                video_id,
                rows,
                index + 1,
                targets.len()
            );
        }

        Ok(())
    }

    /// Records a non-fatal per-child failure and moves on
    fn soft_skip(
        &mut self,
        run_id: i64,
        sink: &str,
        identifier: &str,
        err: &HarvestError,
    ) -> Result<(), HarvestError> {
        let reason = match err.root() {
            HarvestError::Rejected { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        let skip = HarvestError::SoftSkip {
            identifier: identifier.to_string(),
            reason: reason.clone(),
        };
        tracing::warn!("{} ({})", skip, sink);

        self.run_log.record_skip(run_id, sink, identifier, &reason)?;
        self.summary.skipped.push(SkipRecord {
            sink: sink.to_string(),
            identifier: identifier.to_string(),
            reason,
        });
        Ok(())
    }
}
