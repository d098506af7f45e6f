//! Child enumeration, detail lookup and comment collection
//!
//! Thin wrappers that turn the paginated collector and the executor into the
//! three listings the harvest needs, plus the counter-based partition of
//! children.

use crate::client::{Executor, Operation};
use crate::collector::{lookup, lookup_str, ItemsAndCursor, PageExtractor, Paginator};
use crate::config::Endpoints;
use crate::HarvestError;
use serde_json::Value;
use std::collections::HashSet;

/// Most ids a single detail lookup accepts
pub const DETAILS_BATCH_SIZE: usize = 50;

/// Largest page the comment listing serves
const COMMENT_PAGE_SIZE: u32 = 100;

/// Id of the listing that holds every upload of a channel
///
/// Taken from the channel record when present. Otherwise derived from the
/// channel id, whose `UC` prefix maps to `UU` for the uploads listing.
pub fn uploads_listing_id(channel_record: &Value, channel_id: &str) -> Option<String> {
    if let Some(id) = lookup_str(channel_record, "contentDetails.relatedPlaylists.uploads") {
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    channel_id
        .strip_prefix("UC")
        .map(|rest| format!("UU{}", rest))
}

/// Child id of one listing item
fn child_id(item: &Value) -> Option<&str> {
    lookup_str(item, "contentDetails.videoId")
        .or_else(|| lookup_str(item, "snippet.resourceId.videoId"))
}

/// Lists every child id under `listing_id`, in server order, without duplicates
pub async fn enumerate_children(
    executor: &mut Executor,
    endpoints: &Endpoints,
    listing_id: &str,
    page_size: u32,
) -> Result<Vec<String>, HarvestError> {
    let template = Operation::new(&endpoints.playlist_items)
        .param("part", "contentDetails")
        .param("playlistId", listing_id)
        .param("maxResults", page_size.to_string());

    let mut paginator = Paginator::new(executor, template, ItemsAndCursor::default())
        .with_cursor_param(&endpoints.cursor_param);

    let mut seen = HashSet::new();
    let mut children = Vec::new();
    let mut unusable = 0usize;

    while let Some(item) = paginator.next_item().await? {
        match child_id(&item) {
            Some(id) => {
                if seen.insert(id.to_string()) {
                    children.push(id.to_string());
                }
            }
            None => unusable += 1,
        }
    }

    if unusable > 0 {
        tracing::warn!("{} listing items carried no child id", unusable);
    }
    tracing::info!(
        "Enumerated {} children of {} over {} pages",
        children.len(),
        listing_id,
        paginator.pages_fetched()
    );

    Ok(children)
}

/// Fetches detail records for up to `DETAILS_BATCH_SIZE` ids in one call
///
/// Ids the server does not know are simply absent from the result.
pub async fn fetch_details(
    executor: &mut Executor,
    endpoints: &Endpoints,
    ids: &[String],
) -> Result<Vec<Value>, HarvestError> {
    let operation = Operation::new(&endpoints.videos)
        .param("part", "snippet,contentDetails,statistics")
        .param("id", ids.join(","))
        .param("maxResults", ids.len().to_string());

    let response = executor.execute(&operation).await?;
    let page = ItemsAndCursor::default()
        .extract(&response)
        .map_err(|reason| HarvestError::MalformedResponse {
            operation: operation.to_string(),
            reason,
        })?;

    Ok(page.items)
}

/// Comment threads collected for one child
#[derive(Debug, Clone, PartialEq)]
pub struct CommentThreads {
    pub items: Vec<Value>,
    /// The page limit ended collection while more pages remained
    pub capped: bool,
}

/// Collects the top-level comment threads of one child
///
/// With `max_pages` set, at most that many pages are fetched and the result
/// is marked `capped` when the listing had more.
pub async fn collect_comments(
    executor: &mut Executor,
    endpoints: &Endpoints,
    video_id: &str,
    max_pages: Option<usize>,
) -> Result<CommentThreads, HarvestError> {
    let template = Operation::new(&endpoints.comment_threads)
        .param("part", "snippet,replies")
        .param("videoId", video_id)
        .param("maxResults", COMMENT_PAGE_SIZE.to_string())
        .param("textFormat", "plainText");

    let mut paginator = Paginator::new(executor, template, ItemsAndCursor::default())
        .with_cursor_param(&endpoints.cursor_param)
        .with_max_pages(max_pages);

    let mut items = Vec::new();
    while let Some(page) = paginator.next_page().await? {
        items.extend(page);
    }

    Ok(CommentThreads {
        items,
        capped: paginator.is_capped(),
    })
}

/// Server-reported comment count of a detail record
///
/// The API reports counters as decimal strings; plain numbers are accepted
/// too. Returns `None` when the counter is missing or unparseable.
pub fn comment_counter(record: &Value) -> Option<u64> {
    match lookup(record, "statistics.commentCount")? {
        Value::String(text) => text.trim().parse().ok(),
        Value::Number(number) => number.as_u64(),
        _ => None,
    }
}

/// Children split by their comment counter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Counter above zero
    pub has_data: Vec<String>,

    /// Counter exactly zero
    pub empty: Vec<String>,

    /// Counter missing or unparseable
    pub ambiguous: Vec<String>,
}

impl Partition {
    /// Buckets `(child id, counter)` pairs, keeping input order per bucket
    pub fn from_counters<I>(counters: I) -> Self
    where
        I: IntoIterator<Item = (String, Option<u64>)>,
    {
        let mut partition = Self::default();
        for (id, counter) in counters {
            match counter {
                Some(0) => partition.empty.push(id),
                Some(_) => partition.has_data.push(id),
                None => partition.ambiguous.push(id),
            }
        }
        partition
    }

    /// Children whose comments should be collected
    pub fn selected(&self, include_ambiguous: bool) -> Vec<String> {
        let mut selected = self.has_data.clone();
        if include_ambiguous {
            selected.extend(self.ambiguous.iter().cloned());
        }
        selected
    }
}
