use crate::client::{Executor, Operation};
use crate::collector::{Cursor, PageExtractor};
use crate::HarvestError;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};

/// Lazy, finite walk over a cursor-paginated endpoint
///
/// Each page is fetched only when the caller asks for more items. The walk
/// ends when the server returns no cursor. A page with zero items but a valid
/// cursor does not end it, since some APIs return sparse pages. A paginator
/// cannot be restarted; resumption across runs goes through the sink ledger.
pub struct Paginator<'a, E> {
    executor: &'a mut Executor,
    template: Operation,
    extractor: E,
    cursor_param: String,
    next_cursor: Option<String>,
    seen_cursors: HashSet<String>,
    buffer: VecDeque<Value>,
    pages_fetched: usize,
    max_pages: Option<usize>,
    capped: bool,
    finished: bool,
}

impl<'a, E: PageExtractor> Paginator<'a, E> {
    /// Creates a paginator that sends the cursor as `pageToken`
    pub fn new(executor: &'a mut Executor, template: Operation, extractor: E) -> Self {
        Self {
            executor,
            template,
            extractor,
            cursor_param: "pageToken".to_string(),
            next_cursor: None,
            seen_cursors: HashSet::new(),
            buffer: VecDeque::new(),
            pages_fetched: 0,
            max_pages: None,
            capped: false,
            finished: false,
        }
    }

    /// Overrides the query parameter that carries the cursor
    pub fn with_cursor_param(mut self, param: impl Into<String>) -> Self {
        self.cursor_param = param.into();
        self
    }

    /// Stops after this many pages even if the server offers more
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Returns true if the page limit stopped the walk while the server still
    /// offered a cursor
    pub fn is_capped(&self) -> bool {
        self.capped
    }

    /// Returns true once no further page will be requested
    pub fn is_finished(&self) -> bool {
        self.finished && self.buffer.is_empty()
    }

    /// Fetches the next page
    ///
    /// # Returns
    ///
    /// * `Ok(Some(items))` - Items of the next page, possibly empty
    /// * `Ok(None)` - The walk is over
    /// * `Err(HarvestError::MalformedResponse)` - The page did not parse
    /// * `Err(HarvestError::PaginationError)` - The server repeated a cursor
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>, HarvestError> {
        if !self.buffer.is_empty() {
            return Ok(Some(self.buffer.drain(..).collect()));
        }

        if self.finished {
            return Ok(None);
        }

        if let Some(max_pages) = self.max_pages {
            if self.pages_fetched >= max_pages {
                tracing::info!(
                    "Stopping {} after {} pages (page limit)",
                    self.template,
                    self.pages_fetched
                );
                self.capped = true;
                self.finished = true;
                return Ok(None);
            }
        }

        let operation = match &self.next_cursor {
            Some(cursor) => self.template.with_param(&self.cursor_param, cursor),
            None => self.template.clone(),
        };

        let response = self.executor.execute(&operation).await?;
        let page = self
            .extractor
            .extract(&response)
            .map_err(|reason| HarvestError::MalformedResponse {
                operation: operation.to_string(),
                reason,
            })?;

        self.pages_fetched += 1;
        tracing::debug!(
            "Page {} of {}: {} items",
            self.pages_fetched,
            self.template,
            page.items.len()
        );

        match page.next {
            Cursor::End => self.finished = true,
            Cursor::Next(cursor) => {
                if !self.seen_cursors.insert(cursor.clone()) {
                    self.finished = true;
                    return Err(HarvestError::PaginationError {
                        operation: self.template.to_string(),
                        cursor,
                    });
                }
                self.next_cursor = Some(cursor);
            }
        }

        Ok(Some(page.items))
    }

    /// Returns the next item, fetching pages as needed
    pub async fn next_item(&mut self) -> Result<Option<Value>, HarvestError> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }

            match self.next_page().await? {
                Some(items) => self.buffer.extend(items),
                None => return Ok(None),
            }
        }
    }

    /// Drains the walk into a vector
    pub async fn collect_all(mut self) -> Result<Vec<Value>, HarvestError> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }
}
