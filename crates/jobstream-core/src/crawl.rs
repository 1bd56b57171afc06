//! Paginated accumulation loop.
//!
//! Turns a paged source into a capped result set. `truncated` is true only
//! when the cap was reached while the source still reported more pages.

use crate::error::{Error, Result};
use crate::ports::{CompletionNotifier, PageFetcher, StreamEmitter};
use jobstream_bus::event_types;
use jobstream_worker::PostingSummary;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

/// Default item cap
pub const DEFAULT_MAX_ITEMS: i64 = 200;
/// Default first page
pub const DEFAULT_START_PAGE: i64 = 1;
/// Default page size
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Input of one crawl. Non-positive numbers select the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequest {
    /// Source key
    #[serde(default)]
    pub source: String,
    /// Search query
    #[serde(default)]
    pub query: String,
    /// Item cap
    #[serde(default)]
    pub max_items: i64,
    /// First page to fetch
    #[serde(default)]
    pub start_page: i64,
    /// Items per page
    #[serde(default)]
    pub page_size: i64,
}

/// Normalised crawl parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlParams {
    /// Trimmed source
    pub source: String,
    /// Trimmed query
    pub query: String,
    /// Item cap (> 0)
    pub max_items: usize,
    /// First page (>= 1)
    pub start_page: u32,
    /// Page size (> 0)
    pub page_size: u32,
}

impl CrawlRequest {
    /// Apply defaults and trimming.
    #[must_use]
    pub fn normalized(&self) -> CrawlParams {
        fn positive(value: i64, default: i64) -> i64 {
            if value > 0 {
                value
            } else {
                default
            }
        }
        CrawlParams {
            source: self.source.trim().to_string(),
            query: self.query.trim().to_string(),
            max_items: usize::try_from(positive(self.max_items, DEFAULT_MAX_ITEMS))
                .unwrap_or(usize::MAX),
            start_page: u32::try_from(positive(self.start_page, DEFAULT_START_PAGE))
                .unwrap_or(u32::MAX),
            page_size: u32::try_from(positive(self.page_size, DEFAULT_PAGE_SIZE))
                .unwrap_or(u32::MAX),
        }
    }
}

/// Running state of a crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlAccumulator {
    collected: Vec<PostingSummary>,
    last_page_fetched: u32,
    truncated: bool,
    max_items: usize,
}

impl CrawlAccumulator {
    /// Empty accumulator with the given cap.
    #[must_use]
    pub fn new(max_items: usize) -> Self {
        Self {
            collected: Vec::with_capacity(max_items.min(256)),
            max_items,
            ..Self::default()
        }
    }

    /// Whether the cap has been reached.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.collected.len() >= self.max_items
    }

    /// Items still accepted.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.max_items.saturating_sub(self.collected.len())
    }

    /// Add a page's items in order, up to the cap. Returns the accepted slice.
    pub fn absorb(&mut self, page: u32, items: Vec<PostingSummary>) -> &[PostingSummary] {
        self.last_page_fetched = page;
        let start = self.collected.len();
        let take = items.len().min(self.remaining());
        self.collected.extend(items.into_iter().take(take));
        &self.collected[start..]
    }

    /// Close the crawl given whether the source still had more pages.
    #[must_use]
    pub fn finish(mut self, source_has_more: bool) -> CrawlResult {
        self.truncated = self.is_full() && source_has_more;
        CrawlResult {
            items: self.collected,
            last_page_fetched: self.last_page_fetched,
            truncated: self.truncated,
        }
    }

    /// Items collected so far.
    #[must_use]
    pub fn collected(&self) -> &[PostingSummary] {
        &self.collected
    }

    /// Last page fetched (0 before the first page).
    #[must_use]
    pub fn last_page_fetched(&self) -> u32 {
        self.last_page_fetched
    }
}

/// Output of a crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    /// Collected postings in source order
    pub items: Vec<PostingSummary>,
    /// Last page fetched
    pub last_page_fetched: u32,
    /// Cap reached while the source still had more
    pub truncated: bool,
}

/// Run the accumulation loop for one source.
///
/// Emits `page` after every fetched page and `crawlComplete` at the end,
/// then reports the source as complete. A failed fetch aborts the crawl.
pub async fn run_crawl(
    request_id: &str,
    request: &CrawlRequest,
    fetcher: &dyn PageFetcher,
    emitter: &dyn StreamEmitter,
    notifier: &dyn CompletionNotifier,
) -> Result<CrawlResult> {
    if request_id.trim().is_empty() {
        return Err(Error::InvalidRequest("request id is empty".to_string()));
    }
    let params = request.normalized();
    info!(
        request_id = %request_id,
        source = %params.source,
        query = %params.query,
        max_items = params.max_items,
        page_size = params.page_size,
        "Starting crawl"
    );

    let mut acc = CrawlAccumulator::new(params.max_items);
    let mut page = params.start_page;
    let mut source_has_more = true;

    while source_has_more && !acc.is_full() {
        let batch = fetcher
            .fetch_page(request_id, &params.source, &params.query, page, params.page_size)
            .await
            .map_err(|e| {
                warn!(request_id = %request_id, source = %params.source, page, error = %e, "Page fetch failed");
                Error::PageFetch {
                    source_key: params.source.clone(),
                    page,
                    message: e.to_string(),
                }
            })?;

        source_has_more = batch.has_more;
        let accepted = acc.absorb(page, batch.items).to_vec();
        let continues = source_has_more && !acc.is_full();
        debug!(
            request_id = %request_id,
            page,
            accepted = accepted.len(),
            total = acc.collected().len(),
            has_more = source_has_more,
            "Page absorbed"
        );

        emitter.emit(
            request_id,
            event_types::PAGE,
            json!({
                "kind": "page",
                "source": params.source,
                "query": params.query,
                "page": page,
                "pageSize": params.page_size,
                "hasMore": continues,
                "items": accepted,
            }),
        );

        if !continues {
            break;
        }
        page = page.saturating_add(1);
    }

    let result = acc.finish(source_has_more);
    emitter.emit(
        request_id,
        event_types::CRAWL_COMPLETE,
        json!({
            "kind": "crawlComplete",
            "source": params.source,
            "lastPageFetched": result.last_page_fetched,
            "truncated": result.truncated,
            "totalItems": result.items.len(),
        }),
    );
    info!(
        request_id = %request_id,
        source = %params.source,
        total = result.items.len(),
        last_page = result.last_page_fetched,
        truncated = result.truncated,
        "Crawl complete"
    );

    notifier.source_complete(request_id, &params.source);
    Ok(result)
}

#[cfg(test)]
mod tests;
