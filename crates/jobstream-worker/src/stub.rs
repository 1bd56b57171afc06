//! Stub worker - deterministic synthetic results without spawning anything.
//!
//! Used when direct execution is disabled (local development, demos, tests
//! of the layers above the orchestrator).

use crate::error::{Error, Result};
use crate::orchestrator::{ExecuteOutcome, SearchRequest, SupervisorHandle};
use crate::protocol::{JobDetails, PageResult, PostingSummary};
use crate::registry::{ProcessRegistry, ProcessState};
use chrono::Utc;
use jobstream_bus::{event_types, EventBus};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Number of pages every synthetic source has
pub const STUB_PAGES: u32 = 5;

/// Synthetic worker.
#[derive(Debug, Clone)]
pub struct StubWorker {
    bus: EventBus,
    registry: ProcessRegistry,
    delay: Duration,
}

impl StubWorker {
    /// Create a stub publishing to `bus`.
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            registry: ProcessRegistry::new(),
            delay: Duration::ZERO,
        }
    }

    /// Pause between synthetic pages.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Registry of in-flight synthetic searches.
    #[must_use]
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Synthetic page: full pages until the last, which is half-size.
    #[must_use]
    pub fn page(source: &str, query: &str, page: u32, page_size: u32) -> PageResult {
        if page == 0 || page > STUB_PAGES {
            return PageResult::empty(page);
        }
        let count = if page == STUB_PAGES {
            (page_size / 2).max(1)
        } else {
            page_size
        };
        let source = if source.trim().is_empty() {
            "stub"
        } else {
            source.trim()
        };

        let items = (0..count)
            .map(|i| {
                let id = format!("{source}-{page}-{i}");
                PostingSummary {
                    url: format!("https://jobs.example.com/{id}"),
                    title: format!("Software Engineer {} [{query}]", i + 1),
                    company: "Acme Corp".to_string(),
                    location: Some("Remote".to_string()),
                    source: source.to_string(),
                    posted_at: Some(Utc::now()),
                    snippet: Some(format!("Great role working on {query}")),
                    id,
                }
            })
            .collect();

        PageResult {
            page,
            has_more: page < STUB_PAGES,
            items,
        }
    }

    /// Synthetic details derived from the URL alone.
    #[must_use]
    pub fn details(url: &str) -> JobDetails {
        let fallback = JobDetails {
            url: url.to_string(),
            title: "Job Posting".to_string(),
            company: "Unknown".to_string(),
            location: None,
            description: None,
            source: None,
            salary: None,
            team: None,
        };
        let Ok(parsed) = Url::parse(url) else {
            return fallback;
        };

        let host = parsed.host_str().unwrap_or_default().to_string();
        let slug = parsed
            .path()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let labels: Vec<&str> = host.split('.').collect();
        let company = if labels.len() >= 2 {
            labels[labels.len() - 2].to_string()
        } else {
            host.clone()
        };

        JobDetails {
            title: if slug.is_empty() {
                fallback.title.clone()
            } else {
                format!("Job: {slug}")
            },
            company: if company.is_empty() {
                fallback.company.clone()
            } else {
                company
            },
            source: (!host.is_empty()).then_some(host),
            ..fallback
        }
    }

    /// Publish a synthetic stream on a background task.
    pub async fn execute(&self, request: SearchRequest) -> Result<ExecuteOutcome> {
        if request.request_id.trim().is_empty() {
            return Err(Error::InvalidRequest("request id is empty".to_string()));
        }
        let Some(slot) = self.registry.reserve(
            &request.request_id,
            "stub".to_string(),
            PathBuf::from("."),
        ) else {
            warn!(request_id = %request.request_id, "Search already in progress for this request id");
            return Ok(ExecuteOutcome::AlreadyRunning);
        };
        slot.set_running(None);
        info!(request_id = %request.request_id, sources = %request.sources, "Starting stub search");

        self.bus.publish(
            &request.channel,
            event_types::CRAWL_START,
            json!({
                "source": request.sources,
                "query": request.keywords,
                "maxPages": request.max_pages,
                "perSourceLimit": request.per_source_limit,
                "timestamp": Utc::now().timestamp_millis(),
            }),
        );

        let bus = self.bus.clone();
        let delay = self.delay;
        let request_id = request.request_id.clone();
        let join = tokio::spawn(async move {
            let cancel = slot.cancelled();
            let pages = request.max_pages.clamp(1, STUB_PAGES);
            for page in 1..=pages {
                if !delay.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                if cancel.is_cancelled() {
                    break;
                }
                let result = Self::page(
                    &request.sources,
                    &request.keywords,
                    page,
                    request.per_source_limit.max(1),
                );
                bus.publish(
                    &request.channel,
                    event_types::PAGE,
                    json!({
                        "type": event_types::PAGE,
                        "page": result.page,
                        "hasMore": result.has_more,
                        "items": result.items,
                    }),
                );
            }

            let state = if cancel.is_cancelled() {
                bus.publish(
                    &request.channel,
                    event_types::ERROR,
                    json!({ "message": "Search operation stopped", "timestamp": Utc::now().timestamp_millis() }),
                );
                ProcessState::Killed
            } else {
                bus.publish(
                    &request.channel,
                    event_types::COMPLETE,
                    json!({ "exitCode": 0, "timestamp": Utc::now().timestamp_millis() }),
                );
                ProcessState::Exited { code: Some(0) }
            };
            slot.set_state(state);
            debug!(request_id = %slot.request_id(), state = %state, "Stub search finished");
            state
        });

        Ok(ExecuteOutcome::Started(SupervisorHandle::new(&request_id, join)))
    }

    /// Synthetic page lookup.
    pub async fn fetch_page(
        &self,
        request_id: &str,
        source: &str,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<PageResult> {
        if request_id.trim().is_empty() {
            return Err(Error::InvalidRequest("request id is empty".to_string()));
        }
        if page_size == 0 {
            return Err(Error::InvalidRequest("page size must be positive".to_string()));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Self::page(source, query, page, page_size))
    }

    /// Synthetic URL parse.
    pub async fn fetch_by_url(&self, url: &str) -> Result<JobDetails> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidRequest("url is empty".to_string()));
        }
        Ok(Self::details(url))
    }

    /// Stop an in-flight synthetic search.
    pub fn stop(&self, request_id: &str) -> bool {
        self.registry.stop(request_id)
    }
}
