//! Worker line protocol (NDJSON over stdout).
//!
//! Every non-blank line is one JSON object with a `type` discriminator.
//! Streaming consumers forward unknown types verbatim; the single-result
//! modes (`page`, `parse`) only look at the line kinds classified here.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::hash::{Hash, Hasher};

/// Terminal success line for single-URL and page modes
pub const TYPE_PARSED: &str = "parsed";
/// Page result line
pub const TYPE_PAGE: &str = "page";
/// Failure line for a single item
pub const TYPE_PARSE_ERROR: &str = "parseError";
/// Failure line
pub const TYPE_ERROR: &str = "error";

/// Informational lines skipped by the single-result modes
pub const INFORMATIONAL_TYPES: &[&str] = &["banner", "start", "source_start"];

/// One decoded stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerLine {
    /// A JSON object; `event_type` is its `type` field or `""`
    Event {
        /// Value of the `type` field
        event_type: String,
        /// The full object
        payload: Value,
    },
    /// Anything that is not a JSON object
    Malformed {
        /// Trimmed line as read
        raw: String,
        /// Parser message
        error: String,
    },
}

/// Decode one line. Blank lines yield `None`.
#[must_use]
pub fn parse_line(line: &str) -> Option<WorkerLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let decoded = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => {
            let event_type = map
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            WorkerLine::Event {
                event_type,
                payload: Value::Object(map),
            }
        }
        Ok(_) => WorkerLine::Malformed {
            raw: line.to_string(),
            error: "expected a JSON object".to_string(),
        },
        Err(e) => WorkerLine::Malformed {
            raw: line.to_string(),
            error: e.to_string(),
        },
    };
    Some(decoded)
}

/// How the single-result modes treat a line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind<'a> {
    /// `banner` / `start` / `source_start`
    Informational,
    /// `parsed` or `page` result
    Result(&'a Value),
    /// `error` / `parseError`, or a line that is not JSON
    Failure(String),
    /// Anything else
    Other,
}

impl WorkerLine {
    /// Classify for single-result consumers.
    #[must_use]
    pub fn kind(&self) -> LineKind<'_> {
        match self {
            Self::Malformed { raw, error } => {
                LineKind::Failure(format!("unparseable worker output ({error}): {raw}"))
            }
            Self::Event {
                event_type,
                payload,
            } => match event_type.as_str() {
                TYPE_PARSED | TYPE_PAGE => LineKind::Result(payload),
                TYPE_PARSE_ERROR | TYPE_ERROR => LineKind::Failure(failure_message(payload)),
                t if INFORMATIONAL_TYPES.contains(&t) => LineKind::Informational,
                _ => LineKind::Other,
            },
        }
    }
}

fn failure_message(payload: &Value) -> String {
    let message = text(payload, "error")
        .or_else(|| text(payload, "message"))
        .unwrap_or_else(|| "Unknown parse error".to_string());
    match text(payload, "url") {
        Some(url) => format!("{message} (url={url})"),
        None => message,
    }
}

/// String field, `None` when absent or null.
fn text(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

/// One job posting in a page. `id` is the sole equality key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingSummary {
    /// Stable identifier (e.g. hash of the URL)
    pub id: String,
    /// Job title
    #[serde(default)]
    pub title: String,
    /// Hiring company
    #[serde(default)]
    pub company: String,
    /// Location text
    #[serde(default)]
    pub location: Option<String>,
    /// Posting URL
    #[serde(default)]
    pub url: String,
    /// Source key (ats / board)
    #[serde(default)]
    pub source: String,
    /// When the posting was published
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    /// Short description
    #[serde(default)]
    pub snippet: Option<String>,
}

impl PartialEq for PostingSummary {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PostingSummary {}

impl Hash for PostingSummary {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// One fetched page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// Page number as reported by the worker
    #[serde(default)]
    pub page: u32,
    /// Whether the source has more pages
    #[serde(default)]
    pub has_more: bool,
    /// Postings in source order
    #[serde(default)]
    pub items: Vec<PostingSummary>,
}

impl PageResult {
    /// Map a `page`/`parsed` payload. `items` must be present.
    pub fn from_payload(payload: &Value, requested_page: u32) -> Result<Self> {
        if payload.get("items").is_none() {
            return Err(Error::Protocol("page result without items".to_string()));
        }
        let mut page: PageResult = serde_json::from_value(payload.clone())
            .map_err(|e| Error::Protocol(format!("invalid page result: {e}")))?;
        if page.page == 0 {
            page.page = requested_page;
        }
        Ok(page)
    }

    /// Empty, exhausted page.
    #[must_use]
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            has_more: false,
            items: Vec::new(),
        }
    }
}

/// Structured details of a single job URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetails {
    /// Posting URL
    pub url: String,
    /// Job title
    pub title: String,
    /// Hiring company
    pub company: String,
    /// Location text
    pub location: Option<String>,
    /// Full description
    pub description: Option<String>,
    /// Source (usually the host name)
    pub source: Option<String>,
    /// Salary text
    pub salary: Option<String>,
    /// Team name
    pub team: Option<String>,
}

impl JobDetails {
    /// Map a `parsed` payload. Missing `url` falls back to the requested one.
    #[must_use]
    pub fn from_parsed(payload: &Value, requested_url: &str) -> Self {
        Self {
            url: text(payload, "url").unwrap_or_else(|| requested_url.to_string()),
            title: text(payload, "title").unwrap_or_default(),
            company: text(payload, "company").unwrap_or_default(),
            location: text(payload, "location"),
            description: text(payload, "description"),
            source: text(payload, "source"),
            salary: text(payload, "salary"),
            team: text(payload, "team"),
        }
    }
}

#[cfg(test)]
mod tests;
