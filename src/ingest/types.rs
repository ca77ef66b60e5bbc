// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Raw entry as returned by the feed API (Feedly-style JSON).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    /// Feed-provided stable identifier, when present.
    pub id: Option<String>,
    /// Canonical article URL ("originId" on the wire).
    #[serde(rename = "originId")]
    pub origin_id: Option<String>,
    pub title: Option<String>,
    pub content: Option<RawContent>,
    pub summary: Option<RawContent>,
    /// Publication time in unix milliseconds.
    pub published: Option<i64>,
    pub origin: Option<RawOrigin>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContent {
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOrigin {
    pub title: Option<String>,
}

/// One page from the feed API: raw entries plus the opaque cursor for the
/// next page. The client has no cross-call memory beyond this cursor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleBatch {
    #[serde(default)]
    pub items: Vec<RawEntry>,
    pub continuation: Option<String>,
}

/// Canonical article record. Read-only once scored; `id` is stable across
/// runs for the same underlying content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub body_text: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source_feed: String,
}

/// Outcome of one logical `fetch_page` call.
#[derive(Debug)]
pub enum PageFetch {
    Batch(ArticleBatch),
    /// The local budget is exhausted, or remote throttling outlasted the
    /// retry ceiling. Non-exceptional: the run keeps partial results.
    RateLimited { retry_after: Duration },
    /// The run deadline expired while waiting out a backoff delay.
    DeadlineExceeded,
}

/// Unrecoverable feed API failures. Anything transient is retried inside the
/// client and only escalates here once the retry budget is spent.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Authentication or malformed-request response. Never retried.
    #[error("fatal feed API error (HTTP {status}): {body}")]
    Fatal { status: u16, body: String },
    /// Network-level or 5xx failures outlasted the retry schedule.
    #[error("transient feed errors exhausted after {attempts} attempts: {last}")]
    TransientExhausted { attempts: u32, last: String },
}
