// src/ingest/feed_client.rs
//! Authenticated, budget-aware client for the feed aggregation API.
//!
//! Every HTTP attempt consults the [`RequestBudget`] first and consumes one
//! unit, including retries of the same logical page. Throttling (HTTP 429)
//! and network/5xx failures run on separate backoff counters; auth and
//! malformed-request responses fail the run immediately.

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::budget::{BudgetDecision, RequestBudget};
use crate::ingest::types::{ArticleBatch, FeedError, PageFetch};

/// Explicit attempt/delay state for exponential backoff.
///
/// Delays follow `base * 2^attempt`, clamped at `max_delay`. Once `next_delay`
/// has handed out `max_attempts` delays it returns `None`.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    base: Duration,
    max_delay: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl BackoffSchedule {
    pub fn new(base: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_delay,
            max_attempts,
            attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        let delay = self
            .base
            .checked_mul(factor)
            .map(|d| d.min(self.max_delay))
            .unwrap_or(self.max_delay);
        self.attempt += 1;
        Some(delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[derive(Debug, Clone)]
pub struct FeedClientCfg {
    pub base_url: String,
    pub stream_id: String,
    pub token: String,
    pub page_size: u32,
    pub backoff_base: Duration,
    pub backoff_max_delay: Duration,
    pub backoff_max_attempts: u32,
}

/// Seam for the orchestrator: the HTTP client and test fakes both implement
/// this.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        budget: &mut RequestBudget,
        deadline: Instant,
    ) -> Result<PageFetch, FeedError>;

    fn name(&self) -> &'static str;
}

pub struct FeedClient {
    cfg: FeedClientCfg,
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(cfg: FeedClientCfg) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { cfg, client }
    }

    fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule::new(
            self.cfg.backoff_base,
            self.cfg.backoff_max_delay,
            self.cfg.backoff_max_attempts,
        )
    }

    /// Sleep for `wait`, clipped by `deadline`. Returns false when the
    /// deadline cut the wait short.
    async fn wait_within_deadline(wait: Duration, deadline: Instant) -> bool {
        let wake = Instant::now() + wait;
        if wake >= deadline {
            tokio::time::sleep_until(deadline).await;
            return false;
        }
        tokio::time::sleep_until(wake).await;
        true
    }
}

/// `Retry-After` in whole seconds, when the remote provides one.
fn parse_retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn truncate_body(body: String) -> String {
    const MAX: usize = 300;
    if body.chars().count() > MAX {
        body.chars().take(MAX).collect()
    } else {
        body
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        budget: &mut RequestBudget,
        deadline: Instant,
    ) -> Result<PageFetch, FeedError> {
        let url = format!("{}/streams/contents", self.cfg.base_url);
        let count = self.cfg.page_size.to_string();

        // Distinct counters: remote throttling vs. network/5xx failures.
        let mut throttle = self.schedule();
        let mut transient = self.schedule();

        loop {
            // Budget gate before every attempt, retries included.
            match budget.try_consume(Utc::now()) {
                BudgetDecision::Blocked { retry_after } => {
                    counter!("feed_budget_blocked_total").increment(1);
                    debug!(retry_after_secs = retry_after.as_secs(), "budget exhausted");
                    return Ok(PageFetch::RateLimited { retry_after });
                }
                BudgetDecision::Allowed => {}
            }

            let mut params: Vec<(&str, &str)> = vec![
                ("streamId", self.cfg.stream_id.as_str()),
                ("count", count.as_str()),
                ("ranked", "newest"),
            ];
            if let Some(c) = cursor {
                params.push(("continuation", c));
            }

            counter!("feed_requests_total").increment(1);
            let sent = self
                .client
                .get(&url)
                .bearer_auth(&self.cfg.token)
                .query(&params)
                .send()
                .await;

            let resp = match sent {
                Ok(resp) => resp,
                Err(e) => {
                    counter!("feed_transient_errors_total").increment(1);
                    match transient.next_delay() {
                        Some(delay) => {
                            warn!(error = %e, delay_secs = delay.as_secs(), "network error, retrying");
                            if !Self::wait_within_deadline(delay, deadline).await {
                                return Ok(PageFetch::DeadlineExceeded);
                            }
                            continue;
                        }
                        None => {
                            return Err(FeedError::TransientExhausted {
                                attempts: transient.attempts(),
                                last: e.to_string(),
                            })
                        }
                    }
                }
            };

            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                counter!("feed_throttled_total").increment(1);
                let remote_hint = parse_retry_after(&resp);
                match throttle.next_delay() {
                    Some(delay) => {
                        // The remote hint wins over the computed delay.
                        let wait = remote_hint.unwrap_or(delay);
                        warn!(wait_secs = wait.as_secs(), "throttled by feed API, backing off");
                        if !Self::wait_within_deadline(wait, deadline).await {
                            return Ok(PageFetch::DeadlineExceeded);
                        }
                        continue;
                    }
                    None => {
                        let retry_after = remote_hint.unwrap_or(self.cfg.backoff_max_delay);
                        return Ok(PageFetch::RateLimited { retry_after });
                    }
                }
            }

            if matches!(status.as_u16(), 400 | 401 | 403) {
                let body = truncate_body(resp.text().await.unwrap_or_default());
                counter!("feed_fatal_errors_total").increment(1);
                return Err(FeedError::Fatal {
                    status: status.as_u16(),
                    body,
                });
            }

            if status.is_server_error() {
                counter!("feed_transient_errors_total").increment(1);
                match transient.next_delay() {
                    Some(delay) => {
                        warn!(status = status.as_u16(), delay_secs = delay.as_secs(), "server error, retrying");
                        if !Self::wait_within_deadline(delay, deadline).await {
                            return Ok(PageFetch::DeadlineExceeded);
                        }
                        continue;
                    }
                    None => {
                        return Err(FeedError::TransientExhausted {
                            attempts: transient.attempts(),
                            last: format!("HTTP {status}"),
                        })
                    }
                }
            }

            if !status.is_success() {
                let body = truncate_body(resp.text().await.unwrap_or_default());
                return Err(FeedError::Fatal {
                    status: status.as_u16(),
                    body,
                });
            }

            match resp.json::<ArticleBatch>().await {
                Ok(batch) => {
                    debug!(items = batch.items.len(), "fetched feed page");
                    return Ok(PageFetch::Batch(batch));
                }
                // A garbled body is usually a truncated response; retry it.
                Err(e) => match transient.next_delay() {
                    Some(delay) => {
                        warn!(error = %e, "unparsable feed page, retrying");
                        if !Self::wait_within_deadline(delay, deadline).await {
                            return Ok(PageFetch::DeadlineExceeded);
                        }
                        continue;
                    }
                    None => {
                        return Err(FeedError::TransientExhausted {
                            attempts: transient.attempts(),
                            last: e.to_string(),
                        })
                    }
                },
            }
        }
    }

    fn name(&self) -> &'static str {
        "FeedClient"
    }
}
