// src/pipeline.rs
//! Orchestrates one ingestion run:
//! `Idle -> Fetching -> Scoring -> Deduplicating -> Ready | Failed`.
//!
//! `RateLimited` and deadline expiry end the fetch phase but keep partial
//! results; only a fatal feed error (or an internal one) yields `Failed`.
//! History is never committed here — the caller commits after delivery.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::budget::RequestBudget;
use crate::dedup::filter_unseen;
use crate::history::SeenHistory;
use crate::ingest::feed_client::FeedSource;
use crate::ingest::normalize_entries;
use crate::ingest::types::{PageFetch, RawEntry};
use crate::relevance::{KeywordEngine, ScoredArticle};

/// One-time metrics registration (so series show up wherever they are scraped).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Pipeline runs started.");
        describe_counter!("pipeline_failed_total", "Runs ending in Failed.");
        describe_counter!(
            "pipeline_articles_fetched_total",
            "Raw entries fetched across pages."
        );
        describe_counter!(
            "pipeline_articles_accepted_total",
            "Articles accepted into the digest set."
        );
        describe_counter!(
            "pipeline_excluded_total",
            "Articles dropped by the relevance scorer."
        );
        describe_counter!(
            "pipeline_dedup_total",
            "Articles suppressed by seen history."
        );
        describe_counter!(
            "pipeline_rate_limited_total",
            "Runs cut short by the request budget or remote throttling."
        );
        describe_gauge!("pipeline_last_run_ts", "Unix ts when a run last finished.");
    });
}

/// Phases of a single run; `Ready`/`Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Scoring,
    Deduplicating,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineCfg {
    pub max_pages_per_run: u32,
    pub run_deadline: Duration,
}

/// What a terminal `Ready` hands to the caller. Zero accepted articles is a
/// valid, non-error outcome.
#[derive(Debug)]
pub struct RunReport {
    /// Accepted, unseen articles for the digest.
    pub articles: Vec<ScoredArticle>,
    /// Ids to commit into history once delivery succeeds.
    pub pending_ids: Vec<String>,
    pub already_seen: usize,
    pub excluded: usize,
    pub pages_fetched: u32,
    /// Set when the budget or remote throttling ended fetching early;
    /// recorded for operator visibility.
    pub rate_limited: Option<Duration>,
    /// True when the run deadline cut the fetch phase short.
    pub deadline_hit: bool,
}

#[derive(Debug)]
pub enum RunResult {
    Ready(RunReport),
    Failed { reason: String },
}

/// Run the full pipeline once against `source`.
pub async fn run_pipeline(
    source: &dyn FeedSource,
    budget: &mut RequestBudget,
    engine: &KeywordEngine,
    history: &SeenHistory,
    cfg: &PipelineCfg,
) -> RunResult {
    ensure_metrics_described();
    counter!("pipeline_runs_total").increment(1);

    let mut state = RunState::Idle;
    debug!(?state, "run starting");
    let deadline = Instant::now() + cfg.run_deadline;

    // --- Fetching ---
    state = RunState::Fetching;
    debug!(?state, source = source.name(), "entering fetch phase");
    let mut raw: Vec<RawEntry> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages_fetched = 0u32;
    let mut rate_limited: Option<Duration> = None;
    let mut deadline_hit = false;

    while pages_fetched < cfg.max_pages_per_run {
        if Instant::now() >= deadline {
            warn!(pages = pages_fetched, "run deadline reached, stopping fetch");
            deadline_hit = true;
            break;
        }

        match source.fetch_page(cursor.as_deref(), budget, deadline).await {
            Ok(PageFetch::Batch(batch)) => {
                pages_fetched += 1;
                if batch.items.is_empty() {
                    break;
                }
                counter!("pipeline_articles_fetched_total").increment(batch.items.len() as u64);
                raw.extend(batch.items);
                match batch.continuation {
                    Some(c) => cursor = Some(c),
                    None => break,
                }
            }
            Ok(PageFetch::RateLimited { retry_after }) => {
                counter!("pipeline_rate_limited_total").increment(1);
                warn!(
                    retry_after_secs = retry_after.as_secs(),
                    pages = pages_fetched,
                    "rate limited, keeping partial results"
                );
                rate_limited = Some(retry_after);
                break;
            }
            Ok(PageFetch::DeadlineExceeded) => {
                warn!(pages = pages_fetched, "deadline expired during backoff wait");
                deadline_hit = true;
                break;
            }
            Err(e) => {
                state = RunState::Failed;
                counter!("pipeline_failed_total").increment(1);
                warn!(?state, error = %e, "fetch failed, aborting run");
                return RunResult::Failed {
                    reason: e.to_string(),
                };
            }
        }
    }

    // --- Scoring ---
    state = RunState::Scoring;
    debug!(?state, entries = raw.len(), "entering scoring phase");
    let articles = normalize_entries(raw);
    let (scored, excluded) = engine.score_batch(articles);
    counter!("pipeline_excluded_total").increment(excluded as u64);

    // --- Deduplicating ---
    state = RunState::Deduplicating;
    debug!(?state, candidates = scored.len(), "entering dedup phase");
    let (unseen, already_seen) = filter_unseen(scored, history);
    counter!("pipeline_dedup_total").increment(already_seen as u64);

    state = RunState::Ready;
    debug!(?state, "run terminal");
    let pending_ids = unseen.iter().map(|s| s.article.id.clone()).collect();
    counter!("pipeline_articles_accepted_total").increment(unseen.len() as u64);
    gauge!("pipeline_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

    info!(
        accepted = unseen.len(),
        excluded,
        already_seen,
        pages = pages_fetched,
        rate_limited = rate_limited.is_some(),
        deadline_hit,
        "run ready"
    );

    RunResult::Ready(RunReport {
        articles: unseen,
        pending_ids,
        already_seen,
        excluded,
        pages_fetched,
        rate_limited,
        deadline_hit,
    })
}
