//! News Digest — Binary Entrypoint
//! Runs the rate-budgeted ingestion pipeline once or on a daily schedule,
//! delivers the digest, and commits seen history after delivery.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_digest::backup::{backup_state_once, DirSink};
use news_digest::budget::RequestBudget;
use news_digest::config::AppConfig;
use news_digest::history::HistoryStore;
use news_digest::ingest::feed_client::{FeedClient, FeedClientCfg, FeedSource};
use news_digest::notify::email::EmailSender;
use news_digest::notify::webhook::WebhookSender;
use news_digest::notify::DigestItem;
use news_digest::pipeline::{run_pipeline, PipelineCfg, RunResult};
use news_digest::relevance::KeywordEngine;
use news_digest::scheduler;

#[derive(Parser, Debug)]
#[command(name = "news-digest", about = "Rate-budgeted news ingestion and digest delivery")]
struct Cli {
    /// Run one aggregation immediately and exit.
    #[arg(long)]
    once: bool,
    /// Path to the TOML config file.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_digest=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    // All configuration problems abort here, before any network call.
    let cfg = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let engine = KeywordEngine::from_toml().context("loading keyword configuration")?;

    let client = FeedClient::new(FeedClientCfg {
        base_url: cfg.feed_base_url.clone(),
        stream_id: cfg.feed_stream_id.clone(),
        token: cfg.feed_token.clone(),
        page_size: cfg.feed_page_size,
        backoff_base: cfg.backoff_base,
        backoff_max_delay: cfg.backoff_max_delay,
        backoff_max_attempts: cfg.backoff_max_attempts,
    });

    // One budget per process; in scheduler mode it carries across runs.
    let mut budget = RequestBudget::new(cfg.daily_request_limit, cfg.reset_time, Utc::now());

    if cli.once {
        return run_and_deliver(&cfg, &engine, &client, &mut budget).await;
    }

    info!(run_time = %cfg.run_time, "starting daily scheduler");
    loop {
        let wait = scheduler::until_next_run(Utc::now(), cfg.run_time);
        info!(wait_secs = wait.as_secs(), "sleeping until next scheduled run");
        tokio::time::sleep(wait).await;
        if let Err(e) = run_and_deliver(&cfg, &engine, &client, &mut budget).await {
            error!(error = ?e, "scheduled run failed");
        }
    }
}

/// One full cycle: pipeline run, digest delivery, history commit, backup.
async fn run_and_deliver(
    cfg: &AppConfig,
    engine: &KeywordEngine,
    source: &dyn FeedSource,
    budget: &mut RequestBudget,
) -> Result<()> {
    let store = HistoryStore::new(&cfg.history_path);
    let mut history = store.load()?;
    let pruned = history.prune(Utc::now(), cfg.retention_days);
    if pruned > 0 {
        info!(pruned, "pruned expired history entries");
    }

    let pcfg = PipelineCfg {
        max_pages_per_run: cfg.max_pages_per_run,
        run_deadline: cfg.run_deadline,
    };

    let report = match run_pipeline(source, budget, engine, &history, &pcfg).await {
        RunResult::Ready(report) => report,
        // Failed runs commit nothing and deliver nothing.
        RunResult::Failed { reason } => bail!("run failed: {reason}"),
    };

    if let Some(retry_after) = report.rate_limited {
        warn!(
            retry_after_secs = retry_after.as_secs(),
            "fetch ended early on rate limit; digest covers partial results"
        );
    }

    let mut items: Vec<DigestItem> = report.articles.iter().map(DigestItem::from).collect();
    items.sort_by(|a, b| b.total_score.cmp(&a.total_score));

    // Delivery first, commit second: a failed delivery must not poison
    // history with undelivered articles.
    match EmailSender::from_env().context("email configuration")? {
        Some(mailer) => {
            mailer.send_digest(&items, Utc::now()).await?;
            info!(items = items.len(), "digest email sent");
        }
        None => info!("email delivery not configured, skipping"),
    }

    let delivered = WebhookSender::from_env().send_items(&items).await;
    if delivered > 0 {
        info!(delivered, "articles posted to automation webhook");
    }

    history.commit(report.pending_ids.iter().cloned(), Utc::now());
    store.save(&history)?;

    // Best-effort state backup; never fails the run.
    let sink = DirSink::new(&cfg.backup_dir, cfg.max_backups);
    if let Err(e) = backup_state_once(&[cfg.history_path.clone()], &sink).await {
        warn!(error = ?e, "state backup failed");
    }

    info!(
        accepted = report.articles.len(),
        already_seen = report.already_seen,
        excluded = report.excluded,
        pages = report.pages_fetched,
        deadline_hit = report.deadline_hit,
        budget_remaining = budget.remaining(),
        "run complete"
    );
    Ok(())
}
