// src/config.rs
//! Application configuration: a TOML file for tunables, env vars for
//! secrets. Everything is validated at startup, before any network call.

use chrono::NaiveTime;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/news-digest.toml";
pub const ENV_CONFIG_PATH: &str = "NEWS_DIGEST_CONFIG";
pub const ENV_FEED_TOKEN: &str = "FEED_TOKEN";
pub const ENV_FEED_STREAM_ID: &str = "FEED_STREAM_ID";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/* ----------------------------
File schema (serde defaults)
---------------------------- */

fn default_base_url() -> String {
    "https://cloud.feedly.com/v3".to_string()
}
fn default_page_size() -> u32 {
    50
}
fn default_request_limit() -> u32 {
    50
}
fn default_reset_time() -> String {
    "00:00".to_string()
}
fn default_backoff_base() -> f64 {
    1.0
}
fn default_backoff_attempts() -> u32 {
    5
}
fn default_backoff_max_delay() -> f64 {
    60.0
}
fn default_max_pages() -> u32 {
    3
}
fn default_run_deadline() -> f64 {
    120.0
}
fn default_history_path() -> String {
    "data/seen_history.json".to_string()
}
fn default_retention_days() -> u32 {
    30
}
fn default_run_time() -> String {
    "07:00".to_string()
}
fn default_backup_dir() -> String {
    "backups".to_string()
}
fn default_max_backups() -> usize {
    5
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    feed: FeedSection,
    #[serde(default)]
    budget: BudgetSection,
    #[serde(default)]
    backoff: BackoffSection,
    #[serde(default)]
    pipeline: PipelineSection,
    #[serde(default)]
    history: HistorySection,
    #[serde(default)]
    schedule: ScheduleSection,
    #[serde(default)]
    backup: BackupSection,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedSection {
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default)]
    stream_id: String,
    /// Prefer the FEED_TOKEN env var; this exists for local setups only.
    #[serde(default)]
    token: String,
    #[serde(default = "default_page_size")]
    page_size: u32,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_id: String::new(),
            token: String::new(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct BudgetSection {
    #[serde(default = "default_request_limit")]
    daily_request_limit: u32,
    #[serde(default = "default_reset_time")]
    reset_time: String,
}

impl Default for BudgetSection {
    fn default() -> Self {
        Self {
            daily_request_limit: default_request_limit(),
            reset_time: default_reset_time(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct BackoffSection {
    #[serde(default = "default_backoff_base")]
    base_seconds: f64,
    #[serde(default = "default_backoff_attempts")]
    max_attempts: u32,
    #[serde(default = "default_backoff_max_delay")]
    max_delay_seconds: f64,
}

impl Default for BackoffSection {
    fn default() -> Self {
        Self {
            base_seconds: default_backoff_base(),
            max_attempts: default_backoff_attempts(),
            max_delay_seconds: default_backoff_max_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PipelineSection {
    #[serde(default = "default_max_pages")]
    max_pages_per_run: u32,
    #[serde(default = "default_run_deadline")]
    run_deadline_seconds: f64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_pages_per_run: default_max_pages(),
            run_deadline_seconds: default_run_deadline(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct HistorySection {
    #[serde(default = "default_history_path")]
    path: String,
    #[serde(default = "default_retention_days")]
    retention_days: u32,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ScheduleSection {
    #[serde(default = "default_run_time")]
    run_time: String,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            run_time: default_run_time(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct BackupSection {
    #[serde(default = "default_backup_dir")]
    dir: String,
    #[serde(default = "default_max_backups")]
    max_backups: usize,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            max_backups: default_max_backups(),
        }
    }
}

/* ----------------------------
Validated config
---------------------------- */

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feed_base_url: String,
    pub feed_stream_id: String,
    pub feed_token: String,
    pub feed_page_size: u32,
    pub daily_request_limit: u32,
    pub reset_time: NaiveTime,
    pub backoff_base: Duration,
    pub backoff_max_delay: Duration,
    pub backoff_max_attempts: u32,
    pub max_pages_per_run: u32,
    pub run_deadline: Duration,
    pub history_path: PathBuf,
    pub retention_days: u32,
    pub run_time: NaiveTime,
    pub backup_dir: PathBuf,
    pub max_backups: usize,
}

impl AppConfig {
    /// Resolve the config file (explicit path > NEWS_DIGEST_CONFIG > default
    /// location; a missing default file means "all defaults"), merge env
    /// secrets, and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => match std::env::var(ENV_CONFIG_PATH) {
                Ok(p) => Some(PathBuf::from(p)),
                Err(_) => {
                    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                    default.exists().then_some(default)
                }
            },
        };

        let file = match resolved {
            Some(p) => {
                let content = fs::read_to_string(&p)?;
                toml::from_str::<FileConfig>(&content)?
            }
            None => FileConfig::default(),
        };

        Self::finalize(file)
    }

    /// Parse and validate from a TOML string (env secrets still apply).
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Self::finalize(toml::from_str::<FileConfig>(s)?)
    }

    fn finalize(mut file: FileConfig) -> Result<Self, ConfigError> {
        // Env secrets win over file values.
        if let Ok(token) = std::env::var(ENV_FEED_TOKEN) {
            file.feed.token = token;
        }
        if let Ok(stream) = std::env::var(ENV_FEED_STREAM_ID) {
            file.feed.stream_id = stream;
        }

        if file.feed.token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "feed token missing: set {ENV_FEED_TOKEN} or feed.token"
            )));
        }
        if file.feed.stream_id.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "feed stream id missing: set {ENV_FEED_STREAM_ID} or feed.stream_id"
            )));
        }
        if !(1..=500).contains(&file.feed.page_size) {
            return Err(ConfigError::Invalid(
                "feed.page_size must be in 1..=500".into(),
            ));
        }
        if file.budget.daily_request_limit < 1 {
            return Err(ConfigError::Invalid(
                "budget.daily_request_limit must be >= 1".into(),
            ));
        }
        if file.backoff.max_attempts < 1 {
            return Err(ConfigError::Invalid(
                "backoff.max_attempts must be >= 1".into(),
            ));
        }
        if file.pipeline.max_pages_per_run < 1 {
            return Err(ConfigError::Invalid(
                "pipeline.max_pages_per_run must be >= 1".into(),
            ));
        }
        if file.history.retention_days < 1 {
            return Err(ConfigError::Invalid(
                "history.retention_days must be >= 1".into(),
            ));
        }

        let backoff_base = seconds("backoff.base_seconds", file.backoff.base_seconds)?;
        let backoff_max_delay =
            seconds("backoff.max_delay_seconds", file.backoff.max_delay_seconds)?;
        if backoff_max_delay < backoff_base {
            return Err(ConfigError::Invalid(
                "backoff.max_delay_seconds must be >= backoff.base_seconds".into(),
            ));
        }
        let run_deadline = seconds(
            "pipeline.run_deadline_seconds",
            file.pipeline.run_deadline_seconds,
        )?;

        Ok(Self {
            feed_base_url: file.feed.base_url.trim_end_matches('/').to_string(),
            feed_stream_id: file.feed.stream_id,
            feed_token: file.feed.token,
            feed_page_size: file.feed.page_size,
            daily_request_limit: file.budget.daily_request_limit,
            reset_time: time_of_day("budget.reset_time", &file.budget.reset_time)?,
            backoff_base,
            backoff_max_delay,
            backoff_max_attempts: file.backoff.max_attempts,
            max_pages_per_run: file.pipeline.max_pages_per_run,
            run_deadline,
            history_path: PathBuf::from(file.history.path),
            retention_days: file.history.retention_days,
            run_time: time_of_day("schedule.run_time", &file.schedule.run_time)?,
            backup_dir: PathBuf::from(file.backup.dir),
            max_backups: file.backup.max_backups,
        })
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Invalid(format!("{field} must be > 0")));
    }
    Ok(Duration::from_secs_f64(value))
}

fn time_of_day(field: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value.trim(), "%H:%M:%S"))
        .map_err(|_| ConfigError::Invalid(format!("{field}: `{value}` is not a HH:MM time")))
}
