// src/history.rs
//! Durable record of previously digested article ids.
//!
//! The in-memory set and the file store are split so the pipeline can check
//! membership without touching disk, and so the orchestrator commits new ids
//! only after digest delivery succeeds.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Article ids accepted into past digests, each with its first-seen time.
/// An id present here is never re-included in a future digest.
#[derive(Debug, Clone, Default)]
pub struct SeenHistory {
    entries: HashMap<String, DateTime<Utc>>,
}

impl SeenHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record newly digested ids at `now`. Existing entries keep their
    /// original first-seen time.
    pub fn commit<I>(&mut self, ids: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = String>,
    {
        for id in ids {
            self.entries.entry(id).or_insert(now);
        }
    }

    /// Drop entries whose first-seen time is older than the retention
    /// horizon. Entries inside the horizon always survive, so an id that can
    /// recur at the same URL within the window stays suppressed.
    pub fn prune(&mut self, now: DateTime<Utc>, retention_days: u32) -> usize {
        let horizon = now - chrono::Duration::days(i64::from(retention_days));
        let before = self.entries.len();
        self.entries.retain(|_, first_seen| *first_seen >= horizon);
        before - self.entries.len()
    }
}

/// JSON-file persistence for [`SeenHistory`]. Read at run start, written
/// after a successful commit; survives process restarts.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty history, not an error.
    pub fn load(&self) -> Result<SeenHistory> {
        if !self.path.exists() {
            return Ok(SeenHistory::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading history from {}", self.path.display()))?;
        let entries: HashMap<String, DateTime<Utc>> = serde_json::from_str(&content)
            .with_context(|| format!("parsing history at {}", self.path.display()))?;
        Ok(SeenHistory { entries })
    }

    pub fn save(&self, history: &SeenHistory) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&history.entries).context("encoding history")?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing history to {}", self.path.display()))?;
        info!(entries = history.len(), path = %self.path.display(), "history saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn commit_keeps_original_first_seen() {
        let mut h = SeenHistory::new();
        h.commit(["a".to_string()], day(1));
        h.commit(["a".to_string(), "b".to_string()], day(5));
        assert_eq!(h.len(), 2);
        assert_eq!(h.entries["a"], day(1));
        assert_eq!(h.entries["b"], day(5));
    }

    #[test]
    fn prune_respects_retention_horizon() {
        let mut h = SeenHistory::new();
        h.commit(["old".to_string()], day(1));
        h.commit(["fresh".to_string()], day(20));
        let removed = h.prune(day(25), 10);
        assert_eq!(removed, 1);
        assert!(!h.contains("old"));
        assert!(h.contains("fresh"));
    }
}
