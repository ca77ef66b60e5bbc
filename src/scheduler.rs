// src/scheduler.rs
//! Daily run scheduling. The binary sleeps until the configured wall-clock
//! time and only starts the next wait after the previous run (and its
//! history commit) has finished, so runs never overlap.

use chrono::{DateTime, NaiveTime, Utc};
use std::time::Duration;

/// Time until the next occurrence of `run_time` strictly after `now`.
pub fn until_next_run(now: DateTime<Utc>, run_time: NaiveTime) -> Duration {
    let mut next = now.date_naive().and_time(run_time).and_utc();
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or_default()
}
