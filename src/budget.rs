// src/budget.rs
//! Request budget tracking against the feed API's daily quota.
//!
//! The tracker is a plain state object: callers pass `now` explicitly, so unit
//! tests can drive the window with fake time instead of the wall clock.

use chrono::{DateTime, NaiveTime, Utc};
use std::time::Duration;

/// Outcome of asking the budget for one request unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDecision {
    /// A unit was consumed; the caller may issue the request.
    Allowed,
    /// The window is exhausted. `retry_after` is the time until the next reset.
    Blocked { retry_after: Duration },
}

/// Consumed-vs-allowed request counter within a rolling daily window.
///
/// `consumed <= limit` is a soft ceiling: exceeding it blocks new requests
/// until the window resets at the configured wall-clock `reset_time`.
#[derive(Debug, Clone)]
pub struct RequestBudget {
    limit: u32,
    consumed: u32,
    reset_time: NaiveTime,
    window_reset_at: DateTime<Utc>,
}

impl RequestBudget {
    pub fn new(limit: u32, reset_time: NaiveTime, now: DateTime<Utc>) -> Self {
        Self {
            limit,
            consumed: 0,
            reset_time,
            window_reset_at: next_reset(now, reset_time),
        }
    }

    /// Try to consume one request unit at `now`.
    ///
    /// A call made after `window_reset_at` first resets `consumed` to 0 and
    /// recomputes the window, then evaluates normally.
    pub fn try_consume(&mut self, now: DateTime<Utc>) -> BudgetDecision {
        if now >= self.window_reset_at {
            self.consumed = 0;
            self.window_reset_at = next_reset(now, self.reset_time);
        }

        if self.consumed >= self.limit {
            let retry_after = (self.window_reset_at - now).to_std().unwrap_or_default();
            return BudgetDecision::Blocked { retry_after };
        }

        self.consumed += 1;
        BudgetDecision::Allowed
    }

    pub fn consumed(&self) -> u32 {
        self.consumed
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.consumed)
    }

    pub fn window_reset_at(&self) -> DateTime<Utc> {
        self.window_reset_at
    }
}

/// Next occurrence of `reset_time` strictly after `now` (today or tomorrow).
fn next_reset(now: DateTime<Utc>, reset_time: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(reset_time).and_utc();
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}
