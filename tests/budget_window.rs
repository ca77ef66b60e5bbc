// tests/budget_window.rs
use chrono::{NaiveTime, TimeZone, Utc};

use news_digest::budget::{BudgetDecision, RequestBudget};

#[test]
fn two_allowed_then_blocked_then_reset() {
    let reset = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
    let start = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
    let mut budget = RequestBudget::new(2, reset, start);

    assert_eq!(budget.try_consume(start), BudgetDecision::Allowed);
    assert_eq!(budget.try_consume(start), BudgetDecision::Allowed);
    assert!(matches!(
        budget.try_consume(start),
        BudgetDecision::Blocked { .. }
    ));

    // Simulated time passes the window reset: the counter starts over.
    let after_reset = budget.window_reset_at() + chrono::Duration::minutes(1);
    assert_eq!(budget.try_consume(after_reset), BudgetDecision::Allowed);
    assert_eq!(budget.consumed(), 1);
}
