// tests/history_store.rs
use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use news_digest::history::{HistoryStore, SeenHistory};

#[test]
fn missing_file_loads_as_empty_history() {
    let dir = tempdir().unwrap();
    let store = HistoryStore::new(dir.path().join("seen_history.json"));
    let history = store.load().unwrap();
    assert!(history.is_empty());
}

#[test]
fn round_trips_through_the_json_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data").join("seen_history.json");
    let store = HistoryStore::new(&path);

    let mut history = SeenHistory::new();
    let seen_at = Utc.with_ymd_and_hms(2024, 5, 10, 7, 0, 0).unwrap();
    history.commit(["a".to_string(), "b".to_string()], seen_at);
    store.save(&history).unwrap();

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.contains("a"));
    assert!(reloaded.contains("b"));
    assert!(!reloaded.contains("c"));
}

#[test]
fn pruned_state_survives_a_save_load_cycle() {
    let dir = tempdir().unwrap();
    let store = HistoryStore::new(dir.path().join("seen_history.json"));

    let mut history = SeenHistory::new();
    history.commit(
        ["old".to_string()],
        Utc.with_ymd_and_hms(2024, 4, 1, 7, 0, 0).unwrap(),
    );
    history.commit(
        ["fresh".to_string()],
        Utc.with_ymd_and_hms(2024, 5, 9, 7, 0, 0).unwrap(),
    );

    let now = Utc.with_ymd_and_hms(2024, 5, 10, 7, 0, 0).unwrap();
    let removed = history.prune(now, 30);
    assert_eq!(removed, 1);
    store.save(&history).unwrap();

    let reloaded = store.load().unwrap();
    assert!(!reloaded.contains("old"));
    assert!(reloaded.contains("fresh"));
}
