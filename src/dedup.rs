// src/dedup.rs
//! Cross-run deduplication against the persisted seen history.

use crate::history::SeenHistory;
use crate::relevance::ScoredArticle;

/// Split `scored` into articles not yet in `history` plus a count of the
/// suppressed ones. Read-only: committing newly accepted ids is the
/// orchestrator's job, after delivery succeeds.
pub fn filter_unseen(
    scored: Vec<ScoredArticle>,
    history: &SeenHistory,
) -> (Vec<ScoredArticle>, usize) {
    let mut unseen = Vec::with_capacity(scored.len());
    let mut already_seen = 0usize;
    for item in scored {
        if history.contains(&item.article.id) {
            already_seen += 1;
        } else {
            unseen.push(item);
        }
    }
    (unseen, already_seen)
}
