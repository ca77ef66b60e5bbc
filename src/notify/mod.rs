pub mod email;
pub mod webhook;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::relevance::ScoredArticle;

/// Minimal per-article payload handed to delivery collaborators. These four
/// fields are the pipeline's delivery guarantee; everything else is optional.
#[derive(Debug, Clone, Serialize)]
pub struct DigestItem {
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub total_score: i32,
    pub source_feed: String,
}

impl From<&ScoredArticle> for DigestItem {
    fn from(s: &ScoredArticle) -> Self {
        Self {
            title: s.article.title.clone(),
            url: s.article.url.clone(),
            published_at: s.article.published_at,
            total_score: s.score.total_score,
            source_feed: s.article.source_feed.clone(),
        }
    }
}
