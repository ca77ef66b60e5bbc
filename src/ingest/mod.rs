// src/ingest/mod.rs
pub mod feed_client;
pub mod types;

use crate::ingest::types::{Article, RawEntry};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Body text cap after normalization, in chars.
const MAX_BODY_CHARS: usize = 4000;

/// Normalize text: decode HTML entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_BODY_CHARS {
        out = out.chars().take(MAX_BODY_CHARS).collect();
    }

    out
}

/// Short stable hex id derived from a key (URL or feed id).
pub fn stable_id(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Convert one raw feed entry into a canonical article record.
///
/// Entries with neither a URL nor a feed id are dropped: without either there
/// is no stable identity to deduplicate on.
pub fn normalize_entry(raw: RawEntry) -> Option<Article> {
    let url = raw.origin_id.unwrap_or_default();
    let id = match raw.id {
        Some(feed_id) if !feed_id.is_empty() => stable_id(&feed_id),
        _ if !url.is_empty() => stable_id(&url),
        _ => return None,
    };

    // Prefer full content, fall back to the summary (original feed behavior).
    let body_raw = raw
        .content
        .map(|c| c.content)
        .or(raw.summary.map(|c| c.content))
        .unwrap_or_default();

    let published_at = raw
        .published
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    Some(Article {
        id,
        title: normalize_text(&raw.title.unwrap_or_default()),
        body_text: normalize_text(&body_raw),
        url,
        published_at,
        source_feed: raw
            .origin
            .and_then(|o| o.title)
            .unwrap_or_else(|| "Unknown".to_string()),
    })
}

/// Normalize a whole page worth of entries, dropping the unusable ones.
pub fn normalize_entries(raw: Vec<RawEntry>) -> Vec<Article> {
    raw.into_iter().filter_map(normalize_entry).collect()
}
