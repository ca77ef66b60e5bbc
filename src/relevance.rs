// src/relevance.rs
//! Keyword relevance scoring: category → weight → pattern sets loaded from
//! TOML, compiled once, then applied as a pure function of the article text.

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::ingest::types::Article;

// --- env defaults & names ---
pub const DEFAULT_KEYWORDS_CONFIG_PATH: &str = "config/keywords.toml";
pub const ENV_KEYWORDS_CONFIG_PATH: &str = "KEYWORDS_CONFIG_PATH";

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRoot {
    pub scoring: ScoringSection,
    pub categories: Vec<CategoryCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSection {
    /// Total score at or above which an article is included outright.
    pub min_total_score: i32,
    /// Ceiling on points a single category can contribute, so one repeated
    /// keyword family cannot dominate the decision.
    pub category_cap: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryCfg {
    pub name: String,
    pub weight: i32,
    /// Case-insensitive keyword/phrase patterns; each distinct match counts
    /// once per article.
    pub patterns: Vec<String>,
}

/* ----------------------------
Compiled engine
---------------------------- */

#[derive(Debug)]
struct CompiledCategory {
    name: String,
    weight: i32,
    patterns: Vec<Regex>,
}

#[derive(Debug)]
pub struct KeywordEngine {
    min_total_score: i32,
    category_cap: i32,
    categories: Vec<CompiledCategory>,
}

/// Per-article scoring outcome. `total_score` is always the sum of
/// `category_scores`; `included` is derived, never set independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreResult {
    pub article_id: String,
    pub category_scores: BTreeMap<String, i32>,
    pub total_score: i32,
    pub included: bool,
}

/// An article paired with its score, as handed to dedup and delivery.
#[derive(Debug, Clone)]
pub struct ScoredArticle {
    pub article: Article,
    pub score: ScoreResult,
}

impl KeywordEngine {
    /// Load from a TOML file. Uses KEYWORDS_CONFIG_PATH or defaults to
    /// "config/keywords.toml".
    pub fn from_toml() -> Result<Self, ConfigError> {
        let path = std::env::var(ENV_KEYWORDS_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_KEYWORDS_CONFIG_PATH));
        let content = fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Load from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let root: KeywordRoot = toml::from_str(toml_str)?;
        Self::from_root(root)
    }

    fn from_root(root: KeywordRoot) -> Result<Self, ConfigError> {
        if root.scoring.min_total_score < 0 {
            return Err(ConfigError::Invalid(
                "scoring.min_total_score must be >= 0".into(),
            ));
        }
        if root.scoring.category_cap < 1 {
            return Err(ConfigError::Invalid(
                "scoring.category_cap must be >= 1".into(),
            ));
        }
        if root.categories.is_empty() {
            return Err(ConfigError::Invalid("no keyword categories defined".into()));
        }

        let mut categories = Vec::with_capacity(root.categories.len());
        for cat in root.categories {
            if cat.weight < 1 {
                return Err(ConfigError::Invalid(format!(
                    "category `{}` weight must be >= 1",
                    cat.name
                )));
            }
            if cat.patterns.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "category `{}` has no patterns",
                    cat.name
                )));
            }
            let mut patterns = Vec::with_capacity(cat.patterns.len());
            for p in &cat.patterns {
                let trimmed = p.trim();
                if trimmed.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "category `{}` contains an empty pattern",
                        cat.name
                    )));
                }
                // Patterns are literal phrases; matching is case-insensitive
                // substring, the way the keyword lists were originally used.
                let re = Regex::new(&format!("(?i){}", regex::escape(trimmed)))
                    .map_err(|e| {
                        ConfigError::Invalid(format!(
                            "category `{}` pattern `{}`: {}",
                            cat.name, trimmed, e
                        ))
                    })?;
                patterns.push(re);
            }
            categories.push(CompiledCategory {
                name: cat.name,
                weight: cat.weight,
                patterns,
            });
        }

        Ok(Self {
            min_total_score: root.scoring.min_total_score,
            category_cap: root.scoring.category_cap,
            categories,
        })
    }

    /// Score one article. Pure: no network or time dependency.
    pub fn score(&self, article: &Article) -> ScoreResult {
        let haystack = format!("{} {}", article.title, article.body_text);

        let mut category_scores = BTreeMap::new();
        for cat in &self.categories {
            let distinct = cat
                .patterns
                .iter()
                .filter(|re| re.is_match(&haystack))
                .count() as i32;
            let points = (distinct * cat.weight).min(self.category_cap);
            category_scores.insert(cat.name.clone(), points);
        }

        let total_score: i32 = category_scores.values().sum();

        // Inclusion rule, first match wins:
        // 1) total at or above the threshold;
        // 2) otherwise any category with a non-zero match. Clause 2 favors
        //    recall over precision and is a tunable policy, not a law.
        let included = total_score >= self.min_total_score
            || category_scores.values().any(|&v| v >= 1);

        ScoreResult {
            article_id: article.id.clone(),
            category_scores,
            total_score,
            included,
        }
    }

    /// Score a batch, keeping only the included articles. Returns the kept
    /// set and how many were dropped.
    pub fn score_batch(&self, articles: Vec<Article>) -> (Vec<ScoredArticle>, usize) {
        let mut kept = Vec::with_capacity(articles.len());
        let mut dropped = 0usize;
        for article in articles {
            let score = self.score(&article);
            if score.included {
                kept.push(ScoredArticle { article, score });
            } else {
                dropped += 1;
            }
        }
        (kept, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const CFG: &str = r#"
[scoring]
min_total_score = 3
category_cap = 12

[[categories]]
name = "company"
weight = 4
patterns = ["acme logistics"]

[[categories]]
name = "industry"
weight = 3
patterns = ["last mile", "supply chain"]

[[categories]]
name = "business"
weight = 2
patterns = ["series a", "funding"]

[[categories]]
name = "roles"
weight = 1
patterns = ["head of growth"]
"#;

    fn article(title: &str, body: &str) -> Article {
        Article {
            id: "a1".into(),
            title: title.into(),
            body_text: body.into(),
            url: "https://example.test/a1".into(),
            published_at: Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap(),
            source_feed: "Example Wire".into(),
        }
    }

    #[test]
    fn total_is_sum_of_category_scores() {
        let eng = KeywordEngine::from_toml_str(CFG).unwrap();
        let res = eng.score(&article(
            "Acme Logistics raises Series A",
            "Last mile expansion across the supply chain.",
        ));
        assert_eq!(
            res.total_score,
            res.category_scores.values().sum::<i32>()
        );
        // company 4 + industry 2*3 + business 2 = 12
        assert_eq!(res.total_score, 12);
        assert!(res.included);
    }

    #[test]
    fn matching_is_case_insensitive_and_distinct() {
        let eng = KeywordEngine::from_toml_str(CFG).unwrap();
        let res = eng.score(&article(
            "LAST MILE update",
            "last mile, Last Mile, and more last mile news",
        ));
        // One distinct pattern, not one per occurrence.
        assert_eq!(res.category_scores["industry"], 3);
    }

    #[test]
    fn category_cap_limits_a_single_category() {
        let cfg = r#"
[scoring]
min_total_score = 3
category_cap = 5

[[categories]]
name = "industry"
weight = 3
patterns = ["last mile", "supply chain", "warehousing"]
"#;
        let eng = KeywordEngine::from_toml_str(cfg).unwrap();
        let res = eng.score(&article(
            "Report",
            "last mile, supply chain and warehousing all at once",
        ));
        // 3 distinct * weight 3 = 9, capped at 5.
        assert_eq!(res.category_scores["industry"], 5);
        assert_eq!(res.total_score, 5);
    }

    #[test]
    fn lenient_clause_includes_single_low_weight_match() {
        let eng = KeywordEngine::from_toml_str(CFG).unwrap();
        let res = eng.score(&article("Hiring a head of growth", ""));
        assert_eq!(res.total_score, 1);
        assert!(res.included, "non-zero category must include despite total < 3");
    }

    #[test]
    fn zero_score_is_excluded() {
        let eng = KeywordEngine::from_toml_str(CFG).unwrap();
        let res = eng.score(&article("Weather today", "Sunny with light winds."));
        assert_eq!(res.total_score, 0);
        assert!(!res.included);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let zero_weight = CFG.replace("weight = 4", "weight = 0");
        assert!(matches!(
            KeywordEngine::from_toml_str(&zero_weight),
            Err(ConfigError::Invalid(_))
        ));

        let empty_patterns = CFG.replace(r#"patterns = ["acme logistics"]"#, "patterns = []");
        assert!(matches!(
            KeywordEngine::from_toml_str(&empty_patterns),
            Err(ConfigError::Invalid(_))
        ));
    }
}
