//! Rolling 24-hour ledger of published topics, used to suppress near-duplicates.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::{load_json, save_json, StateKeys};
use crate::traits::KeyValueStore;

pub const DEDUP_WINDOW_HOURS: i64 = 24;
pub const LEDGER_CAPACITY: usize = 20;
pub const DUPLICATE_THRESHOLD: f64 = 0.7;
pub const MAX_KEYWORDS: usize = 10;
/// Tokens must be longer than this many characters.
const MIN_TOKEN_CHARS: usize = 2;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "has", "have", "had", "do", "does",
    "did", "will", "would", "could", "should", "은", "는", "이", "가", "을", "를", "의", "에",
    "에서", "로", "으로", "와", "과", "이다", "있다", "하다", "되다", "다", "것", "수", "등",
];

/// Lowercased content words of a title, first-seen order, at most `MAX_KEYWORDS`.
pub fn extract_keywords(title: &str) -> Vec<String> {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
        .collect();

    let mut seen = HashSet::new();
    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > MIN_TOKEN_CHARS)
        .filter(|w| !STOP_WORDS.contains(w))
        .filter(|w| seen.insert(w.to_string()))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of two keyword sets. Identical sets (including two
/// empty ones) score 1.0.
pub fn similarity(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordHistoryEntry {
    pub post_id: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub matched_title: Option<String>,
    pub similarity: Option<f64>,
}

impl DuplicateCheck {
    fn unique() -> Self {
        Self {
            is_duplicate: false,
            matched_title: None,
            similarity: None,
        }
    }
}

pub struct DedupLedger {
    store: Arc<dyn KeyValueStore>,
    key: String,
    /// Newest first.
    entries: Mutex<Vec<KeywordHistoryEntry>>,
}

impl DedupLedger {
    pub fn load(store: Arc<dyn KeyValueStore>, keys: &StateKeys) -> Result<Self> {
        let key = keys.keyword_history();
        let entries: Vec<KeywordHistoryEntry> = load_json(store.as_ref(), &key)?.unwrap_or_default();
        debug!(entries = entries.len(), "Keyword history loaded");
        Ok(Self {
            store,
            key,
            entries: Mutex::new(entries),
        })
    }

    /// Entries inside the window, newest first. Expired entries are dropped
    /// and the pruned ledger is persisted.
    pub fn entries(&self, now: DateTime<Utc>) -> Result<Vec<KeywordHistoryEntry>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let cutoff = now - Duration::hours(DEDUP_WINDOW_HOURS);
        let before = entries.len();
        entries.retain(|e| e.published_at >= cutoff);
        if entries.len() != before {
            debug!(pruned = before - entries.len(), "Pruned expired keyword history");
            save_json(self.store.as_ref(), &self.key, &*entries)?;
        }
        Ok(entries.clone())
    }

    pub fn is_duplicate(&self, title: &str, now: DateTime<Utc>) -> Result<DuplicateCheck> {
        let keywords = extract_keywords(title);
        // Nothing to compare on; the empty set would match every other empty set.
        if keywords.is_empty() {
            return Ok(DuplicateCheck::unique());
        }

        let mut best: Option<(f64, String)> = None;
        for entry in self.entries(now)? {
            let score = similarity(&keywords, &entry.keywords);
            if score >= DUPLICATE_THRESHOLD {
                return Ok(DuplicateCheck {
                    is_duplicate: true,
                    matched_title: Some(entry.title),
                    similarity: Some(score),
                });
            }
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, entry.title));
            }
        }

        Ok(match best {
            Some((score, title)) => DuplicateCheck {
                is_duplicate: false,
                matched_title: Some(title),
                similarity: Some(score),
            },
            None => DuplicateCheck::unique(),
        })
    }

    pub fn record_publication(&self, title: &str, post_id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let cutoff = now - Duration::hours(DEDUP_WINDOW_HOURS);
        entries.retain(|e| e.published_at >= cutoff);

        let keywords = extract_keywords(title);
        info!(title, post_id, keywords = ?keywords, "Recording publication");
        entries.insert(
            0,
            KeywordHistoryEntry {
                post_id: post_id.to_string(),
                title: title.to_string(),
                keywords,
                published_at: now,
            },
        );
        entries.truncate(LEDGER_CAPACITY);
        save_json(self.store.as_ref(), &self.key, &*entries)
    }
}
