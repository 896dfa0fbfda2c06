use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::quality::{
    overall_score, MIN_OVERALL_SCORE, MIN_TRUST_SOURCE_RATIO, NEUTRAL_RUBRIC_SCORE,
};

// --- Topics ---

/// Which kind of feed a topic came from. Declaration order is the
/// tie-break priority: forum first, encyclopedia last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Forum,
    Aggregator,
    Encyclopedia,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Forum => write!(f, "forum"),
            SourceKind::Aggregator => write!(f, "aggregator"),
            SourceKind::Encyclopedia => write!(f, "encyclopedia"),
        }
    }
}

/// A candidate subject pulled from a feed. Lives for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    pub source_kind: SourceKind,
    /// Board / subreddit / list the topic came from, when the feed has one.
    pub source_ref: Option<String>,
    pub url: String,
    pub raw_score: f64,
    pub discovered_at: DateTime<Utc>,
}

impl Topic {
    /// Short provenance label for logs, e.g. `forum:technology`.
    pub fn provenance(&self) -> String {
        match &self.source_ref {
            Some(r) => format!("{}:{}", self.source_kind, r),
            None => self.source_kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTopic {
    #[serde(flatten)]
    pub topic: Topic,
    pub relevance_weight: f64,
    pub combined_score: f64,
    /// Name of the highest-weighted matching category.
    pub category: String,
}

// --- Research ---

/// Raw hit from the search collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub domain: String,
    pub snippet: String,
    /// 0..=100
    pub trust_score: u8,
}

/// A research report. Immutable once built; a re-run produces a new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub topic_title: String,
    pub summary: String,
    pub analysis: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    /// Rendered markdown of the analysis, pros and cons.
    pub body: String,
    pub sources: Vec<Source>,
    pub related_topics: Vec<String>,
    pub is_deep_analysis: bool,
    pub created_at: DateTime<Utc>,
}

// --- Quality ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub reliability: f64,
    pub completeness: f64,
    pub objectivity: f64,
    pub source_quality: f64,
    pub overall: f64,
    pub feedback: String,
    pub trust_source_ratio: f64,
    pub should_publish: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl QualityScore {
    /// Build a score from raw rubric values. Components are clamped to 1..=10
    /// (non-finite values become neutral) before the weighted sum is taken.
    pub fn from_components(
        reliability: f64,
        completeness: f64,
        objectivity: f64,
        source_quality: f64,
        feedback: impl Into<String>,
        trust_source_ratio: f64,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        let reliability = clamp_component(reliability);
        let completeness = clamp_component(completeness);
        let objectivity = clamp_component(objectivity);
        let source_quality = clamp_component(source_quality);
        let overall = overall_score(reliability, completeness, objectivity, source_quality);
        let trust_source_ratio = if trust_source_ratio.is_finite() {
            trust_source_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            reliability,
            completeness,
            objectivity,
            source_quality,
            overall,
            feedback: feedback.into(),
            trust_source_ratio,
            should_publish: overall >= MIN_OVERALL_SCORE
                && trust_source_ratio >= MIN_TRUST_SOURCE_RATIO,
            evaluated_at,
        }
    }
}

fn clamp_component(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(1.0, 10.0)
    } else {
        NEUTRAL_RUBRIC_SCORE
    }
}

// --- Scheduler ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerState {
    pub is_running: bool,
    pub is_processing: bool,
    pub emergency_stop: bool,
    /// -1 until the first successful run.
    pub last_run_hour: i32,
    /// `YYYY-MM-DD`, empty until the first successful run.
    pub last_run_date: String,
    pub next_run_hour: i32,
    #[serde(default)]
    pub total_runs: u64,
    #[serde(default)]
    pub successful_runs: u64,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            is_running: false,
            is_processing: false,
            emergency_stop: false,
            last_run_hour: -1,
            last_run_date: String::new(),
            next_run_hour: 0,
            total_runs: 0,
            successful_runs: 0,
        }
    }
}

impl SchedulerState {
    pub fn ran_this_hour(&self, hour: u32, date: &str) -> bool {
        self.last_run_hour == hour as i32 && self.last_run_date == date
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            self.successful_runs as f64 / self.total_runs as f64
        }
    }
}

// --- Curation log ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurationStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for CurationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurationStatus::Success => write!(f, "success"),
            CurationStatus::Failed => write!(f, "failed"),
            CurationStatus::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurationLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub topic_title: String,
    pub source: String,
    pub status: CurationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
}

impl CurationLogEntry {
    fn new(
        timestamp: DateTime<Utc>,
        topic_title: impl Into<String>,
        source: impl Into<String>,
        status: CurationStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            topic_title: topic_title.into(),
            source: source.into(),
            status,
            reason: None,
            post_id: None,
        }
    }

    pub fn success(
        timestamp: DateTime<Utc>,
        topic_title: impl Into<String>,
        source: impl Into<String>,
        post_id: impl Into<String>,
    ) -> Self {
        Self {
            post_id: Some(post_id.into()),
            ..Self::new(timestamp, topic_title, source, CurationStatus::Success)
        }
    }

    pub fn with_status(
        timestamp: DateTime<Utc>,
        topic_title: impl Into<String>,
        source: impl Into<String>,
        status: CurationStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(timestamp, topic_title, source, status)
        }
    }
}

// --- Posts ---

/// The record handed to the post store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[builder(setter(into))]
    pub title: String,
    #[builder(setter(into))]
    pub content: String,
    #[builder(setter(into))]
    pub board: String,
    #[builder(default)]
    pub tags: Vec<String>,
    #[builder(setter(into))]
    pub author: String,
    #[builder(default = true)]
    pub is_ai_generated: bool,
    pub report_id: Uuid,
    #[builder(default, setter(strip_option, into))]
    pub source_url: Option<String>,
    pub quality_score: f64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_priority_order() {
        assert!(SourceKind::Forum < SourceKind::Aggregator);
        assert!(SourceKind::Aggregator < SourceKind::Encyclopedia);
    }

    #[test]
    fn quality_score_clamps_and_rejects_nan() {
        let score = QualityScore::from_components(42.0, f64::NAN, -3.0, 7.0, "", 0.8, Utc::now());
        assert_eq!(score.reliability, 10.0);
        assert_eq!(score.completeness, NEUTRAL_RUBRIC_SCORE);
        assert_eq!(score.objectivity, 1.0);
        assert!(score.overall.is_finite());
        assert!((1.0..=10.0).contains(&score.overall));
    }

    #[test]
    fn should_publish_needs_both_thresholds() {
        let now = Utc::now();
        assert!(QualityScore::from_components(8.0, 8.0, 8.0, 8.0, "", 0.6, now).should_publish);
        assert!(!QualityScore::from_components(8.0, 8.0, 8.0, 8.0, "", 0.5, now).should_publish);
        assert!(!QualityScore::from_components(6.5, 6.5, 6.5, 6.5, "", 0.8, now).should_publish);
    }

    #[test]
    fn scheduler_state_defaults_to_never_run() {
        let state = SchedulerState::default();
        assert_eq!(state.last_run_hour, -1);
        assert!(!state.ran_this_hour(0, ""));
        assert_eq!(state.success_rate(), 0.0);
    }

    #[test]
    fn scheduler_state_serializes_camel_case() {
        let json = serde_json::to_value(SchedulerState::default()).unwrap();
        assert_eq!(json["lastRunHour"], -1);
        assert_eq!(json["emergencyStop"], false);
    }

    #[test]
    fn log_entry_omits_empty_optionals() {
        let entry = CurationLogEntry::success(Utc::now(), "GPU news", "forum:technology", "p1");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["postId"], "p1");
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn post_record_builder_defaults() {
        let record = PostRecord::builder()
            .title("[AI Research] X")
            .content("body")
            .board("ai-research")
            .author("ai-curator")
            .report_id(Uuid::new_v4())
            .quality_score(8.1)
            .created_at(Utc::now())
            .build();
        assert!(record.is_ai_generated);
        assert!(record.tags.is_empty());
        assert_eq!(record.source_url, None);
    }
}
