//! One curation run: discover, rank, dedup, research, gate, publish.
//!
//! Each stage can end the run early with a `CuratorError`. Nothing before the
//! publisher touches the post store, so an early exit leaves nothing to undo.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use curator_common::{CurationLogEntry, CurationStatus, CuratorError, QualityScore, ScoredTopic};

use crate::dedup::DedupLedger;
use crate::publisher::Publisher;
use crate::quality::QualityGate;
use crate::relevance;
use crate::research::ResearchCommissioner;
use crate::sources;
use crate::traits::TopicSource;

/// Log source label for runs that ended before a topic was chosen.
const DISCOVERY_SOURCE: &str = "discovery";

#[derive(Debug)]
pub struct RunOutcome {
    /// The candidate the run settled on, if it got that far.
    pub topic: Option<ScoredTopic>,
    pub report_id: Option<Uuid>,
    pub quality: Option<QualityScore>,
    /// Post id on success.
    pub result: Result<String, CuratorError>,
}

impl RunOutcome {
    fn early(error: CuratorError) -> Self {
        Self {
            topic: None,
            report_id: None,
            quality: None,
            result: Err(error),
        }
    }

    pub fn status(&self) -> CurationStatus {
        match &self.result {
            Ok(_) => CurationStatus::Success,
            Err(e) => e.status(),
        }
    }

    pub fn log_entry(&self, now: DateTime<Utc>) -> CurationLogEntry {
        let (title, source) = match &self.topic {
            Some(t) => (t.topic.title.clone(), t.topic.provenance()),
            None => (String::new(), DISCOVERY_SOURCE.to_string()),
        };
        match &self.result {
            Ok(post_id) => CurationLogEntry::success(now, title, source, post_id.clone()),
            Err(e) => CurationLogEntry::with_status(now, title, source, e.status(), e.to_string()),
        }
    }
}

pub struct CurationPipeline {
    sources: Vec<Arc<dyn TopicSource>>,
    adapter_timeout: Duration,
    ledger: Arc<DedupLedger>,
    research: ResearchCommissioner,
    gate: QualityGate,
    publisher: Publisher,
}

impl CurationPipeline {
    pub fn new(
        sources: Vec<Arc<dyn TopicSource>>,
        adapter_timeout: Duration,
        ledger: Arc<DedupLedger>,
        research: ResearchCommissioner,
        gate: QualityGate,
        publisher: Publisher,
    ) -> Self {
        Self {
            sources,
            adapter_timeout,
            ledger,
            research,
            gate,
            publisher,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> RunOutcome {
        let topics = sources::discover(&self.sources, self.adapter_timeout).await;
        if topics.is_empty() {
            return RunOutcome::early(CuratorError::NoTopicsDiscovered);
        }

        let discovered = topics.len();
        let ranked = relevance::rank(topics);
        info!(discovered, relevant = ranked.len(), "Topics ranked");
        if ranked.is_empty() {
            return RunOutcome::early(CuratorError::NoRelevantTopics);
        }

        let topic = match self.first_unpublished(ranked, now) {
            Ok(topic) => topic,
            Err(e) => return RunOutcome::early(e),
        };
        info!(
            title = topic.topic.title.as_str(),
            source = topic.topic.provenance().as_str(),
            score = topic.combined_score,
            category = topic.category.as_str(),
            "Selected topic"
        );

        let mut report_id = None;
        let mut quality = None;
        let result: Result<String, CuratorError> = async {
            let report = self.research.research(&topic.topic.title, now).await?;
            report_id = Some(report.id);

            let verdict = self.gate.evaluate(&report, now).await?;
            quality = Some(verdict.score.clone());
            if !verdict.approved() {
                return Err(CuratorError::QualityRejected {
                    feedback: verdict.feedback(),
                });
            }

            self.publisher.publish(&topic, &report, &verdict, now).await
        }
        .await;

        RunOutcome {
            topic: Some(topic),
            report_id,
            quality,
            result,
        }
    }

    /// Highest-ranked candidate that is not a near-duplicate of a recent post.
    fn first_unpublished(
        &self,
        ranked: Vec<ScoredTopic>,
        now: DateTime<Utc>,
    ) -> Result<ScoredTopic, CuratorError> {
        let checked = ranked.len();
        for candidate in ranked {
            let check = self.ledger.is_duplicate(&candidate.topic.title, now)?;
            if !check.is_duplicate {
                return Ok(candidate);
            }
            debug!(
                title = candidate.topic.title.as_str(),
                matched = check.matched_title.as_deref().unwrap_or_default(),
                similarity = check.similarity.unwrap_or_default(),
                "Skipping near-duplicate"
            );
        }
        Err(CuratorError::AllDuplicates { checked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{topic, Harness};
    use curator_common::SourceKind;

    #[tokio::test]
    async fn publishes_top_ranked_topic() {
        let harness = Harness::new().with_topics(vec![
            topic("Rust compiler speeds up builds", SourceKind::Forum, 150.0),
            topic("NVIDIA unveils Rubin GPU", SourceKind::Forum, 2400.0),
        ]);

        let outcome = harness.pipeline().run(Utc::now()).await;

        assert_eq!(outcome.status(), CurationStatus::Success);
        assert_eq!(outcome.topic.unwrap().topic.title, "NVIDIA unveils Rubin GPU");
        assert!(outcome.quality.unwrap().should_publish);
        assert_eq!(harness.posts.posts().len(), 1);
    }

    #[tokio::test]
    async fn empty_feeds_skip_without_topic() {
        let harness = Harness::new();
        let outcome = harness.pipeline().run(Utc::now()).await;

        assert!(matches!(outcome.result, Err(CuratorError::NoTopicsDiscovered)));
        let entry = outcome.log_entry(Utc::now());
        assert_eq!(entry.status, CurationStatus::Skipped);
        assert_eq!(entry.source, "discovery");
        assert_eq!(harness.searcher.queries().len(), 0);
    }

    #[tokio::test]
    async fn every_candidate_duplicate_is_skipped() {
        let harness = Harness::new().with_topics(vec![topic(
            "OpenAI ships GPT-5 reasoning model",
            SourceKind::Aggregator,
            500.0,
        )]);
        harness
            .ledger
            .record_publication("OpenAI ships GPT-5 reasoning model", "p0", Utc::now())
            .unwrap();

        let outcome = harness.pipeline().run(Utc::now()).await;
        assert!(matches!(outcome.result, Err(CuratorError::AllDuplicates { checked: 1 })));
        assert_eq!(outcome.status(), CurationStatus::Skipped);
        assert!(harness.posts.posts().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_logged_as_failed() {
        let harness = Harness::new()
            .with_failing_store()
            .with_topics(vec![topic("TSMC 2nm volume production", SourceKind::Forum, 900.0)]);

        let outcome = harness.pipeline().run(Utc::now()).await;
        let entry = outcome.log_entry(Utc::now());
        assert_eq!(entry.status, CurationStatus::Failed);
        assert_eq!(entry.topic_title, "TSMC 2nm volume production");
        assert!(entry.reason.unwrap().starts_with("publish failed"));
        assert!(harness.ledger.entries(Utc::now()).unwrap().is_empty());
    }
}
