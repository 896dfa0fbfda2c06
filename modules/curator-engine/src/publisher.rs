use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use curator_common::{CuratorError, PostRecord, Report, ScoredTopic};

use crate::dedup::DedupLedger;
use crate::quality::GateVerdict;
use crate::traits::PostStore;

const TITLE_PREFIX: &str = "[AI Research]";
const CURATED_TAG: &str = "ai-curated";

/// Turns an approved report into a post. The only stage with an external
/// side effect, so it always runs last.
pub struct Publisher {
    store: Arc<dyn PostStore>,
    ledger: Arc<DedupLedger>,
    board: String,
    author: String,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn PostStore>,
        ledger: Arc<DedupLedger>,
        board: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ledger,
            board: board.into(),
            author: author.into(),
        }
    }

    pub async fn publish(
        &self,
        topic: &ScoredTopic,
        report: &Report,
        verdict: &GateVerdict,
        now: DateTime<Utc>,
    ) -> Result<String, CuratorError> {
        let record = PostRecord::builder()
            .title(format!("{TITLE_PREFIX} {}", report.topic_title))
            .content(format_post_body(report, verdict))
            .board(self.board.clone())
            .tags(vec![
                CURATED_TAG.to_string(),
                topic.topic.source_kind.to_string(),
                topic.category.clone(),
            ])
            .author(self.author.clone())
            .report_id(report.id)
            .source_url(topic.topic.url.clone())
            .quality_score(verdict.score.overall)
            .created_at(now)
            .build();

        let post_id = self
            .store
            .create_post(&record)
            .await
            .map_err(|e| CuratorError::Publish(format!("{e:#}")))?;
        info!(post_id = post_id.as_str(), title = record.title.as_str(), "Post published");

        // The post exists now; a ledger write failure must not turn it into a
        // failed run.
        if let Err(e) = self.ledger.record_publication(&report.topic_title, &post_id, now) {
            warn!(post_id = post_id.as_str(), error = %e, "Failed to record publication in keyword history");
        }
        Ok(post_id)
    }
}

/// Markdown post body.
pub fn format_post_body(report: &Report, verdict: &GateVerdict) -> String {
    let mut body = format!("## Summary\n\n{}\n\n{}", report.summary, report.body);

    body.push_str("\n## Sources\n\n");
    for (i, source) in report.sources.iter().enumerate() {
        let _ = writeln!(
            body,
            "{}. [{}]({}) ({}, trust {}/100)",
            i + 1,
            source.title,
            source.url,
            source.domain,
            source.trust_score
        );
    }

    if !report.related_topics.is_empty() {
        body.push_str("\n## Related Topics\n\n");
        for related in &report.related_topics {
            let _ = writeln!(body, "- {related}");
        }
    }

    let _ = write!(
        body,
        "\n---\n*Quality score {:.1}/10 · trusted sources {:.0}%{}*\n",
        verdict.score.overall,
        verdict.score.trust_source_ratio * 100.0,
        if report.is_deep_analysis { " · deep analysis" } else { "" }
    );
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StateKeys};
    use crate::testing::{approved_verdict, report_with_trust, scored, MockPostStore};
    use curator_common::SourceKind;

    fn publisher(store: Arc<MockPostStore>) -> (Publisher, Arc<DedupLedger>) {
        let kv = Arc::new(MemoryStore::new());
        let ledger = Arc::new(DedupLedger::load(kv, &StateKeys::new("test")).unwrap());
        (
            Publisher::new(store, ledger.clone(), "ai-research", "ai-curator"),
            ledger,
        )
    }

    #[tokio::test]
    async fn publishes_and_records_in_ledger() {
        let store = Arc::new(MockPostStore::new());
        let (publisher, ledger) = publisher(store.clone());
        let topic = scored("Samsung HBM4 sampling begins", SourceKind::Forum, 800.0);
        let report = report_with_trust("Samsung HBM4 sampling begins", &[100, 90]);
        let verdict = approved_verdict();
        let now = Utc::now();

        let post_id = publisher.publish(&topic, &report, &verdict, now).await.unwrap();

        let posts = store.posts();
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.title, "[AI Research] Samsung HBM4 sampling begins");
        assert_eq!(post.board, "ai-research");
        assert_eq!(post.tags, vec!["ai-curated", "forum", topic.category.as_str()]);
        assert_eq!(post.report_id, report.id);
        assert_eq!(post.source_url.as_deref(), Some(topic.topic.url.as_str()));
        assert!(post.is_ai_generated);

        let entries = ledger.entries(now).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].post_id, post_id);
    }

    #[tokio::test]
    async fn store_failure_is_a_publish_error_and_leaves_ledger_alone() {
        let store = Arc::new(MockPostStore::failing());
        let (publisher, ledger) = publisher(store);
        let topic = scored("Intel 18A yields", SourceKind::Aggregator, 300.0);
        let report = report_with_trust("Intel 18A yields", &[90]);

        let err = publisher
            .publish(&topic, &report, &approved_verdict(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CuratorError::Publish(_)));
        assert!(ledger.entries(Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn body_lists_sources_and_scores() {
        let mut report = report_with_trust("Topic", &[100, 50]);
        report.related_topics = vec!["Packaging".to_string()];
        let body = format_post_body(&report, &approved_verdict());

        assert!(body.starts_with("## Summary\n\n"));
        assert!(body.contains("1. ["));
        assert!(body.contains("trust 100/100"));
        assert!(body.contains("2. ["));
        assert!(body.contains("## Related Topics\n\n- Packaging"));
        assert!(body.contains("Quality score 8.5/10"));
    }
}
