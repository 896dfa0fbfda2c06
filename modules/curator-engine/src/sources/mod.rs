//! Topic-source adapters and the concurrent fan-out that drives them.

mod hacker_news;
mod reddit;
mod wikipedia;

pub use hacker_news::HackerNewsSource;
pub use reddit::RedditSource;
pub use wikipedia::WikipediaSource;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use curator_common::Topic;

use crate::traits::TopicSource;

/// Adapters polled at once during discovery.
pub const MAX_CONCURRENT_SOURCES: usize = 4;

const USER_AGENT: &str = concat!("curator/", env!("CARGO_PKG_VERSION"), " (topic discovery)");

/// Shared HTTP client for the adapters. The per-adapter discovery timeout is
/// enforced separately; this is only a ceiling for a single request.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

async fn poll_source(
    source: Arc<dyn TopicSource>,
    timeout: Duration,
) -> (String, Result<Vec<Topic>>) {
    let name = source.name().to_string();
    let result = match tokio::time::timeout(timeout, source.fetch_topics()).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("timed out after {}s", timeout.as_secs_f32())),
    };
    (name, result)
}

/// Poll every source with its own timeout and concatenate the results in
/// source order. A failing or slow source contributes nothing.
pub async fn discover(sources: &[Arc<dyn TopicSource>], timeout: Duration) -> Vec<Topic> {
    // Boxed up front so the returned future stays `Send` for `tokio::spawn`.
    let polls: Vec<BoxFuture<'static, (String, Result<Vec<Topic>>)>> = sources
        .iter()
        .cloned()
        .map(|source| poll_source(source, timeout).boxed())
        .collect();
    let results: Vec<(String, Result<Vec<Topic>>)> = stream::iter(polls)
        .buffered(MAX_CONCURRENT_SOURCES)
        .collect()
        .await;

    let mut topics = Vec::new();
    let mut failed = 0;
    for (name, result) in results {
        match result {
            Ok(found) => {
                info!(source = name.as_str(), count = found.len(), "Source polled");
                topics.extend(found);
            }
            Err(e) => {
                failed += 1;
                warn!(source = name.as_str(), error = %e, "Source failed, continuing without it");
            }
        }
    }

    info!(
        sources = sources.len(),
        failed,
        topics = topics.len(),
        "Discovery complete"
    );
    topics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{topic, FailingSource, SlowSource, StaticSource};
    use curator_common::SourceKind;

    #[tokio::test]
    async fn failed_source_contributes_nothing() {
        let sources: Vec<Arc<dyn TopicSource>> = vec![
            Arc::new(StaticSource::new(
                "forum",
                SourceKind::Forum,
                vec![topic("GPU prices fall", SourceKind::Forum, 500.0)],
            )),
            Arc::new(FailingSource::new("aggregator", SourceKind::Aggregator)),
            Arc::new(StaticSource::new(
                "encyclopedia",
                SourceKind::Encyclopedia,
                vec![topic("Transformer (machine learning)", SourceKind::Encyclopedia, 90_000.0)],
            )),
        ];

        let topics = discover(&sources, Duration::from_secs(5)).await;
        let titles: Vec<&str> = topics.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["GPU prices fall", "Transformer (machine learning)"]);
    }

    #[tokio::test]
    async fn slow_source_times_out_without_blocking_others() {
        let sources: Vec<Arc<dyn TopicSource>> = vec![
            Arc::new(SlowSource::new("stuck", Duration::from_secs(30))),
            Arc::new(StaticSource::new(
                "forum",
                SourceKind::Forum,
                vec![topic("Rust compiler release", SourceKind::Forum, 120.0)],
            )),
        ];

        let topics = discover(&sources, Duration::from_millis(50)).await;
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].title, "Rust compiler release");
    }

    #[tokio::test]
    async fn native_order_within_a_source_is_kept() {
        let sources: Vec<Arc<dyn TopicSource>> = vec![Arc::new(StaticSource::new(
            "forum",
            SourceKind::Forum,
            vec![
                topic("first", SourceKind::Forum, 10.0),
                topic("second", SourceKind::Forum, 900.0),
            ],
        ))];
        let topics = discover(&sources, Duration::from_secs(1)).await;
        assert_eq!(topics[0].title, "first");
        assert_eq!(topics[1].title, "second");
    }
}
