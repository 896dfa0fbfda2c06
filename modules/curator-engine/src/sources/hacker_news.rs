use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Deserialize;
use tracing::debug;

use curator_common::{SourceKind, Topic};

use crate::traits::TopicSource;

const HN_API: &str = "https://hacker-news.firebaseio.com/v0";

/// Hacker News front page (top stories).
pub struct HackerNewsSource {
    limit: usize,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    score: Option<u64>,
    #[serde(default)]
    dead: bool,
    #[serde(default)]
    deleted: bool,
}

impl HackerNewsSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { limit: 15, client }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    async fn item(&self, id: u64) -> Result<Item> {
        self.client
            .get(format!("{HN_API}/item/{id}.json"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Failed to parse HN item {id}"))
    }
}

fn to_topic(item: Item, now: DateTime<Utc>) -> Option<Topic> {
    if item.dead || item.deleted {
        return None;
    }
    let title = item.title?.trim().to_string();
    if title.is_empty() {
        return None;
    }
    let url = item
        .url
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={}", item.id));
    Some(Topic {
        title,
        source_kind: SourceKind::Aggregator,
        source_ref: None,
        url,
        raw_score: item.score.unwrap_or(0) as f64,
        discovered_at: now,
    })
}

#[async_trait]
impl TopicSource for HackerNewsSource {
    fn name(&self) -> &str {
        "hackernews"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Aggregator
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>> {
        let ids: Vec<u64> = self
            .client
            .get(format!("{HN_API}/topstories.json"))
            .send()
            .await
            .context("HN top stories request failed")?
            .error_for_status()
            .context("HN returned an error status")?
            .json()
            .await
            .context("Failed to parse HN top stories")?;

        let now = Utc::now();
        let items = join_all(ids.iter().take(self.limit).map(|id| self.item(*id))).await;

        Ok(items
            .into_iter()
            .filter_map(|result| match result {
                Ok(item) => to_topic(item, now),
                Err(e) => {
                    debug!(error = %e, "Skipping HN item");
                    None
                }
            })
            .collect())
    }
}
