use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use curator_common::{SourceKind, Topic};

use crate::traits::TopicSource;

/// Hot posts from one subreddit.
pub struct RedditSource {
    name: String,
    subreddit: String,
    limit: u32,
    min_score: i64,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    stickied: bool,
    #[serde(default)]
    over_18: bool,
}

impl RedditSource {
    pub fn new(client: reqwest::Client, subreddit: &str) -> Self {
        Self {
            name: format!("reddit:{subreddit}"),
            subreddit: subreddit.to_string(),
            limit: 25,
            min_score: 100,
            client,
        }
    }

    pub fn with_min_score(mut self, min_score: i64) -> Self {
        self.min_score = min_score;
        self
    }

    fn url(&self) -> String {
        format!(
            "https://www.reddit.com/r/{}/hot.json?limit={}",
            self.subreddit, self.limit
        )
    }

    fn to_topics(&self, listing: Listing, now: DateTime<Utc>) -> Vec<Topic> {
        listing
            .data
            .children
            .into_iter()
            .map(|c| c.data)
            .filter(|p| !p.stickied && !p.over_18 && p.score >= self.min_score)
            .filter(|p| !p.title.trim().is_empty())
            .map(|p| Topic {
                title: p.title.trim().to_string(),
                source_kind: SourceKind::Forum,
                source_ref: Some(self.subreddit.clone()),
                url: format!("https://www.reddit.com{}", p.permalink),
                raw_score: p.score as f64,
                discovered_at: now,
            })
            .collect()
    }
}

#[async_trait]
impl TopicSource for RedditSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Forum
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>> {
        let listing: Listing = self
            .client
            .get(self.url())
            .send()
            .await
            .context("Reddit request failed")?
            .error_for_status()
            .context("Reddit returned an error status")?
            .json()
            .await
            .context("Failed to parse Reddit listing")?;

        Ok(self.to_topics(listing, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "data": {"children": [
            {"data": {"title": "Weekly thread", "score": 5000, "permalink": "/r/technology/a", "stickied": true}},
            {"data": {"title": "NVIDIA ships new GPU", "score": 4200, "permalink": "/r/technology/b"}},
            {"data": {"title": "Small post", "score": 12, "permalink": "/r/technology/c"}},
            {"data": {"title": "Marked adult", "score": 900, "permalink": "/r/technology/d", "over_18": true}}
        ]}
    }"#;

    #[test]
    fn keeps_ranked_posts_above_min_score() {
        let source = RedditSource::new(reqwest::Client::new(), "technology");
        let listing: Listing = serde_json::from_str(LISTING).unwrap();
        let topics = source.to_topics(listing, Utc::now());

        assert_eq!(topics.len(), 1);
        let t = &topics[0];
        assert_eq!(t.title, "NVIDIA ships new GPU");
        assert_eq!(t.source_ref.as_deref(), Some("technology"));
        assert_eq!(t.url, "https://www.reddit.com/r/technology/b");
        assert_eq!(t.raw_score, 4200.0);
    }

    #[test]
    fn min_score_is_configurable() {
        let source = RedditSource::new(reqwest::Client::new(), "technology").with_min_score(0);
        let listing: Listing = serde_json::from_str(LISTING).unwrap();
        assert_eq!(source.to_topics(listing, Utc::now()).len(), 2);
    }

    #[test]
    fn url_targets_hot_listing() {
        let source = RedditSource::new(reqwest::Client::new(), "MachineLearning");
        assert_eq!(source.url(), "https://www.reddit.com/r/MachineLearning/hot.json?limit=25");
        assert_eq!(source.name(), "reddit:MachineLearning");
    }
}
