use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;

use curator_common::{SourceKind, Topic};

use crate::traits::TopicSource;

const PAGEVIEWS_API: &str = "https://wikimedia.org/api/rest_v1/metrics/pageviews/top";

/// Namespaces that are never article topics.
const SKIPPED_PREFIXES: &[&str] = &[
    "Special:", "Wikipedia:", "File:", "Portal:", "Help:", "Category:", "Template:", "Talk:",
    "User:",
];

/// Most-viewed Wikipedia articles for the previous UTC day.
pub struct WikipediaSource {
    project: String,
    limit: usize,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TopResponse {
    #[serde(default)]
    items: Vec<TopItem>,
}

#[derive(Debug, Deserialize)]
struct TopItem {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    article: String,
    views: u64,
}

impl WikipediaSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            project: "en.wikipedia".to_string(),
            limit: 25,
            client,
        }
    }

    fn url_for(&self, day: NaiveDate) -> String {
        format!(
            "{PAGEVIEWS_API}/{}/all-access/{}",
            self.project,
            day.format("%Y/%m/%d")
        )
    }

    fn to_topics(&self, response: TopResponse, now: DateTime<Utc>) -> Vec<Topic> {
        response
            .items
            .into_iter()
            .flat_map(|item| item.articles)
            .filter(|a| a.article != "Main_Page")
            .filter(|a| !SKIPPED_PREFIXES.iter().any(|p| a.article.starts_with(p)))
            .take(self.limit)
            .map(|a| Topic {
                title: a.article.replace('_', " "),
                source_kind: SourceKind::Encyclopedia,
                source_ref: Some(self.project.clone()),
                url: format!("https://{}.org/wiki/{}", self.project, a.article),
                raw_score: a.views as f64,
                discovered_at: now,
            })
            .collect()
    }
}

#[async_trait]
impl TopicSource for WikipediaSource {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Encyclopedia
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>> {
        let now = Utc::now();
        // Today's totals are not published until the day is over.
        let day = (now - Duration::days(1)).date_naive();

        let response: TopResponse = self
            .client
            .get(self.url_for(day))
            .send()
            .await
            .context("Wikimedia pageviews request failed")?
            .error_for_status()
            .context("Wikimedia returned an error status")?
            .json()
            .await
            .context("Failed to parse Wikimedia pageviews")?;

        Ok(self.to_topics(response, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_uses_previous_day_path() {
        let source = WikipediaSource::new(reqwest::Client::new());
        let day = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(
            source.url_for(day),
            "https://wikimedia.org/api/rest_v1/metrics/pageviews/top/en.wikipedia/all-access/2026/03/07"
        );
    }

    #[test]
    fn skips_main_page_and_namespaces() {
        let source = WikipediaSource::new(reqwest::Client::new());
        let response: TopResponse = serde_json::from_str(
            r#"{"items": [{"articles": [
                {"article": "Main_Page", "views": 5000000, "rank": 1},
                {"article": "Special:Search", "views": 900000, "rank": 2},
                {"article": "Large_language_model", "views": 120000, "rank": 3}
            ]}]}"#,
        )
        .unwrap();

        let topics = source.to_topics(response, Utc::now());
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].title, "Large language model");
        assert_eq!(topics[0].url, "https://en.wikipedia.org/wiki/Large_language_model");
        assert_eq!(topics[0].raw_score, 120000.0);
    }
}
