use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use curator_common::SearchHit;

use crate::research::domain_of;
use crate::traits::WebSearcher;

const SERPER_URL: &str = "https://google.serper.dev/search";

// --- Serper (Google Search) ---

pub struct SerperSearcher {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearcher {
    pub fn new(api_key: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            endpoint: SERPER_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to build HTTP client")?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

fn to_hits(response: SerperResponse) -> Vec<SearchHit> {
    response
        .organic
        .into_iter()
        .filter(|r| !r.link.is_empty())
        .map(|r| SearchHit {
            domain: domain_of(&r.link),
            url: r.link,
            title: r.title,
            snippet: r.snippet,
        })
        .collect()
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        info!(query, limit, "Serper search");

        let body = serde_json::json!({
            "q": query,
            "num": limit,
        });

        let data: SerperResponse = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Serper API request failed")?
            .error_for_status()
            .context("Serper returned an error status")?
            .json()
            .await
            .context("Failed to parse Serper response")?;

        let mut hits = to_hits(data);
        hits.truncate(limit);
        info!(query, count = hits.len(), "Serper search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organic_results_become_hits_with_domains() {
        let response: SerperResponse = serde_json::from_str(
            r#"{"organic": [
                {"link": "https://www.theverge.com/a", "title": "A", "snippet": "sa", "position": 1},
                {"title": "no link"},
                {"link": "https://arxiv.org/abs/1", "title": "B"}
            ], "searchParameters": {"q": "x"}}"#,
        )
        .unwrap();

        let hits = to_hits(response);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].domain, "theverge.com");
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn missing_organic_is_empty() {
        let response: SerperResponse = serde_json::from_str("{}").unwrap();
        assert!(to_hits(response).is_empty());
    }
}
