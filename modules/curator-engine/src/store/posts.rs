use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use curator_common::PostRecord;

use crate::traits::PostStore;

/// Post store reached over HTTP: `POST {base}/posts` with the record as JSON,
/// answering `{"id": "..."}`.
pub struct HttpPostStore {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    #[serde(alias = "postId")]
    id: String,
}

impl HttpPostStore {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to build HTTP client")?,
        })
    }
}

#[async_trait]
impl PostStore for HttpPostStore {
    async fn create_post(&self, record: &PostRecord) -> Result<String> {
        let url = format!("{}/posts", self.base_url);

        let mut request = self.client.post(&url).json(record);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.context("Post store request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Post store returned {status}: {body}");
        }

        let created: CreatedPost = resp
            .json()
            .await
            .context("Failed to parse post store response")?;

        info!(post_id = created.id.as_str(), title = record.title.as_str(), "Post created");
        Ok(created.id)
    }
}
