use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use super::sse::{SseDecoder, SseEvent};
use super::types::*;
use crate::error::AiError;
use crate::traits::TextStream;

pub(crate) const OPENAI_API_URL: &str = "https://api.openai.com/v1";

pub(crate) struct OpenAiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, http: reqwest::Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            http,
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap, AiError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| AiError::Config(format!("invalid API key header: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn post(&self, request: &ChatRequest) -> Result<reqwest::Response, AiError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<String, AiError> {
        debug!(model = %request.model, messages = request.messages.len(), "Chat request");

        let response: ChatResponse = self.post(request).await?.json().await?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Chat usage"
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AiError::EmptyResponse)
    }

    /// Open a streaming completion. Errors before the first byte (HTTP status,
    /// connect failure) surface here; errors mid-stream surface as stream items.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream, AiError> {
        debug!(model = %request.model, "Streaming chat request");

        let response = self.post(request).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(AiError::from)?;
                for event in decoder.push(&chunk) {
                    match event {
                        SseEvent::Done => break 'outer,
                        SseEvent::Data(data) => {
                            if let Some(text) = decode_chunk(&data) {
                                yield text;
                            }
                        }
                    }
                }
            }
            if let Some(SseEvent::Data(data)) = decoder.finish() {
                if let Some(text) = decode_chunk(&data) {
                    yield text;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn decode_chunk(data: &str) -> Option<String> {
    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => chunk.text().map(str::to_string),
        Err(e) => {
            warn!(error = %e, "Skipping malformed stream chunk");
            None
        }
    }
}
