mod client;
mod sse;
pub(crate) mod types;

use std::time::Duration;

use crate::error::AiError;
use crate::retry::RetryPolicy;
use crate::traits::{CompletionOptions, Message, TextStream};

use client::{OpenAiClient, OPENAI_API_URL};

// =============================================================================
// OpenAi
// =============================================================================

/// Chat client for any OpenAI-compatible `/chat/completions` endpoint
/// (OpenAI, Groq, OpenRouter, local gateways).
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_API_URL.to_string(),
            retry: RetryPolicy::default(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Per-request ceiling. A timeout surfaces as a retryable network error.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, AiError> {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(self)
    }

    /// Get the default model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> OpenAiClient {
        OpenAiClient::new(&self.api_key, self.http.clone()).with_base_url(&self.base_url)
    }

    fn request(&self, messages: &[Message], options: &CompletionOptions) -> types::ChatRequest {
        let model = options.model.as_deref().unwrap_or(&self.model);
        types::ChatRequest::new(model)
            .messages(messages)
            .temperature(options.temperature)
            .max_tokens(options.max_tokens)
    }

    /// Non-streaming completion with bounded retry.
    pub async fn chat(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, AiError> {
        if messages.is_empty() {
            return Err(AiError::Config("no messages to send".into()));
        }
        let request = self.request(messages, options);
        let client = self.client();
        self.retry.run(|| client.chat(&request)).await
    }

    /// Streaming completion. Only opening the stream is retried; once text has
    /// started flowing a failure is returned to the caller as a stream item.
    pub async fn chat_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<TextStream, AiError> {
        if messages.is_empty() {
            return Err(AiError::Config("no messages to send".into()));
        }
        let request = self.request(messages, options).streaming();
        let client = self.client();
        self.retry.run(|| client.chat_stream(&request)).await
    }

    /// Simple system + user completion (convenience method).
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String, AiError> {
        let messages = [Message::system(system), Message::user(user)];
        self.chat(&messages, &CompletionOptions::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_new() {
        let ai = OpenAi::new("sk-test", "llama-3.3-70b-versatile");
        assert_eq!(ai.model(), "llama-3.3-70b-versatile");
        assert_eq!(ai.base_url, OPENAI_API_URL);
        assert_eq!(ai.retry, RetryPolicy::default());
    }

    #[test]
    fn test_options_override_default_model() {
        let ai = OpenAi::new("sk-test", "default-model");
        let messages = [Message::user("hi")];
        let options = CompletionOptions::new().model("other").max_tokens(64);
        let request = ai.request(&messages, &options);
        assert_eq!(request.model, "other");
        assert_eq!(request.max_tokens, Some(64));
        assert_eq!(request.temperature, None);
    }

    #[tokio::test]
    async fn test_empty_messages_rejected_without_network() {
        let ai = OpenAi::new("sk-test", "m").with_base_url("http://127.0.0.1:9");
        let err = ai.chat(&[], &CompletionOptions::new()).await.unwrap_err();
        assert!(matches!(err, AiError::Config(_)));
    }
}
