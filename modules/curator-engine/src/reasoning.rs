use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;

use ai_client::{CompletionOptions, Message, OpenAi};

use crate::traits::{ReasoningService, TextStream};

/// Wrapper to make OpenAi implement our dyn-compatible ReasoningService trait.
pub struct OpenAiReasoner {
    ai: Arc<OpenAi>,
}

impl OpenAiReasoner {
    pub fn new(ai: Arc<OpenAi>) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl ReasoningService for OpenAiReasoner {
    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> Result<String> {
        Ok(self.ai.chat(messages, options).await?)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<TextStream> {
        let stream = self.ai.chat_stream(messages, options).await?;
        Ok(stream.map(|chunk| chunk.map_err(anyhow::Error::from)).boxed())
    }
}
