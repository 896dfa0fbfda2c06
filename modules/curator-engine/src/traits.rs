// Trait boundaries between the curation pipeline and the outside world.
//
// Five seams, each with a production impl and a mock in `testing`:
// - TopicSource: one feed (forum board, aggregator, encyclopedia trending list)
// - WebSearcher: the search collaborator used by the research protocol
// - ReasoningService: the LLM used for expansion, synthesis and evaluation
// - PostStore: where approved reports are published
// - KeyValueStore: durable local state (scheduler state, ledger, log)

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use ai_client::{CompletionOptions, Message};
use curator_common::{PostRecord, SearchHit, SourceKind, Topic};

/// Incremental text from a streaming completion.
pub type TextStream = BoxStream<'static, Result<String>>;

// ---------------------------------------------------------------------------
// TopicSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TopicSource: Send + Sync {
    /// Stable label for logs, e.g. `reddit:technology`.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Current topics in the feed's own rank order. Reflects live feed state,
    /// so two calls may disagree.
    async fn fetch_topics(&self) -> Result<Vec<Topic>>;
}

// ---------------------------------------------------------------------------
// WebSearcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Zero results is `Ok(vec![])`; only transport failures are errors.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// ReasoningService
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> Result<String>;

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<TextStream>;
}

// ---------------------------------------------------------------------------
// PostStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Persist a post and return its id. Not idempotent: call once per report.
    async fn create_post(&self, record: &PostRecord) -> Result<String>;
}

// ---------------------------------------------------------------------------
// KeyValueStore
// ---------------------------------------------------------------------------

/// Durable string-keyed documents. Writes replace the whole value.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn put(&self, key: &str, value: &str) -> Result<()>;
}
