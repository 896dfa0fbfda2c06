//! In-memory collaborators and fixtures for tests.
//!
//! Mocks are configured builder-style and record what they were asked, so a
//! test can assert both the result and which stages actually ran.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use ai_client::{CompletionOptions, Message, MessageRole};
use curator_common::{
    ContentPolicy, PolicyCheck, PostRecord, QualityScore, Report, ScoredTopic, SearchHit,
    Source, SourceKind, Topic,
};

use crate::curation_log::CurationLog;
use crate::dedup::DedupLedger;
use crate::pipeline::CurationPipeline;
use crate::publisher::Publisher;
use crate::quality::{GateVerdict, QualityGate, EVALUATION_MARKER};
use crate::research::{
    trust::domain_of, ResearchCommissioner, ResearchSettings, EXPANSION_MARKER, SYNTHESIS_MARKER,
};
use crate::scheduling::CuratorScheduler;
use crate::store::{MemoryStore, StateKeys};
use crate::traits::{KeyValueStore, PostStore, ReasoningService, TextStream, TopicSource, WebSearcher};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn slug(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

pub fn topic(title: &str, kind: SourceKind, raw_score: f64) -> Topic {
    Topic {
        title: title.to_string(),
        source_kind: kind,
        source_ref: None,
        url: format!("https://feeds.example/{kind}/{}", slug(title)),
        raw_score,
        discovered_at: Utc::now(),
    }
}

/// A topic already through relevance scoring.
pub fn scored(title: &str, kind: SourceKind, raw_score: f64) -> ScoredTopic {
    ScoredTopic {
        topic: topic(title, kind, raw_score),
        relevance_weight: 2.5,
        combined_score: crate::relevance::combined_score(raw_score, 2.5),
        category: "AI Model & Algorithms".to_string(),
    }
}

/// Search hit with the domain left for the commissioner to derive.
pub fn hit(url: &str) -> SearchHit {
    SearchHit {
        title: format!("Coverage at {url}"),
        url: url.to_string(),
        snippet: format!("Reporting from {}.", domain_of(url)),
        domain: String::new(),
    }
}

/// Hits from well-known outlets: 4 of 5 are trusted.
pub fn trusted_hits() -> Vec<SearchHit> {
    vec![
        hit("https://arxiv.org/abs/2601.00001"),
        hit("https://www.reuters.com/technology/story"),
        hit("https://www.nature.com/articles/n1"),
        hit("https://techcrunch.com/2026/01/01/story"),
        hit("https://someblog.com/post"),
    ]
}

/// A finished report whose sources carry the given trust scores.
pub fn report_with_trust(title: &str, trust: &[u8]) -> Report {
    let sources = trust
        .iter()
        .enumerate()
        .map(|(i, score)| Source {
            title: format!("Source {i}"),
            url: format!("https://source{i}.example/{}", slug(title)),
            domain: format!("source{i}.example"),
            snippet: format!("Snippet {i} about {title}."),
            trust_score: *score,
        })
        .collect();
    Report {
        id: Uuid::new_v4(),
        topic_title: title.to_string(),
        summary: format!("Summary of {title}."),
        analysis: format!("Analysis of {title}."),
        pros: vec!["Faster".to_string()],
        cons: vec!["Costly".to_string()],
        body: format!("## Detailed Analysis\n\nAnalysis of {title}.\n"),
        sources,
        related_topics: Vec::new(),
        is_deep_analysis: false,
        created_at: Utc::now(),
    }
}

/// Overall 8.5, every source trusted, clean policy.
pub fn approved_verdict() -> GateVerdict {
    GateVerdict {
        score: QualityScore::from_components(9.0, 8.0, 8.0, 9.0, "Good.", 1.0, Utc::now()),
        policy: PolicyCheck {
            allowed: true,
            score: 100,
            reasons: Vec::new(),
            flags: Vec::new(),
        },
    }
}

pub const EXPANSION_REPLY: &str = r#"["industry impact", "expert reaction"]"#;

pub const SYNTHESIS_REPLY: &str = "## Summary\nA concise summary [1].\n\n## Detailed Analysis\nThe sources agree on the main facts [1][2].\n\n## Pros\n- Performance gains\n\n## Cons\n- Higher cost\n\n## Related Topics\n- Supply chain\n";

/// Overall 8.5.
pub const GOOD_RUBRIC: &str =
    "reliability: 9\ncompleteness: 8\nobjectivity: 8\nsource_quality: 9\nfeedback: Well sourced and balanced.";

/// Overall 6.5.
pub const WEAK_RUBRIC: &str =
    "reliability: 6.5\ncompleteness: 6.5\nobjectivity: 6.5\nsource_quality: 6.5\nfeedback: Analysis is too shallow for publication.";

// ---------------------------------------------------------------------------
// Topic sources
// ---------------------------------------------------------------------------

pub struct StaticSource {
    name: String,
    kind: SourceKind,
    topics: Vec<Topic>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(name: &str, kind: SourceKind, topics: Vec<Topic>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            topics,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.topics.clone())
    }
}

pub struct FailingSource {
    name: String,
    kind: SourceKind,
}

impl FailingSource {
    pub fn new(name: &str, kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

#[async_trait]
impl TopicSource for FailingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>> {
        bail!("{} is unreachable", self.name)
    }
}

pub struct SlowSource {
    name: String,
    delay: Duration,
}

impl SlowSource {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl TopicSource for SlowSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Forum
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![topic("Late GPU news", SourceKind::Forum, 1.0)])
    }
}

/// Panics mid-discovery, standing in for a bug in an adapter.
pub struct PanicSource;

#[async_trait]
impl TopicSource for PanicSource {
    fn name(&self) -> &str {
        "panicking"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Forum
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>> {
        panic!("feed parser hit an impossible state")
    }
}

// ---------------------------------------------------------------------------
// Searcher
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockSearcher {
    responses: HashMap<String, Vec<SearchHit>>,
    failures: HashSet<String>,
    fallback: Option<Vec<SearchHit>>,
    queries: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.responses.insert(query.to_string(), hits);
        self
    }

    pub fn fail_on(mut self, query: &str) -> Self {
        self.failures.insert(query.to_string());
        self
    }

    /// Hits returned for any query without its own response.
    pub fn with_fallback(mut self, hits: Vec<SearchHit>) -> Self {
        self.fallback = Some(hits);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        lock(&self.queries).push(query.to_string());
        if self.failures.contains(query) {
            bail!("search transport error for {query}");
        }
        let hits = self
            .responses
            .get(query)
            .or(self.fallback.as_ref())
            .cloned()
            .unwrap_or_default();
        Ok(hits.into_iter().take(limit).collect())
    }
}

// ---------------------------------------------------------------------------
// Reasoner
// ---------------------------------------------------------------------------

/// Replies are keyed by a marker that appears in the system prompt. Several
/// replies for one marker are served in order, the last one repeating.
#[derive(Default)]
pub struct MockReasoner {
    scripts: Mutex<Vec<(String, VecDeque<Option<String>>)>>,
    calls: Mutex<Vec<String>>,
    stream_calls: AtomicUsize,
}

impl MockReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard happy-path script: expansion, synthesis, good rubric.
    pub fn scripted() -> Self {
        Self::new()
            .on(EXPANSION_MARKER, EXPANSION_REPLY)
            .on(SYNTHESIS_MARKER, SYNTHESIS_REPLY)
            .on(EVALUATION_MARKER, GOOD_RUBRIC)
    }

    pub fn on(self, marker: &str, reply: &str) -> Self {
        self.push(marker, Some(reply.to_string()));
        self
    }

    pub fn fail_on(self, marker: &str) -> Self {
        self.push(marker, None);
        self
    }

    fn push(&self, marker: &str, reply: Option<String>) {
        let mut scripts = lock(&self.scripts);
        match scripts.iter_mut().find(|(m, _)| m == marker) {
            Some((_, replies)) => replies.push_back(reply),
            None => scripts.push((marker.to_string(), VecDeque::from([reply]))),
        }
    }

    /// Calls whose system prompt carried `marker`.
    pub fn calls_for(&self, marker: &str) -> usize {
        lock(&self.calls).iter().filter(|m| *m == marker).count()
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    fn respond(&self, messages: &[Message]) -> Result<String> {
        let system = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut scripts = lock(&self.scripts);
        // Longest marker wins when one prompt mentions several.
        let Some((marker, replies)) = scripts
            .iter_mut()
            .filter(|(m, _)| system.contains(m.as_str()))
            .max_by_key(|(m, _)| m.len())
        else {
            lock(&self.calls).push(String::new());
            bail!("no scripted reply for prompt");
        };
        lock(&self.calls).push(marker.clone());

        let reply = if replies.len() > 1 {
            replies.pop_front().flatten()
        } else {
            replies.front().cloned().flatten()
        };
        reply.ok_or_else(|| anyhow!("reasoning service unavailable ({marker})"))
    }
}

#[async_trait]
impl ReasoningService for MockReasoner {
    async fn complete(&self, messages: &[Message], _options: &CompletionOptions) -> Result<String> {
        self.respond(messages)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<TextStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.respond(messages)?;
        // Small chunks so callers must accumulate.
        let chars: Vec<char> = reply.chars().collect();
        let chunks: Vec<Result<String>> = chars
            .chunks(16)
            .map(|c| Ok(c.iter().collect::<String>()))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

// ---------------------------------------------------------------------------
// Post store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockPostStore {
    posts: Mutex<Vec<PostRecord>>,
    fail: bool,
}

impl MockPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<PostRecord> {
        lock(&self.posts).clone()
    }
}

#[async_trait]
impl PostStore for MockPostStore {
    async fn create_post(&self, record: &PostRecord) -> Result<String> {
        if self.fail {
            bail!("post store returned 503 Service Unavailable");
        }
        let mut posts = lock(&self.posts);
        posts.push(record.clone());
        Ok(format!("post-{}", posts.len()))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Everything a pipeline or scheduler needs, wired to mocks over one
/// key-value store.
pub struct Harness {
    pub keys: StateKeys,
    pub kv: Arc<dyn KeyValueStore>,
    pub sources: Vec<Arc<dyn TopicSource>>,
    pub searcher: Arc<MockSearcher>,
    pub reasoner: Arc<MockReasoner>,
    pub posts: Arc<MockPostStore>,
    pub ledger: Arc<DedupLedger>,
    pub log: Arc<CurationLog>,
    pub max_posts_per_day: u32,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_kv(Arc::new(MemoryStore::new()))
    }

    /// Harness over existing durable state, e.g. a `FileStore` in a temp dir.
    pub fn with_kv(kv: Arc<dyn KeyValueStore>) -> Self {
        let keys = StateKeys::new("test-curator");
        let ledger = Arc::new(DedupLedger::load(kv.clone(), &keys).unwrap_or_else(|e| {
            panic!("keyword history should load: {e:#}");
        }));
        let log = Arc::new(CurationLog::load(kv.clone(), &keys).unwrap_or_else(|e| {
            panic!("curation log should load: {e:#}");
        }));
        Self {
            keys,
            kv,
            sources: Vec::new(),
            searcher: Arc::new(MockSearcher::new().with_fallback(trusted_hits())),
            reasoner: Arc::new(MockReasoner::scripted()),
            posts: Arc::new(MockPostStore::new()),
            ledger,
            log,
            max_posts_per_day: 3,
        }
    }

    pub fn with_topics(mut self, topics: Vec<Topic>) -> Self {
        self.sources = vec![Arc::new(StaticSource::new("static", SourceKind::Forum, topics))];
        self
    }

    pub fn with_sources(mut self, sources: Vec<Arc<dyn TopicSource>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_reasoner(mut self, reasoner: MockReasoner) -> Self {
        self.reasoner = Arc::new(reasoner);
        self
    }

    pub fn with_searcher(mut self, searcher: MockSearcher) -> Self {
        self.searcher = Arc::new(searcher);
        self
    }

    pub fn with_failing_store(mut self) -> Self {
        self.posts = Arc::new(MockPostStore::failing());
        self
    }

    pub fn with_max_posts_per_day(mut self, max: u32) -> Self {
        self.max_posts_per_day = max;
        self
    }

    pub fn pipeline(&self) -> CurationPipeline {
        let research = ResearchCommissioner::new(
            self.reasoner.clone(),
            self.searcher.clone(),
            ResearchSettings::default().with_inter_query_delay(Duration::ZERO),
        );
        let gate = QualityGate::new(self.reasoner.clone(), ContentPolicy::default());
        let publisher = Publisher::new(
            self.posts.clone(),
            self.ledger.clone(),
            "ai-research",
            "test-curator",
        );
        CurationPipeline::new(
            self.sources.clone(),
            Duration::from_secs(2),
            self.ledger.clone(),
            research,
            gate,
            publisher,
        )
    }

    /// A scheduler outside the process-wide registry.
    pub fn scheduler_unshared(&self) -> Result<CuratorScheduler> {
        CuratorScheduler::load(
            self.keys.clone(),
            self.kv.clone(),
            self.pipeline(),
            self.log.clone(),
            self.max_posts_per_day,
        )
    }

    pub fn scheduler(&self) -> Arc<CuratorScheduler> {
        Arc::new(
            self.scheduler_unshared()
                .unwrap_or_else(|e| panic!("scheduler should load: {e:#}")),
        )
    }
}
