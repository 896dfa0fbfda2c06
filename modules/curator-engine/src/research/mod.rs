//! Research protocol: expand the topic into queries, search each in turn,
//! score the sources by domain, then synthesize a structured report.

pub mod queries;
pub mod synthesis;
pub mod trust;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ai_client::CompletionOptions;
use curator_common::{CuratorError, Report, SearchHit, Source};

use crate::traits::{ReasoningService, WebSearcher};

pub use queries::{parse_expansion, query_set, EXPANSION_MARKER, MAX_EXTRA_QUERIES};
pub use synthesis::{parse_sections, render_body, Sections, SYNTHESIS_MARKER};
pub use trust::{domain_of, trust_score};

/// Query set size and source count at which a report counts as deep analysis.
const DEEP_ANALYSIS_MIN_QUERIES: usize = 3;
const DEEP_ANALYSIS_MIN_SOURCES: usize = 5;

#[derive(Debug, Clone)]
pub struct ResearchSettings {
    /// Stop searching once this many unique sources are collected.
    pub max_results: usize,
    pub per_query_limit: usize,
    /// Pause between consecutive search calls.
    pub inter_query_delay: Duration,
    pub expansion: CompletionOptions,
    pub synthesis: CompletionOptions,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            max_results: 10,
            per_query_limit: 5,
            inter_query_delay: Duration::from_secs(1),
            expansion: CompletionOptions::new().temperature(0.4).max_tokens(300),
            synthesis: CompletionOptions::new().temperature(0.3).max_tokens(2500),
        }
    }
}

impl ResearchSettings {
    pub fn with_model(mut self, model: &str) -> Self {
        self.expansion = self.expansion.model(model);
        self.synthesis = self.synthesis.model(model);
        self
    }

    pub fn with_inter_query_delay(mut self, delay: Duration) -> Self {
        self.inter_query_delay = delay;
        self
    }
}

pub struct ResearchCommissioner {
    reasoner: Arc<dyn ReasoningService>,
    searcher: Arc<dyn WebSearcher>,
    settings: ResearchSettings,
}

impl ResearchCommissioner {
    pub fn new(
        reasoner: Arc<dyn ReasoningService>,
        searcher: Arc<dyn WebSearcher>,
        settings: ResearchSettings,
    ) -> Self {
        Self {
            reasoner,
            searcher,
            settings,
        }
    }

    /// Run the full protocol for one topic. Fails when no sources are found
    /// or the synthesis call errors; an expansion error only narrows the
    /// search to the title.
    pub async fn research(&self, title: &str, now: DateTime<Utc>) -> Result<Report, CuratorError> {
        let queries = self.expand(title).await;
        info!(title, queries = queries.len(), "Researching topic");

        let sources: Vec<Source> = self
            .search_all(&queries)
            .await
            .into_iter()
            .map(to_source)
            .collect();
        if sources.is_empty() {
            return Err(CuratorError::Research("no sources found".to_string()));
        }

        let reply = self.synthesize(title, &sources).await?;
        let sections = parse_sections(&reply, title, &sources, &queries[1..]);
        let body = render_body(&sections);

        let is_deep_analysis = queries.len() >= DEEP_ANALYSIS_MIN_QUERIES
            && sources.len() >= DEEP_ANALYSIS_MIN_SOURCES;
        info!(
            title,
            sources = sources.len(),
            deep = is_deep_analysis,
            "Report assembled"
        );

        Ok(Report {
            id: Uuid::new_v4(),
            topic_title: title.to_string(),
            summary: sections.summary,
            analysis: sections.analysis,
            pros: sections.pros,
            cons: sections.cons,
            body,
            sources,
            related_topics: sections.related_topics,
            is_deep_analysis,
            created_at: now,
        })
    }

    async fn expand(&self, title: &str) -> Vec<String> {
        let messages = queries::expansion_messages(title);
        let extras = match self.reasoner.complete(&messages, &self.settings.expansion).await {
            Ok(reply) => parse_expansion(title, &reply),
            Err(e) => {
                warn!(title, error = %e, "Query expansion failed, searching title only");
                Vec::new()
            }
        };
        query_set(title, extras)
    }

    async fn search_all(&self, queries: &[String]) -> Vec<SearchHit> {
        let max = self.settings.max_results;
        let mut seen = HashSet::new();
        let mut hits = Vec::new();

        for (i, query) in queries.iter().enumerate() {
            if hits.len() >= max {
                break;
            }
            if i > 0 && !self.settings.inter_query_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_query_delay).await;
            }

            let limit = self.settings.per_query_limit.min(max - hits.len());
            match self.searcher.search(query, limit).await {
                Ok(found) => {
                    debug!(query = query.as_str(), count = found.len(), "Search returned");
                    for hit in found {
                        if hits.len() >= max {
                            break;
                        }
                        if seen.insert(hit.url.clone()) {
                            hits.push(hit);
                        }
                    }
                }
                Err(e) => warn!(query = query.as_str(), error = %e, "Search query failed"),
            }
        }
        hits
    }

    async fn synthesize(&self, title: &str, sources: &[Source]) -> Result<String, CuratorError> {
        let messages = synthesis::synthesis_messages(title, sources);
        let mut stream = self
            .reasoner
            .complete_stream(&messages, &self.settings.synthesis)
            .await
            .map_err(|e| CuratorError::Research(format!("synthesis failed: {e:#}")))?;

        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| CuratorError::Research(format!("synthesis stream failed: {e:#}")))?;
            text.push_str(&chunk);
        }
        Ok(text)
    }
}

fn to_source(hit: SearchHit) -> Source {
    let domain = if hit.domain.is_empty() {
        domain_of(&hit.url)
    } else {
        hit.domain.trim_start_matches("www.").to_lowercase()
    };
    Source {
        trust_score: trust_score(&domain),
        title: hit.title,
        url: hit.url,
        domain,
        snippet: hit.snippet,
    }
}
