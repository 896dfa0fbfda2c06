//! Quality & safety gate: rubric evaluation by the reasoning service, the
//! source-trust ratio, and the keyword content policy.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use ai_client::{truncate_to_char_boundary, CompletionOptions, Message};
use curator_common::{
    ContentPolicy, CuratorError, PolicyCheck, QualityScore, Report, Source,
    NEUTRAL_RUBRIC_SCORE, TRUSTED_SOURCE_SCORE,
};

use crate::traits::ReasoningService;

pub const EVALUATION_MARKER: &str = "editorial reviewer";

const DEFAULT_FEEDBACK: &str = "No feedback provided.";
const MAX_BODY_BYTES: usize = 6000;

/// Raw rubric values as the evaluator reported them.
#[derive(Debug, Clone, PartialEq)]
pub struct Rubric {
    pub reliability: f64,
    pub completeness: f64,
    pub objectivity: f64,
    pub source_quality: f64,
    pub feedback: String,
}

impl Default for Rubric {
    fn default() -> Self {
        Self {
            reliability: NEUTRAL_RUBRIC_SCORE,
            completeness: NEUTRAL_RUBRIC_SCORE,
            objectivity: NEUTRAL_RUBRIC_SCORE,
            source_quality: NEUTRAL_RUBRIC_SCORE,
            feedback: DEFAULT_FEEDBACK.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Reliability,
    Completeness,
    Objectivity,
    SourceQuality,
    Feedback,
}

fn field_of(key: &str) -> Option<Field> {
    let key: String = key
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    match key.as_str() {
        "reliability" => Some(Field::Reliability),
        "completeness" => Some(Field::Completeness),
        "objectivity" => Some(Field::Objectivity),
        "sourcequality" => Some(Field::SourceQuality),
        "feedback" => Some(Field::Feedback),
        _ => None,
    }
}

/// First number in `value`: `8`, `7.5`, `8/10`, `**9**`. Anything that is
/// not a finite number falls back to neutral.
fn parse_number(value: &str) -> f64 {
    let start = value.find(|c: char| c.is_ascii_digit());
    let Some(start) = start else {
        return NEUTRAL_RUBRIC_SCORE;
    };
    let number: String = value[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(NEUTRAL_RUBRIC_SCORE)
}

/// Parse the evaluator's reply. Never fails: missing or garbled fields keep
/// their neutral defaults.
pub fn parse_rubric(reply: &str) -> Rubric {
    let mut rubric = Rubric::default();
    let mut feedback: Option<String> = None;
    let mut in_feedback = false;

    for line in reply.lines() {
        let cleaned = line.trim().trim_start_matches(['-', '*', '#', '_', ' ']);
        let parsed = cleaned
            .split_once(':')
            .and_then(|(key, value)| field_of(key).map(|f| (f, value)));

        match parsed {
            Some((field, value)) => {
                let value = value.trim().trim_matches(['*', '_']).trim();
                in_feedback = field == Field::Feedback;
                match field {
                    Field::Reliability => rubric.reliability = parse_number(value),
                    Field::Completeness => rubric.completeness = parse_number(value),
                    Field::Objectivity => rubric.objectivity = parse_number(value),
                    Field::SourceQuality => rubric.source_quality = parse_number(value),
                    Field::Feedback => feedback = Some(value.to_string()),
                }
            }
            // Feedback may wrap onto following lines.
            None if in_feedback => {
                if let Some(text) = feedback.as_mut() {
                    let extra = line.trim();
                    if !extra.is_empty() {
                        if !text.is_empty() {
                            text.push(' ');
                        }
                        text.push_str(extra);
                    }
                }
            }
            None => {}
        }
    }

    if let Some(text) = feedback.filter(|t| !t.trim().is_empty()) {
        rubric.feedback = text.trim().to_string();
    }
    rubric
}

/// Fraction of sources whose domain trust is at or above the trusted bar.
pub fn trust_source_ratio(sources: &[Source]) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }
    let trusted = sources
        .iter()
        .filter(|s| s.trust_score >= TRUSTED_SOURCE_SCORE)
        .count();
    trusted as f64 / sources.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateVerdict {
    pub score: QualityScore,
    pub policy: PolicyCheck,
}

impl GateVerdict {
    pub fn approved(&self) -> bool {
        self.score.should_publish && self.policy.allowed
    }

    /// Evaluator feedback verbatim, followed by the numbers behind the
    /// decision and any policy reasons.
    pub fn feedback(&self) -> String {
        let mut text = format!(
            "{} (overall {:.1}/10, trusted sources {:.0}%)",
            self.score.feedback,
            self.score.overall,
            self.score.trust_source_ratio * 100.0
        );
        if !self.policy.allowed {
            let _ = write!(text, "; content policy: {}", self.policy.reasons.join("; "));
        }
        text
    }
}

pub struct QualityGate {
    reasoner: Arc<dyn ReasoningService>,
    policy: ContentPolicy,
    options: CompletionOptions,
}

impl QualityGate {
    pub fn new(reasoner: Arc<dyn ReasoningService>, policy: ContentPolicy) -> Self {
        Self {
            reasoner,
            policy,
            options: CompletionOptions::new().temperature(0.1).max_tokens(400),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.options = self.options.model(model);
        self
    }

    pub async fn evaluate(
        &self,
        report: &Report,
        now: DateTime<Utc>,
    ) -> Result<GateVerdict, CuratorError> {
        let reply = self
            .reasoner
            .complete(&evaluation_messages(report), &self.options)
            .await
            .map_err(|e| CuratorError::QualityEvaluation(format!("{e:#}")))?;

        let rubric = parse_rubric(&reply);
        let ratio = trust_source_ratio(&report.sources);
        let score = QualityScore::from_components(
            rubric.reliability,
            rubric.completeness,
            rubric.objectivity,
            rubric.source_quality,
            rubric.feedback,
            ratio,
            now,
        );

        let policy_text = format!("{}\n{}", report.summary, report.body);
        let policy = self.policy.check(&report.topic_title, &policy_text);

        let verdict = GateVerdict { score, policy };
        info!(
            title = report.topic_title.as_str(),
            overall = verdict.score.overall,
            trust_ratio = verdict.score.trust_source_ratio,
            policy_score = verdict.policy.score,
            approved = verdict.approved(),
            "Quality gate evaluated"
        );
        Ok(verdict)
    }
}

fn evaluation_messages(report: &Report) -> Vec<Message> {
    let mut sources = String::new();
    for (i, s) in report.sources.iter().enumerate() {
        let _ = writeln!(sources, "[{}] {} ({}, trust {})", i + 1, s.title, s.domain, s.trust_score);
    }

    vec![
        Message::system(format!(
            "You are an {EVALUATION_MARKER} scoring a draft article. Rate each criterion \
             from 1 to 10 and reply with exactly these lines:\n\
             reliability: N\ncompleteness: N\nobjectivity: N\nsource_quality: N\n\
             feedback: one or two sentences for the editor"
        )),
        Message::user(format!(
            "Title: {}\n\nSummary:\n{}\n\nReport:\n{}\n\nSources:\n{}",
            report.topic_title,
            report.summary,
            truncate_to_char_boundary(&report.body, MAX_BODY_BYTES),
            sources
        )),
    ]
}
