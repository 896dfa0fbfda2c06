//! Report synthesis prompt and the section parser for its reply.
//!
//! The reply is free text. Sections are found by scanning for header lines
//! (markdown headings, bold labels, or `Label:` lines, English or Korean).
//! Anything the model left empty is rebuilt from the source snippets so a
//! report never goes out with a blank summary or analysis.

use std::fmt::Write as _;

use ai_client::{truncate_to_char_boundary, Message};
use curator_common::Source;

pub const SYNTHESIS_MARKER: &str = "research report";

const MAX_SNIPPET_BYTES: usize = 600;
const MAX_FALLBACK_SUMMARY_BYTES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Summary,
    Analysis,
    Pros,
    Cons,
    Related,
}

const SECTION_LABELS: &[(&str, Section)] = &[
    ("summary", Section::Summary),
    ("executive summary", Section::Summary),
    ("요약", Section::Summary),
    ("detailed analysis", Section::Analysis),
    ("analysis", Section::Analysis),
    ("상세 분석", Section::Analysis),
    ("분석", Section::Analysis),
    ("pros", Section::Pros),
    ("advantages", Section::Pros),
    ("장점", Section::Pros),
    ("cons", Section::Cons),
    ("disadvantages", Section::Cons),
    ("limitations", Section::Cons),
    ("단점", Section::Cons),
    ("related topics", Section::Related),
    ("related", Section::Related),
    ("관련 주제", Section::Related),
];

/// Parsed sections of a synthesis reply, with fallbacks applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sections {
    pub summary: String,
    pub analysis: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub related_topics: Vec<String>,
}

pub fn synthesis_messages(title: &str, sources: &[Source]) -> Vec<Message> {
    let mut listing = String::new();
    for (i, source) in sources.iter().enumerate() {
        let _ = writeln!(
            listing,
            "[{}] {} ({}, trust {})\n{}\n",
            i + 1,
            source.title,
            source.domain,
            source.trust_score,
            truncate_to_char_boundary(&source.snippet, MAX_SNIPPET_BYTES)
        );
    }

    vec![
        Message::system(format!(
            "You write a balanced {SYNTHESIS_MARKER} for a technology audience using only the \
             numbered sources provided. Cite sources as [n]. Use exactly these sections, each \
             introduced by a markdown heading:\n\
             ## Summary\n## Detailed Analysis\n## Pros\n## Cons\n## Related Topics\n\
             Pros, Cons and Related Topics are bullet lists. Stay neutral and do not speculate \
             beyond the sources."
        )),
        Message::user(format!("Topic: {title}\n\nSources:\n{listing}")),
    ]
}

fn normalize_label(raw: &str) -> String {
    let label: String = raw
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '#' | '`'))
        .collect();
    label
        .trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
        .trim()
        .to_lowercase()
}

/// A header line and any content that followed the label on the same line.
fn classify(line: &str) -> Option<(Section, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (label, rest) = match trimmed.split_once(':') {
        Some((label, rest)) => (label, rest),
        None => (trimmed, ""),
    };
    let label = normalize_label(label);
    let section = SECTION_LABELS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, s)| *s)?;
    let rest = rest.trim().trim_start_matches(['*', '_']).trim();
    Some((section, rest.to_string()))
}

fn list_items(text: &str) -> Vec<String> {
    let mut items: Vec<String> = text
        .lines()
        .map(|l| {
            let l = l.trim().trim_start_matches(['-', '*', '•']).trim();
            let digits = l.chars().take_while(|c| c.is_ascii_digit()).count();
            match l[digits..].chars().next() {
                Some('.' | ')') if digits > 0 => l[digits + 1..].trim(),
                _ => l,
            }
        })
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    // "Related: a, b, c" on a single line.
    if items.len() == 1 && items[0].contains(',') {
        items = items[0]
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    items
}

fn fallback_summary(title: &str, sources: &[Source]) -> String {
    let snippets: Vec<&str> = sources
        .iter()
        .map(|s| s.snippet.trim())
        .filter(|s| !s.is_empty())
        .take(2)
        .collect();
    if snippets.is_empty() {
        return format!("Research notes on {title} compiled from {} sources.", sources.len());
    }
    let joined = format!("Recent coverage of {title}: {}", snippets.join(" "));
    truncate_to_char_boundary(&joined, MAX_FALLBACK_SUMMARY_BYTES).to_string()
}

fn fallback_analysis(sources: &[Source]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let snippet = s.snippet.trim();
            if snippet.is_empty() {
                format!("- [{}] **{}** ({})", i + 1, s.title, s.domain)
            } else {
                format!("- [{}] **{}** ({}): {}", i + 1, s.title, s.domain, snippet)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a synthesis reply into sections and fill required gaps.
/// Text with no recognizable headers is taken as the analysis.
pub fn parse_sections(
    reply: &str,
    title: &str,
    sources: &[Source],
    expansion_queries: &[String],
) -> Sections {
    let mut buckets: Vec<(Section, String)> = Vec::new();
    let mut preamble = String::new();

    for line in reply.lines() {
        if let Some((section, inline)) = classify(line) {
            buckets.push((section, inline));
            continue;
        }
        match buckets.last_mut() {
            Some((_, text)) => {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(line);
            }
            None => {
                preamble.push_str(line);
                preamble.push('\n');
            }
        }
    }

    let joined = |wanted: Section| -> String {
        buckets
            .iter()
            .filter(|(s, _)| *s == wanted)
            .map(|(_, t)| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let mut sections = Sections {
        summary: joined(Section::Summary),
        analysis: joined(Section::Analysis),
        pros: list_items(&joined(Section::Pros)),
        cons: list_items(&joined(Section::Cons)),
        related_topics: list_items(&joined(Section::Related)),
    };

    if buckets.is_empty() {
        sections.analysis = preamble.trim().to_string();
    }
    if sections.summary.is_empty() {
        sections.summary = fallback_summary(title, sources);
    }
    if sections.analysis.is_empty() {
        sections.analysis = fallback_analysis(sources);
    }
    if sections.related_topics.is_empty() {
        sections.related_topics = expansion_queries
            .iter()
            .filter(|q| !q.eq_ignore_ascii_case(title))
            .cloned()
            .collect();
    }
    sections
}

/// Markdown body of a report: analysis, then pros and cons when present.
pub fn render_body(sections: &Sections) -> String {
    let mut body = format!("## Detailed Analysis\n\n{}\n", sections.analysis);
    for (heading, items) in [("Pros", &sections.pros), ("Cons", &sections.cons)] {
        if items.is_empty() {
            continue;
        }
        let _ = write!(body, "\n## {heading}\n\n");
        for item in items {
            let _ = writeln!(body, "- {item}");
        }
    }
    body
}
