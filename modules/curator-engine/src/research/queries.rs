//! Query expansion: the topic title plus a few facet queries from the model.

use ai_client::{extract_json_array, strip_code_blocks, Message};

/// Extra queries requested on top of the title.
pub const MAX_EXTRA_QUERIES: usize = 3;

/// Title query plus extras.
pub const MAX_QUERIES: usize = MAX_EXTRA_QUERIES + 1;

const MAX_QUERY_CHARS: usize = 200;

pub const EXPANSION_MARKER: &str = "search queries";

pub fn expansion_messages(title: &str) -> Vec<Message> {
    vec![
        Message::system(format!(
            "You plan web research for a technology news desk. Given a topic, write up to \
             {MAX_EXTRA_QUERIES} {EXPANSION_MARKER} that each cover a different facet: \
             technical background, industry impact, and expert or critical reaction. \
             Reply with a JSON array of strings and nothing else."
        )),
        Message::user(format!("Topic: {title}")),
    ]
}

fn clean_line(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    let line = match line[digits..].chars().next() {
        Some('.' | ')') if digits > 0 => line[digits + 1..].trim_start(),
        _ => line,
    };
    line.trim_matches(['"', '\'', '`', ',']).trim()
}

/// Parse the model's reply into extra queries. Accepts a JSON array (fenced or
/// wrapped in prose) or one query per line. Never returns the title itself,
/// duplicates, blanks, or more than `MAX_EXTRA_QUERIES` entries.
pub fn parse_expansion(title: &str, reply: &str) -> Vec<String> {
    let body = strip_code_blocks(reply);

    let candidates: Vec<String> = extract_json_array(body)
        .and_then(|json| serde_json::from_str::<Vec<String>>(json).ok())
        .unwrap_or_else(|| {
            body.lines()
                .map(clean_line)
                // Drop bracket remnants and prose lead-ins like "Queries:".
                .filter(|l| !l.starts_with('[') && !l.starts_with(']') && !l.ends_with(':'))
                .map(str::to_string)
                .collect()
        });

    let mut seen = vec![title.trim().to_lowercase()];
    let mut queries = Vec::new();
    for candidate in candidates {
        let query = candidate.trim();
        if query.is_empty() || query.chars().count() > MAX_QUERY_CHARS {
            continue;
        }
        let key = query.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        queries.push(query.to_string());
        if queries.len() == MAX_EXTRA_QUERIES {
            break;
        }
    }
    queries
}

/// The full query set: title first, then the extras.
pub fn query_set(title: &str, extras: Vec<String>) -> Vec<String> {
    std::iter::once(title.trim().to_string())
        .chain(extras)
        .take(MAX_QUERIES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: &str = "NVIDIA Blackwell Ultra";

    #[test]
    fn parses_fenced_json_array() {
        let reply = "```json\n[\"Blackwell Ultra HBM3e capacity\", \"Blackwell Ultra cloud pricing\"]\n```";
        assert_eq!(
            parse_expansion(TITLE, reply),
            vec!["Blackwell Ultra HBM3e capacity", "Blackwell Ultra cloud pricing"]
        );
    }

    #[test]
    fn falls_back_to_numbered_lines() {
        let reply = "Here are some queries:\n1. Blackwell Ultra benchmarks\n2) \"Blackwell Ultra power draw\"\n- Blackwell Ultra supply";
        let queries = parse_expansion(TITLE, reply);
        assert_eq!(
            queries,
            vec![
                "Blackwell Ultra benchmarks",
                "Blackwell Ultra power draw",
                "Blackwell Ultra supply"
            ]
        );
    }

    #[test]
    fn drops_title_duplicates_and_caps() {
        let reply = r#"["nvidia blackwell ultra", "a", "b", "A", "c", "d"]"#;
        assert_eq!(parse_expansion(TITLE, reply), vec!["a", "b", "c"]);
    }

    #[test]
    fn garbage_yields_nothing_but_title_set_survives() {
        let extras = parse_expansion(TITLE, "   ");
        assert!(extras.is_empty());
        assert_eq!(query_set(TITLE, extras), vec![TITLE.to_string()]);
    }

    #[test]
    fn query_set_puts_title_first_and_caps_at_four() {
        let set = query_set(TITLE, vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        assert_eq!(set.len(), MAX_QUERIES);
        assert_eq!(set[0], TITLE);
    }
}
