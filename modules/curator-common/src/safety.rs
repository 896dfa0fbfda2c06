use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// --- Keyword lists ---

const POLITICAL_KEYWORDS: &[&str] = &[
    "대통령", "국회", "여당", "야당", "정당", "선거", "투표", "좌파", "우파", "진보", "보수",
    "정치", "탄핵", "국정농단", "president", "congress", "election", "democrat", "republican",
    "politics", "impeachment",
];

const RELIGIOUS_KEYWORDS: &[&str] = &[
    "종교", "기독교", "불교", "이슬람", "힌두교", "유대교", "교회", "성당", "사찰", "모스크",
    "신앙", "하나님", "부처", "알라", "예수", "religion", "christian", "muslim", "buddhist",
    "hindu", "god", "jesus",
];

const NSFW_KEYWORDS: &[&str] = &[
    "성인", "야동", "포르노", "섹스", "누드", "19금", "nsfw", "adult", "porn", "xxx", "sex",
    "naked", "nude", "explicit", "erotic", "fetish",
];

const CONTROVERSIAL_KEYWORDS: &[&str] = &[
    "논란", "비판", "갈등", "분쟁", "혐오", "차별", "테러", "극단주의", "백신", "음모론",
    "controversy", "scandal", "conflict", "hate", "discrimination", "terrorism", "extremism",
    "vaccine", "antivax", "conspiracy",
];

static POLITICAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&keyword_pattern(POLITICAL_KEYWORDS)).unwrap());
static RELIGIOUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&keyword_pattern(RELIGIOUS_KEYWORDS)).unwrap());
static NSFW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&keyword_pattern(NSFW_KEYWORDS)).unwrap());
static CONTROVERSIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&keyword_pattern(CONTROVERSIAL_KEYWORDS)).unwrap());

/// Content at or above this safety score is allowed.
pub const POLICY_PASS_SCORE: i32 = 50;

/// Case-insensitive alternation. Latin keywords must stand as whole words
/// ("god" must not hit "godot"); Hangul keywords match inside words because
/// particles attach directly to the noun.
fn keyword_pattern<S: AsRef<str>>(keywords: &[S]) -> String {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .map(|k| {
            if k.is_ascii() {
                format!(r"\b{}\b", regex::escape(&k))
            } else {
                regex::escape(&k)
            }
        })
        .collect();
    format!("(?i)(?:{})", alternatives.join("|"))
}

/// Distinct lowercase matches in first-seen order.
fn find_matches(re: &Regex, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in re.find_iter(text) {
        let keyword = m.as_str().to_lowercase();
        if !found.contains(&keyword) {
            found.push(keyword);
        }
    }
    found
}

// --- Results ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyCategory {
    Blacklist,
    Political,
    Religious,
    Nsfw,
    Controversial,
}

impl fmt::Display for PolicyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyCategory::Blacklist => write!(f, "blacklisted"),
            PolicyCategory::Political => write!(f, "political"),
            PolicyCategory::Religious => write!(f, "religious"),
            PolicyCategory::Nsfw => write!(f, "NSFW"),
            PolicyCategory::Controversial => write!(f, "controversial"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyFlag {
    pub category: PolicyCategory,
    pub severity: Severity,
    pub keyword: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCheck {
    pub allowed: bool,
    /// 0..=100, higher is safer.
    pub score: i32,
    pub reasons: Vec<String>,
    pub flags: Vec<PolicyFlag>,
}

// --- Policy ---

/// Keyword-based content policy applied to a finished report before publishing.
#[derive(Debug, Clone)]
pub struct ContentPolicy {
    pub block_political: bool,
    pub block_religious: bool,
    pub block_nsfw: bool,
    pub block_controversial: bool,
    blacklist: Option<Regex>,
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self {
            block_political: true,
            block_religious: true,
            block_nsfw: true,
            block_controversial: false,
            blacklist: None,
        }
    }
}

impl ContentPolicy {
    /// Add operator-supplied keywords; each distinct hit costs 50 points.
    pub fn with_blacklist<S: AsRef<str>>(mut self, keywords: &[S]) -> Result<Self, regex::Error> {
        let has_any = keywords.iter().any(|k| !k.as_ref().trim().is_empty());
        self.blacklist = if has_any {
            Some(Regex::new(&keyword_pattern(keywords))?)
        } else {
            None
        };
        Ok(self)
    }

    pub fn check(&self, title: &str, body: &str) -> PolicyCheck {
        let text = format!("{title} {body}");
        let mut score: i32 = 100;
        let mut reasons = Vec::new();
        let mut flags = Vec::new();

        if let Some(blacklist) = &self.blacklist {
            for keyword in find_matches(blacklist, &text) {
                score -= 50;
                reasons.push(format!("blacklisted keyword: \"{keyword}\""));
                flags.push(PolicyFlag {
                    category: PolicyCategory::Blacklist,
                    severity: Severity::High,
                    keyword,
                });
            }
        }

        let categories: [(bool, PolicyCategory, &Regex); 4] = [
            (self.block_political, PolicyCategory::Political, &POLITICAL_RE),
            (self.block_religious, PolicyCategory::Religious, &RELIGIOUS_RE),
            (self.block_nsfw, PolicyCategory::Nsfw, &NSFW_RE),
            (self.block_controversial, PolicyCategory::Controversial, &CONTROVERSIAL_RE),
        ];

        for (enabled, category, re) in categories {
            if !enabled {
                continue;
            }
            let matches = find_matches(re, &text);
            let Some(first) = matches.first().cloned() else {
                continue;
            };
            let (penalty, severity) = match category {
                PolicyCategory::Nsfw => (100, Severity::High),
                PolicyCategory::Controversial => (20, Severity::Medium),
                _ => {
                    let severity = if matches.len() > 2 { Severity::High } else { Severity::Medium };
                    (30 + 5 * matches.len() as i32, severity)
                }
            };
            score -= penalty;
            let shown: Vec<&str> = matches.iter().take(3).map(String::as_str).collect();
            reasons.push(format!("{category} keywords detected: {}", shown.join(", ")));
            flags.push(PolicyFlag {
                category,
                severity,
                keyword: first,
            });
        }

        PolicyCheck {
            allowed: score >= POLICY_PASS_SCORE,
            score: score.max(0),
            reasons,
            flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tech_content_passes_cleanly() {
        let check = ContentPolicy::default().check(
            "NVIDIA unveils new GPU architecture",
            "The chip doubles HBM bandwidth for transformer inference.",
        );
        assert!(check.allowed);
        assert_eq!(check.score, 100);
        assert!(check.flags.is_empty());
    }

    #[test]
    fn nsfw_is_blocked_outright() {
        let check = ContentPolicy::default().check("Model trained on explicit images", "");
        assert!(!check.allowed);
        assert_eq!(check.score, 0);
        assert_eq!(check.flags[0].category, PolicyCategory::Nsfw);
    }

    #[test]
    fn single_political_mention_is_tolerated() {
        let check = ContentPolicy::default().check("Chip export rules", "The president signed the order.");
        assert!(check.allowed);
        assert_eq!(check.score, 65);
        assert_eq!(check.flags.len(), 1);
    }

    #[test]
    fn political_and_religious_together_block() {
        let check = ContentPolicy::default().check(
            "Election AI",
            "Congress debated while church leaders weighed in on religion.",
        );
        assert!(!check.allowed);
        assert_eq!(check.reasons.len(), 2);
    }

    #[test]
    fn latin_keywords_need_word_boundaries() {
        let check = ContentPolicy::default().check("Godot engine ships Rust bindings", "Sussex lab results");
        assert!(check.allowed);
        assert!(check.flags.is_empty());
    }

    #[test]
    fn hangul_keywords_match_with_particles() {
        let check = ContentPolicy::default().check("선거에서 AI 활용", "");
        assert_eq!(check.flags[0].category, PolicyCategory::Political);
        assert_eq!(check.flags[0].keyword, "선거");
    }

    #[test]
    fn controversial_is_off_by_default() {
        let check = ContentPolicy::default().check("Benchmark scandal at lab", "");
        assert!(check.flags.is_empty());

        let strict = ContentPolicy {
            block_controversial: true,
            ..ContentPolicy::default()
        };
        let check = strict.check("Benchmark scandal at lab", "");
        assert_eq!(check.score, 80);
        assert!(check.allowed);
    }

    #[test]
    fn blacklist_hits_cost_fifty_each() {
        let policy = ContentPolicy::default()
            .with_blacklist(&["sponsored", "giveaway"])
            .unwrap();
        let check = policy.check("Sponsored GPU giveaway", "");
        assert_eq!(check.score, 0);
        assert!(!check.allowed);
        assert_eq!(check.flags.len(), 2);
    }

    #[test]
    fn empty_blacklist_is_ignored() {
        let policy = ContentPolicy::default().with_blacklist(&["  "]).unwrap();
        assert!(policy.check("anything", "").allowed);
    }
}
