//! Keyword-category relevance filter and ranking.
//!
//! Exclusions are checked first so off-topic titles are dropped before any
//! category matching. A topic with no category match is rejected. Matched
//! topics carry the highest category weight, boosted when several categories
//! match, and are ranked by a score that grows with both feed score and weight.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use curator_common::{ScoredTopic, Topic};

pub struct KeywordCategory {
    pub name: &'static str,
    pub weight: f64,
    pub keywords: &'static [&'static str],
}

pub const CATEGORIES: &[KeywordCategory] = &[
    KeywordCategory {
        name: "AI Model & Algorithms",
        weight: 2.5,
        keywords: &[
            "llm", "gpt", "transformer", "attention", "diffusion", "moe", "slm", "multimodal",
            "agi", "generative ai", "hallucination", "rag", "fine-tuning", "inference",
            "zero-shot", "few-shot", "chain-of-thought", "rlhf", "dpo", "prompt engineering",
            "quantization", "pruning", "distillation", "synthetic data", "openai", "anthropic",
            "claude", "gemini", "copilot", "chatgpt", "llama", "mistral", "qwen",
        ],
    },
    KeywordCategory {
        name: "Semiconductor & Hardware",
        weight: 2.0,
        keywords: &[
            "gpu", "cpu", "npu", "tpu", "fpga", "asic", "nvidia", "amd", "intel", "tsmc",
            "samsung", "hbm", "gddr", "chip", "semiconductor", "foundry", "euv", "3nm", "2nm",
            "wafer", "chiplet", "soc", "transistor", "finfet", "memory", "bandwidth", "flops",
            "cuda", "rocm",
        ],
    },
    KeywordCategory {
        name: "Machine Learning & Research",
        weight: 2.0,
        keywords: &[
            "deep learning", "neural network", "cnn", "rnn", "lstm", "gan", "vae",
            "reinforcement learning", "supervised", "unsupervised", "self-supervised",
            "transfer learning", "meta-learning", "computer vision", "nlp", "speech", "robotics",
            "autonomous", "arxiv", "paper", "research", "benchmark", "dataset", "model",
            "training", "pytorch", "tensorflow", "jax",
        ],
    },
    KeywordCategory {
        name: "Tech Industry & Market",
        weight: 1.5,
        keywords: &[
            "startup", "funding", "acquisition", "ipo", "unicorn", "venture capital",
            "market cap", "earnings", "stock", "cloud", "azure", "aws", "gcp", "data center",
            "edge computing", "chips act", "export control", "geopolitics", "supply chain",
            "silicon valley", "tech news",
        ],
    },
    KeywordCategory {
        name: "Development & Tools",
        weight: 1.3,
        keywords: &[
            "github", "open source", "api", "sdk", "framework", "library", "docker",
            "kubernetes", "python", "rust", "c++", "compiler", "hugging face", "langchain",
            "llamaindex", "vllm", "onnx",
        ],
    },
    KeywordCategory {
        name: "Emerging Tech",
        weight: 1.8,
        keywords: &[
            "quantum", "blockchain", "crypto", "web3", "metaverse", "vr", "biotech",
            "neuroscience", "brain-computer", "nanotech", "fusion", "space tech", "satellite",
            "drone", "6g", "photonics",
        ],
    },
];

/// Checked before any category: adult content, gambling, entertainment and
/// lifestyle fluff.
pub const EXCLUDED_KEYWORDS: &[&str] = &[
    "birthday", "anniversary", "celebrates", "trump", "election", "politics", "protest",
    "supporters", "nsfw", "porn", "xxx", "dating", "casino", "gambling", "meme", "joke",
    "funny", "cute", "aww", "wholesome", "music", "movie", "tv show", "celebrity", "fashion",
    "recipe", "cooking", "food", "sports", "gaming", "game",
];

/// Multiplier applied per extra matched category.
pub const CROSS_CATEGORY_BOOST: f64 = 1.2;

/// Ceiling on the boosted weight, as a multiple of the best single weight.
pub const MAX_BOOST_RATIO: f64 = 1.5;

/// Keywords this short only match whole words ("rag" must not hit "storage").
const WHOLE_WORD_MAX_LEN: usize = 3;

/// Leading characters of the normalized title used for in-batch dedup.
const TITLE_KEY_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Excluded(&'static str),
    NoCategory,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// `needle` occurs in `haystack` with no word character on either side.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, m)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + m.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

/// Exclusions match whole words, plural included: "dating" must not hit
/// "updating", but "movies" still counts as "movie".
fn excluded_by(lower_title: &str, keyword: &str) -> bool {
    contains_word(lower_title, keyword) || contains_word(lower_title, &format!("{keyword}s"))
}

fn keyword_matches(lower_title: &str, keyword: &str) -> bool {
    if keyword.chars().count() <= WHOLE_WORD_MAX_LEN {
        contains_word(lower_title, keyword)
    } else {
        lower_title.contains(keyword)
    }
}

/// Strictly increasing in both inputs; the log damps the very different raw
/// scales of forum upvotes and encyclopedia page views.
pub fn combined_score(raw_score: f64, weight: f64) -> f64 {
    weight * (1.0 + raw_score.max(0.0).ln_1p())
}

/// Accept or reject one topic.
pub fn score(topic: Topic) -> Result<ScoredTopic, Rejection> {
    let lower = topic.title.to_lowercase();

    if let Some(excluded) = EXCLUDED_KEYWORDS.iter().find(|k| excluded_by(&lower, k)) {
        return Err(Rejection::Excluded(excluded));
    }

    let matched: Vec<&KeywordCategory> = CATEGORIES
        .iter()
        .filter(|c| c.keywords.iter().any(|k| keyword_matches(&lower, k)))
        .collect();

    let best = matched
        .iter()
        .copied()
        .max_by(|a, b| a.weight.total_cmp(&b.weight))
        .ok_or(Rejection::NoCategory)?;

    let extra = matched.len().saturating_sub(1) as i32;
    let weight = (best.weight * CROSS_CATEGORY_BOOST.powi(extra)).min(best.weight * MAX_BOOST_RATIO);

    Ok(ScoredTopic {
        combined_score: combined_score(topic.raw_score, weight),
        relevance_weight: weight,
        category: best.name.to_string(),
        topic,
    })
}

/// Highest combined score first, then raw score, then source kind priority.
pub fn rank_order(a: &ScoredTopic, b: &ScoredTopic) -> Ordering {
    b.combined_score
        .total_cmp(&a.combined_score)
        .then_with(|| b.topic.raw_score.total_cmp(&a.topic.raw_score))
        .then_with(|| a.topic.source_kind.cmp(&b.topic.source_kind))
}

fn title_key(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(TITLE_KEY_LEN)
        .collect()
}

/// Filter, collapse same-story duplicates across feeds, and sort.
pub fn rank(topics: Vec<Topic>) -> Vec<ScoredTopic> {
    let mut best: HashMap<String, ScoredTopic> = HashMap::new();

    for topic in topics {
        let title = topic.title.clone();
        match score(topic) {
            Ok(scored) => {
                let key = title_key(&scored.topic.title);
                match best.get(&key) {
                    Some(existing) if rank_order(existing, &scored) != Ordering::Greater => {}
                    _ => {
                        best.insert(key, scored);
                    }
                }
            }
            Err(rejection) => debug!(title = title.as_str(), ?rejection, "Topic rejected"),
        }
    }

    let mut ranked: Vec<ScoredTopic> = best.into_values().collect();
    ranked.sort_by(rank_order);
    ranked
}
