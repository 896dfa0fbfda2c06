use std::env;
use std::path::PathBuf;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Identity
    pub account_id: String,

    // Reasoning service (OpenAI-compatible)
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,

    // Search
    pub serper_api_key: String,

    // Post store
    pub post_store_url: String,
    pub post_store_token: Option<String>,
    pub post_board: String,

    // Durable state
    pub data_dir: PathBuf,

    // Curation
    pub max_posts_per_day: u32,
    pub subreddits: Vec<String>,
    pub adapter_timeout_secs: u64,
    pub search_delay_ms: u64,
    pub blacklist_keywords: Vec<String>,

    // Admin surface
    pub admin_host: String,
    pub admin_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            llm_api_key: required_env("LLM_API_KEY"),
            serper_api_key: required_env("SERPER_API_KEY"),
            post_store_url: required_env("POST_STORE_URL"),
            ..Self::offline_from_env()
        }
    }

    /// Config for commands that only read persisted state (no API keys needed).
    pub fn offline_from_env() -> Self {
        Self {
            account_id: env_or("CURATOR_ACCOUNT", "ai-curator"),
            llm_api_key: String::new(),
            llm_base_url: env_or("LLM_BASE_URL", "https://api.groq.com/openai/v1"),
            llm_model: env_or("LLM_MODEL", "llama-3.3-70b-versatile"),
            serper_api_key: String::new(),
            post_store_url: String::new(),
            post_store_token: env::var("POST_STORE_TOKEN").ok().filter(|t| !t.is_empty()),
            post_board: env_or("POST_BOARD", "ai-research"),
            data_dir: PathBuf::from(env_or("DATA_DIR", "data")),
            max_posts_per_day: parsed_env("MAX_POSTS_PER_DAY", 3),
            subreddits: list_env(
                "CURATOR_SUBREDDITS",
                &["technology", "science", "artificial", "programming", "MachineLearning"],
            ),
            adapter_timeout_secs: parsed_env("ADAPTER_TIMEOUT_SECS", 20),
            search_delay_ms: parsed_env("SEARCH_DELAY_MS", 1000),
            blacklist_keywords: list_env("CURATOR_BLACKLIST", &[]),
            admin_host: env_or("ADMIN_HOST", "0.0.0.0"),
            admin_port: parsed_env("ADMIN_PORT", 3100),
        }
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            account = self.account_id.as_str(),
            llm_base_url = self.llm_base_url.as_str(),
            llm_model = self.llm_model.as_str(),
            llm_api_key = redact(&self.llm_api_key),
            serper_api_key = redact(&self.serper_api_key),
            post_store_url = self.post_store_url.as_str(),
            post_store_token = self.post_store_token.as_deref().map(redact).unwrap_or("unset"),
            board = self.post_board.as_str(),
            data_dir = %self.data_dir.display(),
            max_posts_per_day = self.max_posts_per_day,
            subreddits = self.subreddits.join(",").as_str(),
            adapter_timeout_secs = self.adapter_timeout_secs,
            search_delay_ms = self.search_delay_ms,
            blacklist = self.blacklist_keywords.len(),
            admin = format!("{}:{}", self.admin_host, self.admin_port).as_str(),
            "Config loaded"
        );
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "unset"
    } else {
        "***"
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number, got {raw:?}")),
        Err(_) => default,
    }
}

fn list_env(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => split_list(&raw),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_blanks() {
        assert_eq!(
            split_list(" technology, science ,,MachineLearning "),
            vec!["technology", "science", "MachineLearning"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn redact_hides_secrets() {
        assert_eq!(redact("gsk_live_123"), "***");
        assert_eq!(redact(""), "unset");
    }
}
