//! Durable local state: key-value stores plus typed JSON helpers.

mod file;
mod memory;
pub mod posts;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use posts::HttpPostStore;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::traits::KeyValueStore;

/// Per-account document keys.
#[derive(Debug, Clone)]
pub struct StateKeys {
    account: String,
}

impl StateKeys {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn scheduler_state(&self) -> String {
        format!("{}.scheduler_state", self.account)
    }

    pub fn keyword_history(&self) -> String {
        format!("{}.keyword_history", self.account)
    }

    pub fn curation_log(&self) -> String {
        format!("{}.curation_log", self.account)
    }

    pub fn settings(&self) -> String {
        format!("{}.settings", self.account)
    }
}

/// Load a JSON document. A corrupt document is logged and treated as absent
/// so a bad write never keeps the curator from starting.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key, error = %e, "Discarding unreadable state document");
            Ok(None)
        }
    }
}

pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize state document {key}"))?;
    store.put(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_common::SchedulerState;

    #[test]
    fn keys_are_namespaced_by_account() {
        let keys = StateKeys::new("acct-1");
        assert_eq!(keys.scheduler_state(), "acct-1.scheduler_state");
        assert_eq!(keys.keyword_history(), "acct-1.keyword_history");
        assert_ne!(keys.curation_log(), StateKeys::new("acct-2").curation_log());
    }

    #[test]
    fn json_round_trip_through_store() {
        let store = MemoryStore::new();
        let state = SchedulerState {
            last_run_hour: 14,
            ..SchedulerState::default()
        };
        save_json(&store, "k", &state).unwrap();
        let loaded: SchedulerState = load_json(&store, "k").unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn corrupt_document_reads_as_absent() {
        let store = MemoryStore::new();
        store.put("k", "{not json").unwrap();
        let loaded: Option<SchedulerState> = load_json(&store, "k").unwrap();
        assert!(loaded.is_none());
    }
}
