//! Append-only record of every curation attempt, newest first.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use chrono::NaiveDate;

use curator_common::{CurationLogEntry, CurationStatus};

use crate::store::{load_json, save_json, StateKeys};
use crate::traits::KeyValueStore;

/// Entries kept in durable state.
pub const LOG_CAPACITY: usize = 100;

/// Entries shown on the dashboard.
pub const DASHBOARD_LOG_LIMIT: usize = 20;

pub struct CurationLog {
    store: Arc<dyn KeyValueStore>,
    key: String,
    entries: Mutex<Vec<CurationLogEntry>>,
}

impl CurationLog {
    pub fn load(store: Arc<dyn KeyValueStore>, keys: &StateKeys) -> Result<Self> {
        let key = keys.curation_log();
        let entries = load_json(store.as_ref(), &key)?.unwrap_or_default();
        Ok(Self {
            store,
            key,
            entries: Mutex::new(entries),
        })
    }

    pub fn append(&self, entry: CurationLogEntry) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(0, entry);
        entries.truncate(LOG_CAPACITY);
        save_json(self.store.as_ref(), &self.key, &*entries)
    }

    pub fn recent(&self, limit: usize) -> Vec<CurationLogEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().take(limit).cloned().collect()
    }

    /// Successful publishes on a UTC calendar day.
    pub fn successes_on(&self, day: NaiveDate) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|e| e.status == CurationStatus::Success && e.timestamp.date_naive() == day)
            .count()
    }
}
