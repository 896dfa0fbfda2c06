//! Hourly control loop, its persisted state, and the per-account registry.

pub mod registry;
mod scheduler;

pub use scheduler::{next_hour_boundary, ControlError, CuratorScheduler, TickOutcome, TICK_WINDOW_MINUTES};

use std::ops::RangeInclusive;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use curator_common::{CurationLogEntry, SchedulerState, MIN_OVERALL_SCORE, MIN_TRUST_SOURCE_RATIO};

use crate::curation_log::{CurationLog, DASHBOARD_LOG_LIMIT};
use crate::store::{load_json, StateKeys};
use crate::traits::KeyValueStore;

/// Accepted values for the daily publish quota.
pub const MAX_POSTS_PER_DAY_RANGE: RangeInclusive<u32> = 1..=24;

/// Operator settings persisted alongside the scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuratorSettings {
    pub max_posts_per_day: u32,
}

impl CuratorSettings {
    pub fn load(store: &dyn KeyValueStore, keys: &StateKeys, default_max: u32) -> Result<Self> {
        let settings = load_json::<Self>(store, &keys.settings())?.unwrap_or(Self {
            max_posts_per_day: default_max,
        });
        Ok(Self {
            max_posts_per_day: settings.max_posts_per_day.clamp(
                *MAX_POSTS_PER_DAY_RANGE.start(),
                *MAX_POSTS_PER_DAY_RANGE.end(),
            ),
        })
    }
}

/// Read-only view for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub account: String,
    pub state: SchedulerState,
    pub recent_logs: Vec<CurationLogEntry>,
    pub published_today: usize,
    pub max_posts_per_day: u32,
    pub success_rate: f64,
    pub min_quality_score: f64,
    pub min_trust_source_ratio: f64,
}

impl DashboardSnapshot {
    pub fn new(
        account: &str,
        state: SchedulerState,
        log: &CurationLog,
        max_posts_per_day: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            account: account.to_string(),
            success_rate: state.success_rate(),
            state,
            recent_logs: log.recent(DASHBOARD_LOG_LIMIT),
            published_today: log.successes_on(now.date_naive()),
            max_posts_per_day,
            min_quality_score: MIN_OVERALL_SCORE,
            min_trust_source_ratio: MIN_TRUST_SOURCE_RATIO,
        }
    }

    /// Snapshot straight from durable state, for inspecting a curator that
    /// is not running in this process.
    pub fn from_store(
        store: Arc<dyn KeyValueStore>,
        keys: &StateKeys,
        default_max: u32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let state = load_json(store.as_ref(), &keys.scheduler_state())?.unwrap_or_default();
        let settings = CuratorSettings::load(store.as_ref(), keys, default_max)?;
        let log = CurationLog::load(store, keys)?;
        Ok(Self::new(keys.account(), state, &log, settings.max_posts_per_day, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{save_json, MemoryStore};

    #[test]
    fn persisted_quota_is_clamped() {
        let store = MemoryStore::new();
        let keys = StateKeys::new("test");
        save_json(&store, &keys.settings(), &CuratorSettings { max_posts_per_day: 99 }).unwrap();
        let settings = CuratorSettings::load(&store, &keys, 3).unwrap();
        assert_eq!(settings.max_posts_per_day, 24);
    }

    #[test]
    fn snapshot_from_empty_store_uses_defaults() {
        let store = Arc::new(MemoryStore::new());
        let snapshot =
            DashboardSnapshot::from_store(store, &StateKeys::new("test"), 3, Utc::now()).unwrap();
        assert_eq!(snapshot.state, SchedulerState::default());
        assert_eq!(snapshot.max_posts_per_day, 3);
        assert_eq!(snapshot.published_today, 0);
        assert_eq!(snapshot.min_quality_score, 7.0);
        assert_eq!(snapshot.min_trust_source_ratio, 0.6);
    }
}
