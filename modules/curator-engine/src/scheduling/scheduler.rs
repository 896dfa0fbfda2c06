use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, DurationRound, Timelike, Utc};
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use curator_common::{CurationLogEntry, CurationStatus, CuratorError, SchedulerState};

use super::{CuratorSettings, DashboardSnapshot, MAX_POSTS_PER_DAY_RANGE};
use crate::curation_log::CurationLog;
use crate::pipeline::CurationPipeline;
use crate::store::{load_json, save_json, StateKeys};
use crate::traits::KeyValueStore;

/// A natural tick is honoured only within this many minutes past the hour.
pub const TICK_WINDOW_MINUTES: u32 = 5;

/// Log source label for entries the scheduler writes itself.
const SCHEDULER_SOURCE: &str = "scheduler";

/// What a tick or manual run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    EmergencyStopped,
    AlreadyProcessing,
    AlreadyRanThisHour,
    OutsideWindow,
    QuotaReached,
    Completed(CurationStatus),
}

impl TickOutcome {
    /// Whether this trigger appended a curation log entry.
    pub fn wrote_log_entry(&self) -> bool {
        matches!(self, TickOutcome::Completed(_) | TickOutcome::QuotaReached)
    }
}

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("maxPostsPerDay must be between 1 and 24, got {0}")]
    InvalidQuota(u32),

    #[error(transparent)]
    Persist(#[from] anyhow::Error),
}

/// Top of the next UTC hour strictly after `now`.
pub fn next_hour_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = now
        .duration_trunc(chrono::Duration::hours(1))
        .unwrap_or(now);
    floor + chrono::Duration::hours(1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|m| m.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn hour_and_date(now: DateTime<Utc>) -> (u32, String) {
    (now.hour(), now.format("%Y-%m-%d").to_string())
}

/// Owns the curator's wall-clock schedule and its persisted state.
///
/// `processing` is the mutual-exclusion flag. It is flipped before the first
/// await of a run and released by `ProcessingGuard` on every exit path,
/// including panics and dropped futures. A panicking pipeline is logged as a
/// failed run and the scheduler keeps ticking.
pub struct CuratorScheduler {
    keys: StateKeys,
    store: Arc<dyn KeyValueStore>,
    pipeline: CurationPipeline,
    log: Arc<CurationLog>,
    state: Mutex<SchedulerState>,
    settings: Mutex<CuratorSettings>,
    processing: AtomicBool,
}

struct ProcessingGuard<'a> {
    scheduler: &'a CuratorScheduler,
}

impl<'a> ProcessingGuard<'a> {
    fn acquire(scheduler: &'a CuratorScheduler) -> Option<Self> {
        scheduler
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        scheduler.update_state(|s| s.is_processing = true);
        Some(Self { scheduler })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.update_state(|s| s.is_processing = false);
        self.scheduler.processing.store(false, Ordering::Release);
    }
}

impl CuratorScheduler {
    /// Restore state for `keys.account()`. A persisted processing or running
    /// flag can only be left over from a process that died, so both are
    /// cleared.
    pub fn load(
        keys: StateKeys,
        store: Arc<dyn KeyValueStore>,
        pipeline: CurationPipeline,
        log: Arc<CurationLog>,
        default_max_posts_per_day: u32,
    ) -> Result<Self> {
        let mut state: SchedulerState =
            load_json(store.as_ref(), &keys.scheduler_state())?.unwrap_or_default();
        if state.is_processing || state.is_running {
            warn!(account = keys.account(), "Clearing stale processing flags from previous process");
        }
        state.is_processing = false;
        state.is_running = false;
        save_json(store.as_ref(), &keys.scheduler_state(), &state)?;

        let settings = CuratorSettings::load(store.as_ref(), &keys, default_max_posts_per_day)?;
        info!(
            account = keys.account(),
            last_run_hour = state.last_run_hour,
            last_run_date = state.last_run_date.as_str(),
            emergency_stop = state.emergency_stop,
            max_posts_per_day = settings.max_posts_per_day,
            "Scheduler state loaded"
        );

        Ok(Self {
            keys,
            store,
            pipeline,
            log,
            state: Mutex::new(state),
            settings: Mutex::new(settings),
            processing: AtomicBool::new(false),
        })
    }

    pub fn account(&self) -> &str {
        self.keys.account()
    }

    pub fn state(&self) -> SchedulerState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub fn max_posts_per_day(&self) -> u32 {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .max_posts_per_day
    }

    fn update_state(&self, change: impl FnOnce(&mut SchedulerState)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        change(&mut state);
        if let Err(e) = save_json(self.store.as_ref(), &self.keys.scheduler_state(), &*state) {
            warn!(account = self.account(), error = %e, "Failed to persist scheduler state");
        }
    }

    fn try_update_state(&self, change: impl FnOnce(&mut SchedulerState)) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        change(&mut state);
        save_json(self.store.as_ref(), &self.keys.scheduler_state(), &*state)
    }

    // --- Triggers ---

    /// Natural hourly tick.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        if self.state().emergency_stop {
            return TickOutcome::EmergencyStopped;
        }
        if self.is_processing() {
            return TickOutcome::AlreadyProcessing;
        }
        if now.minute() >= TICK_WINDOW_MINUTES {
            debug!(minute = now.minute(), "Tick outside the top-of-hour window");
            return TickOutcome::OutsideWindow;
        }
        let (hour, date) = hour_and_date(now);
        if self.state().ran_this_hour(hour, &date) {
            debug!(hour, date = date.as_str(), "Already ran this hour");
            return TickOutcome::AlreadyRanThisHour;
        }
        self.execute(now).await
    }

    /// Manual trigger: skips the hour checks, keeps the stop and the
    /// processing guard.
    pub async fn run_now(&self, now: DateTime<Utc>) -> TickOutcome {
        if self.state().emergency_stop {
            return TickOutcome::EmergencyStopped;
        }
        info!(account = self.account(), "Manual run requested");
        self.execute(now).await
    }

    async fn execute(&self, now: DateTime<Utc>) -> TickOutcome {
        let Some(_guard) = ProcessingGuard::acquire(self) else {
            info!(account = self.account(), "Run already in progress");
            return TickOutcome::AlreadyProcessing;
        };

        let limit = self.max_posts_per_day();
        let published = self.log.successes_on(now.date_naive());
        if published >= limit as usize {
            let reason = CuratorError::QuotaExceeded { published, limit };
            info!(published, limit, "Daily limit reached, skipping run");
            self.append_log(CurationLogEntry::with_status(
                now,
                "",
                SCHEDULER_SOURCE,
                CurationStatus::Skipped,
                reason.to_string(),
            ));
            return TickOutcome::QuotaReached;
        }

        self.update_state(|s| s.total_runs += 1);
        let (status, entry) = match AssertUnwindSafe(self.pipeline.run(now)).catch_unwind().await {
            Ok(outcome) => {
                let entry = outcome.log_entry(now);
                match &outcome.result {
                    Ok(post_id) => info!(
                        title = entry.topic_title.as_str(),
                        post_id = post_id.as_str(),
                        "Curation succeeded"
                    ),
                    Err(e) if e.status() == CurationStatus::Failed => {
                        error!(title = entry.topic_title.as_str(), error = %e, "Curation failed")
                    }
                    Err(e) => {
                        info!(title = entry.topic_title.as_str(), reason = %e, "Curation skipped")
                    }
                }
                (outcome.status(), entry)
            }
            Err(payload) => {
                let reason = CuratorError::Internal(anyhow!(
                    "internal error: run panicked: {}",
                    panic_message(payload.as_ref())
                ));
                error!(account = self.account(), error = %reason, "Curation run panicked");
                let entry = CurationLogEntry::with_status(
                    now,
                    "",
                    SCHEDULER_SOURCE,
                    reason.status(),
                    reason.to_string(),
                );
                (reason.status(), entry)
            }
        };
        self.append_log(entry);

        let (hour, date) = hour_and_date(now);
        self.update_state(|s| {
            if status == CurationStatus::Success {
                s.last_run_hour = hour as i32;
                s.last_run_date = date;
                s.successful_runs += 1;
            }
            s.next_run_hour = ((hour + 1) % 24) as i32;
        });
        TickOutcome::Completed(status)
    }

    fn append_log(&self, entry: CurationLogEntry) {
        if let Err(e) = self.log.append(entry) {
            error!(account = self.account(), error = %e, "Failed to persist curation log");
        }
    }

    // --- Operator controls ---

    pub fn emergency_stop(&self) -> Result<(), ControlError> {
        warn!(account = self.account(), "Emergency stop engaged");
        Ok(self.try_update_state(|s| s.emergency_stop = true)?)
    }

    /// Clearing never fires a missed run; the next natural tick proceeds.
    pub fn clear_emergency_stop(&self) -> Result<(), ControlError> {
        info!(account = self.account(), "Emergency stop cleared");
        Ok(self.try_update_state(|s| s.emergency_stop = false)?)
    }

    pub fn set_max_posts_per_day(&self, max: u32) -> Result<(), ControlError> {
        if !MAX_POSTS_PER_DAY_RANGE.contains(&max) {
            return Err(ControlError::InvalidQuota(max));
        }
        let mut settings = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        let updated = CuratorSettings {
            max_posts_per_day: max,
        };
        save_json(self.store.as_ref(), &self.keys.settings(), &updated)?;
        *settings = updated;
        info!(account = self.account(), max_posts_per_day = max, "Daily quota updated");
        Ok(())
    }

    pub fn dashboard(&self, now: DateTime<Utc>) -> DashboardSnapshot {
        DashboardSnapshot::new(
            self.account(),
            self.state(),
            &self.log,
            self.max_posts_per_day(),
            now,
        )
    }

    // --- Timer ---

    /// Tick at every top of the hour until `shutdown` flips to true. A run
    /// in flight when shutdown arrives is allowed to finish.
    pub async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        self.update_state(|s| s.is_running = true);
        info!(account = self.account(), "Scheduler started");

        let now = Utc::now();
        if now.minute() < TICK_WINDOW_MINUTES {
            let outcome = self.tick(now).await;
            debug!(?outcome, "Startup tick");
        }

        loop {
            let now = Utc::now();
            let next = next_hour_boundary(now);
            self.update_state(|s| s.next_run_hour = next.hour() as i32);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(next = %next, wait_secs = wait.as_secs(), "Sleeping until next tick");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    let outcome = self.tick(Utc::now()).await;
                    debug!(?outcome, "Hourly tick");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.update_state(|s| s.is_running = false);
        info!(account = self.account(), "Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_boundary_is_strictly_after() {
        let t = Utc.with_ymd_and_hms(2026, 5, 1, 13, 42, 10).unwrap();
        assert_eq!(next_hour_boundary(t), Utc.with_ymd_and_hms(2026, 5, 1, 14, 0, 0).unwrap());

        let on_the_hour = Utc.with_ymd_and_hms(2026, 5, 1, 23, 0, 0).unwrap();
        assert_eq!(
            next_hour_boundary(on_the_hour),
            Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn panic_payloads_become_text() {
        let literal: Box<dyn Any + Send> = Box::new("adapter exploded");
        let formatted: Box<dyn Any + Send> = Box::new(format!("index {} out of range", 7));
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(literal.as_ref()), "adapter exploded");
        assert_eq!(panic_message(formatted.as_ref()), "index 7 out of range");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    #[test]
    fn hour_and_date_are_utc() {
        let t = Utc.with_ymd_and_hms(2026, 1, 9, 7, 3, 0).unwrap();
        assert_eq!(hour_and_date(t), (7, "2026-01-09".to_string()));
    }
}
