//! Scheduler behaviour across ticks, manual runs, operator controls and restarts.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;

use curator_common::{CurationStatus, SchedulerState, SourceKind, Topic};
use curator_engine::scheduling::{next_hour_boundary, ControlError};
use curator_engine::store::{load_json, save_json, FileStore, StateKeys};
use curator_engine::testing::{topic, Harness, PanicSource, SlowSource};
use curator_engine::traits::{KeyValueStore, TopicSource};
use curator_engine::TickOutcome;

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 2, hour, minute, 0).unwrap()
}

fn feed() -> Vec<Topic> {
    vec![
        topic("TSMC begins 2nm volume production", SourceKind::Forum, 2200.0),
        topic("Anthropic publishes Claude interpretability paper", SourceKind::Aggregator, 900.0),
    ]
}

/// Records the persisted processing flag at the moment discovery runs.
struct FlagWatchSource {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    seen: Mutex<Option<bool>>,
}

#[async_trait]
impl TopicSource for FlagWatchSource {
    fn name(&self) -> &str {
        "flag-watch"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Forum
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>> {
        let state: Option<SchedulerState> = load_json(self.kv.as_ref(), &self.key)?;
        *self.seen.lock().unwrap() = state.map(|s| s.is_processing);
        Ok(feed())
    }
}

#[tokio::test]
async fn runs_once_per_hour() {
    let harness = Harness::new().with_topics(feed());
    let scheduler = harness.scheduler();

    assert_eq!(
        scheduler.tick(at(10, 0)).await,
        TickOutcome::Completed(CurationStatus::Success)
    );
    assert_eq!(scheduler.tick(at(10, 3)).await, TickOutcome::AlreadyRanThisHour);
    assert_eq!(harness.posts.posts().len(), 1);

    // Next hour picks the runner-up; the leader is now in the keyword history.
    assert_eq!(
        scheduler.tick(at(11, 1)).await,
        TickOutcome::Completed(CurationStatus::Success)
    );
    let posts = harness.posts.posts();
    assert_eq!(posts.len(), 2);
    assert_eq!(
        posts[0].title,
        "[AI Research] Anthropic publishes Claude interpretability paper"
    );
    assert_eq!(posts[1].title, "[AI Research] TSMC begins 2nm volume production");
    assert_eq!(scheduler.state().last_run_hour, 11);
}

#[tokio::test]
async fn ticks_outside_the_window_are_ignored() {
    let harness = Harness::new().with_topics(feed());
    let scheduler = harness.scheduler();

    assert_eq!(scheduler.tick(at(10, 5)).await, TickOutcome::OutsideWindow);
    assert_eq!(scheduler.tick(at(10, 42)).await, TickOutcome::OutsideWindow);
    assert_eq!(scheduler.state().total_runs, 0);
    assert!(harness.posts.posts().is_empty());
}

#[tokio::test]
async fn processing_flag_is_persisted_only_during_a_run() {
    let harness = Harness::new();
    let watcher = Arc::new(FlagWatchSource {
        kv: harness.kv.clone(),
        key: harness.keys.scheduler_state(),
        seen: Mutex::new(None),
    });
    let harness = harness.with_sources(vec![watcher.clone() as Arc<dyn TopicSource>]);
    let scheduler = harness.scheduler();

    assert!(!scheduler.is_processing());
    scheduler.run_now(at(9, 30)).await;

    assert_eq!(*watcher.seen.lock().unwrap(), Some(true));
    assert!(!scheduler.is_processing());
    let persisted: SchedulerState = load_json(harness.kv.as_ref(), &harness.keys.scheduler_state())
        .unwrap()
        .unwrap();
    assert!(!persisted.is_processing);
}

#[tokio::test]
async fn overlapping_triggers_run_once() {
    let harness = Harness::new().with_sources(vec![Arc::new(SlowSource::new(
        "slow",
        StdDuration::from_millis(200),
    )) as Arc<dyn TopicSource>]);
    let scheduler = harness.scheduler();

    let (first, second) = tokio::join!(scheduler.run_now(at(13, 0)), scheduler.tick(at(13, 0)));

    assert_eq!(first, TickOutcome::Completed(CurationStatus::Success));
    assert_eq!(second, TickOutcome::AlreadyProcessing);
    assert_eq!(scheduler.dashboard(at(13, 1)).recent_logs.len(), 1);
    assert_eq!(scheduler.state().total_runs, 1);
}

#[tokio::test]
async fn emergency_stop_blocks_every_trigger_until_cleared() {
    let harness = Harness::new().with_topics(feed());
    let scheduler = harness.scheduler();

    scheduler.emergency_stop().unwrap();
    assert_eq!(scheduler.tick(at(8, 0)).await, TickOutcome::EmergencyStopped);
    assert_eq!(scheduler.run_now(at(8, 10)).await, TickOutcome::EmergencyStopped);
    assert!(harness.posts.posts().is_empty());
    assert!(scheduler.dashboard(at(8, 10)).recent_logs.is_empty());

    scheduler.clear_emergency_stop().unwrap();
    assert!(!scheduler.state().emergency_stop);
    assert_eq!(
        scheduler.tick(at(9, 0)).await,
        TickOutcome::Completed(CurationStatus::Success)
    );
}

#[tokio::test]
async fn manual_run_ignores_hour_bookkeeping() {
    let harness = Harness::new().with_topics(feed());
    let scheduler = harness.scheduler();

    assert_eq!(
        scheduler.tick(at(15, 2)).await,
        TickOutcome::Completed(CurationStatus::Success)
    );
    assert_eq!(
        scheduler.run_now(at(15, 30)).await,
        TickOutcome::Completed(CurationStatus::Success)
    );
    assert_eq!(harness.posts.posts().len(), 2);
    assert_eq!(scheduler.state().successful_runs, 2);
}

#[tokio::test]
async fn unsuccessful_runs_leave_the_hour_open() {
    let harness = Harness::new().with_failing_store().with_topics(feed());
    let scheduler = harness.scheduler();

    assert_eq!(
        scheduler.tick(at(20, 0)).await,
        TickOutcome::Completed(CurationStatus::Failed)
    );
    let state = scheduler.state();
    assert_eq!(state.last_run_hour, -1);
    assert_eq!(state.last_run_date, "");
    assert_eq!(state.next_run_hour, 21);

    // Still inside the window, so the same hour gets another attempt.
    assert_eq!(
        scheduler.tick(at(20, 4)).await,
        TickOutcome::Completed(CurationStatus::Failed)
    );
    assert_eq!(scheduler.state().total_runs, 2);
    assert_eq!(scheduler.dashboard(at(20, 4)).success_rate, 0.0);
}

#[tokio::test]
async fn quota_changes_are_validated_and_persisted() {
    let harness = Harness::new();
    let scheduler = harness.scheduler();

    assert!(matches!(
        scheduler.set_max_posts_per_day(0),
        Err(ControlError::InvalidQuota(0))
    ));
    assert!(matches!(
        scheduler.set_max_posts_per_day(25),
        Err(ControlError::InvalidQuota(25))
    ));
    assert_eq!(scheduler.max_posts_per_day(), 3);

    scheduler.set_max_posts_per_day(24).unwrap();
    assert_eq!(scheduler.max_posts_per_day(), 24);

    let reloaded = harness.scheduler_unshared().unwrap();
    assert_eq!(reloaded.max_posts_per_day(), 24);
}

#[tokio::test]
async fn state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
        let harness = Harness::with_kv(kv).with_topics(feed());
        let scheduler = harness.scheduler();
        assert_eq!(
            scheduler.tick(at(6, 1)).await,
            TickOutcome::Completed(CurationStatus::Success)
        );
        scheduler.emergency_stop().unwrap();
    }

    // A process that died mid-run leaves its flags behind.
    let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let keys = StateKeys::new("test-curator");
    let mut stale: SchedulerState = load_json(kv.as_ref(), &keys.scheduler_state())
        .unwrap()
        .unwrap();
    stale.is_processing = true;
    stale.is_running = true;
    save_json(kv.as_ref(), &keys.scheduler_state(), &stale).unwrap();

    let harness = Harness::with_kv(kv).with_topics(feed());
    let scheduler = harness.scheduler();
    let state = scheduler.state();

    assert!(!state.is_processing);
    assert!(!state.is_running);
    assert!(!scheduler.is_processing());
    assert!(state.emergency_stop);
    assert_eq!(state.last_run_hour, 6);
    assert_eq!(state.last_run_date, "2026-04-02");
    assert_eq!(state.successful_runs, 1);

    let dashboard = scheduler.dashboard(at(6, 30));
    assert_eq!(dashboard.recent_logs.len(), 1);
    assert_eq!(dashboard.published_today, 1);
    assert_eq!(harness.ledger.entries(at(6, 30)).unwrap().len(), 1);

    scheduler.clear_emergency_stop().unwrap();
    assert_eq!(scheduler.tick(at(6, 3)).await, TickOutcome::AlreadyRanThisHour);
}

#[tokio::test]
async fn manual_run_completes_on_a_spawned_task() {
    let harness = Harness::new().with_topics(feed());
    let scheduler = harness.scheduler();

    let task = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_now(at(12, 30)).await })
    };

    assert_eq!(task.await.unwrap(), TickOutcome::Completed(CurationStatus::Success));
    assert_eq!(harness.posts.posts().len(), 1);
}

#[tokio::test]
async fn timer_loop_runs_on_a_spawned_task_and_stops_on_shutdown() {
    let harness = Harness::new().with_topics(feed());
    let scheduler = harness.scheduler();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(scheduler.clone().run_loop(shutdown_rx));
    shutdown_tx.send(true).unwrap();
    task.await.unwrap();

    assert!(!scheduler.state().is_running);
    assert!(!scheduler.is_processing());
}

#[tokio::test]
async fn panicking_stage_is_logged_as_failure_and_releases_the_guard() {
    let harness = Harness::new().with_sources(vec![Arc::new(PanicSource) as Arc<dyn TopicSource>]);
    let scheduler = harness.scheduler();

    assert_eq!(
        scheduler.tick(at(10, 0)).await,
        TickOutcome::Completed(CurationStatus::Failed)
    );
    assert!(!scheduler.is_processing());
    let persisted: SchedulerState = load_json(harness.kv.as_ref(), &harness.keys.scheduler_state())
        .unwrap()
        .unwrap();
    assert!(!persisted.is_processing);

    let logs = scheduler.dashboard(at(10, 0)).recent_logs;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, CurationStatus::Failed);
    assert_eq!(logs[0].source, "scheduler");
    let reason = logs[0].reason.clone().unwrap();
    assert!(reason.contains("feed parser hit an impossible state"), "{reason}");

    let state = scheduler.state();
    assert_eq!(state.total_runs, 1);
    assert_eq!(state.last_run_hour, -1);

    // The scheduler stays usable for the next trigger.
    assert_eq!(
        scheduler.tick(at(10, 2)).await,
        TickOutcome::Completed(CurationStatus::Failed)
    );
    assert_eq!(scheduler.state().total_runs, 2);
}

#[tokio::test]
async fn only_runs_past_the_guards_write_a_log_entry() {
    let harness = Harness::new().with_topics(feed()).with_max_posts_per_day(1);
    let scheduler = harness.scheduler();

    let done = scheduler.run_now(at(9, 0)).await;
    let quota = scheduler.run_now(at(9, 10)).await;
    scheduler.emergency_stop().unwrap();
    let stopped = scheduler.run_now(at(9, 20)).await;

    assert!(done.wrote_log_entry());
    assert!(quota.wrote_log_entry());
    assert!(!stopped.wrote_log_entry());
    assert!(!TickOutcome::AlreadyProcessing.wrote_log_entry());
    assert!(!TickOutcome::OutsideWindow.wrote_log_entry());
    assert_eq!(scheduler.dashboard(at(9, 20)).recent_logs.len(), 2);
}

#[test]
fn next_boundary_rolls_over_midnight() {
    assert_eq!(
        next_hour_boundary(Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap()),
        Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
    );
}
