//! Scheduler ticks with a controllable clock.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use common::{date, Call, World};
use lifeos_core::logging::{day_file_layer, day_file_path};
use lifeos_core::storage::{ActionFetchFallback, TaskFetchFallback};
use lifeos_core::{
    Clock, FailurePolicy, ReconcilerState, Reconciler, Scheduler, SnapshotStore, SyncDirection,
    TickOutcome,
};
use tempfile::TempDir;
use tracing_subscriber::layer::SubscriberExt;

#[derive(Clone)]
struct FakeClock(Arc<Mutex<NaiveDateTime>>);

impl FakeClock {
    fn at(day: NaiveDate, h: u32, m: u32) -> Self {
        Self(Arc::new(Mutex::new(day.and_hms_opt(h, m, 0).unwrap())))
    }

    fn set(&self, day: NaiveDate, h: u32, m: u32) {
        *self.0.lock().unwrap() = day.and_hms_opt(h, m, 0).unwrap();
    }
}

impl Clock for FakeClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().unwrap()
    }
}

fn synced(outcome: TickOutcome) -> lifeos_core::CycleReport {
    match outcome {
        TickOutcome::Synced(report) => report,
        TickOutcome::Blackout { .. } => panic!("expected a sync, got blackout"),
    }
}

#[tokio::test]
async fn test_first_tick_syncs_immediately() {
    let world = World::new();
    let day = date(2024, 5, 10);
    world.notion.put("A1", "Buy milk", day);
    let clock = FakeClock::at(day, 9, 0);
    let reconciler = Reconciler::new(world.notion.clone(), world.tasks.clone());
    let mut scheduler = Scheduler::new(reconciler, clock, ReconcilerState::default());

    let report = synced(scheduler.tick().await);

    assert!(!report.new_day);
    assert_eq!(report.created, vec!["A1".to_string()]);
    assert!(scheduler.state().is_converged());
    assert_eq!(scheduler.today(), day);
}

#[tokio::test]
async fn test_blackout_minute_skips_sync() {
    let world = World::new();
    let day = date(2024, 5, 10);
    world.notion.put("A1", "Buy milk", day);
    let clock = FakeClock::at(day, 23, 59);
    let reconciler = Reconciler::new(world.notion.clone(), world.tasks.clone());
    let mut scheduler = Scheduler::new(reconciler, clock.clone(), ReconcilerState::default())
        .with_timing(Duration::from_secs(60), Duration::from_secs(120));

    let outcome = scheduler.tick().await;

    assert_eq!(
        outcome,
        TickOutcome::Blackout {
            pause: Duration::from_secs(120)
        }
    );
    assert!(world.take_calls().is_empty());
    assert!(scheduler.state().is_empty());

    clock.set(day, 23, 58);
    synced(scheduler.tick().await);
    assert!(!world.take_calls().is_empty());
}

#[tokio::test]
async fn test_day_rollover_runs_exactly_one_clearing_cycle() {
    let world = World::new();
    let day = date(2024, 5, 10);
    let next_day = date(2024, 5, 11);
    world.notion.put("A1", "Buy milk", day);
    let clock = FakeClock::at(day, 22, 0);
    let reconciler = Reconciler::new(world.notion.clone(), world.tasks.clone());
    let mut scheduler = Scheduler::new(reconciler, clock.clone(), ReconcilerState::default());

    synced(scheduler.tick().await);
    let old_task = world.tasks.task_id("A1").unwrap();
    world.take_calls();

    clock.set(next_day, 0, 1);
    let report = synced(scheduler.tick().await);
    assert!(report.new_day);
    assert_eq!(report.cleared, 1);
    assert_eq!(world.take_mutations()[0], Call::Delete(old_task));
    assert_eq!(scheduler.today(), next_day);

    clock.set(next_day, 0, 2);
    let report = synced(scheduler.tick().await);
    assert!(!report.new_day);
    assert_eq!(report.direction, SyncDirection::Unchanged);
    assert!(world.take_mutations().is_empty());
}

#[tokio::test]
async fn test_skipped_rollover_is_retried() {
    let world = World::new();
    let day = date(2024, 5, 10);
    let next_day = date(2024, 5, 11);
    world.notion.put("A1", "Buy milk", day);
    let clock = FakeClock::at(day, 12, 0);
    let reconciler = Reconciler::new(world.notion.clone(), world.tasks.clone());
    let mut scheduler = Scheduler::new(reconciler, clock.clone(), ReconcilerState::default());
    synced(scheduler.tick().await);

    world.notion.fail_query(true);
    let policy = FailurePolicy {
        on_action_fetch_error: ActionFetchFallback::SkipCycle,
        on_task_fetch_error: TaskFetchFallback::Empty,
    };
    let reconciler =
        Reconciler::new(world.notion.clone(), world.tasks.clone()).with_policy(policy);
    let state = scheduler.state().clone();
    let mut scheduler = Scheduler::new(reconciler, clock.clone(), state);

    clock.set(next_day, 0, 5);
    let report = synced(scheduler.tick().await);
    assert_eq!(report.direction, SyncDirection::Skipped);
    assert!(report.new_day);
    assert_eq!(scheduler.today(), day);

    world.notion.fail_query(false);
    clock.set(next_day, 0, 6);
    let report = synced(scheduler.tick().await);
    assert!(report.new_day);
    assert_eq!(report.cleared, 1);
    assert_eq!(scheduler.today(), next_day);
}

#[tokio::test]
async fn test_state_is_persisted_after_each_cycle() {
    let temp_dir = TempDir::new().unwrap();
    let store = SnapshotStore::new_with_path(temp_dir.path().join("snapshot.json"));
    let world = World::new();
    let day = date(2024, 5, 10);
    world.notion.put("A1", "Buy milk", day);
    let reconciler = Reconciler::new(world.notion.clone(), world.tasks.clone());
    let mut scheduler = Scheduler::new(reconciler, FakeClock::at(day, 8, 0), store.load_or_default())
        .with_snapshot_store(store.clone());

    synced(scheduler.tick().await);

    let persisted = store.load().unwrap();
    assert_eq!(&persisted, scheduler.state());
    assert!(persisted.last_tasks.contains_key("A1"));
}

#[tokio::test]
async fn test_restored_state_avoids_resync() {
    let temp_dir = TempDir::new().unwrap();
    let store = SnapshotStore::new_with_path(temp_dir.path().join("snapshot.json"));
    let world = World::new();
    let day = date(2024, 5, 10);
    world.notion.put("A1", "Buy milk", day);

    {
        let reconciler = Reconciler::new(world.notion.clone(), world.tasks.clone());
        let mut scheduler = Scheduler::new(reconciler, FakeClock::at(day, 8, 0), store.load_or_default())
            .with_snapshot_store(store.clone());
        synced(scheduler.tick().await);
    }
    world.take_calls();

    let reconciler = Reconciler::new(world.notion.clone(), world.tasks.clone());
    let mut restarted = Scheduler::new(reconciler, FakeClock::at(day, 8, 5), store.load_or_default())
        .with_snapshot_store(store.clone());
    let report = synced(restarted.tick().await);

    assert_eq!(report.direction, SyncDirection::Unchanged);
    assert!(world.take_mutations().is_empty());
}

#[tokio::test]
async fn test_restart_after_midnight_clears_yesterdays_tasks() {
    let temp_dir = TempDir::new().unwrap();
    let store = SnapshotStore::new_with_path(temp_dir.path().join("snapshot.json"));
    let world = World::new();
    let day = date(2024, 5, 10);
    let next_day = date(2024, 5, 11);
    world.notion.put("A1", "Buy milk", day);

    {
        let reconciler = Reconciler::new(world.notion.clone(), world.tasks.clone());
        let mut scheduler = Scheduler::new(reconciler, FakeClock::at(day, 23, 30), store.load_or_default())
            .with_snapshot_store(store.clone());
        synced(scheduler.tick().await);
    }
    let yesterdays_task = world.tasks.task_id("A1").unwrap();
    assert_eq!(store.load().unwrap().last_day, Some(day));
    world.take_calls();

    // Process comes back up after midnight.
    let reconciler = Reconciler::new(world.notion.clone(), world.tasks.clone());
    let mut restarted = Scheduler::new(reconciler, FakeClock::at(next_day, 0, 10), store.load_or_default())
        .with_snapshot_store(store.clone());
    assert_eq!(restarted.today(), day);
    let report = synced(restarted.tick().await);

    assert!(report.new_day);
    assert_eq!(report.cleared, 1);
    assert_eq!(report.created, vec!["A1".to_string()]);
    assert_eq!(world.take_mutations()[0], Call::Delete(yesterdays_task.clone()));
    assert_ne!(world.tasks.task_id("A1").unwrap(), yesterdays_task);
    assert_eq!(world.tasks.open_copies("A1"), 1);
    assert_eq!(restarted.today(), next_day);
    assert_eq!(store.load().unwrap().last_day, Some(next_day));
}

#[tokio::test]
async fn test_rollover_rotates_log_file() {
    let temp_dir = TempDir::new().unwrap();
    let day = date(2024, 5, 10);
    let next_day = date(2024, 5, 11);
    let (layer, handle) = day_file_layer(temp_dir.path(), day).unwrap();
    let _subscriber = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));
    let world = World::new();
    let clock = FakeClock::at(day, 23, 0);
    let reconciler = Reconciler::new(world.notion.clone(), world.tasks.clone());
    let mut scheduler = Scheduler::new(reconciler, clock.clone(), ReconcilerState::default())
        .with_log_handle(handle);

    synced(scheduler.tick().await);
    assert!(!day_file_path(temp_dir.path(), next_day).exists());

    clock.set(next_day, 0, 0);
    synced(scheduler.tick().await);
    tracing::info!("after rollover");

    let previous = std::fs::read_to_string(day_file_path(temp_dir.path(), day)).unwrap();
    let current = std::fs::read_to_string(day_file_path(temp_dir.path(), next_day)).unwrap();
    assert!(!previous.contains("after rollover"));
    assert!(current.contains("after rollover"));
}

#[tokio::test]
async fn test_run_until_stops_on_shutdown() {
    let world = World::new();
    let day = date(2024, 5, 10);
    world.notion.put("A1", "Buy milk", day);
    let reconciler = Reconciler::new(world.notion.clone(), world.tasks.clone());
    let mut scheduler = Scheduler::new(reconciler, FakeClock::at(day, 10, 0), ReconcilerState::default())
        .with_timing(Duration::from_secs(3600), Duration::from_secs(3600));

    scheduler.run_until(async {}).await;

    let queries = world
        .take_calls()
        .into_iter()
        .filter(|c| *c == Call::Query)
        .count();
    assert_eq!(queries, 1);
    assert!(scheduler.state().is_converged());
}
