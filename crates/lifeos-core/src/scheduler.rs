//! Fixed-cadence driver for the reconciler.
//!
//! The scheduler is a two-state machine with no internal thread:
//!
//! ```text
//! Idle --tick()--> Syncing --cycle done--> Idle
//! ```
//!
//! [`Scheduler::tick`] runs at most one cycle and reports what happened;
//! [`Scheduler::run_until`] calls it in a loop, sleeping `interval` after each
//! completed cycle. A tick that starts at 23:59 does not sync and asks the
//! driver to wait out the day boundary instead.

use std::future::Future;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::{error, info};

use crate::logging::LogHandle;
use crate::reconciler::{CycleReport, Reconciler, SyncDirection};
use crate::snapshot::{ReconcilerState, SnapshotStore};
use crate::storage::SyncConfig;
use crate::stores::{ActionStore, TaskStore};

/// Source of local wall-clock time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A cycle ran (possibly skipped by the failure policy).
    Synced(CycleReport),
    /// The tick fell on the day's last minute; try again after `pause`.
    Blackout { pause: Duration },
}

/// True during the last minute of the day.
pub fn in_blackout(time: NaiveTime) -> bool {
    time.hour() == 23 && time.minute() == 59
}

pub struct Scheduler<A, T, C = SystemClock> {
    reconciler: Reconciler<A, T>,
    clock: C,
    state: ReconcilerState,
    /// Day of the last cycle that was not skipped.
    today: NaiveDate,
    log_day: NaiveDate,
    interval: Duration,
    blackout_pause: Duration,
    snapshots: Option<SnapshotStore>,
    log: Option<LogHandle>,
}

impl<A: ActionStore, T: TaskStore, C: Clock> Scheduler<A, T, C> {
    /// A restored `state` carries the day of its last cycle, so a restart
    /// on a later day begins with a rollover cycle.
    pub fn new(reconciler: Reconciler<A, T>, clock: C, state: ReconcilerState) -> Self {
        let started = clock.now().date();
        let defaults = SyncConfig::default();
        Self {
            reconciler,
            clock,
            today: state.last_day.unwrap_or(started),
            state,
            log_day: started,
            interval: defaults.interval(),
            blackout_pause: defaults.blackout_pause(),
            snapshots: None,
            log: None,
        }
    }

    pub fn with_timing(mut self, interval: Duration, blackout_pause: Duration) -> Self {
        self.interval = interval;
        self.blackout_pause = blackout_pause;
        self
    }

    /// Persist the retained state here after every cycle.
    pub fn with_snapshot_store(mut self, store: SnapshotStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Rotate this log target when the day changes.
    pub fn with_log_handle(mut self, handle: LogHandle) -> Self {
        self.log = Some(handle);
        self
    }

    pub fn state(&self) -> &ReconcilerState {
        &self.state
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn reconciler(&self) -> &Reconciler<A, T> {
        &self.reconciler
    }

    /// Run one cycle unless the clock is in the blackout minute.
    pub async fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now();
        if in_blackout(now.time()) {
            info!(pause_secs = self.blackout_pause.as_secs(), "day boundary blackout; pausing");
            return TickOutcome::Blackout {
                pause: self.blackout_pause,
            };
        }

        info!("syncing Notion and Google Tasks");
        let current_day = now.date();
        let is_new_day = current_day != self.today;
        if is_new_day {
            info!(previous = %self.today, today = %current_day, "day rollover");
            self.rotate_log(current_day);
        }

        let state = std::mem::take(&mut self.state);
        let (state, report) = self
            .reconciler
            .run_cycle(state, current_day, is_new_day)
            .await;
        self.state = state;

        // A skipped rollover cycle is retried as a rollover next tick.
        if report.direction != SyncDirection::Skipped {
            self.today = current_day;
        }
        self.persist();

        TickOutcome::Synced(report)
    }

    /// Tick until `shutdown` resolves. Shutdown is observed between cycles.
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) {
        tokio::pin!(shutdown);
        info!(interval_secs = self.interval.as_secs(), "lifeos automation is running");
        loop {
            let wait = match self.tick().await {
                TickOutcome::Synced(_) => self.interval,
                TickOutcome::Blackout { pause } => pause,
            };
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested; stopping scheduler");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn rotate_log(&mut self, day: NaiveDate) {
        if day == self.log_day {
            return;
        }
        if let Some(handle) = &self.log {
            if let Err(e) = handle.rotate(day) {
                error!(error = %e, "failed to rotate log file");
                return;
            }
        }
        self.log_day = day;
    }

    fn persist(&self) {
        if let Some(store) = &self.snapshots {
            if let Err(e) = store.persist(&self.state) {
                error!(path = %store.path().display(), error = %e, "failed to persist snapshot");
            }
        }
    }
}
