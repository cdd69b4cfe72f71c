//! Reconciliation between Notion actions and Google Tasks.
//!
//! One cycle compares freshly fetched state with the retained
//! [`ReconcilerState`] and pushes the lagging side toward the other:
//!
//! ```text
//! actions changed            -> Notion => Google Tasks (create / delete tasks)
//! only tasks changed         -> Google Tasks => Notion (mark removed tasks' actions done)
//! neither changed            -> no remote calls
//! ```
//!
//! When both sides changed, the Notion direction wins; task-side removals
//! are picked up on a later cycle once actions are stable.
//!
//! Remote failures never abort a cycle. A failed fetch falls back according
//! to [`FailurePolicy`]; a failed mutation is logged, and the retained
//! actions are left untouched so the next cycle retries the same diff.
//! A task list that could not be fetched is never read as the user having
//! removed tasks, so it can lead to re-created tasks but not to actions
//! being marked done.
//!
//! Extra tasks that repeat a back-reference are deleted at the start of
//! every cycle, keeping the retained one, so each action is mirrored by
//! exactly one open task.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::model::{task_due, ActionId, ActionMap, TaskListing, TaskMap};
use crate::snapshot::ReconcilerState;
use crate::storage::{ActionFetchFallback, SyncConfig, TaskFetchFallback};
use crate::stores::{ActionStore, TaskStore};

/// Which way a cycle pushed changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Nothing changed on either side.
    #[default]
    Unchanged,
    /// Actions changed: tasks were created or deleted to mirror them.
    ActionsToTasks,
    /// Only tasks changed: actions whose task disappeared were marked done.
    TasksToActions,
    /// A fetch failed and the policy said to sit this cycle out.
    Skipped,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub direction: SyncDirection,
    pub new_day: bool,
    /// Tasks deleted by the day-rollover clear.
    pub cleared: usize,
    /// Action ids a task was created for.
    pub created: Vec<ActionId>,
    /// Back-references of deleted tasks.
    pub deleted: Vec<ActionId>,
    /// Task ids of deleted tasks that repeated another task's back-reference.
    pub pruned: Vec<String>,
    /// Action ids marked done in Notion.
    pub marked_done: Vec<ActionId>,
    /// Failed remote calls.
    pub failures: usize,
}

impl CycleReport {
    /// Number of successful remote mutations.
    pub fn mutations(&self) -> usize {
        self.cleared
            + self.created.len()
            + self.deleted.len()
            + self.pruned.len()
            + self.marked_done.len()
    }
}

/// Fallbacks for failed fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    pub on_action_fetch_error: ActionFetchFallback,
    pub on_task_fetch_error: TaskFetchFallback,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            on_action_fetch_error: ActionFetchFallback::LastKnown,
            on_task_fetch_error: TaskFetchFallback::Empty,
        }
    }
}

impl From<&SyncConfig> for FailurePolicy {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            on_action_fetch_error: cfg.on_action_fetch_error,
            on_task_fetch_error: cfg.on_task_fetch_error,
        }
    }
}

pub struct Reconciler<A, T> {
    actions: A,
    tasks: T,
    policy: FailurePolicy,
}

impl<A: ActionStore, T: TaskStore> Reconciler<A, T> {
    pub fn new(actions: A, tasks: T) -> Self {
        Self {
            actions,
            tasks,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn action_store(&self) -> &A {
        &self.actions
    }

    pub fn task_store(&self) -> &T {
        &self.tasks
    }

    /// Fetch both sides and reconcile them against `state`.
    ///
    /// With `is_new_day` every listed task is deleted first and the cycle
    /// starts from an empty retained state, so all eligible actions get
    /// fresh tasks. Unless the cycle is skipped, the returned state records
    /// `today` as its last day.
    pub async fn run_cycle(
        &self,
        state: ReconcilerState,
        today: NaiveDate,
        is_new_day: bool,
    ) -> (ReconcilerState, CycleReport) {
        let mut failures = 0;

        let current_actions = match self.actions.query(today).await {
            Ok(actions) => actions,
            Err(e) => {
                error!(store = self.actions.name(), error = %e, "failed to fetch actions");
                failures += 1;
                match self.policy.on_action_fetch_error {
                    ActionFetchFallback::LastKnown => state.last_actions.clone(),
                    ActionFetchFallback::SkipCycle => return (state, skipped(is_new_day, failures)),
                }
            }
        };

        let mut cleared = 0;
        let mut tasks_listed = true;
        let (state, listing) = if is_new_day {
            let (count, failed) = self.clear_all_tasks().await;
            cleared = count;
            failures += failed;
            (ReconcilerState::default(), TaskListing::default())
        } else {
            match self.tasks.list().await {
                Ok(listing) => (state, listing),
                Err(e) => {
                    error!(store = self.tasks.name(), error = %e, "failed to fetch tasks");
                    failures += 1;
                    match self.policy.on_task_fetch_error {
                        TaskFetchFallback::Empty => {
                            tasks_listed = false;
                            (state, TaskListing::default())
                        }
                        TaskFetchFallback::SkipCycle => {
                            return (state, skipped(is_new_day, failures))
                        }
                    }
                }
            }
        };

        let (current_tasks, pruned, failed) =
            self.prune_duplicates(&state.last_tasks, listing).await;
        failures += failed;

        let (mut state, mut report) = if tasks_listed {
            self.reconcile(state, current_actions, current_tasks, today)
                .await
        } else if current_actions != state.last_actions {
            self.sync_actions_to_tasks(state, current_actions, current_tasks, today)
                .await
        } else {
            debug!("task list unavailable and actions unchanged; nothing to do");
            (state, CycleReport::default())
        };
        state.last_day = Some(today);
        report.new_day = is_new_day;
        report.cleared = cleared;
        report.pruned = pruned;
        report.failures += failures;
        (state, report)
    }

    /// Decide a direction for already-fetched state and apply it.
    pub async fn reconcile(
        &self,
        state: ReconcilerState,
        current_actions: ActionMap,
        current_tasks: TaskMap,
        today: NaiveDate,
    ) -> (ReconcilerState, CycleReport) {
        let actions_changed = current_actions != state.last_actions;
        let tasks_changed = current_tasks != state.last_tasks;

        if actions_changed {
            if tasks_changed {
                debug!("both sides changed; Notion wins this cycle");
            }
            self.sync_actions_to_tasks(state, current_actions, current_tasks, today)
                .await
        } else if tasks_changed {
            self.sync_tasks_to_actions(state, current_tasks).await
        } else {
            debug!("no changes on either side");
            (state, CycleReport::default())
        }
    }

    async fn sync_actions_to_tasks(
        &self,
        state: ReconcilerState,
        current_actions: ActionMap,
        mut tasks: TaskMap,
        today: NaiveDate,
    ) -> (ReconcilerState, CycleReport) {
        let mut report = CycleReport {
            direction: SyncDirection::ActionsToTasks,
            ..CycleReport::default()
        };

        // Orphans, plus tasks whose action was edited since it was last seen.
        let outdated: Vec<ActionId> = tasks
            .iter()
            .filter(|(back_ref, task)| match current_actions.get(*back_ref) {
                None => true,
                Some(action) => {
                    task.title != action.title
                        || state
                            .last_actions
                            .get(*back_ref)
                            .is_some_and(|previous| previous != action)
                }
            })
            .map(|(back_ref, _)| back_ref.clone())
            .collect();

        for back_ref in outdated {
            let Some(task_id) = tasks.get(&back_ref).map(|t| t.id.clone()) else {
                continue;
            };
            match self.tasks.delete(&task_id).await {
                Ok(()) => {
                    tasks.remove(&back_ref);
                    report.deleted.push(back_ref);
                }
                Err(e) => {
                    error!(task_id = %task_id, back_reference = %back_ref, error = %e, "failed to delete task");
                    report.failures += 1;
                }
            }
        }

        let due = task_due(today);
        for (action_id, action) in &current_actions {
            if tasks.contains_key(action_id) {
                continue;
            }
            match self.tasks.create(&action.title, action_id, &due).await {
                Ok(task) => {
                    if task.back_reference != *action_id {
                        warn!(
                            action_id = %action_id,
                            back_reference = %task.back_reference,
                            "created task does not echo its back-reference"
                        );
                    }
                    tasks.insert(action_id.clone(), task);
                    report.created.push(action_id.clone());
                }
                Err(e) => {
                    error!(action_id = %action_id, error = %e, "failed to create task");
                    report.failures += 1;
                }
            }
        }

        info!(
            created = report.created.len(),
            deleted = report.deleted.len(),
            failures = report.failures,
            "synced Notion actions to Google Tasks"
        );

        let last_actions = if report.failures == 0 {
            current_actions
        } else {
            warn!("keeping previous action snapshot so the next cycle retries");
            state.last_actions
        };
        let next = ReconcilerState {
            last_actions,
            last_tasks: tasks,
            last_day: state.last_day,
        };
        (next, report)
    }

    async fn sync_tasks_to_actions(
        &self,
        state: ReconcilerState,
        current_tasks: TaskMap,
    ) -> (ReconcilerState, CycleReport) {
        let mut report = CycleReport {
            direction: SyncDirection::TasksToActions,
            ..CycleReport::default()
        };
        let ReconcilerState {
            mut last_actions,
            last_tasks,
            last_day,
        } = state;

        let removed: Vec<ActionId> = last_tasks
            .iter()
            .filter(|(back_ref, _)| !current_tasks.contains_key(*back_ref))
            .map(|(_, task)| task.back_reference.clone())
            .collect();

        for action_id in removed {
            match self.actions.mark_done(&action_id).await {
                Ok(()) => report.marked_done.push(action_id.clone()),
                Err(e) => {
                    error!(action_id = %action_id, error = %e, "failed to mark action as done");
                    report.failures += 1;
                }
            }
            last_actions.remove(&action_id);
        }

        info!(
            marked_done = report.marked_done.len(),
            failures = report.failures,
            "synced Google Tasks removals to Notion"
        );
        let next = ReconcilerState {
            last_actions,
            last_tasks: current_tasks,
            last_day,
        };
        (next, report)
    }

    /// Delete listed tasks that repeat a back-reference.
    ///
    /// Of the copies, the one retained in `last_tasks` is kept; otherwise the
    /// listing's pick stands. Returns the kept tasks, the deleted task ids and
    /// the number of failed deletes. A copy that failed to delete shows up
    /// again in the next listing.
    async fn prune_duplicates(
        &self,
        last_tasks: &TaskMap,
        listing: TaskListing,
    ) -> (TaskMap, Vec<String>, usize) {
        let TaskListing {
            mut tasks,
            duplicates,
        } = listing;
        let mut pruned = Vec::new();
        let mut failed = 0;

        for mut extra in duplicates {
            let retained = last_tasks
                .get(&extra.back_reference)
                .is_some_and(|task| task.id == extra.id);
            if retained {
                if let Some(kept) = tasks.get_mut(&extra.back_reference) {
                    std::mem::swap(kept, &mut extra);
                }
            }
            match self.tasks.delete(&extra.id).await {
                Ok(()) => pruned.push(extra.id),
                Err(e) => {
                    error!(
                        task_id = %extra.id,
                        back_reference = %extra.back_reference,
                        error = %e,
                        "failed to delete duplicate task"
                    );
                    failed += 1;
                }
            }
        }

        if !pruned.is_empty() {
            info!(pruned = pruned.len(), "deleted duplicate tasks");
        }
        (tasks, pruned, failed)
    }

    /// Delete every listed task. Returns (deleted, failed calls).
    async fn clear_all_tasks(&self) -> (usize, usize) {
        let existing = match self.tasks.list().await {
            Ok(listing) => listing,
            Err(e) => {
                error!(store = self.tasks.name(), error = %e, "failed to list tasks for day rollover");
                return (0, 1);
            }
        };

        let mut deleted = 0;
        let mut failed = 0;
        for task in existing.all() {
            match self.tasks.delete(&task.id).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    error!(task_id = %task.id, error = %e, "failed to delete task during day rollover");
                    failed += 1;
                }
            }
        }
        info!(deleted, total = existing.len(), "new day: cleared task list");
        (deleted, failed)
    }
}

fn skipped(new_day: bool, failures: usize) -> CycleReport {
    warn!("skipping cycle after fetch failure");
    CycleReport {
        direction: SyncDirection::Skipped,
        new_day,
        failures,
        ..CycleReport::default()
    }
}
