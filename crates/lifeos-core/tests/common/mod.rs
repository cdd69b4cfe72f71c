//! In-memory stores shared by the integration tests.
//!
//! Both stores are cheap handles over shared state: hand one clone to the
//! reconciler and keep another to seed data, inject failures and inspect
//! the calls that were made.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use lifeos_core::model::{index_tasks, Action, ActionId, ActionMap, Task, TaskListing, TaskMap};
use lifeos_core::{ActionStore, RemoteError, TaskStore};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn unavailable(service: &'static str) -> RemoteError {
    RemoteError::Status {
        service,
        status: 503,
        body: "service unavailable".to_string(),
    }
}

/// Recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Query,
    MarkActionDone(String),
    List,
    Create { title: String, back_reference: String },
    Delete(String),
    MarkTaskDone(String),
    MarkTaskIncomplete(String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::Query | Call::List)
    }
}

/// Shared call log so tests can see the order across both stores.
pub type CallLog = Arc<Mutex<Vec<Call>>>;

// ============================================================================
// Notion side
// ============================================================================

#[derive(Default)]
struct NotionState {
    /// Every page, eligible or not.
    pages: BTreeMap<ActionId, (Action, bool)>,
    fail_query: bool,
    fail_mark_done: BTreeSet<ActionId>,
}

#[derive(Clone)]
pub struct MemoryNotion {
    state: Arc<Mutex<NotionState>>,
    calls: CallLog,
}

impl MemoryNotion {
    pub fn new(calls: CallLog) -> Self {
        Self {
            state: Arc::default(),
            calls,
        }
    }

    /// Add or replace an active, not-done page.
    pub fn put(&self, id: &str, title: &str, do_date: NaiveDate) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(id.to_string(), (Action::new(id, title, Some(do_date)), true));
    }

    /// Flip the status away from "Active".
    pub fn deactivate(&self, id: &str) {
        if let Some((_, active)) = self.state.lock().unwrap().pages.get_mut(id) {
            *active = false;
        }
    }

    pub fn remove(&self, id: &str) {
        self.state.lock().unwrap().pages.remove(id);
    }

    pub fn rename(&self, id: &str, title: &str) {
        if let Some((action, _)) = self.state.lock().unwrap().pages.get_mut(id) {
            action.title = title.to_string();
        }
    }

    pub fn is_done(&self, id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .pages
            .get(id)
            .is_some_and(|(action, _)| action.completed)
    }

    pub fn fail_query(&self, fail: bool) {
        self.state.lock().unwrap().fail_query = fail;
    }

    pub fn fail_mark_done(&self, id: &str, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.fail_mark_done.insert(id.to_string());
        } else {
            state.fail_mark_done.remove(id);
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ActionStore for MemoryNotion {
    fn name(&self) -> &str {
        "memory_notion"
    }

    async fn query(&self, today: NaiveDate) -> Result<ActionMap, RemoteError> {
        self.record(Call::Query);
        let state = self.state.lock().unwrap();
        if state.fail_query {
            return Err(unavailable("Notion"));
        }
        Ok(state
            .pages
            .values()
            .filter(|(action, active)| {
                *active && !action.completed && action.do_date.is_some_and(|d| d <= today)
            })
            .map(|(action, _)| (action.id.clone(), action.clone()))
            .collect())
    }

    async fn mark_done(&self, action_id: &str) -> Result<(), RemoteError> {
        self.record(Call::MarkActionDone(action_id.to_string()));
        let mut state = self.state.lock().unwrap();
        if state.fail_mark_done.contains(action_id) {
            return Err(unavailable("Notion"));
        }
        match state.pages.get_mut(action_id) {
            Some((action, _)) => {
                action.completed = true;
                Ok(())
            }
            None => Err(RemoteError::Status {
                service: "Notion",
                status: 404,
                body: format!("page {action_id} not found"),
            }),
        }
    }
}

// ============================================================================
// Google Tasks side
// ============================================================================

#[derive(Default)]
struct TasksState {
    tasks: BTreeMap<String, Task>,
    next_id: u32,
    fail_list: bool,
    /// Back-references whose creation fails.
    fail_create: BTreeSet<ActionId>,
    /// Task ids whose deletion fails.
    fail_delete: BTreeSet<String>,
}

#[derive(Clone)]
pub struct MemoryTasks {
    state: Arc<Mutex<TasksState>>,
    calls: CallLog,
}

impl MemoryTasks {
    pub fn new(calls: CallLog) -> Self {
        Self {
            state: Arc::default(),
            calls,
        }
    }

    /// Seed a task directly, bypassing the call log.
    pub fn seed(&self, title: &str, notes: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("seed-{}", state.next_id);
        state.tasks.insert(
            id.clone(),
            Task {
                id: id.clone(),
                title: title.to_string(),
                back_reference: notes.to_string(),
                completed: false,
                due: None,
            },
        );
        id
    }

    /// The user ticks a task in the Google Tasks app.
    pub fn user_completes(&self, back_reference: &str) {
        let mut state = self.state.lock().unwrap();
        for task in state.tasks.values_mut() {
            if task.back_reference == back_reference {
                task.completed = true;
            }
        }
    }

    /// The user ticks one specific task, leaving any copies open.
    pub fn user_completes_task(&self, task_id: &str) {
        if let Some(task) = self.state.lock().unwrap().tasks.get_mut(task_id) {
            task.completed = true;
        }
    }

    /// The user deletes a task in the Google Tasks app.
    pub fn user_deletes(&self, back_reference: &str) {
        self.state
            .lock()
            .unwrap()
            .tasks
            .retain(|_, task| task.back_reference != back_reference);
    }

    pub fn user_renames(&self, back_reference: &str, title: &str) {
        let mut state = self.state.lock().unwrap();
        for task in state.tasks.values_mut() {
            if task.back_reference == back_reference {
                task.title = title.to_string();
            }
        }
    }

    /// Open tasks, as `list` would return them.
    pub fn listing(&self) -> TaskListing {
        index_tasks(
            self.state
                .lock()
                .unwrap()
                .tasks
                .values()
                .filter(|t| !t.completed)
                .cloned(),
        )
    }

    /// Open tasks keyed by back-reference.
    pub fn open(&self) -> TaskMap {
        self.listing().tasks
    }

    /// Number of open tasks pointing at `back_reference`.
    pub fn open_copies(&self, back_reference: &str) -> usize {
        self.listing()
            .all()
            .filter(|t| t.back_reference == back_reference)
            .count()
    }

    /// Every stored task, including completed and foreign ones.
    pub fn all(&self) -> Vec<Task> {
        self.state.lock().unwrap().tasks.values().cloned().collect()
    }

    pub fn task_id(&self, back_reference: &str) -> Option<String> {
        self.open().get(back_reference).map(|t| t.id.clone())
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    pub fn fail_create(&self, back_reference: &str, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.fail_create.insert(back_reference.to_string());
        } else {
            state.fail_create.remove(back_reference);
        }
    }

    pub fn fail_delete(&self, task_id: &str, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.fail_delete.insert(task_id.to_string());
        } else {
            state.fail_delete.remove(task_id);
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn set_completed(&self, task_id: &str, completed: bool) -> Result<(), RemoteError> {
        match self.state.lock().unwrap().tasks.get_mut(task_id) {
            Some(task) => {
                task.completed = completed;
                Ok(())
            }
            None => Err(not_found(task_id)),
        }
    }
}

fn not_found(task_id: &str) -> RemoteError {
    RemoteError::Status {
        service: "Google Tasks",
        status: 404,
        body: format!("task {task_id} not found"),
    }
}

impl TaskStore for MemoryTasks {
    fn name(&self) -> &str {
        "memory_tasks"
    }

    async fn list(&self) -> Result<TaskListing, RemoteError> {
        self.record(Call::List);
        if self.state.lock().unwrap().fail_list {
            return Err(unavailable("Google Tasks"));
        }
        Ok(self.listing())
    }

    async fn create(
        &self,
        title: &str,
        back_reference: &ActionId,
        due: &str,
    ) -> Result<Task, RemoteError> {
        self.record(Call::Create {
            title: title.to_string(),
            back_reference: back_reference.clone(),
        });
        let mut state = self.state.lock().unwrap();
        if state.fail_create.contains(back_reference) {
            return Err(unavailable("Google Tasks"));
        }
        state.next_id += 1;
        let task = Task {
            id: format!("task-{}", state.next_id),
            title: title.to_string(),
            back_reference: back_reference.clone(),
            completed: false,
            due: Some(due.to_string()),
        };
        state.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn delete(&self, task_id: &str) -> Result<(), RemoteError> {
        self.record(Call::Delete(task_id.to_string()));
        let mut state = self.state.lock().unwrap();
        if state.fail_delete.contains(task_id) {
            return Err(unavailable("Google Tasks"));
        }
        state
            .tasks
            .remove(task_id)
            .map(|_| ())
            .ok_or_else(|| not_found(task_id))
    }

    async fn mark_done(&self, task_id: &str) -> Result<(), RemoteError> {
        self.record(Call::MarkTaskDone(task_id.to_string()));
        self.set_completed(task_id, true)
    }

    async fn mark_incomplete(&self, task_id: &str) -> Result<(), RemoteError> {
        self.record(Call::MarkTaskIncomplete(task_id.to_string()));
        self.set_completed(task_id, false)
    }
}

// ============================================================================
// Fixture
// ============================================================================

/// Both stores sharing one call log.
pub struct World {
    pub notion: MemoryNotion,
    pub tasks: MemoryTasks,
    pub calls: CallLog,
}

impl World {
    pub fn new() -> Self {
        let calls = CallLog::default();
        Self {
            notion: MemoryNotion::new(calls.clone()),
            tasks: MemoryTasks::new(calls.clone()),
            calls,
        }
    }

    /// Drain the call log.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    /// Drain the call log, keeping only mutations.
    pub fn take_mutations(&self) -> Vec<Call> {
        self.take_calls()
            .into_iter()
            .filter(Call::is_mutation)
            .collect()
    }
}
