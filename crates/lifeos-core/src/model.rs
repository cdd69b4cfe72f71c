//! Records observed on either side of the sync.
//!
//! An [`Action`] lives in the Notion database, a [`Task`] lives in a Google
//! Tasks list. The two are joined by `Task::back_reference == Action::id`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Notion page id of an action.
pub type ActionId = String;

/// Eligible actions keyed by their id.
pub type ActionMap = BTreeMap<ActionId, Action>;

/// Open tasks keyed by their back-reference (the originating action id).
pub type TaskMap = BTreeMap<ActionId, Task>;

/// A to-do record owned by the Notion database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub title: String,
    pub completed: bool,
    /// Date the action becomes due. `None` when the page has no do date.
    #[serde(default)]
    pub do_date: Option<NaiveDate>,
}

impl Action {
    pub fn new(id: impl Into<String>, title: impl Into<String>, do_date: Option<NaiveDate>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            completed: false,
            do_date,
        }
    }
}

/// A Google Tasks entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque Google Tasks id.
    pub id: String,
    pub title: String,
    /// Originating action id, stored verbatim in the task notes.
    pub back_reference: ActionId,
    pub completed: bool,
    #[serde(default)]
    pub due: Option<String>,
}

/// Due timestamp for a task created on `date`.
///
/// Google Tasks only keeps the date part of `due`, so midnight UTC of the
/// local calendar day is the canonical encoding.
pub fn task_due(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

/// Open tasks as listed by a task store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListing {
    /// One task per back-reference.
    pub tasks: TaskMap,
    /// Extra tasks that claim a back-reference already present in `tasks`.
    pub duplicates: Vec<Task>,
}

impl TaskListing {
    /// Every listed task, duplicates included.
    pub fn all(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().chain(self.duplicates.iter())
    }

    pub fn len(&self) -> usize {
        self.tasks.len() + self.duplicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.duplicates.is_empty()
    }
}

/// Key a task listing by back-reference.
///
/// Tasks without a back-reference are not ours and are left out. When two
/// tasks claim the same action the later one is kept in the map and the
/// earlier one is reported as a duplicate.
pub fn index_tasks(tasks: impl IntoIterator<Item = Task>) -> TaskListing {
    let mut listing = TaskListing::default();
    for task in tasks {
        if task.back_reference.is_empty() {
            tracing::debug!(task_id = %task.id, "ignoring task without back-reference");
            continue;
        }
        if let Some(previous) = listing.tasks.insert(task.back_reference.clone(), task) {
            tracing::warn!(
                back_reference = %previous.back_reference,
                duplicate_task = %previous.id,
                "duplicate back-reference in task list"
            );
            listing.duplicates.push(previous);
        }
    }
    listing
}
