use chrono::NaiveDate;

use crate::error::RemoteError;
use crate::model::{ActionId, ActionMap, Task, TaskListing};

/// The Notion side of the sync.
///
/// Implementations hold their own credentials; every call is one or more
/// network requests and may fail with a [`RemoteError`].
#[allow(async_fn_in_trait)]
pub trait ActionStore {
    /// Short name used in log lines (e.g. "notion").
    fn name(&self) -> &str;

    /// Eligible actions: do date on or before `today`, not done, status active.
    async fn query(&self, today: NaiveDate) -> Result<ActionMap, RemoteError>;

    /// Tick the done checkbox of an action.
    async fn mark_done(&self, action_id: &str) -> Result<(), RemoteError>;
}

/// The Google Tasks side of the sync.
#[allow(async_fn_in_trait)]
pub trait TaskStore {
    /// Short name used in log lines (e.g. "google_tasks").
    fn name(&self) -> &str;

    /// Open (not completed) tasks keyed by back-reference, plus any extra
    /// tasks that repeat a back-reference.
    async fn list(&self) -> Result<TaskListing, RemoteError>;

    /// Create a task whose notes carry `back_reference` verbatim.
    async fn create(
        &self,
        title: &str,
        back_reference: &ActionId,
        due: &str,
    ) -> Result<Task, RemoteError>;

    async fn delete(&self, task_id: &str) -> Result<(), RemoteError>;

    async fn mark_done(&self, task_id: &str) -> Result<(), RemoteError>;

    async fn mark_incomplete(&self, task_id: &str) -> Result<(), RemoteError>;
}
