//! Retained state between reconciliation cycles, plus its on-disk form.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{ActionMap, TaskMap};
use crate::storage::data_dir;

/// The last-observed state of both sides.
///
/// After a successful cycle `last_tasks` and `last_actions` have the same
/// key set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerState {
    #[serde(default)]
    pub last_actions: ActionMap,
    #[serde(default)]
    pub last_tasks: TaskMap,
    /// Local day of the last cycle that ran to completion.
    #[serde(default)]
    pub last_day: Option<NaiveDate>,
}

impl ReconcilerState {
    /// Whether `today` is a later day than the last completed cycle.
    ///
    /// A state that has never completed a cycle is not on a new day.
    pub fn is_new_day(&self, today: NaiveDate) -> bool {
        self.last_day.is_some_and(|day| day != today)
    }

    pub fn is_empty(&self) -> bool {
        self.last_actions.is_empty() && self.last_tasks.is_empty()
    }

    /// Every retained action has exactly one retained task and vice versa.
    pub fn is_converged(&self) -> bool {
        self.last_actions.keys().eq(self.last_tasks.keys())
    }
}

/// JSON file holding a [`ReconcilerState`].
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Store at `<data_dir>/snapshot.json`.
    pub fn new() -> Self {
        let dir = data_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            path: dir.join("snapshot.json"),
        }
    }

    /// Store at a specific path (for testing).
    pub fn new_with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist state to disk.
    pub fn persist(&self, state: &ReconcilerState) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    /// Load state from disk. A missing file is an empty state.
    pub fn load(&self) -> Result<ReconcilerState, std::io::Error> {
        if !self.path.exists() {
            return Ok(ReconcilerState::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let state: ReconcilerState = serde_json::from_str(&content)?;
        Ok(state)
    }

    /// Load, falling back to an empty state when the file is unreadable.
    pub fn load_or_default(&self) -> ReconcilerState {
        match self.load() {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "discarding unreadable snapshot");
                ReconcilerState::default()
            }
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
