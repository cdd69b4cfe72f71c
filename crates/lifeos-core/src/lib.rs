//! # LifeOS Core Library
//!
//! Keeps a Google Tasks list in step with the open actions of a Notion
//! database. Actions due today (or earlier) are mirrored as tasks; removing
//! a task in Google Tasks marks its action done in Notion.
//!
//! ## Architecture
//!
//! - **Reconciler**: one polling cycle. Diffs freshly fetched actions and
//!   tasks against the retained state and pushes the lagging side
//! - **Scheduler**: caller-driven `tick()` with a fixed interval, day rollover
//!   and a blackout during the last minute of the day
//! - **Integrations**: Notion and Google Tasks adapters behind the
//!   [`ActionStore`] / [`TaskStore`] traits, plus the Google OAuth flow
//! - **Storage**: TOML configuration and the JSON state snapshot
//!
//! ## Key Components
//!
//! - [`Reconciler`]: the sync algorithm
//! - [`Scheduler`]: the long-running driver
//! - [`Config`]: application configuration management
//! - [`SnapshotStore`]: retained state across restarts

pub mod error;
pub mod integrations;
pub mod logging;
pub mod model;
pub mod reconciler;
pub mod scheduler;
pub mod snapshot;
pub mod storage;
pub mod stores;

pub use error::{ConfigError, CoreError, OAuthError, RemoteError};
pub use integrations::{GoogleAuth, GoogleTasksStore, NotionActionStore, TokenSource};
pub use logging::{init_logging, LogHandle};
pub use model::{Action, ActionId, ActionMap, Task, TaskListing, TaskMap};
pub use reconciler::{CycleReport, FailurePolicy, Reconciler, SyncDirection};
pub use scheduler::{Clock, Scheduler, SystemClock, TickOutcome};
pub use snapshot::{ReconcilerState, SnapshotStore};
pub use storage::{data_dir, Config};
pub use stores::{ActionStore, TaskStore};
