pub mod google_tasks;
pub mod notion;
pub mod oauth;

pub use google_tasks::{GoogleTasksStore, TaskList};
pub use notion::NotionActionStore;
pub use oauth::{GoogleAuth, OAuthConfig, OAuthTokens, StaticToken, TokenFile, TokenSource};
