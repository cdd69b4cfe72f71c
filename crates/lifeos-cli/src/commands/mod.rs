pub mod auth;
pub mod config;
pub mod run;
pub mod status;
pub mod sync;
pub mod tasklists;

use std::error::Error;
use std::time::Duration;

use lifeos_core::integrations::{OAuthConfig, TokenFile};
use lifeos_core::{
    Config, FailurePolicy, GoogleAuth, GoogleTasksStore, NotionActionStore, Reconciler, TaskStore,
    TokenSource,
};

pub type CommandResult = Result<(), Box<dyn Error>>;

/// Reconciler wired to the real services.
pub type LiveReconciler = Reconciler<NotionActionStore, GoogleTasksStore<GoogleAuth>>;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()
}

/// Config file plus environment overrides.
pub fn load_config() -> Result<Config, Box<dyn Error>> {
    Ok(Config::load_effective()?)
}

pub fn google_auth(config: &Config, http: reqwest::Client) -> Result<GoogleAuth, Box<dyn Error>> {
    Ok(GoogleAuth::new(
        OAuthConfig::google_tasks(&config.google),
        TokenFile::google()?,
        http,
    ))
}

pub fn google_tasks(
    config: &Config,
    http: &reqwest::Client,
) -> Result<GoogleTasksStore<GoogleAuth>, Box<dyn Error>> {
    Ok(GoogleTasksStore::new(
        config.google.api_base.clone(),
        config.google.tasklist_id.clone(),
        google_auth(config, http.clone())?,
        http.clone(),
    ))
}

pub fn build_reconciler(
    config: &Config,
    http: &reqwest::Client,
) -> Result<LiveReconciler, Box<dyn Error>> {
    let actions = NotionActionStore::new(config.notion.clone(), http.clone());
    let tasks = google_tasks(config, http)?;
    Ok(Reconciler::new(actions, tasks).with_policy(FailurePolicy::from(&config.sync)))
}

/// Obtain a Google access token once, so a broken session fails at start-up
/// instead of on every cycle.
pub async fn ensure_google_session(reconciler: &LiveReconciler) -> CommandResult {
    let store = reconciler.task_store();
    store.tokens().access_token().await.map_err(|e| {
        format!(
            "{} session unusable ({e}); run `lifeos auth google login`",
            store.name()
        )
    })?;
    Ok(())
}
