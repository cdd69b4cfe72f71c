//! Long-running sync loop.

use chrono::Local;
use lifeos_core::{
    init_logging, Config, LogHandle, ReconcilerState, Scheduler, SnapshotStore, SystemClock,
};

use super::{build_reconciler, ensure_google_session, http_client, load_config, runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = load_config()?;
    config.validate()?;

    let log = init_logging(
        &config.log_dir()?,
        &config.logging.level,
        Local::now().date_naive(),
    )?;

    runtime()?.block_on(serve(config, log))
}

async fn serve(config: Config, log: LogHandle) -> CommandResult {
    let http = http_client()?;
    let reconciler = build_reconciler(&config, &http)?;
    ensure_google_session(&reconciler).await?;

    let snapshots = SnapshotStore::new();
    let state = if config.sync.persist_snapshot {
        snapshots.load_or_default()
    } else {
        ReconcilerState::default()
    };
    tracing::info!(
        actions = state.last_actions.len(),
        tasks = state.last_tasks.len(),
        last_day = ?state.last_day,
        "starting from retained state"
    );

    let mut scheduler = Scheduler::new(reconciler, SystemClock, state)
        .with_timing(config.sync.interval(), config.sync.blackout_pause())
        .with_log_handle(log);
    if config.sync.persist_snapshot {
        scheduler = scheduler.with_snapshot_store(snapshots);
    }

    scheduler.run_until(shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
}
