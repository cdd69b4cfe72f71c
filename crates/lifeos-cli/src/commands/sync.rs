//! One-shot sync cycle.
//!
//! Runs exactly one reconciliation against the persisted state and stores
//! the result, so `lifeos sync` from cron behaves like one tick of `run`.

use chrono::Local;
use lifeos_core::{init_logging, Config, CycleReport, SnapshotStore, SyncDirection};

use super::{build_reconciler, ensure_google_session, http_client, load_config, runtime, CommandResult};

pub fn run(force_new_day: bool, json: bool) -> CommandResult {
    let config = load_config()?;
    config.validate()?;

    let today = Local::now().date_naive();
    init_logging(&config.log_dir()?, &config.logging.level, today)?;

    let report = runtime()?.block_on(sync_once(&config, force_new_day))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn sync_once(
    config: &Config,
    force_new_day: bool,
) -> Result<CycleReport, Box<dyn std::error::Error>> {
    let http = http_client()?;
    let reconciler = build_reconciler(config, &http)?;
    ensure_google_session(&reconciler).await?;

    let snapshots = SnapshotStore::new();
    let state = if config.sync.persist_snapshot {
        snapshots.load_or_default()
    } else {
        Default::default()
    };

    let today = Local::now().date_naive();
    let new_day = force_new_day || state.is_new_day(today);
    let (state, report) = reconciler.run_cycle(state, today, new_day).await;

    if config.sync.persist_snapshot {
        snapshots.persist(&state)?;
    }
    Ok(report)
}

fn print_report(report: &CycleReport) {
    let direction = match report.direction {
        SyncDirection::Unchanged => "no changes",
        SyncDirection::ActionsToTasks => "Notion -> Google Tasks",
        SyncDirection::TasksToActions => "Google Tasks -> Notion",
        SyncDirection::Skipped => "skipped (fetch failed)",
    };
    println!("Direction: {direction}");
    if report.new_day {
        println!("Cleared:   {} task(s) for the new day", report.cleared);
    }
    for id in &report.created {
        println!("  + task for {id}");
    }
    for id in &report.deleted {
        println!("  - task for {id}");
    }
    for id in &report.pruned {
        println!("  - duplicate task {id}");
    }
    for id in &report.marked_done {
        println!("  ✓ action {id} marked done");
    }
    if report.failures > 0 {
        println!("Failures:  {} (see log)", report.failures);
    }
}
