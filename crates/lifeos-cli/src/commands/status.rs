use lifeos_core::SnapshotStore;

use super::CommandResult;

pub fn run(json: bool) -> CommandResult {
    let store = SnapshotStore::new();
    let state = store.load()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    println!("Snapshot: {}", store.path().display());
    if state.is_empty() {
        println!("No retained state (nothing synced yet).");
        return Ok(());
    }

    println!(
        "Actions: {}  Tasks: {}  Converged: {}",
        state.last_actions.len(),
        state.last_tasks.len(),
        if state.is_converged() { "yes" } else { "no" }
    );
    if let Some(day) = state.last_day {
        println!("Last synced day: {day}");
    }
    for (id, action) in &state.last_actions {
        let task = state
            .last_tasks
            .get(id)
            .map(|t| t.id.as_str())
            .unwrap_or("-");
        let do_date = action
            .do_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {do_date}  {}  [{id} -> {task}]", action.title);
    }
    for (back_ref, task) in &state.last_tasks {
        if !state.last_actions.contains_key(back_ref) {
            println!("  (orphan task {} for {back_ref})", task.id);
        }
    }
    Ok(())
}
