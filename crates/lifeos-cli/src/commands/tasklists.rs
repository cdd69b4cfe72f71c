//! Discover Google task list ids.

use lifeos_core::integrations::TaskList;

use super::{google_tasks, http_client, load_config, runtime, CommandResult};

pub fn run(json: bool) -> CommandResult {
    let config = load_config()?;
    let lists = runtime()?.block_on(fetch(&config))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&lists)?);
        return Ok(());
    }

    if lists.is_empty() {
        println!("No task lists found.");
    }
    for list in &lists {
        let marker = if list.id == config.google.tasklist_id {
            "*"
        } else {
            " "
        };
        println!("{marker} {}  {}", list.id, list.title);
    }
    Ok(())
}

async fn fetch(config: &lifeos_core::Config) -> Result<Vec<TaskList>, Box<dyn std::error::Error>> {
    let http = http_client()?;
    Ok(google_tasks(config, &http)?.list_tasklists().await?)
}
