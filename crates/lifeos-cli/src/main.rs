use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lifeos", version, about = "Keep Google Tasks in step with Notion actions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every interval until Ctrl-C
    Run,
    /// Run a single sync cycle and print what it did
    Sync {
        /// Treat this cycle as the first of a new day (clears the task list).
        /// Also implied when the last synced day in the snapshot is not today.
        #[arg(long)]
        new_day: bool,
        /// Print the cycle report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Authentication management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// List Google task lists (to find `google.tasklist_id`)
    Tasklists {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the persisted sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run => commands::run::run(),
        Commands::Sync { new_day, json } => commands::sync::run(new_day, json),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Tasklists { json } => commands::tasklists::run(json),
        Commands::Status { json } => commands::status::run(json),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
