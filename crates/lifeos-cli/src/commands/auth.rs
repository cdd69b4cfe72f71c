use std::time::Duration;

use chrono::{TimeZone, Utc};
use clap::Subcommand;
use lifeos_core::integrations::oauth::{self, is_expired};
use lifeos_core::integrations::{OAuthConfig, TokenFile};

use super::{http_client, load_config, runtime, CommandResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Google Tasks: login / logout / status
    Google {
        #[command(subcommand)]
        action: AuthOp,
    },
}

#[derive(Subcommand)]
pub enum AuthOp {
    /// Authorize in the browser and store the tokens
    Login {
        /// OAuth client ID (saved to config)
        #[arg(long)]
        client_id: Option<String>,
        /// OAuth client secret (saved to config)
        #[arg(long)]
        client_secret: Option<String>,
        /// Seconds to wait for the browser redirect
        #[arg(long, default_value_t = 180)]
        timeout: u64,
    },
    /// Remove stored tokens
    Logout,
    /// Check authentication status
    Status,
}

pub fn run(action: AuthAction) -> CommandResult {
    match action {
        AuthAction::Google { action: op } => handle_google(op),
    }
}

fn handle_google(op: AuthOp) -> CommandResult {
    let token_file = TokenFile::google()?;
    match op {
        AuthOp::Login {
            client_id,
            client_secret,
            timeout,
        } => {
            let mut config = load_config()?;
            if client_id.is_some() || client_secret.is_some() {
                let mut stored = lifeos_core::Config::load()?;
                if let Some(id) = client_id {
                    stored.google.client_id = id.clone();
                    config.google.client_id = id;
                }
                if let Some(secret) = client_secret {
                    stored.google.client_secret = secret.clone();
                    config.google.client_secret = secret;
                }
                stored.save()?;
            }

            let oauth_config = OAuthConfig::google_tasks(&config.google);
            let http = http_client()?;
            runtime()?.block_on(oauth::authorize(
                &http,
                &oauth_config,
                &token_file,
                Duration::from_secs(timeout),
                |url| {
                    println!("Opening browser for Google authorization.");
                    println!("If it does not open, visit:\n\n  {url}\n");
                },
            ))?;
            println!("Google authenticated");
        }
        AuthOp::Logout => {
            token_file.delete()?;
            println!("Google disconnected");
        }
        AuthOp::Status => match token_file.load()? {
            None => println!("not authenticated"),
            Some(tokens) => {
                let now = Utc::now().timestamp();
                let expiry = tokens
                    .expires_at
                    .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string());
                let state = if !is_expired(&tokens, now) {
                    "valid"
                } else if tokens.refresh_token.is_some() {
                    "expired (will refresh)"
                } else {
                    "expired (login again)"
                };
                println!("authenticated");
                println!("  access token: {state}, expires {expiry}");
                println!("  token file:   {}", token_file.path().display());
            }
        },
    }
    Ok(())
}
