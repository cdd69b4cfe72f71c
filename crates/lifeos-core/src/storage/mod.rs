mod config;

pub use config::{
    ActionFetchFallback, Config, GoogleConfig, LoggingConfig, NotionConfig, SyncConfig,
    TaskFetchFallback,
};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `LIFEOS_DATA_DIR` wins when set. Otherwise `~/.config/lifeos[-dev]/`
/// based on `LIFEOS_ENV` (set `LIFEOS_ENV=dev` for a development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var("LIFEOS_DATA_DIR") {
        Ok(explicit) if !explicit.trim().is_empty() => PathBuf::from(explicit),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("LIFEOS_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("lifeos-dev")
            } else {
                base_dir.join("lifeos")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
