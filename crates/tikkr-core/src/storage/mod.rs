mod config;
pub mod database;

pub use config::{Config, NotificationsConfig};
pub use database::{Database, HistoryStats, TaskRecord};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the directory holding `config.toml` and `tikkr.db`.
///
/// `TIKKR_DATA_DIR` wins when set. Otherwise `~/.config/tikkr[-dev]/`,
/// with the `-dev` suffix when `TIKKR_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("TIKKR_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("TIKKR_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("tikkr-dev")
            } else {
                base_dir.join("tikkr")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
