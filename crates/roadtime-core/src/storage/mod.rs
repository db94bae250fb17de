mod config;
pub mod store;

pub use config::{AlertsConfig, Config};
pub use store::{MemoryStore, PersistenceStore, SqliteStore, RULES_KEY};

use std::path::PathBuf;

/// Returns `~/.config/roadtime[-dev]/` based on ROADTIME_ENV.
///
/// Set ROADTIME_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("ROADTIME_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("roadtime-dev")
    } else {
        base_dir.join("roadtime")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
