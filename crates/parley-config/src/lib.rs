pub mod config;
pub mod manager;

pub use config::{
    ApiConfig, CheckoutConfig, Config, ConfigError, ConfigResult, LogLevel, LoggingConfig,
    SessionConfig, TimeFrame, UsageConfig, API_URL_ENV, PUBLISHABLE_KEY_ENV,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// `~/.parley`
pub fn parley_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".parley"))
}

/// Create the `~/.parley` directory layout
pub async fn init_parley_dirs() -> ConfigResult<()> {
    if let Some(parley) = parley_dir() {
        tokio::fs::create_dir_all(&parley).await?;
        tokio::fs::create_dir_all(parley.join("credentials")).await?;
        tokio::fs::create_dir_all(parley.join("logs")).await?;
    }
    Ok(())
}

/// Expand a leading `~/` to the home directory
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(rest))
    } else {
        Some(PathBuf::from(path))
    }
}
