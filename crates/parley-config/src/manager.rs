use crate::config::{Config, ConfigError, ConfigResult};
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Loads, validates and persists the client config file.
///
/// `config` is the effective config, with `${VAR}` expansion and
/// environment overrides applied. `stored` is the file as written, which is
/// what gets saved back.
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Arc<RwLock<Config>>,
    stored: Arc<RwLock<Option<Value>>>,
}

impl ConfigManager {
    /// Load the config file, writing defaults if it does not exist yet.
    ///
    /// Environment overrides are applied after parsing.
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let (mut config, stored): (Config, Value) = if path.exists() {
            info!("Loading config from {:?}", path);
            let raw = tokio::fs::read_to_string(path).await?;
            let stored = serde_json::from_str(&raw)?;
            let content = Self::expand_env_vars(&raw)?;
            (serde_json::from_str(&content)?, stored)
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            let stored = serde_json::to_value(&default_config)?;
            (default_config, stored)
        };

        config.apply_env_overrides();
        Self::validate(&config)?;

        Ok(Self {
            path: path.to_path_buf(),
            config: Arc::new(RwLock::new(config)),
            stored: Arc::new(RwLock::new(Some(stored))),
        })
    }

    /// Load from `~/.parley/config.json`
    pub async fn load_default() -> ConfigResult<Self> {
        let config_path = Self::default_config_path()?;
        Self::load(&config_path).await
    }

    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let dir = crate::parley_dir()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))?;
        Ok(dir.join("config.json"))
    }

    /// Build a manager around an in-memory config (tests, `config init`)
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(config)),
            stored: Arc::new(RwLock::new(None)),
        }
    }

    /// Clone of the current config
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Write the stored form, or the config itself for a manager built with `new`
    pub async fn save(&self) -> ConfigResult<()> {
        let content = match &*self.stored.read().await {
            Some(stored) => serde_json::to_string_pretty(stored)?,
            None => serde_json::to_string_pretty(&*self.config.read().await)?,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    /// Apply `f`, validate the result and save it.
    ///
    /// Only the keys `f` changed reach the file; overrides and expanded
    /// variables stay in memory.
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        let mut config = self.config.write().await;
        let mut candidate = config.clone();
        f(&mut candidate)?;
        Self::validate(&candidate)?;

        if let Some(stored) = self.stored.write().await.as_mut() {
            let before = serde_json::to_value(&*config)?;
            let after = serde_json::to_value(&candidate)?;
            merge_changes(stored, &before, &after);
        }

        *config = candidate;
        drop(config);
        self.save().await
    }

    pub fn validate(config: &Config) -> ConfigResult<()> {
        let base_url = &config.api.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                base_url
            )));
        }

        if config.api.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "api.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if config.usage.message_limit == 0 {
            return Err(ConfigError::Validation(
                "usage.message_limit must be greater than 0".to_string(),
            ));
        }

        if config.session.credential_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "session.credential_path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Expand `${VAR}` and `${VAR:-default}`
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let (Some(full_match), Some(var_expr)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let var_expr = var_expr.as_str();

            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                },
            };

            result = result.replace(full_match.as_str(), &replacement);
        }

        Ok(result)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Copy every leaf that differs between `before` and `after` into `stored`
fn merge_changes(stored: &mut Value, before: &Value, after: &Value) {
    match (before, after) {
        (Value::Object(before), Value::Object(after)) => {
            if !stored.is_object() {
                *stored = Value::Object(Default::default());
            }
            let Some(stored) = stored.as_object_mut() else {
                return;
            };
            for (key, new) in after {
                match before.get(key) {
                    Some(old) if old == new => {}
                    Some(old) => {
                        let slot = stored.entry(key.clone()).or_insert(Value::Null);
                        merge_changes(slot, old, new);
                    }
                    None => {
                        stored.insert(key.clone(), new.clone());
                    }
                }
            }
        }
        _ => *stored = after.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeFrame;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_creates_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let manager = ConfigManager::load(&config_path).await.unwrap();
        let config = manager.snapshot().await;

        assert!(config_path.exists());
        assert_eq!(config.usage.message_limit, 10);
        assert_eq!(config.usage.time_frame, TimeFrame::Minute);
    }

    #[tokio::test]
    async fn test_env_var_expansion() {
        std::env::set_var("PARLEY_TEST_EXPAND_VAR", "expanded");

        let content = r#"{"key": "${PARLEY_TEST_EXPAND_VAR}", "other": "${PARLEY_TEST_UNSET_VAR:-fallback}"}"#;
        let expanded = ConfigManager::expand_env_vars(content).unwrap();

        assert!(expanded.contains("expanded"));
        assert!(expanded.contains("fallback"));
    }

    #[tokio::test]
    async fn test_missing_env_var_without_default_fails() {
        let content = r#"{"key": "${PARLEY_TEST_DEFINITELY_UNSET}"}"#;
        let err = ConfigManager::expand_env_vars(content).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound(name) if name == "PARLEY_TEST_DEFINITELY_UNSET"));
    }

    #[tokio::test]
    async fn test_config_validation() {
        let mut config = Config::default();
        config.usage.message_limit = 0;
        assert!(ConfigManager::validate(&config).is_err());

        config.usage.message_limit = 5;
        config.api.base_url = "localhost:8000".to_string();
        assert!(ConfigManager::validate(&config).is_err());

        config.api.base_url = "https://api.example.com".to_string();
        assert!(ConfigManager::validate(&config).is_ok());

        config.api.timeout_seconds = 0;
        assert!(ConfigManager::validate(&config).is_err());
    }

    #[test]
    fn test_default_config_path_is_under_parley_dir() {
        let path = ConfigManager::default_config_path().unwrap();
        assert!(path.ends_with(".parley/config.json"));
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_and_keeps_previous() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::new(Config::default(), config_path.clone());

        let result = manager
            .update(|config| config.set_value("usage.message_limit", "0"))
            .await;
        assert!(result.is_err());
        assert_eq!(manager.snapshot().await.usage.message_limit, 10);

        manager
            .update(|config| config.set_value("usage.message_limit", "20"))
            .await
            .unwrap();
        let saved: Config =
            serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
        assert_eq!(saved.usage.message_limit, 20);
    }

    #[tokio::test]
    async fn test_update_keeps_overrides_out_of_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut on_disk = Config::default();
        on_disk.checkout.publishable_key = Some("${PARLEY_TEST_PERSIST_KEY}".to_string());
        std::fs::write(&config_path, serde_json::to_string_pretty(&on_disk).unwrap()).unwrap();

        std::env::set_var("PARLEY_TEST_PERSIST_KEY", "pk_test_secret");
        std::env::set_var(crate::config::API_URL_ENV, "https://staging.example.com");
        let manager = ConfigManager::load(&config_path).await;
        std::env::remove_var(crate::config::API_URL_ENV);
        let manager = manager.unwrap();

        let effective = manager.snapshot().await;
        assert_eq!(effective.api.base_url, "https://staging.example.com");
        assert_eq!(effective.checkout.publishable_key.as_deref(), Some("pk_test_secret"));

        manager
            .update(|config| config.set_value("usage.message_limit", "20"))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(&config_path).unwrap();
        assert!(raw.contains("${PARLEY_TEST_PERSIST_KEY}"));
        assert!(!raw.contains("pk_test_secret"));
        assert!(!raw.contains("staging.example.com"));

        let saved: Config = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved.usage.message_limit, 20);
        assert_eq!(saved.api.base_url, "http://localhost:8000");
        assert_eq!(manager.snapshot().await.usage.message_limit, 20);
    }
}
