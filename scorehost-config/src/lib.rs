//! Layered configuration for the scoring host.
//!
//! Values are merged from a config file, then `.env`, then the process
//! environment (`SCOREHOST_` prefix), later layers winning. [`ServerConfig`]
//! is the typed view the server runs from.

pub mod env;
pub mod error;
pub mod loader;
pub mod server;
pub mod validation;

pub use env::{ENV_PREFIX, EnvLoader};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use server::ServerConfig;
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Key/value store that the configuration layers are merged into.
#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<Map<String, Value>>>,
    env: EnvLoader,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different environment prefix (`None` reads every variable).
    pub fn with_prefix(prefix: Option<String>) -> Self {
        Self {
            config: Arc::default(),
            env: EnvLoader::new(prefix),
        }
    }

    /// Merge prefixed variables from the process environment.
    pub fn load_env(&self) {
        self.merge_strings(self.env.load());
    }

    /// Merge prefixed variables from an explicit list.
    pub fn load_env_from<I, K, V>(&self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.merge_strings(self.env.load_from(vars));
    }

    /// Merge prefixed entries of a `.env` file without touching the process
    /// environment. Returns `false` when no file was found.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<bool> {
        let iter = match path {
            Some(path) => dotenvy::from_path_iter(path),
            None => dotenvy::dotenv_iter(),
        };
        let iter = match iter {
            Ok(iter) => iter,
            Err(e) if e.not_found() => return Ok(false),
            Err(e) => return Err(ConfigError::ParseError(format!(".env: {}", e))),
        };

        let mut vars = Vec::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| ConfigError::ParseError(format!(".env: {}", e)))?;
            vars.push((key, value));
        }
        self.load_env_from(vars);
        Ok(true)
    }

    /// Merge the top-level keys of a config file.
    pub fn load_file(&self, path: &Path, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path)?;
        self.merge(data);
        Ok(())
    }

    pub fn merge(&self, values: Map<String, Value>) {
        let mut config = self.config.write();
        for (key, value) in values {
            config.insert(key, value);
        }
    }

    fn merge_strings<I: IntoIterator<Item = (String, String)>>(&self, values: I) {
        let mut config = self.config.write();
        for (key, value) in values {
            config.insert(key, Value::String(value));
        }
    }

    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.config.write().insert(key.to_string(), json_value);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .config
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.config.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Copy of everything merged so far.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.config.read().clone()
    }

    /// Deserialize the merged values into `T` and run its validation.
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let validated: T = serde_json::from_value(Value::Object(self.snapshot()))
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("service_name", "svc").unwrap();

        assert_eq!(manager.get_string("service_name").unwrap(), "svc");
        assert!(manager.has("service_name"));
        assert!(!manager.has("missing"));
    }

    #[test]
    fn test_get_or_default() {
        let manager = ConfigManager::new();
        let value: u64 = manager.get_or("scoring_timeout_ms", 1000);

        assert_eq!(value, 1000);
    }

    #[test]
    fn test_later_layers_win() {
        let manager = ConfigManager::new();
        manager.set("port", 8000).unwrap();
        manager.load_env_from([("SCOREHOST_PORT", "9000")]);

        assert_eq!(manager.get_string("port").unwrap(), "9000");
    }

    #[test]
    fn test_dotenv_file_is_prefix_filtered() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SCOREHOST_SERVICE_NAME=from-dotenv").unwrap();
        writeln!(file, "OTHER=ignored").unwrap();

        let manager = ConfigManager::new();
        assert!(manager.load_dotenv(Some(file.path())).unwrap());
        assert_eq!(manager.get_string("service_name").unwrap(), "from-dotenv");
        assert!(!manager.has("other"));
    }

    #[test]
    fn test_missing_dotenv_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::new();

        assert!(!manager.load_dotenv(Some(&dir.path().join(".env"))).unwrap());
    }

    #[test]
    fn test_wrong_type_reports_key() {
        let manager = ConfigManager::new();
        manager.set("port", "not-a-number").unwrap();

        let err = manager.get::<u16>("port").unwrap_err();
        assert!(err.to_string().starts_with("Invalid value for 'port'"));
    }
}
