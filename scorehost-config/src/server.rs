// Typed server configuration

use crate::{ConfigError, ConfigManager, ConfigValidator, FileFormat, Result, Validate};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_APP_ROOT: &str = "/var/scorehost/app";
pub const DEFAULT_PORT: u16 = 31311;
pub const DEFAULT_SCORING_TIMEOUT_MS: u64 = 3_600_000;
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Keys read by other components (logging, file discovery) that are not
/// fields here but must not be reported as unknown.
const AUXILIARY_KEYS: &[&str] = &["config_file", "log_format", "log_color"];

const KNOWN_KEYS: &[&str] = &[
    "app_root",
    "entry_script",
    "source_dir",
    "service_name",
    "service_version",
    "service_path_prefix",
    "workspace_name",
    "scoring_timeout_ms",
    "log_level",
    "telemetry_enabled",
    "model_data_collection_enabled",
    "log_response_enabled",
    "model_dir",
    "hostname",
    "server_version",
    "port",
];

/// Everything the scoring server needs at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub app_root: PathBuf,
    #[serde(deserialize_with = "opt_string")]
    pub entry_script: Option<String>,
    #[serde(deserialize_with = "opt_path")]
    pub source_dir: Option<PathBuf>,
    #[serde(deserialize_with = "loose_string")]
    pub service_name: String,
    #[serde(deserialize_with = "loose_string")]
    pub service_version: String,
    #[serde(deserialize_with = "loose_string")]
    pub service_path_prefix: String,
    #[serde(deserialize_with = "loose_string")]
    pub workspace_name: String,
    #[serde(deserialize_with = "loose_u64")]
    pub scoring_timeout_ms: u64,
    #[serde(deserialize_with = "loose_string")]
    pub log_level: String,
    #[serde(deserialize_with = "loose_bool")]
    pub telemetry_enabled: bool,
    #[serde(deserialize_with = "loose_bool")]
    pub model_data_collection_enabled: bool,
    #[serde(deserialize_with = "loose_bool")]
    pub log_response_enabled: bool,
    #[serde(deserialize_with = "opt_path")]
    pub model_dir: Option<PathBuf>,
    #[serde(deserialize_with = "loose_string")]
    pub hostname: String,
    #[serde(deserialize_with = "loose_string")]
    pub server_version: String,
    #[serde(deserialize_with = "loose_u16")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_root: PathBuf::from(DEFAULT_APP_ROOT),
            entry_script: None,
            source_dir: None,
            service_name: "ML service".to_string(),
            service_version: "1.0".to_string(),
            service_path_prefix: String::new(),
            workspace_name: String::new(),
            scoring_timeout_ms: DEFAULT_SCORING_TIMEOUT_MS,
            log_level: "info".to_string(),
            telemetry_enabled: false,
            model_data_collection_enabled: false,
            log_response_enabled: true,
            model_dir: None,
            hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "Unknown".to_string()),
            server_version: String::new(),
            port: DEFAULT_PORT,
        }
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::positive(self.scoring_timeout_ms, "scoring_timeout_ms")?;
        ConfigValidator::is_port(self.port, "port")?;
        ConfigValidator::not_empty(&self.log_level, "log_level")?;
        Ok(())
    }
}

impl ServerConfig {
    /// Load from the process: config file, then `.env`, then `SCOREHOST_*`
    /// variables.
    pub fn load() -> Result<Self> {
        let dotenv = ConfigManager::new();
        if dotenv.load_dotenv(None)? {
            tracing::debug!("Loaded .env file");
        }
        let env = ConfigManager::new();
        env.load_env();

        Self::from_layers(dotenv, env)
    }

    /// Resolve the config file from the two override layers, then merge
    /// file, dotenv and environment in that order.
    pub fn from_layers(dotenv: ConfigManager, env: ConfigManager) -> Result<Self> {
        let overrides = ConfigManager::new();
        overrides.merge(dotenv.snapshot());
        overrides.merge(env.snapshot());

        let merged = ConfigManager::new();
        if let Some(path) = locate_config_file(&overrides)? {
            tracing::info!(path = %path.display(), "Loading configuration file");
            let format = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(FileFormat::from_extension)
                .unwrap_or(FileFormat::Json);
            merged.load_file(&path, format)?;
        }
        merged.merge(overrides.snapshot());

        warn_unknown_keys(&merged.keys());
        merged.load_validated()
    }

    /// Build from explicit values on top of the defaults, without consulting
    /// files or the environment.
    pub fn from_values<I, K, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Serialize,
    {
        let manager = ConfigManager::new();
        for (key, value) in values {
            manager.set(key.as_ref(), value)?;
        }
        warn_unknown_keys(&manager.keys());
        manager.load_validated()
    }

    pub fn scoring_timeout(&self) -> Duration {
        Duration::from_millis(self.scoring_timeout_ms)
    }

    pub fn with_entry_script(mut self, name: impl Into<String>) -> Self {
        self.entry_script = Some(name.into());
        self
    }

    pub fn with_app_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.app_root = path.into();
        self
    }

    pub fn with_scoring_timeout_ms(mut self, ms: u64) -> Self {
        self.scoring_timeout_ms = ms;
        self
    }
}

fn locate_config_file(overrides: &ConfigManager) -> Result<Option<PathBuf>> {
    if let Ok(explicit) = overrides.get_string("config_file") {
        let path = PathBuf::from(explicit);
        if !path.is_file() {
            return Err(ConfigError::LoadError {
                path: path.display().to_string(),
                reason: "file does not exist".to_string(),
            });
        }
        return Ok(Some(path));
    }

    let app_root = overrides
        .get_string("app_root")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_APP_ROOT));
    let mut candidates = vec![app_root.join(CONFIG_FILE_NAME)];
    if let Ok(source_dir) = overrides.get_string("source_dir") {
        candidates.push(Path::new(&source_dir).join(CONFIG_FILE_NAME));
    }

    Ok(candidates.into_iter().find(|path| non_empty_file(path)))
}

fn non_empty_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

fn warn_unknown_keys(keys: &[String]) {
    for key in keys {
        if !KNOWN_KEYS.contains(&key.as_str()) && !AUXILIARY_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Ignoring unknown configuration key");
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Loose::deserialize(deserializer)? {
        Loose::Bool(b) => b.to_string(),
        Loose::Unsigned(n) => n.to_string(),
        Loose::Signed(n) => n.to_string(),
        Loose::Float(f) => f.to_string(),
        Loose::Text(s) => s,
    })
}

fn opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn opt_path<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<PathBuf>, D::Error> {
    Ok(opt_string(deserializer)?.map(PathBuf::from))
}

fn loose_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    use serde::de::Error;

    match Loose::deserialize(deserializer)? {
        Loose::Unsigned(n) => Ok(n),
        Loose::Float(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        Loose::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected a non-negative integer, got '{}'", s))),
        _ => Err(D::Error::custom("expected a non-negative integer")),
    }
}

fn loose_u16<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u16, D::Error> {
    use serde::de::Error;

    let n = loose_u64(deserializer)?;
    u16::try_from(n).map_err(|_| D::Error::custom(format!("{} is out of range", n)))
}

fn loose_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    use serde::de::Error;

    match Loose::deserialize(deserializer)? {
        Loose::Bool(b) => Ok(b),
        Loose::Unsigned(0) => Ok(false),
        Loose::Unsigned(1) => Ok(true),
        Loose::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" | "" => Ok(false),
            _ => Err(D::Error::custom(format!("expected a boolean, got '{}'", s))),
        },
        _ => Err(D::Error::custom("expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn env(vars: &[(&str, &str)]) -> ConfigManager {
        let manager = ConfigManager::new();
        manager.load_env_from(vars.iter().copied());
        manager
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_values(Vec::<(&str, String)>::new()).unwrap();

        assert_eq!(config.app_root, PathBuf::from(DEFAULT_APP_ROOT));
        assert_eq!(config.service_name, "ML service");
        assert_eq!(config.service_version, "1.0");
        assert_eq!(config.scoring_timeout_ms, 3_600_000);
        assert_eq!(config.port, 31311);
        assert!(config.log_response_enabled);
        assert!(!config.telemetry_enabled);
        assert!(config.entry_script.is_none());
        assert!(!config.hostname.is_empty());
    }

    #[test]
    fn test_string_values_are_coerced() {
        let config = ServerConfig::from_layers(
            ConfigManager::new(),
            env(&[
                ("SCOREHOST_APP_ROOT", "/nonexistent/app"),
                ("SCOREHOST_SCORING_TIMEOUT_MS", "250"),
                ("SCOREHOST_PORT", "8080"),
                ("SCOREHOST_TELEMETRY_ENABLED", "True"),
                ("SCOREHOST_LOG_RESPONSE_ENABLED", "false"),
                ("SCOREHOST_ENTRY_SCRIPT", "main"),
            ]),
        )
        .unwrap();

        assert_eq!(config.scoring_timeout(), Duration::from_millis(250));
        assert_eq!(config.port, 8080);
        assert!(config.telemetry_enabled);
        assert!(!config.log_response_enabled);
        assert_eq!(config.entry_script.as_deref(), Some("main"));
    }

    #[test]
    fn test_numbers_accepted_for_strings() {
        let config = ServerConfig::from_values([("service_version", serde_json::json!(2))]).unwrap();

        assert_eq!(config.service_version, "2");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ServerConfig::from_values([("scoring_timeout_ms", "0")]).unwrap_err();

        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_bad_number_rejected() {
        let err = ServerConfig::from_values([("port", "eighty")]).unwrap_err();

        assert!(err.to_string().contains("eighty"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = ServerConfig::from_values([("not_a_setting", "x")]).unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_empty_path_is_none() {
        let config = ServerConfig::from_values([("model_dir", "")]).unwrap();

        assert!(config.model_dir.is_none());
    }

    #[test]
    fn test_file_then_dotenv_then_env() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"service_name": "from-file", "service_version": 3, "port": 7000, "workspace_name": "ws"}"#,
        )
        .unwrap();
        let app_root = dir.path().to_string_lossy().to_string();

        let dotenv = env(&[
            ("SCOREHOST_APP_ROOT", app_root.as_str()),
            ("SCOREHOST_SERVICE_NAME", "from-dotenv"),
            ("SCOREHOST_PORT", "7100"),
        ]);
        let process = env(&[("SCOREHOST_PORT", "7200")]);

        let config = ServerConfig::from_layers(dotenv, process).unwrap();
        assert_eq!(config.service_name, "from-dotenv");
        assert_eq!(config.service_version, "3");
        assert_eq!(config.workspace_name, "ws");
        assert_eq!(config.port, 7200);
    }

    #[test]
    fn test_explicit_config_file_must_exist() {
        let err = ServerConfig::from_layers(
            ConfigManager::new(),
            env(&[("SCOREHOST_CONFIG_FILE", "/nonexistent/scorehost.toml")]),
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::LoadError { .. }));
    }

    #[test]
    fn test_explicit_toml_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scorehost.toml");
        fs::write(&path, "scoring_timeout_ms = 1500\nservice_path_prefix = \"/api\"\n").unwrap();
        let path = path.to_string_lossy().to_string();

        let config = ServerConfig::from_layers(
            ConfigManager::new(),
            env(&[("SCOREHOST_CONFIG_FILE", path.as_str())]),
        )
        .unwrap();

        assert_eq!(config.scoring_timeout_ms, 1500);
        assert_eq!(config.service_path_prefix, "/api");
    }
}
