// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::BTreeMap;
use std::env;

/// Prefix shared by every scorehost environment variable.
pub const ENV_PREFIX: &str = "SCOREHOST";

/// Collects prefixed environment variables into lower-cased config keys.
///
/// `SCOREHOST_SCORING_TIMEOUT_MS=500` becomes `scoring_timeout_ms = "500"`.
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Loader for the `SCOREHOST_` namespace.
    pub fn scorehost() -> Self {
        Self::new(Some(ENV_PREFIX.to_string()))
    }

    /// Load from the process environment.
    pub fn load(&self) -> BTreeMap<String, String> {
        self.load_from(env::vars())
    }

    /// Load from an explicit set of variables.
    pub fn load_from<I, K, V>(&self, vars: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = BTreeMap::new();

        for (key, value) in vars {
            let key = key.as_ref();
            let stripped = match self.prefix {
                Some(ref prefix) => match key.strip_prefix(prefix.as_str()) {
                    Some(rest) if rest.starts_with('_') => &rest[1..],
                    _ => continue,
                },
                None => key,
            };
            if stripped.is_empty() {
                continue;
            }
            config.insert(stripped.to_lowercase(), value.into());
        }

        config
    }

    /// Load one variable, applying the prefix.
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.full_key(key)).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    fn full_key(&self, key: &str) -> String {
        match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::scorehost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // std::env::set_var is unsafe under edition 2024, so these feed
    // variables through load_from instead.

    #[test]
    fn test_prefix_is_stripped_and_lowercased() {
        let loader = EnvLoader::scorehost();
        let vars = loader.load_from([
            ("SCOREHOST_SCORING_TIMEOUT_MS", "500"),
            ("SCOREHOST_APP_ROOT", "/srv/app"),
            ("PATH", "/usr/bin"),
        ]);

        assert_eq!(vars.len(), 2);
        assert_eq!(vars["scoring_timeout_ms"], "500");
        assert_eq!(vars["app_root"], "/srv/app");
    }

    #[test]
    fn test_prefix_requires_separator() {
        let loader = EnvLoader::scorehost();
        let vars = loader.load_from([("SCOREHOSTPORT", "1"), ("SCOREHOST_", "2")]);

        assert!(vars.is_empty());
    }

    #[test]
    fn test_no_prefix_keeps_everything() {
        let loader = EnvLoader::new(None);
        let vars = loader.load_from([("HOME", "/root")]);

        assert_eq!(vars["home"], "/root");
    }

    #[test]
    fn test_missing_var_uses_default() {
        let loader = EnvLoader::scorehost();

        assert!(loader.load_var("NONEXISTENT_VAR_12345").is_err());
        assert_eq!(loader.load_var_or("NONEXISTENT_VAR_12345", "fallback"), "fallback");
    }
}
