// Configuration validation

use crate::{ConfigError, Result};

/// Implemented by configuration structs that check themselves after loading.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable field checks.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    pub fn positive(value: u64, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than zero",
                field
            )));
        }
        Ok(())
    }

    pub fn is_port(value: u16, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid port number",
                field
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("value", "field").is_ok());
        assert!(ConfigValidator::not_empty("  ", "field").is_err());
    }

    #[test]
    fn test_positive_validation() {
        assert!(ConfigValidator::positive(1, "scoring_timeout_ms").is_ok());
        let err = ConfigValidator::positive(0, "scoring_timeout_ms").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: scoring_timeout_ms must be greater than zero"
        );
    }

    #[test]
    fn test_port_validation() {
        assert!(ConfigValidator::is_port(31311, "port").is_ok());
        assert!(ConfigValidator::is_port(0, "port").is_err());
    }
}
