//! Schema document errors

use scorehost_core::Error;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The requested version is not an alias of any known document version.
    #[error("Swagger version [{requested}] is not valid. Supported versions: [{}].", .supported.join(", "))]
    UnknownVersion {
        requested: String,
        supported: Vec<String>,
    },

    /// Known version, but the scoring script cannot be described in it.
    #[error(
        "Swagger version [{requested}] is not supported for the scoring script. Supported swagger versions: [{}].",
        .supported.join(", ")
    )]
    UnsupportedForHandler {
        requested: String,
        supported: Vec<String>,
    },

    /// The override file exists but is unreadable or not JSON. `path` and
    /// `reason` are logged, never sent to the client.
    #[error("Swagger for version [{version}] could not be loaded. Check the logs for more info.")]
    InvalidOverride {
        version: String,
        path: String,
        reason: String,
    },

    #[error("Schema template for version {version} is invalid: {reason}")]
    InvalidTemplate { version: String, reason: String },
}

impl SchemaError {
    pub fn status_code(&self) -> u16 {
        match self {
            SchemaError::UnknownVersion { .. } | SchemaError::UnsupportedForHandler { .. } => 404,
            SchemaError::InvalidOverride { .. } | SchemaError::InvalidTemplate { .. } => 500,
        }
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownVersion { .. } | SchemaError::UnsupportedForHandler { .. } => {
                Error::NotFound(err.to_string())
            }
            other => Error::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = SchemaError::UnknownVersion {
            requested: "3.0a".to_string(),
            supported: vec!["2".to_string(), "3".to_string(), "3.1".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Swagger version [3.0a] is not valid. Supported versions: [2, 3, 3.1]."
        );
        assert_eq!(err.status_code(), 404);

        let err = SchemaError::UnsupportedForHandler {
            requested: "2".to_string(),
            supported: vec!["3".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Swagger version [2] is not supported for the scoring script. Supported swagger versions: [3]."
        );
    }

    #[test]
    fn test_core_error_mapping() {
        let err: Error = SchemaError::UnknownVersion {
            requested: "9".to_string(),
            supported: vec![],
        }
        .into();
        assert_eq!(err.status_code(), 404);

        let err: Error = SchemaError::InvalidOverride {
            version: "2".to_string(),
            path: "/srv/app/swagger.json".to_string(),
            reason: "EOF".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.to_string().contains("/srv/app"));
    }
}
