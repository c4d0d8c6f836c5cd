// Errors raised while loading or running the user script

use crate::BoxError;
use std::any::Any;
use thiserror::Error;

/// Message returned to the client when the handler fails. The underlying
/// error only goes to logs and telemetry.
pub const HANDLER_EXCEPTION_MESSAGE: &str =
    "An unexpected error occurred in scoring script. Check the logs for more info.";

#[derive(Error, Debug)]
pub enum ScriptError {
    /// The script could not be located, or its loader failed or panicked.
    #[error("Failed to import user script {location}: {source}")]
    ImportFailure {
        location: String,
        #[source]
        source: BoxError,
    },

    #[error("{0}")]
    MissingEntryPoint(String),

    /// The handler's declared signature or capabilities are unusable.
    #[error("{0}")]
    Configuration(String),

    /// `init()` or `run()` returned an error or panicked.
    #[error("{message}")]
    Exception {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Scoring timeout after {timeout_ms} ms")]
    Timeout { timeout_ms: u64, elapsed_ms: f64 },
}

impl ScriptError {
    pub fn exception(source: BoxError) -> Self {
        ScriptError::Exception {
            message: "Caught an unhandled exception from the user script".to_string(),
            source,
        }
    }

    pub(crate) fn from_panic(what: &str, payload: Box<dyn Any + Send>) -> Self {
        ScriptError::exception(format!("{} panicked: {}", what, panic_message(payload.as_ref())).into())
    }

    /// Text safe to show an HTTP client.
    pub fn client_message(&self) -> String {
        match self {
            ScriptError::Exception { .. } => HANDLER_EXCEPTION_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = ScriptError::Timeout {
            timeout_ms: 500,
            elapsed_ms: 501.2,
        };
        assert_eq!(err.to_string(), "Scoring timeout after 500 ms");
        assert_eq!(err.client_message(), "Scoring timeout after 500 ms");
    }

    #[test]
    fn test_exception_hides_source_from_client() {
        let err = ScriptError::exception("secret stack trace".into());
        assert_eq!(err.client_message(), HANDLER_EXCEPTION_MESSAGE);
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "secret stack trace");
    }

    #[test]
    fn test_panic_payloads() {
        let err = ScriptError::from_panic("run()", Box::new("boom"));
        let source = std::error::Error::source(&err).unwrap().to_string();
        assert_eq!(source, "run() panicked: boom");

        let err = ScriptError::from_panic("init()", Box::new(String::from("owned")));
        let source = std::error::Error::source(&err).unwrap().to_string();
        assert_eq!(source, "init() panicked: owned");
    }
}
