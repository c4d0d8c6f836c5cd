// Error types for the scoring server

use crate::HttpStatus;
use thiserror::Error;

/// Boxed error returned by user-authored `init`/`run` callables.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// HTTP-facing errors. Each maps to a status code and is rendered as
/// `{"message": "..."}` at the transport boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    RouteNotFound(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    RequestHeaderFieldsTooLarge(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn status_code(&self) -> u16 {
        self.http_status().code()
    }

    pub fn http_status(&self) -> HttpStatus {
        match self {
            Error::RouteNotFound(_) | Error::NotFound(_) => HttpStatus::NotFound,
            Error::MethodNotAllowed(_) => HttpStatus::MethodNotAllowed,
            Error::BadRequest(_) => HttpStatus::BadRequest,
            Error::UnsupportedMediaType(_) => HttpStatus::UnsupportedMediaType,
            Error::RequestHeaderFieldsTooLarge(_) => HttpStatus::RequestHeaderFieldsTooLarge,
            Error::ServiceUnavailable(_) => HttpStatus::ServiceUnavailable,
            Error::Serialization(_) | Error::Internal(_) | Error::Io(_) => {
                HttpStatus::InternalServerError
            }
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.http_status().is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.http_status().is_server_error()
    }
}
