// HTTP request and response types

use crate::headers::HeaderMap;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Inbound request as seen by the adapter.
///
/// Owned by the request flow; the raw-request binding hands an `Arc` of it
/// to the handler and nothing keeps it past the response.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    /// Raw (still percent-encoded) query string without the leading `?`.
    pub query_string: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpRequest {
    /// Build a request from a method and a target that may carry a query.
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            method: method.into(),
            path: path.to_string(),
            query_string: query.to_string(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Decoded query pairs in request order. Repeated keys stay repeated.
    pub fn query_pairs(&self) -> Result<Vec<(String, String)>, crate::Error> {
        serde_urlencoded::from_str(&self.query_string)
            .map_err(|e| crate::Error::BadRequest(format!("Invalid query string: {}", e)))
    }

    /// First decoded value for a query key.
    pub fn query(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .ok()?
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Parse the request body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, crate::Error> {
        serde_json::from_slice(&self.body).map_err(|e| crate::Error::BadRequest(e.to_string()))
    }
}

/// Outbound response
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = text.into().into_bytes();
        self.headers.set_content_type("text/plain; charset=utf-8");
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, crate::Error> {
        self.body =
            serde_json::to_vec(value).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        self.headers.set_content_type("application/json");
        Ok(self)
    }

    /// Set a header, replacing existing entries of the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// `{"message": ...}` body used for every error the server reports.
    pub fn message(status: u16, message: impl Into<String>) -> Self {
        let body = serde_json::json!({ "message": message.into() });
        let mut response = Self::new(status);
        response.body = body.to_string().into_bytes();
        response.headers.set_content_type("application/json");
        response
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl From<crate::Error> for HttpResponse {
    fn from(err: crate::Error) -> Self {
        HttpResponse::message(err.status_code(), err.to_string())
    }
}
