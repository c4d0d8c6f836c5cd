//! Request correlation headers.

use scorehost_core::{HttpRequest, HttpResponse};
use tracing::warn;
use uuid::Uuid;

/// Longest accepted request id, in characters.
pub const HEADER_LIMIT: usize = 100;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";
/// Deprecated: used to carry both ids.
pub const LEGACY_REQUEST_ID_HEADER: &str = "x-ms-request-id";
pub const TRACE_ID_HEADER: &str = "TraceId";
pub const SERVER_VERSION_HEADER: &str = "x-ms-server-version";

/// Ids assigned to one request and echoed on its response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIds {
    pub request_id: String,
    pub client_request_id: String,
    pub legacy_request_id: String,
    pub trace_id: Option<String>,
}

/// The request carried an id over [`HEADER_LIMIT`]. `ids` holds whatever
/// was accepted before the check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedIds {
    pub ids: RequestIds,
    pub message: String,
}

impl RequestIds {
    /// Read the ids from the request, generating `x-request-id` when absent.
    ///
    /// When only the legacy `x-ms-request-id` is sent it doubles as the
    /// client request id. When it is absent it is filled from the client
    /// request id, or failing that the request id.
    pub fn from_request(request: &HttpRequest) -> Result<Self, RejectedIds> {
        let mut ids = RequestIds {
            trace_id: request.header(TRACE_ID_HEADER).map(str::to_string),
            ..Default::default()
        };

        let request_id = request
            .header(REQUEST_ID_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if too_long(&request_id) {
            return Err(RejectedIds {
                ids,
                message: format!("x-request-id must not exceed {} characters", HEADER_LIMIT),
            });
        }
        ids.request_id = request_id;

        let mut legacy = request
            .header(LEGACY_REQUEST_ID_HEADER)
            .unwrap_or_default()
            .to_string();
        let mut client = request
            .header(CLIENT_REQUEST_ID_HEADER)
            .unwrap_or_default()
            .to_string();

        if !legacy.is_empty() {
            warn!(
                "x-ms-request-id header has been deprecated and will be removed from future versions of the server. Please use x-ms-client-request-id."
            );
            if client.is_empty() {
                client = legacy.clone();
            }
        } else if client.is_empty() {
            legacy = ids.request_id.clone();
        } else {
            legacy = client.clone();
        }

        if too_long(&legacy) || too_long(&client) {
            return Err(RejectedIds {
                ids,
                message: format!(
                    "x-ms-request-id and x-ms-client-request-id must not exceed {} characters",
                    HEADER_LIMIT
                ),
            });
        }

        ids.legacy_request_id = legacy;
        ids.client_request_id = client;
        Ok(ids)
    }

    /// Echo the ids (and the server version, when set) on a response.
    pub fn apply(&self, response: &mut HttpResponse, server_version: &str) {
        if !server_version.is_empty() {
            response.headers.append(SERVER_VERSION_HEADER, server_version);
        }
        if !self.request_id.is_empty() {
            response.headers.insert(REQUEST_ID_HEADER, self.request_id.as_str());
        }
        if !self.legacy_request_id.is_empty() {
            response
                .headers
                .insert(LEGACY_REQUEST_ID_HEADER, self.legacy_request_id.as_str());
        }
        if !self.client_request_id.is_empty() {
            response
                .headers
                .insert(CLIENT_REQUEST_ID_HEADER, self.client_request_id.as_str());
        }
        if let Some(trace_id) = &self.trace_id {
            response.headers.append(TRACE_ID_HEADER, trace_id.as_str());
        }
    }
}

fn too_long(value: &str) -> bool {
    value.chars().count() > HEADER_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> HttpRequest {
        headers
            .iter()
            .fold(HttpRequest::new("POST", "/score"), |req, (k, v)| {
                req.with_header(*k, *v)
            })
    }

    #[test]
    fn test_generated_request_id() {
        let ids = RequestIds::from_request(&request(&[])).unwrap();

        assert!(Uuid::parse_str(&ids.request_id).is_ok());
        assert_eq!(ids.legacy_request_id, ids.request_id);
        assert!(ids.client_request_id.is_empty());
        assert!(ids.trace_id.is_none());
    }

    #[test]
    fn test_client_id_fills_legacy() {
        let ids = RequestIds::from_request(&request(&[
            ("x-request-id", "req"),
            ("x-ms-client-request-id", "client"),
        ]))
        .unwrap();

        assert_eq!(ids.request_id, "req");
        assert_eq!(ids.client_request_id, "client");
        assert_eq!(ids.legacy_request_id, "client");
    }

    #[test]
    fn test_legacy_id_fills_client() {
        let ids = RequestIds::from_request(&request(&[("X-MS-Request-Id", "legacy")])).unwrap();

        assert_eq!(ids.client_request_id, "legacy");
        assert_eq!(ids.legacy_request_id, "legacy");
    }

    #[test]
    fn test_both_ids_kept_apart() {
        let ids = RequestIds::from_request(&request(&[
            ("x-ms-request-id", "legacy"),
            ("x-ms-client-request-id", "client"),
        ]))
        .unwrap();

        assert_eq!(ids.client_request_id, "client");
        assert_eq!(ids.legacy_request_id, "legacy");
    }

    #[test]
    fn test_limits() {
        let at_limit = "a".repeat(HEADER_LIMIT);
        assert!(RequestIds::from_request(&request(&[("x-request-id", at_limit.as_str())])).is_ok());

        let long = "a".repeat(HEADER_LIMIT + 1);
        let rejected = RequestIds::from_request(&request(&[("x-request-id", long.as_str())])).unwrap_err();
        assert_eq!(rejected.message, "x-request-id must not exceed 100 characters");
        assert!(rejected.ids.request_id.is_empty());

        let rejected = RequestIds::from_request(&request(&[
            ("x-request-id", "ok"),
            ("x-ms-client-request-id", long.as_str()),
        ]))
        .unwrap_err();
        assert_eq!(
            rejected.message,
            "x-ms-request-id and x-ms-client-request-id must not exceed 100 characters"
        );
        assert_eq!(rejected.ids.request_id, "ok");
    }

    #[test]
    fn test_apply_echoes_headers() {
        let ids = RequestIds::from_request(&request(&[
            ("x-request-id", "req"),
            ("TraceId", "trace-1"),
        ]))
        .unwrap();
        let mut response = HttpResponse::ok();
        ids.apply(&mut response, "1.4.0");

        assert_eq!(response.headers.get("x-request-id"), Some("req"));
        assert_eq!(response.headers.get("x-ms-request-id"), Some("req"));
        assert!(!response.headers.contains("x-ms-client-request-id"));
        assert_eq!(response.headers.get("traceid"), Some("trace-1"));
        assert_eq!(response.headers.get("x-ms-server-version"), Some("1.4.0"));
    }
}
