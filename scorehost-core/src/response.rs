//! Turning `run()` output into the wire response.

use crate::invoke::TimedResult;
use crate::HttpResponse;
use serde_json::Value;

/// Set to `True` whenever the failure is attributable to `run()`.
pub const RUN_FUNCTION_FAILED_HEADER: &str = "x-ms-run-function-failed";

/// Measured `run()` duration in milliseconds, three decimals.
pub const EXECUTION_TIME_HEADER: &str = "x-ms-run-fn-exec-ms";

const DEFAULT_TEXT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

fn wire_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// What `run()` returned.
#[derive(Debug, Clone)]
pub enum RunOutput {
    /// Any JSON value; sent as a 200 JSON body.
    Value(Value),
    /// A fully specified response; passed through.
    Response(ScoreResponse),
}

impl From<Value> for RunOutput {
    fn from(value: Value) -> Self {
        RunOutput::Value(value)
    }
}

impl From<ScoreResponse> for RunOutput {
    fn from(response: ScoreResponse) -> Self {
        RunOutput::Response(response)
    }
}

impl RunOutput {
    /// JSON view used for telemetry.
    pub fn to_json(&self) -> Value {
        match self {
            RunOutput::Value(value) => value.clone(),
            RunOutput::Response(resp) => match &resp.body {
                Some(ResponseBody::Json(value)) => value.clone(),
                Some(ResponseBody::Text(text)) => Value::String(text.clone()),
                Some(ResponseBody::Bytes(bytes)) => {
                    Value::String(String::from_utf8_lossy(bytes).into_owned())
                }
                None => Value::Null,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Text(String),
    Bytes(Vec<u8>),
    /// Serialized as JSON with an `application/json` content type.
    Json(Value),
}

/// Response built by a raw-request handler.
///
/// ```rust
/// use scorehost_core::response::ScoreResponse;
///
/// let resp = ScoreResponse::text("created", 201)
///     .with_header("Content-Type", "text/plain")
///     .with_header("Vary", "Accept, Origin")
///     .into_http();
///
/// assert_eq!(resp.status, 201);
/// assert_eq!(resp.headers.get_all("vary"), vec!["Accept", "Origin"]);
/// assert_eq!(resp.headers.get("x-ms-run-function-failed"), Some("False"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResponse {
    pub status: u16,
    /// `None` is sent as an empty JSON object.
    pub body: Option<ResponseBody>,
    /// Comma-joined values fan out into repeated headers.
    pub headers: Vec<(String, String)>,
    pub run_function_failed: bool,
}

impl ScoreResponse {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: None,
            headers: Vec::new(),
            run_function_failed: false,
        }
    }

    pub fn text(text: impl Into<String>, status: u16) -> Self {
        Self {
            body: Some(ResponseBody::Text(text.into())),
            ..Self::empty(status)
        }
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>, status: u16) -> Self {
        Self {
            body: Some(ResponseBody::Bytes(bytes.into())),
            ..Self::empty(status)
        }
    }

    pub fn json(value: Value, status: u16) -> Self {
        Self {
            body: Some(ResponseBody::Json(value)),
            ..Self::empty(status)
        }
    }

    /// `{"message": ...}` error body.
    pub fn message(message: impl Into<String>, status: u16) -> Self {
        Self::json(serde_json::json!({ "message": message.into() }), status)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn failed(mut self, failed: bool) -> Self {
        self.run_function_failed = failed;
        self
    }

    pub fn into_http(self) -> HttpResponse {
        let mut resp = HttpResponse::new(self.status);

        match self.body {
            None => {
                resp.body = b"{}".to_vec();
                resp.headers.set_content_type("application/json");
            }
            Some(ResponseBody::Json(value)) => {
                resp.body = value.to_string().into_bytes();
                resp.headers.set_content_type("application/json");
            }
            Some(ResponseBody::Text(text)) => {
                resp.body = text.into_bytes();
                resp.headers.set_content_type(DEFAULT_TEXT_CONTENT_TYPE);
            }
            Some(ResponseBody::Bytes(bytes)) => {
                resp.body = bytes;
                resp.headers.set_content_type(DEFAULT_TEXT_CONTENT_TYPE);
            }
        }

        resp.headers
            .insert(RUN_FUNCTION_FAILED_HEADER, wire_bool(self.run_function_failed));

        for (name, value) in self.headers {
            if name.eq_ignore_ascii_case("Content-Type") {
                resp.headers.insert(name, value.trim());
                continue;
            }
            for segment in value.split(',') {
                resp.headers.append(name.clone(), segment.trim());
            }
        }

        resp
    }
}

/// Build the response for a successful invocation.
///
/// Pass-through responses with a 5xx status get the failed header forced
/// to `True`. Every response carries the execution-time header.
pub fn shape(result: TimedResult) -> HttpResponse {
    let mut resp = match result.output {
        RunOutput::Response(response) => {
            let mut resp = response.into_http();
            if resp.status >= 500 {
                resp.headers.insert(RUN_FUNCTION_FAILED_HEADER, wire_bool(true));
            }
            resp
        }
        RunOutput::Value(value) => ScoreResponse::json(value, 200).into_http(),
    };

    resp.headers
        .append(EXECUTION_TIME_HEADER, format!("{:.3}", result.elapsed_ms));
    resp
}

/// `{"message"}` response carrying the failed header.
pub fn error_response(status: u16, message: impl Into<String>, run_function_failed: bool) -> HttpResponse {
    ScoreResponse::message(message, status)
        .failed(run_function_failed)
        .into_http()
}
