//! Request-to-argument parsers, one per binding strategy.

use crate::script::ParamSpec;
use crate::{Error, HttpRequest};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Client-side input problems. Never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("{0}")]
    BadInput(String),

    #[error("{0}")]
    UnsupportedInput(String),

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
}

impl From<InputError> for Error {
    fn from(err: InputError) -> Self {
        match err {
            InputError::BadInput(msg) => Error::BadRequest(msg),
            InputError::UnsupportedInput(msg) => Error::UnsupportedMediaType(msg),
            InputError::UnsupportedMethod(_) => {
                Error::MethodNotAllowed("Method not allowed".to_string())
            }
        }
    }
}

/// One bound argument.
#[derive(Debug, Clone)]
pub enum BoundValue {
    Request(Arc<HttpRequest>),
    Text(String),
    Json(Value),
}

impl BoundValue {
    /// JSON view used for telemetry. A raw request is summarised, not
    /// dumped.
    pub fn to_json(&self) -> Value {
        match self {
            BoundValue::Request(req) => Value::String(format!("{} {}", req.method, req.path)),
            BoundValue::Text(text) => Value::String(text.clone()),
            BoundValue::Json(value) => value.clone(),
        }
    }
}

/// Arguments for one `run()` call, in binding order.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    values: Vec<(String, BoundValue)>,
    request_headers: Option<HashMap<String, String>>,
}

impl RunArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: BoundValue) {
        self.values.push((name.into(), value));
    }

    pub fn push_json(&mut self, name: impl Into<String>, value: Value) {
        self.push(name, BoundValue::Json(value));
    }

    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// The raw request bound to `name`.
    pub fn request(&self, name: &str) -> Option<&HttpRequest> {
        match self.get(name)? {
            BoundValue::Request(req) => Some(req),
            _ => None,
        }
    }

    /// Text bound to `name`.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            BoundValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// JSON value bound to `name`.
    pub fn json(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            BoundValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn request_headers(&self) -> Option<&HashMap<String, String>> {
        self.request_headers.as_ref()
    }

    pub fn set_request_headers(&mut self, headers: HashMap<String, String>) {
        self.request_headers = Some(headers);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bound input as a JSON object, without `request_headers`.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(n, v)| (n.clone(), v.to_json()))
                .collect(),
        )
    }
}

pub(crate) fn parse_raw_request(parameter_name: &str, request: Arc<HttpRequest>) -> RunArgs {
    let mut args = RunArgs::new();
    args.push(parameter_name, BoundValue::Request(request));
    args
}

/// GET: query parameters re-encoded as a JSON object string.
/// POST: the body as UTF-8 text, untouched.
pub(crate) fn parse_json_string(
    parameter_name: &str,
    request: &HttpRequest,
) -> Result<RunArgs, InputError> {
    let text = match request.method.as_str() {
        "GET" => Value::Object(decode_query(request)?).to_string(),
        "POST" => std::str::from_utf8(&request.body)
            .map_err(|e| InputError::BadInput(format!("Input cannot be decoded as UTF-8: {}", e)))?
            .to_string(),
        other => return Err(InputError::UnsupportedMethod(other.to_string())),
    };

    let mut args = RunArgs::new();
    args.push(parameter_name, BoundValue::Text(text));
    Ok(args)
}

/// Bind every declared parameter by name from a JSON object (POST body)
/// or from the decoded query (GET).
pub(crate) fn parse_object(
    parameters: &[ParamSpec],
    request: &HttpRequest,
) -> Result<RunArgs, InputError> {
    let source = match request.method.as_str() {
        "GET" => decode_query(request)?,
        "POST" => decode_json_body(request)?,
        other => return Err(InputError::UnsupportedMethod(other.to_string())),
    };

    let mut args = RunArgs::new();
    for param in parameters {
        let value = match source.get(&param.name) {
            Some(value) => value.clone(),
            None => param.default.clone().ok_or_else(|| {
                InputError::BadInput(format!(
                    "A value is not provided for the '{}' parameter.",
                    param.name
                ))
            })?,
        };
        args.push_json(&param.name, value);
    }

    Ok(args)
}

fn decode_json_body(request: &HttpRequest) -> Result<Map<String, Value>, InputError> {
    if !is_json_content_type(request.headers.content_type()) {
        return Err(InputError::UnsupportedInput(
            "Expects Content-Type to be application/json".to_string(),
        ));
    }

    let value: Value = serde_json::from_slice(&request.body)
        .map_err(|e| InputError::BadInput(format!("POST body could not be decoded as JSON: {}", e)))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(InputError::BadInput(format!(
            "POST body must be a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Query parameters as a JSON object.
///
/// Keys are case-sensitive and keep first-seen order. A key seen once maps
/// to its value parsed as JSON, or to the literal string when that fails;
/// a repeated key maps to an array of such values in request order.
pub fn decode_query(request: &HttpRequest) -> Result<Map<String, Value>, InputError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(&request.query_string)
        .map_err(|e| InputError::BadInput(format!("Query string could not be decoded: {}", e)))?;

    let mut grouped: Vec<(String, Vec<Value>)> = Vec::new();
    for (key, raw) in pairs {
        let value = json_or_string(raw);
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => grouped.push((key, vec![value])),
        }
    }

    Ok(grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            };
            (key, value)
        })
        .collect())
}

fn json_or_string(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let media = content_type.split(';').next().unwrap_or("").trim();
    media.eq_ignore_ascii_case("application/json")
        || (media.len() > 5
            && media.is_char_boundary(media.len() - 5)
            && media[media.len() - 5..].eq_ignore_ascii_case("+json"))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
