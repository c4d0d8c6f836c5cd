//! Static description of a loaded handler.
//!
//! Handler authors declare `run()`'s parameters and capabilities on a
//! [`RunFunction`]. [`HandlerDescriptor::analyze`] validates that
//! declaration once, at load time, and freezes it.

use super::ScriptError;
use crate::input::RunArgs;
use crate::response::RunOutput;
use crate::BoxError;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Name of the optional parameter that receives the inbound headers.
pub const REQUEST_HEADERS_PARAM: &str = "request_headers";

/// Callable behind `run()`.
pub type RunCallable = Arc<dyn Fn(&RunArgs) -> Result<RunOutput, BoxError> + Send + Sync>;

/// How a parameter may be passed. Only `Named` parameters can be bound
/// from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Named,
    PositionalOnly,
    Variadic,
    KeywordVariadic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
    /// JSON schema fragment describing the expected value.
    pub declared_type: Option<Value>,
}

impl ParamSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Named,
            default: None,
            declared_type: None,
        }
    }

    pub fn positional_only(name: impl Into<String>) -> Self {
        Self {
            kind: ParamKind::PositionalOnly,
            ..Self::named(name)
        }
    }

    pub fn variadic(name: impl Into<String>) -> Self {
        Self {
            kind: ParamKind::Variadic,
            ..Self::named(name)
        }
    }

    pub fn keyword_variadic(name: impl Into<String>) -> Self {
        Self {
            kind: ParamKind::KeywordVariadic,
            ..Self::named(name)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_type(mut self, schema: Value) -> Self {
        self.declared_type = Some(schema);
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Declaration of a script's `run()` entry point.
///
/// ```rust
/// use scorehost_core::script::{ParamSpec, RunFunction};
/// use scorehost_core::response::RunOutput;
/// use serde_json::json;
///
/// let run = RunFunction::new(|args| {
///     let num = args.json("num").and_then(|v| v.as_i64()).unwrap_or(0);
///     Ok(RunOutput::from(json!({ "doubled": num * 2 })))
/// })
/// .param(ParamSpec::named("num").with_type(json!({ "type": "integer" })))
/// .input_schema();
///
/// assert!(run.is_schema_capable());
/// ```
#[derive(Clone)]
pub struct RunFunction {
    params: Vec<ParamSpec>,
    raw_http: bool,
    input_schema: bool,
    output_schema: Option<Value>,
    schema_versions: Option<BTreeSet<String>>,
    call: RunCallable,
}

impl RunFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RunArgs) -> Result<RunOutput, BoxError> + Send + Sync + 'static,
    {
        Self {
            params: Vec::new(),
            raw_http: false,
            input_schema: false,
            output_schema: None,
            schema_versions: None,
            call: Arc::new(f),
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// The handler wants the whole request instead of parsed input.
    pub fn raw_http(mut self) -> Self {
        self.raw_http = true;
        self
    }

    /// The handler's parameters are bound one by one from a JSON object.
    pub fn input_schema(mut self) -> Self {
        self.input_schema = true;
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Restrict the interface document versions this handler can be
    /// described in. Unrestricted when never called.
    pub fn schema_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema_versions = Some(versions.into_iter().map(Into::into).collect());
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn is_raw_http(&self) -> bool {
        self.raw_http
    }

    pub fn is_schema_capable(&self) -> bool {
        self.input_schema
    }

    pub fn callable(&self) -> RunCallable {
        self.call.clone()
    }
}

impl fmt::Debug for RunFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunFunction")
            .field("params", &self.params)
            .field("raw_http", &self.raw_http)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

/// Frozen view of `run()` used by binding and schema generation.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerDescriptor {
    pub entry_point_name: String,
    /// Declared parameters, minus the request-headers parameter.
    pub parameters: Vec<ParamSpec>,
    pub accepts_request_headers: bool,
    pub raw_request_capable: bool,
    pub schema_capable: bool,
    pub output_schema: Option<Value>,
    pub schema_versions: Option<BTreeSet<String>>,
}

impl HandlerDescriptor {
    /// Validate the declared signature.
    ///
    /// Fails when a parameter is positional-only or variadic, or when a
    /// name is declared twice.
    pub fn analyze(
        entry_point_name: impl Into<String>,
        run: &RunFunction,
    ) -> Result<Self, ScriptError> {
        if run.params.iter().any(|p| p.kind != ParamKind::Named) {
            return Err(ScriptError::Configuration(
                "run() cannot accept positional-only arguments, *args, or **kwargs.".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for param in &run.params {
            if !seen.insert(param.name.as_str()) {
                return Err(ScriptError::Configuration(format!(
                    "run() declares the parameter '{}' more than once.",
                    param.name
                )));
            }
        }

        let accepts_request_headers = run.params.iter().any(|p| p.name == REQUEST_HEADERS_PARAM);
        let parameters = run
            .params
            .iter()
            .filter(|p| p.name != REQUEST_HEADERS_PARAM)
            .cloned()
            .collect();

        Ok(Self {
            entry_point_name: entry_point_name.into(),
            parameters,
            accepts_request_headers,
            raw_request_capable: run.raw_http,
            schema_capable: run.input_schema,
            output_schema: run.output_schema.clone(),
            schema_versions: run.schema_versions.clone(),
        })
    }

    pub fn first_parameter(&self) -> Option<&ParamSpec> {
        self.parameters.first()
    }

    /// Whether any of `aliases` is in the declared compatible set.
    pub fn supports_schema_version(&self, aliases: &[&str]) -> bool {
        match &self.schema_versions {
            None => true,
            Some(versions) => aliases.iter().any(|a| versions.contains(*a)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> RunFunction {
        RunFunction::new(|_| Ok(RunOutput::from(Value::Null)))
    }

    #[test]
    fn test_rejects_variadic_and_positional_only() {
        for bad in [
            ParamSpec::positional_only("x"),
            ParamSpec::variadic("args"),
            ParamSpec::keyword_variadic("kwargs"),
        ] {
            let run = noop().param(ParamSpec::named("data")).param(bad);
            let err = HandlerDescriptor::analyze("run", &run).unwrap_err();
            assert_eq!(
                err.to_string(),
                "run() cannot accept positional-only arguments, *args, or **kwargs."
            );
        }
    }

    #[test]
    fn test_request_headers_is_split_out() {
        let run = noop()
            .param(ParamSpec::named(REQUEST_HEADERS_PARAM))
            .param(ParamSpec::named("data"));
        let descriptor = HandlerDescriptor::analyze("run", &run).unwrap();

        assert!(descriptor.accepts_request_headers);
        assert_eq!(descriptor.parameters.len(), 1);
        assert_eq!(descriptor.first_parameter().unwrap().name, "data");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let run = noop().param(ParamSpec::named("a")).param(ParamSpec::named("a"));
        assert!(matches!(
            HandlerDescriptor::analyze("run", &run),
            Err(ScriptError::Configuration(_))
        ));
    }

    #[test]
    fn test_captures_capabilities_and_types() {
        let run = noop()
            .param(ParamSpec::named("num").with_type(json!({"type": "integer"})))
            .param(ParamSpec::named("scale").with_default(json!(1.5)))
            .input_schema()
            .schema_versions(["3.0", "3.1"]);
        let descriptor = HandlerDescriptor::analyze("run", &run).unwrap();

        assert!(descriptor.schema_capable);
        assert!(!descriptor.raw_request_capable);
        assert!(!descriptor.parameters[0].has_default());
        assert_eq!(descriptor.parameters[1].default, Some(json!(1.5)));
        assert!(descriptor.supports_schema_version(&["3", "3.0"]));
        assert!(!descriptor.supports_schema_version(&["2", "2.0"]));
    }

    #[test]
    fn test_unrestricted_versions() {
        let descriptor =
            HandlerDescriptor::analyze("run", &noop().param(ParamSpec::named("d"))).unwrap();
        assert!(descriptor.supports_schema_version(&["2"]));
    }
}
