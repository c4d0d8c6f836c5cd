//! Choosing how requests become `run()` arguments.
//!
//! The strategy is picked once per loaded script and reused for every
//! request.

use crate::input::{self, InputError, RunArgs};
use crate::script::{HandlerDescriptor, ParamSpec, REQUEST_HEADERS_PARAM, ScriptError};
use crate::HttpRequest;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum InputBindingStrategy {
    /// Hand the whole request to one parameter.
    RawRequest { parameter_name: String },
    /// Hand the input, as JSON text, to one parameter.
    JsonString { parameter_name: String },
    /// Bind each declared parameter from a JSON object.
    SchemaObject { parameters: Vec<ParamSpec> },
}

impl InputBindingStrategy {
    pub fn is_raw_request(&self) -> bool {
        matches!(self, InputBindingStrategy::RawRequest { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            InputBindingStrategy::RawRequest { .. } => "raw-request",
            InputBindingStrategy::JsonString { .. } => "json-string",
            InputBindingStrategy::SchemaObject { .. } => "schema-object",
        }
    }

    /// Parse `request` into the arguments for `run()`.
    ///
    /// Parameters the strategy does not bind fall back to their declared
    /// defaults; `request_headers` is filled when the handler declares it.
    pub fn bind(
        &self,
        descriptor: &HandlerDescriptor,
        request: HttpRequest,
    ) -> Result<RunArgs, InputError> {
        let headers = descriptor
            .accepts_request_headers
            .then(|| request.headers.to_flat_map());

        let mut args = match self {
            InputBindingStrategy::RawRequest { parameter_name } => {
                input::parse_raw_request(parameter_name, Arc::new(request))
            }
            InputBindingStrategy::JsonString { parameter_name } => {
                input::parse_json_string(parameter_name, &request)?
            }
            // The object parser applies defaults itself.
            InputBindingStrategy::SchemaObject { parameters } => {
                input::parse_object(parameters, &request)?
            }
        };

        if !matches!(self, InputBindingStrategy::SchemaObject { .. }) {
            for param in &descriptor.parameters {
                if let Some(default) = &param.default {
                    if args.get(&param.name).is_none() {
                        args.push_json(&param.name, default.clone());
                    }
                }
            }
        }

        if let Some(headers) = headers {
            args.set_request_headers(headers);
        }

        Ok(args)
    }
}

/// Pick the binding for a handler.
///
/// Raw-request and schema capabilities are mutually exclusive, and the
/// handler must declare at least one parameter besides `request_headers`.
pub fn select(descriptor: &HandlerDescriptor) -> Result<InputBindingStrategy, ScriptError> {
    if descriptor.raw_request_capable && descriptor.schema_capable {
        return Err(ScriptError::Configuration(
            "run() cannot be declared both raw-request and input-schema capable.".to_string(),
        ));
    }

    let Some(first) = descriptor.first_parameter() else {
        let message = if descriptor.accepts_request_headers {
            format!(
                "run() needs to accept an argument other than \"{}\".",
                REQUEST_HEADERS_PARAM
            )
        } else {
            "run() needs to accept an argument for input data.".to_string()
        };
        return Err(ScriptError::Configuration(message));
    };

    let strategy = if descriptor.raw_request_capable {
        info!("run() is raw-request capable. Server will invoke it with the request object.");
        InputBindingStrategy::RawRequest {
            parameter_name: first.name.clone(),
        }
    } else if descriptor.schema_capable {
        let names: Vec<_> = descriptor.parameters.iter().map(|p| p.name.as_str()).collect();
        info!(
            "run() declares an input schema. Server will invoke it with the following arguments: {}.",
            names.join(", ")
        );
        InputBindingStrategy::SchemaObject {
            parameters: descriptor.parameters.clone(),
        }
    } else {
        info!("run() declares no input schema. Server will invoke it with the input in JSON string.");
        InputBindingStrategy::JsonString {
            parameter_name: first.name.clone(),
        }
    };

    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::RunOutput;
    use crate::script::RunFunction;
    use serde_json::{Value, json};

    fn descriptor(run: RunFunction) -> HandlerDescriptor {
        HandlerDescriptor::analyze("run", &run).unwrap()
    }

    fn noop() -> RunFunction {
        RunFunction::new(|_| Ok(RunOutput::from(Value::Null)))
    }

    #[test]
    fn test_conflicting_capabilities() {
        let d = descriptor(noop().param(ParamSpec::named("d")).raw_http().input_schema());
        let err = select(&d).unwrap_err();
        assert!(matches!(err, ScriptError::Configuration(_)));
        assert!(err.to_string().contains("cannot be declared both"));
    }

    #[test]
    fn test_conflict_reported_before_missing_parameters() {
        let d = descriptor(noop().raw_http().input_schema());
        assert!(select(&d).unwrap_err().to_string().contains("cannot be declared both"));
    }

    #[test]
    fn test_no_parameters() {
        let err = select(&descriptor(noop())).unwrap_err();
        assert_eq!(err.to_string(), "run() needs to accept an argument for input data.");

        let d = descriptor(noop().param(ParamSpec::named(REQUEST_HEADERS_PARAM)));
        assert_eq!(
            select(&d).unwrap_err().to_string(),
            "run() needs to accept an argument other than \"request_headers\"."
        );
    }

    #[test]
    fn test_raw_binds_first_non_header_param() {
        let d = descriptor(
            noop()
                .param(ParamSpec::named(REQUEST_HEADERS_PARAM))
                .param(ParamSpec::named("req"))
                .raw_http(),
        );
        let strategy = select(&d).unwrap();
        assert!(strategy.is_raw_request());
        assert_eq!(
            strategy,
            InputBindingStrategy::RawRequest {
                parameter_name: "req".into()
            }
        );
    }

    #[test]
    fn test_schema_binds_every_param() {
        let d = descriptor(
            noop()
                .param(ParamSpec::named("a"))
                .param(ParamSpec::named("b").with_default(json!(2)))
                .input_schema(),
        );
        match select(&d).unwrap() {
            InputBindingStrategy::SchemaObject { parameters } => {
                assert_eq!(parameters.len(), 2);
                assert_eq!(parameters[1].default, Some(json!(2)));
            }
            other => panic!("unexpected strategy {:?}", other),
        }
    }

    #[test]
    fn test_plain_handler_gets_json_string() {
        let d = descriptor(noop().param(ParamSpec::named("data")));
        let strategy = select(&d).unwrap();
        assert_eq!(strategy.name(), "json-string");
        assert!(!strategy.is_raw_request());
    }

    #[test]
    fn test_schema_binding_defaults_come_from_its_parameters() {
        let d = descriptor(
            noop()
                .param(ParamSpec::named("a"))
                .param(ParamSpec::named("b").with_default(json!(2)))
                .input_schema(),
        );
        let strategy = InputBindingStrategy::SchemaObject {
            parameters: vec![ParamSpec::named("a")],
        };
        let request = HttpRequest::new("GET", "/score?a=1");

        let args = strategy.bind(&d, request).unwrap();
        assert_eq!(args.json("a"), Some(&json!(1)));
        assert!(args.get("b").is_none());
    }

    #[test]
    fn test_defaults_fill_unbound_params() {
        let d = descriptor(
            noop()
                .param(ParamSpec::named("data"))
                .param(ParamSpec::named("threshold").with_default(json!(0.5)))
                .param(ParamSpec::named(REQUEST_HEADERS_PARAM)),
        );
        let strategy = select(&d).unwrap();
        let request = HttpRequest::new("POST", "/score")
            .with_header("X-Trace", "1")
            .with_body("hello");

        let args = strategy.bind(&d, request).unwrap();
        assert_eq!(args.text("data"), Some("hello"));
        assert_eq!(args.json("threshold"), Some(&json!(0.5)));
        assert_eq!(
            args.request_headers().and_then(|h| h.get("X-Trace")).map(String::as_str),
            Some("1")
        );
    }
}
