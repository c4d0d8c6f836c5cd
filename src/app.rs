//! The scoring application: one loaded script generation plus everything
//! a request needs to reach it.

use crate::error::StartupError;
use crate::request_ids::RequestIds;
use crate::telemetry::{self, Telemetry};
use parking_lot::RwLock;
use scorehost_config::ServerConfig;
use scorehost_core::binding::InputBindingStrategy;
use scorehost_core::input::{InputError, RunArgs};
use scorehost_core::invoke::{DeadlineInvoker, TimedResult};
use scorehost_core::response::{RunOutput, ScoreResponse, error_response, shape};
use scorehost_core::script::{HandlerLoader, ScriptError, UserScript};
use scorehost_core::{HttpRequest, HttpResponse};
use scorehost_openapi::SchemaRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info};

/// A loaded script and the schema documents derived from it. Replaced as a
/// whole on reload.
#[derive(Debug)]
pub struct ScriptState {
    pub generation: u64,
    pub script: UserScript,
    pub schemas: SchemaRegistry,
}

pub struct ScoringApp {
    config: ServerConfig,
    invoker: DeadlineInvoker,
    telemetry: Arc<dyn Telemetry>,
    state: RwLock<Arc<ScriptState>>,
    generation: AtomicU64,
}

impl ScoringApp {
    /// Wrap an already loaded (and initialised) script.
    pub fn new(config: ServerConfig, script: UserScript) -> Self {
        let telemetry = telemetry::telemetry_for(&config);
        let state = Arc::new(ScriptState {
            generation: 1,
            schemas: SchemaRegistry::from_config(&config, script.shared_descriptor()),
            script,
        });

        Self {
            invoker: DeadlineInvoker::from_millis(config.scoring_timeout_ms),
            config,
            telemetry,
            state: RwLock::new(state),
            generation: AtomicU64::new(1),
        }
    }

    /// Load the configured entry script and run its `init()`.
    pub fn start(config: ServerConfig) -> Result<Self, StartupError> {
        let script = load_and_init(&config)?;
        Ok(Self::new(config, script))
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &Arc<dyn Telemetry> {
        &self.telemetry
    }

    pub fn invoker(&self) -> DeadlineInvoker {
        self.invoker
    }

    /// Current script generation. Requests hold on to the generation they
    /// started with even if a reload happens meanwhile.
    pub fn state(&self) -> Arc<ScriptState> {
        self.state.read().clone()
    }

    /// Load and initialise the entry script again, then swap it in. The
    /// running generation keeps serving if anything fails.
    pub fn reload(&self) -> Result<u64, StartupError> {
        let script = load_and_init(&self.config)?;
        Ok(self.install(script))
    }

    /// Swap in a new script generation with a fresh schema cache.
    pub fn install(&self, script: UserScript) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let state = Arc::new(ScriptState {
            generation,
            schemas: SchemaRegistry::from_config(&self.config, script.shared_descriptor()),
            script,
        });

        *self.state.write() = state;
        info!(generation, "Installed scoring script generation");
        generation
    }

    /// Bind, invoke and shape one `/score` request.
    ///
    /// `OPTIONS` reaches `run()` only for raw-request handlers; everyone
    /// else gets an empty 200.
    pub async fn score(&self, request: HttpRequest, ids: &RequestIds) -> HttpResponse {
        let state = self.state();
        if request.method.eq_ignore_ascii_case("OPTIONS")
            && !state.script.strategy().is_raw_request()
        {
            return ScoreResponse::text("", 200).into_http();
        }

        let args = match state.script.bind(request) {
            Ok(args) => args,
            Err(InputError::BadInput(message)) => return error_response(400, message, false),
            Err(InputError::UnsupportedInput(message)) => {
                return error_response(415, message, false);
            }
            Err(InputError::UnsupportedMethod(_)) => {
                return error_response(405, "Method not allowed", false);
            }
        };

        match state.script.invoke_run(args, &self.invoker).await {
            Ok(timed) => {
                self.send_model_data(state.script.strategy(), ids, &timed);
                if matches!(timed.output, RunOutput::Response(_)) {
                    info!("run() output is HTTP Response");
                }
                shape(timed)
            }
            Err(err) => {
                telemetry::report(
                    self.telemetry
                        .send_exception(&ids.request_id, &ids.client_request_id, &err),
                    "exception",
                );
                match &err {
                    ScriptError::Timeout { .. } => debug!("Run function timeout caught"),
                    _ => debug!("Run function exception caught"),
                }
                error!(error = %err, cause = ?std::error::Error::source(&err), "Encountered Exception");
                error_response(500, err.client_message(), true)
            }
        }
    }

    /// `/swagger.json?version=V`
    pub fn swagger(&self, version: &str) -> HttpResponse {
        match self.state().schemas.get(version) {
            Ok(doc) => ScoreResponse::json(Value::clone(&doc), 200).into_http(),
            Err(err) => error_response(err.status_code(), err.to_string(), false),
        }
    }

    fn send_model_data(&self, strategy: &InputBindingStrategy, ids: &RequestIds, timed: &TimedResult) {
        let input = model_input(strategy, &timed.input);
        telemetry::report(
            self.telemetry.send_model_data(
                &ids.request_id,
                &ids.client_request_id,
                &input,
                &timed.output.to_json(),
            ),
            "model data",
        );
    }
}

/// Single-argument strategies report the bare argument; object binding
/// reports every bound parameter.
fn model_input(strategy: &InputBindingStrategy, args: &RunArgs) -> Value {
    match strategy {
        InputBindingStrategy::RawRequest { .. } | InputBindingStrategy::JsonString { .. } => args
            .iter()
            .next()
            .map(|(_, value)| value.to_json())
            .unwrap_or(Value::Null),
        InputBindingStrategy::SchemaObject { .. } => args.to_json(),
    }
}

fn load_and_init(config: &ServerConfig) -> Result<UserScript, StartupError> {
    let script = HandlerLoader::new(config.entry_script.clone())
        .load()
        .map_err(StartupError::Script)?;
    script.invoke_init().map_err(StartupError::Init)?;
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorehost_core::script::{HandlerLoader, ParamSpec, RunFunction, ScriptModule};
    use serde_json::json;

    fn script(run: RunFunction) -> UserScript {
        HandlerLoader::load_module(ScriptModule::new("inline").with_init(|| Ok(())).with_run(run))
            .unwrap()
    }

    #[test]
    fn test_model_input_shapes() {
        let mut args = RunArgs::new();
        args.push_json("data", json!({"a": 1}));
        args.push_json("extra", json!(2));

        let single = InputBindingStrategy::JsonString {
            parameter_name: "data".to_string(),
        };
        assert_eq!(model_input(&single, &args), json!({"a": 1}));

        let object = InputBindingStrategy::SchemaObject { parameters: vec![] };
        assert_eq!(model_input(&object, &args), json!({"data": {"a": 1}, "extra": 2}));
    }

    #[test]
    fn test_install_bumps_generation() {
        let first = script(RunFunction::new(|_| Ok(json!(1).into())).param(ParamSpec::named("data")));
        let app = ScoringApp::new(ServerConfig::default(), first);
        assert_eq!(app.state().generation, 1);

        let held = app.state();
        let second = script(
            RunFunction::new(|_| Ok(json!(2).into()))
                .input_schema()
                .param(ParamSpec::named("num")),
        );
        assert_eq!(app.install(second), 2);

        assert_eq!(held.generation, 1);
        assert!(app.state().script.descriptor().schema_capable);
    }
}
