//! Scorehost - an HTTP host for user-written scoring functions.
//!
//! A scoring script exposes `init()` and `run(...)`. The server loads it at
//! startup, calls `init()` once, and then answers:
//!
//! - `GET /` with a liveness message
//! - `GET|POST|OPTIONS /score` by binding the request onto `run(...)`
//! - `GET /swagger.json?version=` with a generated or overridden document
//!
//! Scripts are compiled into the server binary and registered by name:
//!
//! ```no_run
//! use scorehost::BoxError;
//! use scorehost::script::{ParamSpec, RunFunction, ScriptModule};
//! use serde_json::json;
//!
//! fn score() -> Result<ScriptModule, BoxError> {
//!     let run = RunFunction::new(|args| Ok(json!({ "echo": args.to_json() }).into()))
//!         .param(ParamSpec::named("data"));
//!     Ok(ScriptModule::new("score.rs").with_init(|| Ok(())).with_run(run))
//! }
//!
//! scorehost::register_script!("score.rs", score);
//!
//! #[tokio::main]
//! async fn main() {
//!     scorehost::serve().await;
//! }
//! ```

pub mod app;
pub mod bootstrap;
pub mod error;
pub mod prepost;
pub mod request_ids;
pub mod routes;
pub mod telemetry;

pub use scorehost_core::*;

pub use app::{ScoringApp, ScriptState};
pub use bootstrap::{run, serve};
pub use error::StartupError;
pub use request_ids::RequestIds;
pub use routes::router;
pub use telemetry::{NoopTelemetry, RequestRecord, Telemetry, TracingTelemetry};

pub use scorehost_config as config;
pub use scorehost_log as log;
pub use scorehost_openapi as openapi;

#[cfg(feature = "testing")]
pub use scorehost_testing as testing;

/// Common imports for writing and hosting a scoring script.
pub mod prelude {
    pub use crate::config::ServerConfig;
    pub use crate::response::{RunOutput, ScoreResponse};
    pub use crate::script::{ParamSpec, RunFunction, ScriptModule};
    pub use crate::{
        Application, Error, HttpMethod, HttpRequest, HttpResponse, Router, ScoringApp,
        register_script, router, serve,
    };
}
