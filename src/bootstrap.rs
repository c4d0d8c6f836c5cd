//! Process startup: configuration, logging, script loading, serving.

use crate::app::ScoringApp;
use crate::error::StartupError;
use crate::routes;
use crate::telemetry::{self, Telemetry};
use scorehost_config::ServerConfig;
use scorehost_core::Application;
use scorehost_core::diagnostics::{FILE_TREE_LINE_LIMIT, model_dir_listing};
use scorehost_log::{LogConfig, LogError, LogLevel, WorkerGuard};
use std::sync::Arc;
use tracing::{error, info};

/// Run the server and exit the process when it stops.
///
/// Deployment problems (bad configuration, missing or failing scoring
/// script) exit with status 3, everything else with 1.
pub async fn serve() {
    if let Err(err) = run().await {
        error!(error = %err, "Server stopped");
        eprintln!("{err}");
        std::process::exit(err.exit_code());
    }
}

/// Load everything and serve until the listener fails.
pub async fn run() -> Result<(), StartupError> {
    let config = ServerConfig::load()?;
    let _guard = init_logging(&config)?;
    log_startup(&config);

    let app = match ScoringApp::start(config.clone()) {
        Ok(app) => Arc::new(app),
        Err(err) => {
            report_startup_failure(&config, &err);
            return Err(err);
        }
    };

    info!("Scoring timeout is set to {}", config.scoring_timeout_ms);
    info!("Worker with pid {} ready for serving traffic", std::process::id());

    Application::new(routes::router(app)).listen(config.port).await?;
    Ok(())
}

/// Install the global subscriber at the configured level. A subscriber that
/// is already installed is kept.
fn init_logging(config: &ServerConfig) -> Result<Option<WorkerGuard>, StartupError> {
    let level: LogLevel = config.log_level.parse()?;
    match LogConfig::from_env().level(level).init() {
        Ok(guard) => Ok(Some(guard)),
        Err(LogError::AlreadyInitialized) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn log_startup(config: &ServerConfig) {
    info!("Starting scoring server {}", config.server_version);
    info!(
        entry_script = config.entry_script.as_deref().unwrap_or("<registered>"),
        app_root = %config.app_root.display(),
        source_dir = ?config.source_dir,
        model_dir = ?config.model_dir,
        port = config.port,
        "Server configuration"
    );
    if !config.service_name.is_empty() {
        info!(
            service = %config.service_name,
            version = %config.service_version,
            workspace = %config.workspace_name,
            "Serving model"
        );
    }
}

/// Log what went wrong with the script, and for `init()` failures, what
/// the model directory looked like.
fn report_startup_failure(config: &ServerConfig, err: &StartupError) {
    let StartupError::Init(cause) = err else {
        error!(error = %err, "Failed to load the scoring script");
        return;
    };

    error!(
        error = %cause,
        causes = %telemetry::error_chain(cause),
        "User's init function failed"
    );
    let sink = telemetry::telemetry_for(config);
    telemetry::report(sink.send_exception("", "", cause), "exception");

    if let Some(model_dir) = config.model_dir.as_deref().filter(|dir| dir.exists()) {
        error!("Model Directory Contents:");
        for line in model_dir_listing(model_dir, FILE_TREE_LINE_LIMIT) {
            error!("{}", line);
        }
    }
}
