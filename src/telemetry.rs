//! Telemetry collaborator.
//!
//! The server reports each request, each successful prediction and each
//! handler failure through a [`Telemetry`] implementation. Reporting is
//! best effort: a failing collaborator is logged and never fails the request.

use chrono::{DateTime, SecondsFormat, Utc};
use scorehost_config::ServerConfig;
use scorehost_core::BoxError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// `tracing` target for telemetry events.
pub const TELEMETRY_TARGET: &str = "scorehost::telemetry";

const NON_TEXT_RESPONSE: &str =
    "Scoring request response payload is a non serializable object or raw binary";

/// One finished request.
#[derive(Debug, Clone)]
pub struct RequestRecord<'a> {
    pub request_id: &'a str,
    pub client_request_id: &'a str,
    pub method: &'a str,
    pub path: &'a str,
    /// Path plus query string, when there is one.
    pub url: &'a str,
    pub status: u16,
    pub start: DateTime<Utc>,
    pub duration_ms: f64,
    pub response_body: &'a [u8],
}

pub trait Telemetry: Send + Sync {
    fn log_request(&self, record: &RequestRecord<'_>) -> Result<(), BoxError>;

    /// Input and prediction of a successful `run()`.
    fn send_model_data(
        &self,
        request_id: &str,
        client_request_id: &str,
        input: &Value,
        prediction: &Value,
    ) -> Result<(), BoxError>;

    fn send_exception(
        &self,
        request_id: &str,
        client_request_id: &str,
        error: &(dyn std::error::Error + 'static),
    ) -> Result<(), BoxError>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn log_request(&self, _record: &RequestRecord<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    fn send_model_data(&self, _: &str, _: &str, _: &Value, _: &Value) -> Result<(), BoxError> {
        Ok(())
    }

    fn send_exception(
        &self,
        _: &str,
        _: &str,
        _: &(dyn std::error::Error + 'static),
    ) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Writes structured events on [`TELEMETRY_TARGET`] for a log shipper to
/// pick up.
#[derive(Debug, Clone)]
pub struct TracingTelemetry {
    container_id: String,
    workspace_name: String,
    service_name: String,
    log_response: bool,
    model_data_collection: bool,
}

impl TracingTelemetry {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            container_id: config.hostname.clone(),
            workspace_name: config.workspace_name.clone(),
            service_name: config.service_name.clone(),
            log_response: config.log_response_enabled,
            model_data_collection: config.model_data_collection_enabled,
        }
    }
}

impl Telemetry for TracingTelemetry {
    fn log_request(&self, record: &RequestRecord<'_>) -> Result<(), BoxError> {
        let response_value = if self.log_response {
            let text = std::str::from_utf8(record.response_body).unwrap_or(NON_TEXT_RESPONSE);
            Some(serde_json::to_string(text)?)
        } else {
            None
        };

        info!(
            target: TELEMETRY_TARGET,
            event = "request",
            container_id = %self.container_id,
            request_id = %record.request_id,
            client_request_id = %record.client_request_id,
            name = %record.path,
            url = %record.url,
            http_method = %record.method,
            start_time = %record.start.to_rfc3339_opts(SecondsFormat::Micros, true),
            duration = %format_duration(record.duration_ms),
            result_code = %record.status,
            success = record.status < 400,
            workspace_name = %self.workspace_name,
            service_name = %self.service_name,
            response_value = response_value.as_deref(),
            "request"
        );
        Ok(())
    }

    fn send_model_data(
        &self,
        request_id: &str,
        client_request_id: &str,
        input: &Value,
        prediction: &Value,
    ) -> Result<(), BoxError> {
        if !self.model_data_collection {
            return Ok(());
        }
        let input = serde_json::to_string(input)?;
        let prediction = serde_json::to_string(prediction)?;

        info!(
            target: TELEMETRY_TARGET,
            event = "model_data_collection",
            id = %Uuid::new_v4(),
            container_id = %self.container_id,
            request_id = %request_id,
            client_request_id = %client_request_id,
            workspace_name = %self.workspace_name,
            service_name = %self.service_name,
            input = %input,
            prediction = %prediction,
            "model_data_collection"
        );
        Ok(())
    }

    fn send_exception(
        &self,
        request_id: &str,
        client_request_id: &str,
        error: &(dyn std::error::Error + 'static),
    ) -> Result<(), BoxError> {
        error!(
            target: TELEMETRY_TARGET,
            event = "exception",
            container_id = %self.container_id,
            request_id = %request_id,
            client_request_id = %client_request_id,
            causes = %error_chain(error),
            "{}",
            error
        );
        Ok(())
    }
}

/// The collaborator the configuration asks for.
pub fn telemetry_for(config: &ServerConfig) -> Arc<dyn Telemetry> {
    if config.telemetry_enabled {
        Arc::new(TracingTelemetry::from_config(config))
    } else {
        Arc::new(NoopTelemetry)
    }
}

/// Log and drop a collaborator failure.
pub(crate) fn report(result: Result<(), BoxError>, what: &str) {
    if let Err(err) = result {
        warn!(error = %err, "Error sending {} telemetry", what);
    }
}

/// `[d.]hh:mm:ss.fff`
pub fn format_duration(duration_ms: f64) -> String {
    let mut remaining = if duration_ms.is_finite() && duration_ms > 0.0 {
        duration_ms as u64
    } else {
        0
    };

    let mut parts = [0u64; 4];
    for (slot, unit) in parts.iter_mut().rev().zip([1000u64, 60, 60, 24]) {
        *slot = remaining % unit;
        remaining /= unit;
    }

    let formatted = format!(
        "{:02}:{:02}:{:02}.{:03}",
        parts[0], parts[1], parts[2], parts[3]
    );
    if remaining > 0 {
        format!("{}.{}", remaining, formatted)
    } else {
        formatted
    }
}

pub(crate) fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    causes.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00:00.000");
        assert_eq!(format_duration(12.9), "00:00:00.012");
        assert_eq!(format_duration(3_723_004.5), "01:02:03.004");
        assert_eq!(format_duration(90_000_000.0), "1.01:00:00.000");
        assert_eq!(format_duration(-5.0), "00:00:00.000");
    }

    #[test]
    fn test_error_chain() {
        let inner: BoxError = "disk on fire".into();
        let err = scorehost_core::script::ScriptError::exception(inner);

        assert_eq!(error_chain(&err), "disk on fire");
    }

    #[test]
    fn test_disabled_config_uses_noop() {
        let config = ServerConfig::default();
        let telemetry = telemetry_for(&config);

        assert!(telemetry.send_model_data("r", "c", &Value::Null, &Value::Null).is_ok());
    }

    #[test]
    fn test_tracing_telemetry_accepts_binary_bodies() {
        let mut config = ServerConfig::default();
        config.telemetry_enabled = true;
        config.model_data_collection_enabled = true;
        let telemetry = TracingTelemetry::from_config(&config);

        let record = RequestRecord {
            request_id: "r",
            client_request_id: "c",
            method: "POST",
            path: "/score",
            url: "/score?x=1",
            status: 200,
            start: Utc::now(),
            duration_ms: 1.5,
            response_body: &[0xff, 0xfe],
        };
        assert!(telemetry.log_request(&record).is_ok());
        assert!(telemetry
            .send_model_data("r", "c", &serde_json::json!({"a": 1}), &serde_json::json!(2))
            .is_ok());
    }
}
