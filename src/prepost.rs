//! Pre/post-processing pipeline in front of a separate model server.
//!
//! A request body goes through [`ModelHandler::preprocess`], the result is
//! sent to a [`ModelServerClient`], and the model server's reply is turned
//! into the HTTP response by [`ModelHandler::postprocess`]. The transport to
//! the model server is left to the client implementation.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use scorehost::prepost::*;
//! use scorehost::{Application, BoxError};
//! use serde_json::{Value, json};
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! impl ModelHandler for Echo {
//!     fn preprocess(&self, body: &[u8], _ctx: &mut PrePostContext) -> Result<Value, BoxError> {
//!         Ok(serde_json::from_slice(body)?)
//!     }
//!
//!     fn postprocess(&self, data: Value, _ctx: &PrePostContext) -> Result<ProcessedOutput, BoxError> {
//!         Ok(ProcessedOutput::Json(data))
//!     }
//! }
//!
//! struct Loopback;
//!
//! #[async_trait]
//! impl ModelServerClient for Loopback {
//!     async fn infer(&self, input: Value) -> Result<Value, BoxError> {
//!         Ok(json!({ "outputs": input }))
//!     }
//! }
//!
//! # async fn serve() -> Result<(), scorehost::Error> {
//! let pipeline = Arc::new(PrePostPipeline::new(Arc::new(Echo), Arc::new(Loopback)));
//! Application::new(pipeline.router()).listen(5001).await
//! # }
//! ```

use async_trait::async_trait;
use scorehost_core::{BoxError, HttpMethod, HttpRequest, HttpResponse, Router};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const PREPROCESS_TIME_HEADER: &str = "x-ms-preproc-exec-ms";
pub const INFERENCE_TIME_HEADER: &str = "x-ms-infr-exec-ms";
pub const POSTPROCESS_TIME_HEADER: &str = "x-ms-postproc-exec-ms";

/// Request headers copied into [`PrePostContext::headers`].
const CONTEXT_HEADERS: [&str; 5] = [
    "content-type",
    "content-length",
    "accept",
    "x-ms-request-id",
    "x-ms-custom",
];

const READY_STATUS: &str = "OK. Ready to serve requests.";
const GENERIC_FAILURE: &str =
    "An unexpected error occurred in the pre/post-processing pipeline. Check the logs for more info.";

/// Request details handed to the user's handler.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PrePostContext {
    pub method: String,
    pub url: String,
    pub query_string: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    /// Set by `preprocess` to answer without calling the model server.
    pub skip_inference: bool,
}

impl PrePostContext {
    pub fn from_request(request: &HttpRequest) -> Self {
        let url = if request.query_string.is_empty() {
            request.path.clone()
        } else {
            format!("{}?{}", request.path, request.query_string)
        };
        let headers = CONTEXT_HEADERS
            .iter()
            .map(|name| {
                let value = request.header(name).unwrap_or_default();
                (name.to_string(), value.to_string())
            })
            .collect();

        Self {
            method: request.method.clone(),
            url,
            query_string: request.query_string.clone(),
            path: request.path.clone(),
            headers,
            skip_inference: false,
        }
    }
}

/// What `postprocess` produced, and how it goes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedOutput {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
    Other { content_type: String, body: Vec<u8> },
}

impl ProcessedOutput {
    pub fn content_type(&self) -> &str {
        match self {
            Self::Json(_) => "application/json",
            Self::Text(_) => "text/plain",
            Self::Bytes(_) => "application/octet-stream",
            Self::Other { content_type, .. } => content_type,
        }
    }

    fn into_response(self) -> HttpResponse {
        debug!("Returning response with content-type: {}", self.content_type());
        match self {
            Self::Json(value) => {
                let mut response = HttpResponse::ok().with_body(value.to_string().into_bytes());
                response.headers.set_content_type("application/json");
                response
            }
            Self::Text(text) => HttpResponse::ok().with_text(text),
            Self::Bytes(body) => {
                let mut response = HttpResponse::ok().with_body(body);
                response.headers.set_content_type("application/octet-stream");
                response
            }
            Self::Other { content_type, body } => {
                warn!("Unfamiliar content-type: {}", content_type);
                let mut response = HttpResponse::ok().with_body(body);
                response.headers.set_content_type(content_type);
                response
            }
        }
    }
}

/// User code on either side of the model server.
pub trait ModelHandler: Send + Sync + 'static {
    /// Turn the raw request body into the model server's input.
    fn preprocess(&self, body: &[u8], ctx: &mut PrePostContext) -> Result<Value, BoxError>;

    /// Turn the model server's reply into the response. Receives an empty
    /// object when inference was skipped.
    fn postprocess(&self, data: Value, ctx: &PrePostContext) -> Result<ProcessedOutput, BoxError>;
}

/// Transport to the model server.
#[async_trait]
pub trait ModelServerClient: Send + Sync + 'static {
    async fn infer(&self, input: Value) -> Result<Value, BoxError>;
}

#[derive(Debug, Error)]
pub enum PrePostError {
    #[error("preprocess failed: {0}")]
    Preprocess(#[source] BoxError),

    #[error("inference request failed: {0}")]
    Inference(#[source] BoxError),

    #[error("postprocess failed: {0}")]
    Postprocess(#[source] BoxError),
}

/// Stage timings in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTimings {
    pub preprocess_ms: f64,
    pub inference_ms: f64,
    pub postprocess_ms: f64,
}

impl StageTimings {
    fn apply(&self, response: &mut HttpResponse) {
        response.headers.insert(PREPROCESS_TIME_HEADER, format!("{:.3}", self.preprocess_ms));
        response.headers.insert(INFERENCE_TIME_HEADER, format!("{:.3}", self.inference_ms));
        response.headers.insert(POSTPROCESS_TIME_HEADER, format!("{:.3}", self.postprocess_ms));
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

pub struct PrePostPipeline {
    handler: Arc<dyn ModelHandler>,
    client: Arc<dyn ModelServerClient>,
}

impl PrePostPipeline {
    pub fn new(handler: Arc<dyn ModelHandler>, client: Arc<dyn ModelServerClient>) -> Self {
        Self { handler, client }
    }

    /// Run the three stages for one request.
    pub async fn process(
        &self,
        request: &HttpRequest,
    ) -> Result<(ProcessedOutput, StageTimings), PrePostError> {
        let mut ctx = PrePostContext::from_request(request);
        debug!(context = ?ctx, "Request context");
        let mut timings = StageTimings::default();

        debug!("Invoking user's preprocessing");
        let started = Instant::now();
        let input = self
            .handler
            .preprocess(&request.body, &mut ctx)
            .map_err(PrePostError::Preprocess)?;
        timings.preprocess_ms = elapsed_ms(started);

        let mut reply = json!({});
        if !ctx.skip_inference {
            let started = Instant::now();
            reply = self.client.infer(input).await.map_err(PrePostError::Inference)?;
            timings.inference_ms = elapsed_ms(started);
        }

        debug!("Invoking user's postprocessing");
        let started = Instant::now();
        let output = self
            .handler
            .postprocess(reply, &ctx)
            .map_err(PrePostError::Postprocess)?;
        timings.postprocess_ms = elapsed_ms(started);

        Ok((output, timings))
    }

    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        info!("Received {} request at route {}.", request.method, request.path);
        match self.process(&request).await {
            Ok((output, timings)) => {
                let mut response = output.into_response();
                timings.apply(&mut response);
                response
            }
            Err(err) => {
                error!(error = %err, "Pre/post-processing pipeline failed");
                HttpResponse::message(500, GENERIC_FAILURE)
            }
        }
    }

    /// `GET /` reports readiness, `POST|OPTIONS /score` runs the pipeline.
    pub fn router(self: Arc<Self>) -> Router {
        let mut router = Router::new();

        router.on(&[HttpMethod::GET], "/", |_request| async {
            HttpResponse::ok().with_json(&json!({ "Status": READY_STATUS }))
        });

        router.on(&[HttpMethod::POST, HttpMethod::OPTIONS], "/score", move |request| {
            let pipeline = Arc::clone(&self);
            async move { Ok(pipeline.handle(request).await) }
        });

        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Doubler;

    impl ModelHandler for Doubler {
        fn preprocess(&self, body: &[u8], ctx: &mut PrePostContext) -> Result<Value, BoxError> {
            if body == b"skip" {
                ctx.skip_inference = true;
                return Ok(Value::Null);
            }
            Ok(serde_json::from_slice(body)?)
        }

        fn postprocess(&self, data: Value, ctx: &PrePostContext) -> Result<ProcessedOutput, BoxError> {
            if ctx.headers.get("accept").map(String::as_str) == Some("text/plain") {
                return Ok(ProcessedOutput::Text(data.to_string()));
            }
            Ok(ProcessedOutput::Json(data))
        }
    }

    #[derive(Default)]
    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelServerClient for CountingClient {
        async fn infer(&self, input: Value) -> Result<Value, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = input["n"].as_i64().ok_or("missing n")?;
            Ok(json!({ "n": n * 2 }))
        }
    }

    fn pipeline(client: Arc<CountingClient>) -> PrePostPipeline {
        PrePostPipeline::new(Arc::new(Doubler), client)
    }

    #[tokio::test]
    async fn test_pipeline_runs_all_stages() {
        let client = Arc::new(CountingClient::default());
        let request = HttpRequest::new("POST", "/score").with_body(br#"{"n": 21}"#.to_vec());

        let response = pipeline(Arc::clone(&client)).handle(request).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), r#"{"n":42}"#);
        assert_eq!(response.headers.content_type(), Some("application/json"));
        assert!(response.headers.contains(PREPROCESS_TIME_HEADER));
        assert!(response.headers.contains(INFERENCE_TIME_HEADER));
        assert!(response.headers.contains(POSTPROCESS_TIME_HEADER));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_skip_inference() {
        let client = Arc::new(CountingClient::default());
        let request = HttpRequest::new("POST", "/score").with_body(b"skip".to_vec());

        let response = pipeline(Arc::clone(&client)).handle(request).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "{}");
        assert_eq!(response.headers.get(INFERENCE_TIME_HEADER), Some("0.000"));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_context_headers_reach_handler() {
        let client = Arc::new(CountingClient::default());
        let request = HttpRequest::new("POST", "/score?verbose=1")
            .with_header("Accept", "text/plain")
            .with_body(br#"{"n": 1}"#.to_vec());

        let ctx = PrePostContext::from_request(&request);
        assert_eq!(ctx.url, "/score?verbose=1");
        assert_eq!(ctx.headers["x-ms-custom"], "");

        let response = pipeline(client).handle(request).await;
        assert_eq!(response.text(), r#"{"n":2}"#);
        assert_eq!(response.headers.content_type(), Some("text/plain; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_stage_failure_is_500() {
        let client = Arc::new(CountingClient::default());
        let request = HttpRequest::new("POST", "/score").with_body(b"not json".to_vec());

        let response = pipeline(client).handle(request).await;

        assert_eq!(response.status, 500);
        assert!(response.text().contains("pre/post-processing pipeline"));
    }

    #[tokio::test]
    async fn test_inference_failure_is_reported() {
        let client = Arc::new(CountingClient::default());
        let request = HttpRequest::new("POST", "/score").with_body(br#"{"m": 1}"#.to_vec());

        let err = pipeline(client).process(&request).await.unwrap_err();
        assert!(matches!(err, PrePostError::Inference(_)));
    }

    #[test]
    fn test_other_content_type() {
        let output = ProcessedOutput::Other {
            content_type: "image/png".into(),
            body: vec![1, 2, 3],
        };
        assert_eq!(output.content_type(), "image/png");
        let response = output.into_response();
        assert_eq!(response.body, vec![1, 2, 3]);
        assert_eq!(response.headers.content_type(), Some("image/png"));
    }
}
