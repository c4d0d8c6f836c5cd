//! HTTP surface of the scoring server.
//!
//! | Path            | Methods             |
//! |-----------------|---------------------|
//! | `/`             | GET                 |
//! | `/score`        | GET, POST, OPTIONS  |
//! | `/swagger.json` | GET                 |

use crate::app::ScoringApp;
use crate::request_ids::RequestIds;
use crate::telemetry::{self, RequestRecord};
use chrono::Utc;
use scorehost_core::response::error_response;
use scorehost_core::{HttpMethod, HttpRequest, HttpResponse, Router};
use scorehost_openapi::DEFAULT_VERSION;
use std::sync::Arc;
use std::time::Instant;

pub const HEALTH_RESPONSE: &str = "Healthy";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    Health,
    Score,
    Swagger,
    /// No route accepted the request.
    Unmatched { status: u16, message: String },
}

/// Routes for `app`.
pub fn router(app: Arc<ScoringApp>) -> Router {
    let mut router = Router::new();

    let routes: [(&[HttpMethod], &str, Endpoint); 3] = [
        (&[HttpMethod::GET], "/", Endpoint::Health),
        (
            &[HttpMethod::GET, HttpMethod::POST, HttpMethod::OPTIONS],
            "/score",
            Endpoint::Score,
        ),
        (&[HttpMethod::GET], "/swagger.json", Endpoint::Swagger),
    ];

    for (methods, path, endpoint) in routes {
        let app = Arc::clone(&app);
        router.on(methods, path, move |request| {
            let app = Arc::clone(&app);
            let endpoint = endpoint.clone();
            async move { Ok(respond(&app, request, endpoint).await) }
        });
    }

    router.fallback(move |request, err| {
        let app = Arc::clone(&app);
        let endpoint = Endpoint::Unmatched {
            status: err.status_code(),
            message: err.to_string(),
        };
        async move { Ok(respond(&app, request, endpoint).await) }
    });

    router
}

/// Assign request ids, run the endpoint, then echo the ids and report the
/// request. A rejected id short-circuits with 431. Requests to `/` are not
/// reported.
async fn respond(app: &ScoringApp, request: HttpRequest, endpoint: Endpoint) -> HttpResponse {
    let start = Utc::now();
    let started = Instant::now();
    let method = request.method.clone();
    let path = request.path.clone();
    let url = if request.query_string.is_empty() {
        path.clone()
    } else {
        format!("{}?{}", request.path, request.query_string)
    };

    let (ids, mut response) = match RequestIds::from_request(&request) {
        Ok(ids) => {
            let response = match endpoint {
                Endpoint::Health => HttpResponse::ok().with_text(HEALTH_RESPONSE),
                Endpoint::Swagger => {
                    let version = request
                        .query("version")
                        .unwrap_or_else(|| DEFAULT_VERSION.to_string());
                    app.swagger(&version)
                }
                Endpoint::Score => app.score(request, &ids).await,
                Endpoint::Unmatched { status, message } => error_response(status, message, false),
            };
            (ids, response)
        }
        Err(rejected) => (rejected.ids, error_response(431, rejected.message, false)),
    };

    ids.apply(&mut response, &app.config().server_version);

    if path != "/" {
        let record = RequestRecord {
            request_id: &ids.request_id,
            client_request_id: &ids.client_request_id,
            method: &method,
            path: &path,
            url: &url,
            status: response.status,
            start,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            response_body: &response.body,
        };
        telemetry::report(app.telemetry().log_request(&record), "request");
    }

    response
}
