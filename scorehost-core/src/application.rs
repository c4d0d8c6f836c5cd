// HTTP server

use crate::{Error, HttpRequest, HttpResponse, Router};
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Serves a `Router` over HTTP/1.1.
pub struct Application {
    pub router: Arc<Router>,
}

impl Application {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    /// Bind `0.0.0.0:port` and serve until the listener fails.
    pub async fn listen(self, port: u16) -> Result<(), Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;

        info!(%addr, "Listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let router = self.router.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let router = router.clone();
                    async move { handle_request(req, router).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(%peer, error = %err, "Error serving connection");
                }
            });
        }
    }
}

/// Route a request and turn any error into a `{"message"}` response.
pub async fn dispatch(router: &Router, request: HttpRequest) -> HttpResponse {
    let method = request.method.clone();
    let target = if request.query_string.is_empty() {
        request.path.clone()
    } else {
        format!("{}?{}", request.path, request.query_string)
    };
    let started = Instant::now();

    let response = match router.route(request).await {
        Ok(resp) => resp,
        Err(err) => {
            if err.is_server_error() {
                error!(error = %err, "Request failed");
            }
            HttpResponse::from(err)
        }
    };

    info!(
        target: "scorehost::access",
        "{} {} {} {:.3}ms {}",
        method,
        target,
        response.status,
        started.elapsed().as_secs_f64() * 1000.0,
        response.body.len()
    );

    response
}

async fn handle_request(
    req: Request<IncomingBody>,
    router: Arc<Router>,
) -> Result<Response<Full<bytes::Bytes>>, hyper::Error> {
    let mut request = HttpRequest::new(req.method().as_str(), "");
    request.path = req.uri().path().to_string();
    request.query_string = req.uri().query().unwrap_or_default().to_string();

    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.headers.append(name.as_str(), value);
        }
    }

    request.body = req.collect().await?.to_bytes();

    let response = dispatch(&router, request).await;
    Ok(into_hyper(response))
}

fn into_hyper(response: HttpResponse) -> Response<Full<bytes::Bytes>> {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in response.headers {
        builder = builder.header(name, value);
    }

    match builder.body(Full::new(bytes::Bytes::from(response.body))) {
        Ok(resp) => resp,
        Err(err) => {
            error!(error = %err, "Handler produced an invalid response");
            let fallback = HttpResponse::message(500, "Invalid response produced by the server");
            let mut resp = Response::new(Full::new(bytes::Bytes::from(fallback.body)));
            *resp.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            resp
        }
    }
}
