// Request routing

use crate::{Error, HttpRequest, HttpResponse};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A route handler function type
pub type HandlerFn = Arc<
    dyn Fn(HttpRequest) -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>
        + Send
        + Sync,
>;

/// Handler for requests no route accepted; receives the routing error.
pub type FallbackFn = Arc<
    dyn Fn(HttpRequest, Error) -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>
        + Send
        + Sync,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }
}

/// Route definition with handler
#[derive(Clone)]
pub struct Route {
    pub methods: Vec<HttpMethod>,
    pub path: String,
    pub handler: HandlerFn,
}

impl Route {
    fn accepts(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.as_str().eq_ignore_ascii_case(method))
    }
}

/// Dispatches requests by exact path, then by method.
///
/// A path that matches but with a method no route accepts yields
/// `MethodNotAllowed`; an unknown path yields `RouteNotFound`. Either is
/// handed to the fallback when one is set.
pub struct Router {
    pub routes: Vec<Route>,
    fallback: Option<FallbackFn>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: None,
        }
    }

    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Register an async handler for one or more methods on a path.
    pub fn on<F, Fut>(&mut self, methods: &[HttpMethod], path: &str, handler: F)
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |req| Box::pin(handler(req)));
        self.add_route(Route {
            methods: methods.to_vec(),
            path: path.to_string(),
            handler,
        });
    }

    /// Answer unmatched requests instead of failing with the routing error.
    pub fn fallback<F, Fut>(&mut self, handler: F)
    where
        F: Fn(HttpRequest, Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move |req, err| Box::pin(handler(req, err))));
    }

    pub async fn route(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let mut path_matched = false;

        for route in &self.routes {
            if !match_path(&route.path, &request.path) {
                continue;
            }
            path_matched = true;

            if route.accepts(&request.method) {
                return (route.handler)(request).await;
            }
        }

        let err = if path_matched {
            Error::MethodNotAllowed("Method not allowed".to_string())
        } else {
            Error::RouteNotFound(format!("{} {} not found", request.method, request.path))
        };

        match &self.fallback {
            Some(fallback) => fallback(request, err).await,
            None => Err(err),
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Segment-wise comparison; empty segments (leading, trailing or doubled
/// slashes) are ignored.
fn match_path(pattern: &str, path: &str) -> bool {
    let pattern_parts = pattern.split('/').filter(|s| !s.is_empty());
    let path_parts = path.split('/').filter(|s| !s.is_empty());
    pattern_parts.eq(path_parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_router() -> Router {
        let mut router = Router::new();
        router.on(&[HttpMethod::GET], "/", |_req| async {
            Ok(HttpResponse::ok().with_text("root"))
        });
        router.on(
            &[HttpMethod::GET, HttpMethod::POST],
            "/score",
            |req: HttpRequest| async move { Ok(HttpResponse::ok().with_text(req.method)) },
        );
        router
    }

    #[test]
    fn test_match_path() {
        assert!(match_path("/", "/"));
        assert!(match_path("/score", "/score"));
        assert!(match_path("/score", "/score/"));
        assert!(!match_path("/score", "/scores"));
        assert!(!match_path("/", "/score"));
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(HttpMethod::from_str("options"), Some(HttpMethod::OPTIONS));
        assert_eq!(HttpMethod::from_str("BREW"), None);
    }

    #[tokio::test]
    async fn test_dispatch_by_method() {
        let router = echo_router();
        let resp = router.route(HttpRequest::new("POST", "/score")).await.unwrap();
        assert_eq!(resp.text(), "POST");

        let resp = router.route(HttpRequest::new("GET", "/score?x=1")).await.unwrap();
        assert_eq!(resp.text(), "GET");
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let router = echo_router();
        let err = router.route(HttpRequest::new("PUT", "/score")).await.unwrap_err();
        assert!(matches!(err, Error::MethodNotAllowed(_)));
        assert_eq!(err.status_code(), 405);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let router = echo_router();
        let err = router.route(HttpRequest::new("GET", "/nope")).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_fallback_receives_misses() {
        let mut router = echo_router();
        router.fallback(|req: HttpRequest, err: Error| async move {
            Ok(HttpResponse::message(err.status_code(), format!("{} {}", req.method, err)))
        });

        let resp = router.route(HttpRequest::new("PUT", "/score")).await.unwrap();
        assert_eq!(resp.status, 405);
        assert!(resp.text().contains("PUT Method not allowed"));

        let resp = router.route(HttpRequest::new("GET", "/nope")).await.unwrap();
        assert_eq!(resp.status, 404);

        let resp = router.route(HttpRequest::new("GET", "/")).await.unwrap();
        assert_eq!(resp.text(), "root");
    }
}
