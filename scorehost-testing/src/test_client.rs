// Test HTTP client

use scorehost_core::{HttpMethod, HttpRequest, HttpResponse, Router, dispatch};
use serde::Serialize;
use std::sync::Arc;

/// Routes requests through a [`Router`] in-process, the same way the
/// hyper front end does, without opening a socket.
#[derive(Clone)]
pub struct TestClient {
    router: Arc<Router>,
}

impl TestClient {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    pub async fn get(&self, target: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::GET, target))
            .await
    }

    pub async fn post(&self, target: &str, body: impl Into<Vec<u8>>) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::POST, target).body(body))
            .await
    }

    /// POST with a JSON body and `Content-Type: application/json`.
    pub async fn post_json<T: Serialize>(&self, target: &str, data: &T) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::POST, target).json(data))
            .await
    }

    pub async fn options(&self, target: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::OPTIONS, target))
            .await
    }

    /// Send a request built with [`TestRequestBuilder`].
    pub async fn send(&self, builder: TestRequestBuilder) -> TestResponse {
        self.request(builder.build()).await
    }

    pub async fn request(&self, request: HttpRequest) -> TestResponse {
        TestResponse::new(dispatch(&self.router, request).await)
    }
}

/// Builder for test requests
pub struct TestRequestBuilder {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    query_params: Vec<(String, String)>,
}

impl TestRequestBuilder {
    pub fn new(method: HttpMethod, target: &str) -> Self {
        Self::with_method(method.as_str(), target)
    }

    /// Any method name, including ones the router does not know.
    pub fn with_method(method: &str, target: &str) -> Self {
        Self {
            method: method.to_string(),
            target: target.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            query_params: Vec::new(),
        }
    }

    /// Add a header. Repeated names are kept as separate entries.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and its content type.
    pub fn json<T: Serialize>(mut self, data: &T) -> Self {
        self.body = serde_json::to_vec(data).unwrap_or_default();
        self.header("Content-Type", "application/json")
    }

    /// Add a query parameter; it is URL-encoded and appended to any query
    /// already present in the target.
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query_params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> HttpRequest {
        let mut target = self.target;
        if !self.query_params.is_empty() {
            let encoded = serde_urlencoded::to_string(&self.query_params).unwrap_or_default();
            target.push(if target.contains('?') { '&' } else { '?' });
            target.push_str(&encoded);
        }

        let mut request = HttpRequest::new(self.method, &target).with_body(self.body);
        for (name, value) in self.headers {
            request = request.with_header(name, value);
        }
        request
    }
}

/// Response from a test request
#[derive(Debug, Clone)]
pub struct TestResponse {
    inner: HttpResponse,
}

impl TestResponse {
    pub fn new(inner: HttpResponse) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> u16 {
        self.inner.status
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.inner.headers.get(key)
    }

    /// Every value of a header, in order.
    pub fn header_all(&self, key: &str) -> Vec<&str> {
        self.inner.headers.get_all(key)
    }

    pub fn text(&self) -> String {
        self.inner.text()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.inner.body
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.inner.body)
    }

    /// The `message` field of a `{"message": ...}` error body.
    pub fn message(&self) -> Option<String> {
        self.json::<serde_json::Value>()
            .ok()?
            .get("message")?
            .as_str()
            .map(str::to_string)
    }

    pub fn into_inner(self) -> HttpResponse {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorehost_core::Error;

    fn router() -> Arc<Router> {
        let mut router = Router::new();
        router.on(&[HttpMethod::GET, HttpMethod::POST], "/echo", |req| async move {
            Ok(HttpResponse::ok()
                .with_header("X-Query", req.query_string.clone())
                .with_header("X-Method", req.method.clone())
                .with_body(req.body.to_vec()))
        });
        router.on(&[HttpMethod::GET], "/fail", |_req| async move {
            Err(Error::BadRequest("nope".to_string()))
        });
        Arc::new(router)
    }

    #[test]
    fn test_request_builder() {
        let req = TestRequestBuilder::new(HttpMethod::GET, "/score?a=1")
            .header("Authorization", "Bearer token")
            .header("X-Multi", "1")
            .header("x-multi", "2")
            .query("b", "x y")
            .build();

        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/score");
        assert_eq!(req.query_string, "a=1&b=x+y");
        assert_eq!(req.header("authorization"), Some("Bearer token"));
        assert_eq!(req.headers.get_all("X-MULTI"), vec!["1", "2"]);
    }

    #[test]
    fn test_json_builder_sets_content_type() {
        let req = TestRequestBuilder::new(HttpMethod::POST, "/score")
            .json(&serde_json::json!({"a": 1}))
            .build();

        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(&req.body[..], br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_client_round_trip() {
        let client = TestClient::new(router());

        let resp = client.post("/echo?x=1", "payload").await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text(), "payload");
        assert_eq!(resp.header("x-query"), Some("x=1"));
        assert_eq!(resp.header("X-Method"), Some("POST"));
    }

    #[tokio::test]
    async fn test_errors_become_message_bodies() {
        let client = TestClient::new(router());

        let resp = client.get("/fail").await;
        assert_eq!(resp.status(), 400);
        assert_eq!(resp.message().as_deref(), Some("nope"));

        let resp = client.get("/missing").await;
        assert_eq!(resp.status(), 404);
    }
}
