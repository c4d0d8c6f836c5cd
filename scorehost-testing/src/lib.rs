//! Testing utilities for scorehost routers.
//!
//! ```no_run
//! use scorehost_core::{HttpMethod, HttpResponse, Router};
//! use scorehost_testing::*;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let mut router = Router::new();
//! router.on(&[HttpMethod::GET], "/", |_req| async {
//!     Ok(HttpResponse::ok().with_text("Healthy"))
//! });
//!
//! let client = TestClient::new(Arc::new(router));
//! let response = client.get("/").await;
//! assert_status(&response, 200);
//! assert_eq!(response.text(), "Healthy");
//! # });
//! ```

mod assertions;
mod test_client;

pub use assertions::{
    assert_body_contains, assert_header, assert_http_status, assert_json, assert_message,
    assert_status,
};
pub use test_client::{TestClient, TestRequestBuilder, TestResponse};

// Re-export common testing utilities
pub use tokio::test as tokio_test;
