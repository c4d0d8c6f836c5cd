// Test assertions for HTTP responses

use crate::TestResponse;
use scorehost_core::HttpStatus;

pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual,
        expected,
        "Expected status {}, got {} (body: {})",
        expected,
        actual,
        response.text()
    );
}

pub fn assert_http_status(response: &TestResponse, expected: HttpStatus) {
    assert_status(response, expected.code());
}

/// Assert the body parses as JSON equal to `expected`.
pub fn assert_json(response: &TestResponse, expected: &serde_json::Value) {
    let actual: serde_json::Value = match response.json() {
        Ok(value) => value,
        Err(e) => panic!("Response body is not JSON ({}): {}", e, response.text()),
    };
    assert_eq!(&actual, expected, "JSON bodies do not match");
}

pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

/// Assert a `{"message": ...}` error body.
pub fn assert_message(response: &TestResponse, expected: &str) {
    assert_eq!(
        response.message().as_deref(),
        Some(expected),
        "Unexpected error message, body: {}",
        response.text()
    );
}

pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.text();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}', but it didn't. Body: {}",
        expected,
        body
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorehost_core::HttpResponse;

    #[test]
    fn test_assertions_pass() {
        let response = TestResponse::new(
            HttpResponse::message(404, "gone").with_header("x-ms-run-function-failed", "False"),
        );

        assert_status(&response, 404);
        assert_http_status(&response, HttpStatus::NotFound);
        assert_header(&response, "X-MS-Run-Function-Failed", "False");
        assert_message(&response, "gone");
        assert_json(&response, &serde_json::json!({"message": "gone"}));
        assert_body_contains(&response, "gone");
    }

    #[test]
    #[should_panic(expected = "Expected status 200")]
    fn test_status_mismatch_panics() {
        assert_status(&TestResponse::new(HttpResponse::new(500)), 200);
    }
}
