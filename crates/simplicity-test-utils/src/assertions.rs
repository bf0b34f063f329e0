use serde_json::Value;

/// Assert the response status is 200 and return the JSON body.
pub fn assert_ok(status: u16, body: &Value) -> &Value {
    assert_eq!(status, 200, "Expected 200 OK, got {status}: {body}");
    body
}

/// Assert an error response: expected status and a JSON `error` message.
pub fn assert_api_error(status: u16, body: &Value, expected_status: u16) {
    assert_eq!(
        status, expected_status,
        "Expected status {expected_status}, got {status}: {body}"
    );
    assert!(
        body.get("error").and_then(|e| e.as_str()).is_some(),
        "Expected an error message, got {body}"
    );
}
