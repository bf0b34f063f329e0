use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Log every request with the status chosen downstream; failures are logged
/// at error level. The response passes through untouched.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;
    if status >= 400 {
        tracing::error!(%method, path = %path, status, latency_ms, "request failed");
    } else {
        tracing::debug!(%method, path = %path, status, latency_ms, "request completed");
    }
    response
}
