use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use simplicity_blob_memory::MemoryBlobStore;
use simplicity_core::SnowflakeIdProvider;
use simplicity_core::config::SimplicityConfig;
use simplicity_media::DefaultTranscoder;
use simplicity_server::{AppState, build_router};

use crate::multipart::MultipartBody;

pub fn create_test_config() -> SimplicityConfig {
    SimplicityConfig {
        port: 0,
        ..SimplicityConfig::default()
    }
}

/// App state over a fresh in-memory backend, which is returned alongside so
/// tests can inspect raw keys.
pub fn create_test_app_state() -> (AppState<MemoryBlobStore>, Arc<MemoryBlobStore>) {
    create_test_app_state_with_config(create_test_config())
}

pub fn create_test_app_state_with_config(
    config: SimplicityConfig,
) -> (AppState<MemoryBlobStore>, Arc<MemoryBlobStore>) {
    let backend = Arc::new(MemoryBlobStore::new());
    let id_provider = SnowflakeIdProvider::new(config.images.node_id)
        .expect("default node id is in range");
    let state = AppState::new(
        Arc::clone(&backend),
        config,
        Arc::new(id_provider),
        Arc::new(DefaultTranscoder::new()),
    );
    (state, backend)
}

pub fn create_test_router() -> Router {
    create_test_router_and_store().0
}

pub fn create_test_router_and_store() -> (Router, Arc<MemoryBlobStore>) {
    let (state, backend) = create_test_app_state();
    (build_router(state), backend)
}

/// Status, headers and raw body of a routed request.
pub struct TestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        if self.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&self.body).unwrap_or(Value::String(
                String::from_utf8_lossy(&self.body).to_string(),
            ))
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Send a request with an optional `(content_type, body)` payload.
pub async fn send_raw(
    router: &Router,
    method: &str,
    uri: &str,
    payload: Option<(String, Vec<u8>)>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match payload {
        Some((content_type, data)) => {
            builder = builder.header("content-type", content_type);
            Body::from(data)
        }
        None => Body::empty(),
    };

    let req = builder.body(body).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status().as_u16();
    let headers = resp.headers().clone();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Send a request through the router and return (status, body_json).
pub async fn send_request(router: &Router, method: &str, uri: &str) -> (u16, Value) {
    let resp = send_raw(router, method, uri, None).await;
    (resp.status, resp.json())
}

/// Upload one file as the `file` form field.
pub async fn upload_file(router: &Router, file_name: &str, data: &[u8]) -> TestResponse {
    let form = MultipartBody::new()
        .file("file", file_name, "application/octet-stream", data)
        .finish();
    send_raw(router, "POST", "/api/image/upload", Some(form)).await
}
