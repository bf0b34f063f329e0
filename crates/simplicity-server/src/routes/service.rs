use axum::http::StatusCode;
use axum::response::Response;
use serde_json::json;

use crate::response;

pub async fn version() -> Response {
    response::json(
        StatusCode::OK,
        &json!({
            "name": "simplicity",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

pub async fn health() -> Response {
    response::json(StatusCode::OK, &json!({ "status": "ok" }))
}
