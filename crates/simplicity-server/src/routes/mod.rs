pub mod images;
pub mod service;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use simplicity_core::BlobStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router<B: BlobStore>(state: AppState<B>) -> axum::Router {
    let max_upload = usize::try_from(state.config.images.max_upload_bytes).unwrap_or(usize::MAX);

    let images = axum::Router::new()
        .route("/files/", get(images::list_files::<B>))
        .route("/upload", post(images::upload_file::<B>))
        .route(
            "/files/{id}",
            get(images::get_file::<B>).delete(images::delete_file::<B>),
        )
        .layer(DefaultBodyLimit::max(max_upload));

    axum::Router::new()
        .route("/api/version", get(service::version))
        .route("/api/health", get(service::health))
        .nest("/api/image", images)
        .layer(axum::middleware::from_fn(crate::middleware::log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
