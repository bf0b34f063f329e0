use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;

use simplicity_core::{BlobStore, DELIMITER, Metadata};
use simplicity_media::{ImageMetadata, Ingest, SOURCE, resolve_format, storage_path};

use crate::error::ApiError;
use crate::response;
use crate::state::AppState;

/// Form field carrying the uploaded image.
pub const FILE_FIELD: &str = "file";

// ---------------------------------------------------------------------------
// GET /files/
// ---------------------------------------------------------------------------

/// Ids of every stored image.
pub async fn list_files<B: BlobStore>(
    State(state): State<AppState<B>>,
) -> Result<Response, ApiError> {
    tracing::debug!("listing images");
    let entries = state.images().list("", DELIMITER).await?;
    let ids: Vec<&str> = entries
        .iter()
        .filter(|entry| !entry.is_object())
        .map(|entry| entry.key().trim_end_matches(DELIMITER))
        .collect();
    Ok(response::json(StatusCode::OK, &ids))
}

// ---------------------------------------------------------------------------
// POST /upload
// ---------------------------------------------------------------------------

struct UploadedFile {
    file_name: String,
    data: Bytes,
}

/// Pull the single file part out of the form.
async fn read_upload(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let name = field.name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        files.push((name, UploadedFile { file_name, data }));
    }

    if files.len() > 1 {
        return Err(ApiError::bad_request("only one file is supported"));
    }
    match files.pop() {
        Some((name, file)) if name == FILE_FIELD => Ok(file),
        _ => Err(ApiError::bad_request("missing file field")),
    }
}

pub async fn upload_file<B: BlobStore>(
    State(state): State<AppState<B>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let file = read_upload(multipart?).await?;

    let id = state.id_provider.generate();
    let metadata = ImageMetadata::for_upload(&id, &file.file_name)?;
    tracing::debug!(id = %id, original_name = %metadata.original_name, size = file.data.len(), "creating image");

    match state.media.ingest(file.data, &metadata).await? {
        Ingest::Complete => tracing::info!(id = %id, "image created"),
        Ingest::SourceOnly => tracing::info!(id = %id, "image created without derived variants"),
    }

    let mut response = response::json(StatusCode::CREATED, &json!({ "id": id }));
    if let Ok(location) = HeaderValue::from_str(&format!("/api/image/files/{id}")) {
        response.headers_mut().insert(LOCATION, location);
    }
    Ok(response)
}

// ---------------------------------------------------------------------------
// GET /files/{id}?format=
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    pub format: String,
}

pub async fn get_file<B: BlobStore>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Response, ApiError> {
    state.id_provider.validate(&id)?;
    let format = resolve_format(&query.format)?;
    tracing::debug!(id = %id, format = format.name, "fetching image");

    let variant = state.media.open(&id, format).await?;
    let blob = variant.blob;

    let mut response = Response::new(Body::from_stream(blob.body.inspect_err(
        move |e| tracing::error!(id = %id, error = %e, "failed while streaming image"),
    )));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(variant.content_type));
    insert_metadata_headers(headers, &blob.metadata);
    Ok(response)
}

/// Surface blob metadata as `metadata-<key>` headers. Entries that are not
/// valid header text are skipped.
fn insert_metadata_headers(headers: &mut axum::http::HeaderMap, metadata: &Metadata) {
    for (key, value) in metadata {
        let name = HeaderName::try_from(format!("metadata-{key}"));
        let value = HeaderValue::from_str(value);
        match (name, value) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::debug!(key = %key, "skipping metadata that is not a valid header"),
        }
    }
}

// ---------------------------------------------------------------------------
// DELETE /files/{id}
// ---------------------------------------------------------------------------

/// Archive the source, then drop every variant of the id.
pub async fn delete_file<B: BlobStore>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.id_provider.validate(&id)?;
    tracing::info!(id = %id, "deleting image");

    let source_path = storage_path(&id, &SOURCE);
    let source = state.images().get(&source_path).await?;
    state
        .deleted
        .put(&source_path, source.body, source.metadata)
        .await?;
    tracing::debug!(id = %id, path = %source_path, "archived source image");

    state.images().delete_all(&id).await?;
    tracing::debug!(id = %id, "image deleted");
    Ok(StatusCode::OK.into_response())
}
