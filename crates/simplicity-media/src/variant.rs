use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use simplicity_core::{
    Blob, BlobStore, SimplicityError, SimplicityResult, stream_from_bytes,
};

use crate::format::{
    CANONICAL, Format, SOURCE, resolve_container, resolve_mime, storage_path,
};
use crate::metadata::{ImageMetadata, source_extension};
use crate::transcode::{Transcoder, transcode_stream};

/// A stored variant opened for reading.
pub struct Variant {
    pub blob: Blob,
    pub content_type: &'static str,
}

/// Outcome of storing an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Source and canonical copies were both written.
    Complete,
    /// Only the source was written; the content could not be normalized.
    SourceOnly,
}

type InFlight = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Serves variants of stored images, deriving missing ones from the
/// canonical copy and caching the result in the store.
///
/// Concurrent misses on the same variant are coalesced: one caller
/// transcodes, the others wait and then read the cached result.
pub struct VariantMaterializer<S: BlobStore + ?Sized> {
    store: Arc<S>,
    transcoder: Arc<dyn Transcoder>,
    in_flight: InFlight,
}

impl<S: BlobStore + ?Sized> VariantMaterializer<S> {
    pub fn new(store: Arc<S>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            store,
            transcoder,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Write the source blob, then its canonical copy.
    ///
    /// Content the transcoder rejects still leaves the source stored and is
    /// reported as [`Ingest::SourceOnly`]. Storage failures of either write
    /// are returned.
    pub async fn ingest(&self, data: Bytes, metadata: &ImageMetadata) -> SimplicityResult<Ingest> {
        let id = &metadata.id;
        let inbound = Format::inbound(resolve_container(&metadata.extension)?);
        let map = metadata.to_map();
        self.store
            .put(
                &storage_path(id, &SOURCE),
                stream_from_bytes(data.clone()),
                map.clone(),
            )
            .await?;

        let canonical = transcode_stream(
            Arc::clone(&self.transcoder),
            inbound,
            CANONICAL,
            stream_from_bytes(data),
        );
        match self
            .store
            .put(&storage_path(id, &CANONICAL), canonical, map)
            .await
        {
            Ok(()) => Ok(Ingest::Complete),
            Err(e @ (SimplicityError::Transcode(_) | SimplicityError::UnsupportedEncoding(_))) => {
                tracing::warn!(id = %id, error = %e, "stored source without canonical copy");
                Ok(Ingest::SourceOnly)
            }
            Err(e) => Err(e),
        }
    }

    /// Open the `format` variant of `id`, deriving it first when it is missing.
    pub async fn open(&self, id: &str, format: &Format) -> SimplicityResult<Variant> {
        let path = storage_path(id, format);
        let blob = match self.store.get(&path).await {
            Ok(blob) => blob,
            Err(SimplicityError::KeyNotFound) if is_derived(format) => {
                self.materialize(id, format).await?;
                self.store.get(&path).await?
            }
            Err(e) => return Err(e),
        };

        let ext = if format.is_source() {
            source_extension(&blob.metadata).unwrap_or(format.container.ext())
        } else {
            format.container.ext()
        };
        Ok(Variant {
            content_type: resolve_mime(ext),
            blob,
        })
    }

    async fn materialize(&self, id: &str, format: &Format) -> SimplicityResult<()> {
        let path = storage_path(id, format);
        let lock = self.flight_lock(&path);
        let result = {
            let _guard = lock.lock().await;
            self.materialize_locked(id, format, &path).await
        };
        self.release_flight(&path, lock);
        result
    }

    async fn materialize_locked(&self, id: &str, format: &Format, path: &str) -> SimplicityResult<()> {
        // Another caller may have finished while we waited.
        match self.store.get(path).await {
            Ok(_) => return Ok(()),
            Err(SimplicityError::KeyNotFound) => {}
            Err(e) => return Err(e),
        }

        let canonical = self.store.get(&storage_path(id, &CANONICAL)).await?;
        let body = transcode_stream(
            Arc::clone(&self.transcoder),
            CANONICAL,
            *format,
            canonical.body,
        );
        self.store.put(path, body, canonical.metadata).await?;
        tracing::info!(id, format = format.name, "created image variant");
        Ok(())
    }

    fn flight_lock(&self, path: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(in_flight.entry(path.to_string()).or_default())
    }

    fn release_flight(&self, path: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        // Registry plus this caller: nobody else is waiting.
        if Arc::strong_count(&lock) == 2 {
            in_flight.remove(path);
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.lock().map(|m| m.len()).unwrap_or(0)
    }
}

fn is_derived(format: &Format) -> bool {
    *format != SOURCE && *format != CANONICAL
}
