use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;

use simplicity_core::config::MIB;
use simplicity_core::{
    Blob, BlobStore, ByteStream, ListEntry, Metadata, SimplicityError, SimplicityResult,
    dir_prefix,
};

use crate::service::{CompletedPart, ObjectService};

/// Default size of the chunks read from an upload stream.
pub const DEFAULT_MULTIPART_THRESHOLD: usize = 10 * MIB as usize;

/// Blob store over a remote object service.
///
/// Uploads are read in fixed-size chunks: a body shorter than one chunk goes
/// out as a single object write, anything longer through a multipart session,
/// so no more than one chunk is buffered at a time.
pub struct RemoteBlobStore<S: ObjectService> {
    service: Arc<S>,
    threshold: usize,
}

impl<S: ObjectService> Clone for RemoteBlobStore<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            threshold: self.threshold,
        }
    }
}

impl<S: ObjectService> RemoteBlobStore<S> {
    pub fn new(service: S) -> Self {
        Self::with_threshold(service, DEFAULT_MULTIPART_THRESHOLD)
    }

    /// `threshold` is both the single-write cutoff and the part size.
    pub fn with_threshold(service: S, threshold: usize) -> Self {
        Self {
            service: Arc::new(service),
            threshold: threshold.max(1),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    async fn put_multipart(
        &self,
        key: &str,
        first: Bytes,
        reader: &mut ChunkReader,
        metadata: &Metadata,
    ) -> SimplicityResult<()> {
        let upload_id = self.service.create_multipart_upload(key, metadata).await?;
        tracing::info!(key, upload_id = %upload_id, "started multipart upload");

        let result = match self.upload_parts(key, &upload_id, first, reader).await {
            Ok(parts) => {
                let count = parts.len();
                self.service
                    .complete_multipart_upload(key, &upload_id, parts)
                    .await
                    .map(|()| count)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(count) => {
                tracing::info!(key, parts = count, "completed multipart upload");
                Ok(())
            }
            Err(e) => {
                if let Err(abort_err) = self.service.abort_multipart_upload(key, &upload_id).await {
                    tracing::warn!(key, upload_id = %upload_id, "failed to abort multipart upload: {abort_err}");
                }
                Err(e)
            }
        }
    }

    /// Upload `first` and every following chunk as consecutive 1-based parts.
    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        first: Bytes,
        reader: &mut ChunkReader,
    ) -> SimplicityResult<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut chunk = first;
        let mut part_number: i32 = 1;

        loop {
            let size = chunk.len();
            let etag = self
                .service
                .upload_part(key, upload_id, part_number, chunk)
                .await?;
            tracing::debug!(key, part_number, size, "uploaded part");
            parts.push(CompletedPart { part_number, etag });

            // A short chunk means the stream is exhausted.
            if size < self.threshold {
                break;
            }
            chunk = reader.next_chunk().await?;
            if chunk.is_empty() {
                break;
            }
            part_number += 1;
        }

        Ok(parts)
    }
}

#[async_trait]
impl<S: ObjectService> BlobStore for RemoteBlobStore<S> {
    async fn list(&self, prefix: &str, delimiter: &str) -> SimplicityResult<Vec<ListEntry>> {
        let delimiter = (!delimiter.is_empty()).then_some(delimiter);
        let mut entries = Vec::new();
        let mut directories = BTreeSet::new();
        let mut token = None;

        loop {
            let page = self.service.list_page(prefix, delimiter, token).await?;
            for dir in page.common_prefixes {
                if directories.insert(dir.clone()) {
                    entries.push(ListEntry::Directory { key: dir });
                }
            }
            for (key, size) in page.objects {
                // Zero-byte placeholder objects ending in the delimiter act as folders.
                match delimiter {
                    Some(d) if key.ends_with(d) => {
                        if directories.insert(key.clone()) {
                            entries.push(ListEntry::Directory { key });
                        }
                    }
                    _ => entries.push(ListEntry::Object { key, size }),
                }
            }
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }

        entries.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(entries)
    }

    async fn get(&self, key: &str) -> SimplicityResult<Blob> {
        if key.is_empty() {
            return Err(SimplicityError::InvalidKey);
        }
        tracing::debug!(key, "fetching remote object");
        self.service.get_object(key).await
    }

    async fn put(&self, key: &str, body: ByteStream, metadata: Metadata) -> SimplicityResult<()> {
        if key.is_empty() {
            return Err(SimplicityError::InvalidKey);
        }

        let mut reader = ChunkReader::new(body, self.threshold);
        let first = reader.next_chunk().await?;
        if first.is_empty() {
            return Err(SimplicityError::EmptyUpload);
        }

        if first.len() < self.threshold {
            let size = first.len();
            self.service.put_object(key, first, &metadata).await?;
            tracing::info!(key, size, "completed blob upload");
            return Ok(());
        }

        self.put_multipart(key, first, &mut reader, &metadata).await
    }

    async fn delete(&self, key: &str) -> SimplicityResult<()> {
        if key.is_empty() {
            return Err(SimplicityError::InvalidKey);
        }
        self.service.delete_object(key).await
    }

    async fn delete_all(&self, prefix: &str) -> SimplicityResult<()> {
        if prefix.is_empty() {
            return Err(SimplicityError::InvalidKey);
        }
        let prefix = dir_prefix(prefix);

        // Collect first so deletions do not shift the pages being walked.
        let mut keys = Vec::new();
        let mut token = None;
        loop {
            let page = self.service.list_page(&prefix, None, token).await?;
            keys.extend(page.objects.into_iter().map(|(key, _)| key));
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }

        for key in &keys {
            self.service.delete_object(key).await?;
        }
        tracing::debug!(prefix = %prefix, removed = keys.len(), "deleted remote objects by prefix");
        Ok(())
    }
}

/// Re-slices an arbitrary chunked stream into chunks of exactly `chunk_size`
/// bytes; only the final chunk may be shorter, and an exhausted stream yields
/// empty chunks.
struct ChunkReader {
    body: ByteStream,
    buffer: BytesMut,
    chunk_size: usize,
    exhausted: bool,
}

impl ChunkReader {
    fn new(body: ByteStream, chunk_size: usize) -> Self {
        Self {
            body,
            buffer: BytesMut::new(),
            chunk_size,
            exhausted: false,
        }
    }

    async fn next_chunk(&mut self) -> SimplicityResult<Bytes> {
        while self.buffer.len() < self.chunk_size && !self.exhausted {
            match self.body.next().await {
                Some(chunk) => self.buffer.extend_from_slice(&chunk?),
                None => self.exhausted = true,
            }
        }
        let take = self.buffer.len().min(self.chunk_size);
        Ok(self.buffer.split_to(take).freeze())
    }
}
