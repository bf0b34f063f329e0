use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use simplicity_core::{
    Blob, BlobStore, ByteStream, ListEntry, Metadata, SimplicityError, SimplicityResult,
    collect_stream, dir_prefix, stream_from_bytes,
};

#[derive(Clone)]
struct StoredBlob {
    data: Bytes,
    metadata: Metadata,
}

/// Map-backed blob store with no persistence.
///
/// Every operation runs inside one lock acquisition, so a `delete_all` never
/// interleaves with writes under the same prefix. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<BTreeMap<String, StoredBlob>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list(&self, prefix: &str, delimiter: &str) -> SimplicityResult<Vec<ListEntry>> {
        let blobs = self.blobs.read().await;
        let mut entries = Vec::new();
        let mut directories = BTreeSet::new();

        for (key, blob) in blobs.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            match rest.find(delimiter).filter(|_| !delimiter.is_empty()) {
                Some(index) => {
                    let dir = format!("{prefix}{}", &rest[..index + delimiter.len()]);
                    if directories.insert(dir.clone()) {
                        entries.push(ListEntry::Directory { key: dir });
                    }
                }
                None => entries.push(ListEntry::Object {
                    key: key.clone(),
                    size: blob.data.len() as u64,
                }),
            }
        }

        Ok(entries)
    }

    async fn get(&self, key: &str) -> SimplicityResult<Blob> {
        let blobs = self.blobs.read().await;
        let blob = blobs.get(key).ok_or(SimplicityError::KeyNotFound)?;
        Ok(Blob::new(
            stream_from_bytes(blob.data.clone()),
            blob.metadata.clone(),
        ))
    }

    async fn put(&self, key: &str, body: ByteStream, metadata: Metadata) -> SimplicityResult<()> {
        if key.is_empty() {
            return Err(SimplicityError::InvalidKey);
        }
        // Drain before locking: a failed stream leaves any previous blob intact.
        let data = collect_stream(body).await?;
        tracing::debug!(key, size = data.len(), "storing blob in memory");
        self.blobs
            .write()
            .await
            .insert(key.to_string(), StoredBlob { data, metadata });
        Ok(())
    }

    async fn delete(&self, key: &str) -> SimplicityResult<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }

    async fn delete_all(&self, prefix: &str) -> SimplicityResult<()> {
        if prefix.is_empty() {
            return Err(SimplicityError::InvalidKey);
        }
        let prefix = dir_prefix(prefix);
        let mut blobs = self.blobs.write().await;
        let before = blobs.len();
        blobs.retain(|key, _| !key.starts_with(&prefix));
        tracing::debug!(prefix = %prefix, removed = before - blobs.len(), "deleted blobs by prefix");
        Ok(())
    }
}
