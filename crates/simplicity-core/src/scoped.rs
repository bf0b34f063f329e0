use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{SimplicityError, SimplicityResult};
use crate::traits::BlobStore;
use crate::types::{Blob, ByteStream, ListEntry, Metadata};

/// Confines a shared backend to the keys under a fixed prefix.
///
/// Keys handed to this store are relative; the prefix is prepended before
/// delegating and stripped from listed keys on the way back, so several
/// logical collections can share one physical backend.
pub struct ScopedBlobStore<S: BlobStore + ?Sized> {
    inner: Arc<S>,
    prefix: String,
}

impl<S: BlobStore + ?Sized> ScopedBlobStore<S> {
    pub fn new(inner: Arc<S>, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    fn scoped(&self, key: &str) -> SimplicityResult<String> {
        if key.is_empty() {
            return Err(SimplicityError::InvalidKey);
        }
        Ok(format!("{}{key}", self.prefix))
    }
}

impl<S: BlobStore + ?Sized> Clone for ScopedBlobStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            prefix: self.prefix.clone(),
        }
    }
}

#[async_trait]
impl<S: BlobStore + ?Sized> BlobStore for ScopedBlobStore<S> {
    // An empty listing prefix is allowed: it lists the whole namespace.
    async fn list(&self, prefix: &str, delimiter: &str) -> SimplicityResult<Vec<ListEntry>> {
        let full = format!("{}{prefix}", self.prefix);
        let entries = self.inner.list(&full, delimiter).await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                entry.map_key(|key| match key.strip_prefix(self.prefix.as_str()) {
                    Some(relative) => relative.to_string(),
                    None => key,
                })
            })
            .collect())
    }

    async fn get(&self, key: &str) -> SimplicityResult<Blob> {
        let key = self.scoped(key)?;
        self.inner.get(&key).await
    }

    async fn put(&self, key: &str, body: ByteStream, metadata: Metadata) -> SimplicityResult<()> {
        let key = self.scoped(key)?;
        self.inner.put(&key, body, metadata).await
    }

    async fn delete(&self, key: &str) -> SimplicityResult<()> {
        let key = self.scoped(key)?;
        self.inner.delete(&key).await
    }

    async fn delete_all(&self, prefix: &str) -> SimplicityResult<()> {
        let prefix = self.scoped(prefix)?;
        self.inner.delete_all(&prefix).await
    }
}
