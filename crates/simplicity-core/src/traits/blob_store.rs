use async_trait::async_trait;

use crate::error::SimplicityResult;
use crate::types::{Blob, ByteStream, ListEntry, Metadata};

/// Key/value binary storage with string metadata.
///
/// Keys are `/`-segmented paths. A `put` replaces both content and metadata of
/// an existing key; there is no versioning.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// List keys starting with `prefix`. When `delimiter` is non-empty, keys
    /// whose remainder contains it collapse into one directory entry per
    /// distinct first segment.
    async fn list(&self, prefix: &str, delimiter: &str) -> SimplicityResult<Vec<ListEntry>>;

    /// Open a blob. Fails with `KeyNotFound` when nothing is stored at `key`.
    async fn get(&self, key: &str) -> SimplicityResult<Blob>;

    /// Store `body` under `key`, consuming the stream fully before returning.
    async fn put(&self, key: &str, body: ByteStream, metadata: Metadata) -> SimplicityResult<()>;

    async fn delete(&self, key: &str) -> SimplicityResult<()>;

    /// Delete every key under `prefix`, which is normalized to end with the
    /// delimiter. An empty prefix is rejected with `InvalidKey`.
    async fn delete_all(&self, prefix: &str) -> SimplicityResult<()>;
}
