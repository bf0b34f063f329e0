use std::collections::BTreeMap;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};

use crate::error::SimplicityResult;

/// String metadata attached to a blob at write time.
pub type Metadata = BTreeMap<String, String>;

/// Blob content as a stream of chunks. Dropping the stream releases whatever
/// backend resource (buffer, connection) feeds it.
pub type ByteStream = Pin<Box<dyn Stream<Item = SimplicityResult<Bytes>> + Send>>;

/// One row of a directory-style listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    /// A real stored blob.
    Object { key: String, size: u64 },
    /// Synthetic grouping node for every key sharing `key` as a prefix.
    /// The key always ends with the listing delimiter.
    Directory { key: String },
}

impl ListEntry {
    pub fn key(&self) -> &str {
        match self {
            ListEntry::Object { key, .. } | ListEntry::Directory { key } => key,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ListEntry::Object { .. })
    }

    pub fn size(&self) -> Option<u64> {
        match self {
            ListEntry::Object { size, .. } => Some(*size),
            ListEntry::Directory { .. } => None,
        }
    }

    /// Rewrite the entry's key, keeping its kind and size.
    pub fn map_key(self, f: impl FnOnce(String) -> String) -> Self {
        match self {
            ListEntry::Object { key, size } => ListEntry::Object { key: f(key), size },
            ListEntry::Directory { key } => ListEntry::Directory { key: f(key) },
        }
    }
}

/// A blob opened for reading.
pub struct Blob {
    pub body: ByteStream,
    pub metadata: Metadata,
}

impl Blob {
    pub fn new(body: ByteStream, metadata: Metadata) -> Self {
        Self { body, metadata }
    }

    /// Drain the body into memory.
    pub async fn into_bytes(self) -> SimplicityResult<Bytes> {
        collect_stream(self.body).await
    }
}

/// Wrap an in-memory buffer as a single-chunk stream.
pub fn stream_from_bytes(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    Box::pin(stream::once(async move { Ok(data) }))
}

/// Read a stream to its end, failing on the first error chunk.
pub async fn collect_stream(mut body: ByteStream) -> SimplicityResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
