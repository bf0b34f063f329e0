use async_trait::async_trait;
use bytes::Bytes;

use simplicity_core::{Blob, Metadata, SimplicityResult};

/// One page of a remote listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// `(key, size)` of every object on this page.
    pub objects: Vec<(String, u64)>,
    /// Grouped key prefixes, each ending with the requested delimiter.
    pub common_prefixes: Vec<String>,
    /// Token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

/// Part number and completion tag recorded for one uploaded part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// The remote object API the streaming store is written against: paginated
/// listing, whole-object writes, and explicit multipart sessions.
#[async_trait]
pub trait ObjectService: Send + Sync + 'static {
    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<String>,
    ) -> SimplicityResult<ListPage>;

    async fn get_object(&self, key: &str) -> SimplicityResult<Blob>;

    async fn put_object(&self, key: &str, body: Bytes, metadata: &Metadata)
    -> SimplicityResult<()>;

    async fn delete_object(&self, key: &str) -> SimplicityResult<()>;

    /// Open a multipart session and return its upload id.
    async fn create_multipart_upload(&self, key: &str, metadata: &Metadata)
    -> SimplicityResult<String>;

    /// Upload one part and return its completion tag.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> SimplicityResult<String>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> SimplicityResult<()>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> SimplicityResult<()>;
}
