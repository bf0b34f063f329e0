use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream;

use simplicity_blob_memory::MemoryBlobStore;
use simplicity_blob_s3::{CompletedPart, ListPage, ObjectService, RemoteBlobStore};
use simplicity_core::{
    Blob, BlobStore, ByteStream, ListEntry, Metadata, SimplicityError, SimplicityResult,
    stream_from_bytes,
};

#[derive(Default)]
struct Upload {
    key: String,
    metadata: Metadata,
    parts: HashMap<i32, (String, Bytes)>,
}

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<String, (Bytes, Metadata)>,
    uploads: HashMap<String, Upload>,
    next_upload: u64,
    single_puts: usize,
    uploaded_parts: Vec<(i32, usize)>,
    completed: Vec<Vec<i32>>,
    aborted: Vec<String>,
    list_calls: usize,
}

/// In-process stand-in for an S3-style object API.
#[derive(Default)]
struct FakeObjectService {
    state: Mutex<FakeState>,
    page_size: usize,
    fail_part: Option<i32>,
    fail_complete: bool,
}

impl FakeObjectService {
    fn new() -> Self {
        Self {
            page_size: 1000,
            ..Default::default()
        }
    }

    fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    fn failing_at_part(part: i32) -> Self {
        Self {
            page_size: 1000,
            fail_part: Some(part),
            ..Default::default()
        }
    }

    fn failing_at_complete() -> Self {
        Self {
            page_size: 1000,
            fail_complete: true,
            ..Default::default()
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

enum Row {
    Object(String, u64),
    Prefix(String),
}

#[async_trait]
impl ObjectService for FakeObjectService {
    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<String>,
    ) -> SimplicityResult<ListPage> {
        let mut state = self.state();
        state.list_calls += 1;

        let mut rows = Vec::new();
        let mut seen = BTreeSet::new();
        for (key, (data, _)) in state.objects.iter() {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            match delimiter.and_then(|d| rest.find(d).map(|i| (d, i))) {
                Some((d, i)) => {
                    let group = format!("{prefix}{}", &rest[..i + d.len()]);
                    if seen.insert(group.clone()) {
                        rows.push(Row::Prefix(group));
                    }
                }
                None => rows.push(Row::Object(key.clone(), data.len() as u64)),
            }
        }

        let total = rows.len();
        let start: usize = continuation.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(total);
        let mut page = ListPage::default();
        for row in rows.drain(start..end) {
            match row {
                Row::Object(key, size) => page.objects.push((key, size)),
                Row::Prefix(p) => page.common_prefixes.push(p),
            }
        }
        if end < total {
            page.next_token = Some(end.to_string());
        }
        Ok(page)
    }

    async fn get_object(&self, key: &str) -> SimplicityResult<Blob> {
        let state = self.state();
        let (data, metadata) = state
            .objects
            .get(key)
            .cloned()
            .ok_or(SimplicityError::KeyNotFound)?;
        Ok(Blob::new(stream_from_bytes(data), metadata))
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: &Metadata,
    ) -> SimplicityResult<()> {
        let mut state = self.state();
        state.single_puts += 1;
        state
            .objects
            .insert(key.to_string(), (body, metadata.clone()));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> SimplicityResult<()> {
        self.state().objects.remove(key);
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        metadata: &Metadata,
    ) -> SimplicityResult<String> {
        let mut state = self.state();
        state.next_upload += 1;
        let id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            id.clone(),
            Upload {
                key: key.to_string(),
                metadata: metadata.clone(),
                parts: HashMap::new(),
            },
        );
        Ok(id)
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> SimplicityResult<String> {
        if self.fail_part == Some(part_number) {
            return Err(SimplicityError::Storage(format!(
                "failed to upload part {part_number}"
            )));
        }
        let mut state = self.state();
        state.uploaded_parts.push((part_number, body.len()));
        let etag = format!("etag-{upload_id}-{part_number}");
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| SimplicityError::Storage("no such upload".to_string()))?;
        upload.parts.insert(part_number, (etag.clone(), body));
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> SimplicityResult<()> {
        if self.fail_complete {
            return Err(SimplicityError::Storage(format!(
                "failed to complete upload {upload_id}"
            )));
        }
        let mut state = self.state();
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| SimplicityError::Storage("no such upload".to_string()))?;
        assert_eq!(upload.key, key);

        let mut data = BytesMut::new();
        for part in &parts {
            let (etag, body) = upload
                .parts
                .get(&part.part_number)
                .ok_or_else(|| SimplicityError::Storage("missing part".to_string()))?;
            if *etag != part.etag {
                return Err(SimplicityError::Storage("etag mismatch".to_string()));
            }
            data.extend_from_slice(body);
        }
        state
            .completed
            .push(parts.iter().map(|p| p.part_number).collect());
        state
            .objects
            .insert(key.to_string(), (data.freeze(), upload.metadata));
        Ok(())
    }

    async fn abort_multipart_upload(&self, _key: &str, upload_id: &str) -> SimplicityResult<()> {
        let mut state = self.state();
        state.uploads.remove(upload_id);
        state.aborted.push(upload_id.to_string());
        Ok(())
    }
}

fn payload(len: usize) -> Bytes {
    (0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>().into()
}

/// Split `data` into uneven stream chunks so part boundaries never line up
/// with the incoming chunks.
fn uneven_stream(data: Bytes) -> ByteStream {
    let mut chunks = Vec::new();
    let mut offset = 0;
    let mut step = 3;
    while offset < data.len() {
        let end = (offset + step).min(data.len());
        chunks.push(Ok(data.slice(offset..end)));
        offset = end;
        step = step * 2 % 17 + 1;
    }
    Box::pin(stream::iter(chunks))
}

fn meta() -> Metadata {
    [("original_name", "big.png"), ("extension", "png")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn small_body_is_a_single_write() {
    let store = RemoteBlobStore::with_threshold(FakeObjectService::new(), 16);
    store
        .put("k", stream_from_bytes(payload(10)), meta())
        .await
        .unwrap();

    let state = store.service().state();
    assert_eq!(state.single_puts, 1);
    assert!(state.uploaded_parts.is_empty());
    assert!(state.completed.is_empty());
}

#[tokio::test]
async fn large_body_uploads_consecutive_parts() {
    let store = RemoteBlobStore::with_threshold(FakeObjectService::new(), 16);
    let data = payload(16 * 3 + 5);
    store
        .put("big", uneven_stream(data.clone()), meta())
        .await
        .unwrap();

    {
        let state = store.service().state();
        assert_eq!(state.single_puts, 0);
        assert_eq!(state.uploaded_parts, vec![(1, 16), (2, 16), (3, 16), (4, 5)]);
        assert_eq!(state.completed, vec![vec![1, 2, 3, 4]]);
        assert!(state.aborted.is_empty());
    }

    let blob = store.get("big").await.unwrap();
    assert_eq!(blob.metadata, meta());
    assert_eq!(blob.into_bytes().await.unwrap(), data);
}

#[tokio::test]
async fn exact_multiple_of_threshold_has_no_empty_part() {
    let store = RemoteBlobStore::with_threshold(FakeObjectService::new(), 16);
    let data = payload(32);
    store
        .put("even", uneven_stream(data.clone()), Metadata::new())
        .await
        .unwrap();

    let state = store.service().state();
    assert_eq!(state.uploaded_parts, vec![(1, 16), (2, 16)]);
    assert_eq!(state.completed, vec![vec![1, 2]]);
}

#[tokio::test]
async fn empty_body_is_nothing_to_upload() {
    let store = RemoteBlobStore::with_threshold(FakeObjectService::new(), 16);
    let body: ByteStream = Box::pin(stream::empty());
    let err = store.put("k", body, Metadata::new()).await.unwrap_err();
    assert!(matches!(err, SimplicityError::EmptyUpload));
    assert!(store.service().state().objects.is_empty());
}

#[tokio::test]
async fn part_failure_aborts_session_and_surfaces_error() {
    let store = RemoteBlobStore::with_threshold(FakeObjectService::failing_at_part(2), 16);
    let err = store
        .put("big", uneven_stream(payload(40)), Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SimplicityError::Storage(_)));

    let state = store.service().state();
    assert_eq!(state.aborted, vec!["upload-1".to_string()]);
    assert!(state.uploads.is_empty());
    assert!(state.completed.is_empty());
    assert!(!state.objects.contains_key("big"));
}

#[tokio::test]
async fn completion_failure_aborts_session_and_surfaces_error() {
    let store = RemoteBlobStore::with_threshold(FakeObjectService::failing_at_complete(), 16);
    let err = store
        .put("big", uneven_stream(payload(40)), Metadata::new())
        .await
        .unwrap_err();
    match err {
        SimplicityError::Storage(message) => {
            assert_eq!(message, "failed to complete upload upload-1")
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let state = store.service().state();
    assert_eq!(state.uploaded_parts, vec![(1, 16), (2, 16), (3, 8)]);
    assert_eq!(state.aborted, vec!["upload-1".to_string()]);
    assert!(state.uploads.is_empty());
    assert!(state.completed.is_empty());
    assert!(state.objects.is_empty());
}

#[tokio::test]
async fn stream_error_mid_upload_aborts_session() {
    let store = RemoteBlobStore::with_threshold(FakeObjectService::new(), 4);
    let body: ByteStream = Box::pin(stream::iter(vec![
        Ok(Bytes::from_static(b"abcdefgh")),
        Err(SimplicityError::Transcode("decode failed".to_string())),
    ]));
    let err = store.put("k", body, Metadata::new()).await.unwrap_err();
    assert!(matches!(err, SimplicityError::Transcode(_)));
    assert_eq!(store.service().state().aborted.len(), 1);
}

#[tokio::test]
async fn large_upload_matches_in_memory_single_shot() {
    let data = payload(1000);

    let remote = RemoteBlobStore::with_threshold(FakeObjectService::new(), 64);
    remote
        .put("obj", uneven_stream(data.clone()), meta())
        .await
        .unwrap();
    assert!(remote.service().state().completed[0].len() > 1);

    let memory = MemoryBlobStore::new();
    memory
        .put("obj", stream_from_bytes(data.clone()), meta())
        .await
        .unwrap();

    let remote_blob = remote.get("obj").await.unwrap();
    let memory_blob = memory.get("obj").await.unwrap();
    assert_eq!(remote_blob.metadata, memory_blob.metadata);
    assert_eq!(
        remote_blob.into_bytes().await.unwrap(),
        memory_blob.into_bytes().await.unwrap()
    );
}

#[tokio::test]
async fn get_missing_is_key_not_found() {
    let store = RemoteBlobStore::new(FakeObjectService::new());
    assert!(matches!(
        store.get("nope").await.err(),
        Some(SimplicityError::KeyNotFound)
    ));
}

#[tokio::test]
async fn empty_keys_are_invalid() {
    let store = RemoteBlobStore::new(FakeObjectService::new());
    assert!(matches!(
        store.put("", stream_from_bytes(payload(1)), Metadata::new()).await,
        Err(SimplicityError::InvalidKey)
    ));
    assert!(matches!(store.delete("").await, Err(SimplicityError::InvalidKey)));
    assert!(matches!(store.delete_all("").await, Err(SimplicityError::InvalidKey)));
}

#[tokio::test]
async fn list_walks_every_page_and_dedups_directories() {
    let store = RemoteBlobStore::with_threshold(FakeObjectService::with_page_size(2), 1024);
    for key in ["a/1", "a/2", "b/1", "c", "d/x/y"] {
        store
            .put(key, stream_from_bytes(payload(3)), Metadata::new())
            .await
            .unwrap();
    }

    let entries = store.list("", "/").await.unwrap();
    assert_eq!(
        entries,
        vec![
            ListEntry::Directory { key: "a/".to_string() },
            ListEntry::Directory { key: "b/".to_string() },
            ListEntry::Object { key: "c".to_string(), size: 3 },
            ListEntry::Directory { key: "d/".to_string() },
        ]
    );
    assert!(store.service().state().list_calls >= 2);

    let entries = store.list("a", "/").await.unwrap();
    assert_eq!(entries, vec![ListEntry::Directory { key: "a/".to_string() }]);
}

#[tokio::test]
async fn list_treats_trailing_delimiter_objects_as_directories() {
    let store = RemoteBlobStore::with_threshold(FakeObjectService::new(), 1024);
    store
        .service()
        .state()
        .objects
        .insert("folder/".to_string(), (Bytes::new(), Metadata::new()));

    let entries = store.list("folder/", "/").await.unwrap();
    assert_eq!(entries, vec![ListEntry::Directory { key: "folder/".to_string() }]);
}

#[tokio::test]
async fn delete_all_spans_pages_and_keeps_siblings() {
    let store = RemoteBlobStore::with_threshold(FakeObjectService::with_page_size(2), 1024);
    for key in ["7/a", "7/b", "7/c", "7/d/e", "70/a", "8/a"] {
        store
            .put(key, stream_from_bytes(payload(1)), Metadata::new())
            .await
            .unwrap();
    }

    store.delete_all("7").await.unwrap();

    assert!(store.list("7/", "").await.unwrap().is_empty());
    let keys: Vec<String> = store
        .service()
        .state()
        .objects
        .keys()
        .cloned()
        .collect();
    assert_eq!(keys, vec!["70/a".to_string(), "8/a".to_string()]);
}
