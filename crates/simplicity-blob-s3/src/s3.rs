use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as AwsCompletedPart};
use bytes::Bytes;

use simplicity_core::config::StorageConfig;
use simplicity_core::{Blob, ByteStream, Metadata, SimplicityError, SimplicityResult};

use crate::service::{CompletedPart, ListPage, ObjectService};
use crate::store::RemoteBlobStore;

/// The streaming store wired to Amazon S3 or an S3-compatible service.
pub type S3BlobStore = RemoteBlobStore<S3ObjectService>;

fn storage_error<E>(context: &str) -> impl FnOnce(E) -> SimplicityError + '_
where
    E: std::error::Error,
{
    move |e| SimplicityError::Storage(format!("{context}: {}", DisplayErrorContext(&e)))
}

#[derive(Clone)]
pub struct S3ObjectService {
    client: Client,
    bucket: String,
}

impl S3ObjectService {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the storage section of the config. Credentials
    /// fall back to the default AWS provider chain when not configured.
    pub async fn from_config(config: &StorageConfig) -> SimplicityResult<Self> {
        let bucket = config.bucket.clone().ok_or_else(|| {
            SimplicityError::InternalError("storage.bucket is required for the s3 backend".to_string())
        })?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "simplicity-config",
            ));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.endpoint.is_some())
            .build();
        Ok(Self::new(Client::from_conf(s3_config), bucket))
    }
}

impl S3BlobStore {
    pub async fn connect(config: &StorageConfig) -> SimplicityResult<Self> {
        let service = S3ObjectService::from_config(config).await?;
        Ok(RemoteBlobStore::with_threshold(
            service,
            config.multipart_threshold as usize,
        ))
    }
}

fn to_remote_metadata(metadata: &Metadata) -> std::collections::HashMap<String, String> {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[async_trait]
impl ObjectService for S3ObjectService {
    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<String>,
    ) -> SimplicityResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_delimiter(delimiter.map(str::to_string))
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(storage_error("failed to list objects"))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                if key.is_empty() {
                    return None;
                }
                Some((key.to_string(), object.size().unwrap_or(0).max(0) as u64))
            })
            .collect();
        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();
        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            common_prefixes,
            next_token,
        })
    }

    async fn get_object(&self, key: &str) -> SimplicityResult<Blob> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let err = err.into_service_error();
                if err.is_no_such_key() {
                    return Err(SimplicityError::KeyNotFound);
                }
                return Err(storage_error("failed to get object")(err));
            }
        };

        let metadata: Metadata = output
            .metadata()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let body: ByteStream = Box::pin(futures::stream::unfold(
            output.body,
            |mut body| async move {
                let chunk = body.next().await?;
                Some((
                    chunk.map_err(storage_error("failed to read object body")),
                    body,
                ))
            },
        ));

        Ok(Blob::new(body, metadata))
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: &Metadata,
    ) -> SimplicityResult<()> {
        let length = body.len() as i64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(AwsByteStream::from(body))
            .content_length(length)
            .set_metadata(Some(to_remote_metadata(metadata)))
            .send()
            .await
            .map_err(storage_error("failed to put object"))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> SimplicityResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(storage_error("failed to delete object"))?;
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        metadata: &Metadata,
    ) -> SimplicityResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .set_metadata(Some(to_remote_metadata(metadata)))
            .send()
            .await
            .map_err(storage_error("failed to create multipart upload"))?;
        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| SimplicityError::Storage("multipart upload returned no id".to_string()))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> SimplicityResult<String> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(AwsByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                SimplicityError::Storage(format!(
                    "failed to upload part {part_number}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        output
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| SimplicityError::Storage(format!("part {part_number} returned no etag")))
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> SimplicityResult<()> {
        let parts = parts
            .into_iter()
            .map(|part| {
                AwsCompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(part.etag)
                    .build()
            })
            .collect();
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(storage_error("failed to complete multipart upload"))?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> SimplicityResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(storage_error("failed to abort multipart upload"))?;
        Ok(())
    }
}
