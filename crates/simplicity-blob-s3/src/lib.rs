pub mod s3;
pub mod service;
pub mod store;

pub use s3::{S3BlobStore, S3ObjectService};
pub use service::{CompletedPart, ListPage, ObjectService};
pub use store::RemoteBlobStore;
