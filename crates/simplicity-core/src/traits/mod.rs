pub mod blob_store;
pub mod id_provider;

pub use blob_store::BlobStore;
pub use id_provider::IdProvider;
