pub mod config;
pub mod error;
pub mod id;
pub mod path;
pub mod scoped;
pub mod traits;
pub mod types;

pub use config::SimplicityConfig;
pub use error::{SimplicityError, SimplicityResult};
pub use id::{SnowflakeIdProvider, UuidIdProvider};
pub use path::{DELIMITER, dir_prefix, join_path};
pub use scoped::ScopedBlobStore;
pub use traits::{BlobStore, IdProvider};
pub use types::{Blob, ByteStream, ListEntry, Metadata, collect_stream, stream_from_bytes};
