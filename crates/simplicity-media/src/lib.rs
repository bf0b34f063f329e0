//! Image formats, transcoding, and lazily derived variants over a
//! [`simplicity_core::BlobStore`].

pub mod format;
pub mod metadata;
pub mod transcode;
pub mod variant;

pub use format::{
    CANONICAL, Container, FORMATS, Format, SOURCE, WEB_STD, WEB_THUMB_SQ, resolve_container,
    resolve_format, resolve_mime, storage_path,
};
pub use metadata::{ImageMetadata, extension_from_file_name, source_extension};
pub use transcode::{DefaultTranscoder, JPEG_QUALITY, ResizeStrategy, Transcoder, transcode_stream};
pub use variant::{Ingest, Variant, VariantMaterializer};
