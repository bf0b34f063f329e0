use std::path::Path;

use chrono::{SecondsFormat, Utc};

use simplicity_core::{Metadata, SimplicityError, SimplicityResult};

use crate::format::{SOURCE, resolve_container};

pub const KEY_ID: &str = "id";
pub const KEY_FORMAT: &str = "format";
pub const KEY_TIMESTAMP: &str = "timestamp";
pub const KEY_ORIGINAL_NAME: &str = "original_name";
pub const KEY_EXTENSION: &str = "extension";

/// Metadata attached to every variant of an uploaded image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub id: String,
    pub format: String,
    /// RFC 3339 upload time.
    pub timestamp: String,
    pub original_name: String,
    /// Normalized container extension of the uploaded file.
    pub extension: String,
}

impl ImageMetadata {
    /// Record for a fresh upload. Fails with `UnsupportedEncoding` when the
    /// file name does not carry a decodable image extension.
    pub fn for_upload(id: &str, original_name: &str) -> SimplicityResult<Self> {
        let extension = extension_from_file_name(original_name)?;
        Ok(Self {
            id: id.to_string(),
            format: SOURCE.name.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            original_name: original_name.to_string(),
            extension: extension.to_string(),
        })
    }

    pub fn to_map(&self) -> Metadata {
        [
            (KEY_ID, &self.id),
            (KEY_FORMAT, &self.format),
            (KEY_TIMESTAMP, &self.timestamp),
            (KEY_ORIGINAL_NAME, &self.original_name),
            (KEY_EXTENSION, &self.extension),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }

    /// Missing fields come back empty.
    pub fn from_map(map: &Metadata) -> Self {
        let field = |key: &str| map.get(key).cloned().unwrap_or_default();
        Self {
            id: field(KEY_ID),
            format: field(KEY_FORMAT),
            timestamp: field(KEY_TIMESTAMP),
            original_name: field(KEY_ORIGINAL_NAME),
            extension: field(KEY_EXTENSION),
        }
    }
}

/// Normalized extension (`jpeg` or `png`) of an uploaded file name.
pub fn extension_from_file_name(name: &str) -> SimplicityResult<&'static str> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| SimplicityError::UnsupportedEncoding(format!("no extension in {name:?}")))?;
    Ok(resolve_container(ext)?.ext())
}

/// Recognized extension of the original upload, read from the recorded
/// extension first and the original file name second.
pub fn source_extension(metadata: &Metadata) -> Option<&'static str> {
    let recorded = metadata
        .get(KEY_EXTENSION)
        .and_then(|ext| resolve_container(ext).ok());
    recorded
        .map(|c| c.ext())
        .or_else(|| {
            metadata
                .get(KEY_ORIGINAL_NAME)
                .and_then(|name| extension_from_file_name(name).ok())
        })
}
