use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

pub const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplicityConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Raise the default log level to debug.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub images: ImagesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint of an S3-compatible service; enables path-style addressing.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Uploads at least this large go through a multipart session.
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_images_prefix")]
    pub prefix: String,
    #[serde(default = "default_deleted_prefix")]
    pub deleted_prefix: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Node id embedded in generated snowflake ids (0..=1023).
    #[serde(default = "default_node_id")]
    pub node_id: u16,
}

fn default_port() -> u16 {
    8090
}

fn default_backend() -> StorageBackend {
    StorageBackend::Memory
}

fn default_multipart_threshold() -> u64 {
    10 * MIB
}

fn default_images_prefix() -> String {
    "images/files/".to_string()
}

fn default_deleted_prefix() -> String {
    "images/deleted-files/".to_string()
}

fn default_max_upload_bytes() -> u64 {
    48 * MIB
}

fn default_node_id() -> u16 {
    1
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: None,
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            multipart_threshold: default_multipart_threshold(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            prefix: default_images_prefix(),
            deleted_prefix: default_deleted_prefix(),
            max_upload_bytes: default_max_upload_bytes(),
            node_id: default_node_id(),
        }
    }
}

impl Default for SimplicityConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            debug: false,
            storage: StorageConfig::default(),
            images: ImagesConfig::default(),
        }
    }
}

impl SimplicityConfig {
    /// Defaults, overridden by the TOML file at `path` (if present), then by
    /// `SIMPLICITY_`-prefixed environment variables (`__` separates levels).
    pub fn load(path: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(SimplicityConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SIMPLICITY_").split("__"))
            .extract()
    }
}
