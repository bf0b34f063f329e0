use std::sync::Arc;

use simplicity_blob_memory::MemoryBlobStore;
use simplicity_blob_s3::S3BlobStore;
use simplicity_core::config::{SimplicityConfig, StorageBackend};
use simplicity_core::{BlobStore, SnowflakeIdProvider};
use simplicity_media::DefaultTranscoder;
use simplicity_server::{AppState, build_router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/simplicity.toml".to_string());
    let config = SimplicityConfig::load(&config_path)?;

    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory blob store");
            serve(Arc::new(MemoryBlobStore::new()), config).await
        }
        StorageBackend::S3 => {
            let store = S3BlobStore::connect(&config.storage).await?;
            tracing::info!(
                bucket = config.storage.bucket.as_deref().unwrap_or_default(),
                threshold = store.threshold(),
                "using s3 blob store"
            );
            serve(Arc::new(store), config).await
        }
    }
}

async fn serve<B: BlobStore>(backend: Arc<B>, config: SimplicityConfig) -> anyhow::Result<()> {
    let id_provider = SnowflakeIdProvider::new(config.images.node_id)?;
    let addr = format!("0.0.0.0:{}", config.port);

    let state = AppState::new(
        backend,
        config,
        Arc::new(id_provider),
        Arc::new(DefaultTranscoder::new()),
    );
    let router = build_router(state);

    tracing::info!("simplicity-single starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
