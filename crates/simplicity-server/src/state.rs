use std::sync::Arc;

use simplicity_core::config::SimplicityConfig;
use simplicity_core::{BlobStore, IdProvider, ScopedBlobStore, dir_prefix};
use simplicity_media::{Transcoder, VariantMaterializer};

pub struct AppState<B: BlobStore> {
    /// Variants of live images, served from the `images.prefix` namespace.
    pub media: Arc<VariantMaterializer<ScopedBlobStore<B>>>,
    /// Archive of deleted sources, the `images.deleted_prefix` namespace.
    pub deleted: Arc<ScopedBlobStore<B>>,
    pub id_provider: Arc<dyn IdProvider>,
    pub config: Arc<SimplicityConfig>,
}

impl<B: BlobStore> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            media: Arc::clone(&self.media),
            deleted: Arc::clone(&self.deleted),
            id_provider: Arc::clone(&self.id_provider),
            config: Arc::clone(&self.config),
        }
    }
}

impl<B: BlobStore> AppState<B> {
    /// Carve the image namespaces out of one shared backend. Configured
    /// prefixes are closed with the delimiter so one namespace never lists
    /// another that merely shares its leading characters.
    pub fn new(
        backend: Arc<B>,
        config: SimplicityConfig,
        id_provider: Arc<dyn IdProvider>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let images = Arc::new(ScopedBlobStore::new(
            Arc::clone(&backend),
            namespace(&config.images.prefix),
        ));
        let deleted = Arc::new(ScopedBlobStore::new(
            backend,
            namespace(&config.images.deleted_prefix),
        ));
        Self {
            media: Arc::new(VariantMaterializer::new(images, transcoder)),
            deleted,
            id_provider,
            config: Arc::new(config),
        }
    }

    pub fn images(&self) -> &Arc<ScopedBlobStore<B>> {
        self.media.store()
    }
}

fn namespace(prefix: &str) -> String {
    if prefix.is_empty() {
        String::new()
    } else {
        dir_prefix(prefix)
    }
}
