//! Application state shared across handlers.

use picstash_core::config::AppConfig;
use picstash_metadata::MetadataStore;
use picstash_storage::ImageStore;
use std::sync::Arc;

/// Shared application state.
///
/// Created once at startup and cloned into every handler; the stores are
/// reference-counted handles, so clones share the same pool and upload root.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Image file storage.
    pub storage: Arc<dyn ImageStore>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
}

impl AppState {
    /// Create new application state.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid. Binaries validate before
    /// calling this, so a failure here is a programming error.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ImageStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        if let Err(e) = config.validate() {
            panic!("invalid configuration: {e}");
        }
        Self {
            config: Arc::new(config),
            storage,
            metadata,
        }
    }

    /// Public URL of a stored image, absolute when `public_base_url` is set.
    pub fn image_url(&self, filename: &str) -> String {
        self.prefixed(&format!("/images/{filename}"))
    }

    /// URL that deletes an image record.
    pub fn delete_url(&self, id: i64) -> String {
        self.prefixed(&format!("/api/images/{id}"))
    }

    fn prefixed(&self, path: &str) -> String {
        match self.config.server.public_base_url.as_deref() {
            Some(base) if !base.is_empty() => format!("{}{path}", base.trim_end_matches('/')),
            _ => path.to_string(),
        }
    }
}
