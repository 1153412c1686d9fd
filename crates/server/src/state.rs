//! Application state shared across handlers.

use crate::library::Library;
use musicspot_core::config::AppConfig;
use musicspot_metadata::MetadataStore;
use musicspot_storage::ChunkStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Segmented asset storage.
    pub chunks: ChunkStore,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
}

impl AppState {
    /// Create a new application state, rejecting invalid configuration.
    pub fn new(
        config: AppConfig,
        chunks: ChunkStore,
        metadata: Arc<dyn MetadataStore>,
    ) -> Result<Self, String> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            chunks,
            metadata,
        })
    }

    /// Library operations over this state's stores.
    pub fn library(&self) -> Library {
        Library::new(self.chunks.clone(), self.metadata.clone())
    }
}
