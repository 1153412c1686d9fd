//! Object storage abstraction and the chunk store for Music Spot.
//!
//! This crate provides:
//! - A flat key/value [`ObjectStore`] trait with atomic single-object writes
//! - A local filesystem backend
//! - [`ChunkStore`], which stores audio assets as ordered fixed-size segments

pub mod backends;
pub mod chunks;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use chunks::{ChunkStore, IncompleteAsset, SegmentStream};
pub use error::{StorageError, StorageResult, WritePosition};
pub use traits::{ObjectMeta, ObjectStore};

use musicspot_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    match config {
        StorageConfig::Filesystem { path } => {
            if path.as_os_str().is_empty() {
                return Err(StorageError::Config(
                    "filesystem storage requires a path".to_string(),
                ));
            }
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}
