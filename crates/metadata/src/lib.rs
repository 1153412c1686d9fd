//! Metadata store abstraction and implementation for Music Spot.
//!
//! This crate holds the control-plane records:
//! - Song metadata and its reference to a chunk store asset
//! - Login sessions used to identify callers

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{SessionRow, SongRow};
pub use repos::{SessionRepo, SongRepo};
pub use store::{MetadataStore, SqliteStore};

use musicspot_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            if path.as_os_str().is_empty() {
                return Err(MetadataError::Config(
                    "sqlite metadata requires a path".to_string(),
                ));
            }
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
