//! Server test utilities.

use super::metadata::{FailingMetadata, create_session};
use super::storage::FaultyBackend;
use musicspot_core::UserId;
use musicspot_core::config::{AppConfig, MetadataConfig, StorageConfig};
use musicspot_metadata::{MetadataStore, SqliteStore};
use musicspot_server::{AppState, create_router};
use musicspot_storage::{ChunkStore, FilesystemBackend, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    /// Present when built with [`TestServer::with_failing_metadata`].
    pub failing: Option<Arc<FailingMetadata>>,
    /// Present when built with [`TestServer::with_faulty_storage`].
    pub faulty: Option<Arc<FaultyBackend>>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::build(|_| {}, false, false).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::build(modifier, false, false).await
    }

    /// Create a test server whose metadata store can be made to reject song creation.
    pub async fn with_failing_metadata() -> Self {
        Self::build(|_| {}, true, false).await
    }

    /// Create a test server whose object store can be made to fail writes and deletes.
    pub async fn with_faulty_storage() -> Self {
        Self::build(|_| {}, false, true).await
    }

    async fn build<F>(modifier: F, failing: bool, faulty: bool) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );
        let (storage, faulty) = if faulty {
            let wrapper = FaultyBackend::new(storage);
            (wrapper.clone() as Arc<dyn ObjectStore>, Some(wrapper))
        } else {
            (storage, None)
        };

        let db_path = temp_dir.path().join("metadata.db");
        let sqlite: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("Failed to create metadata store"),
        );

        let (metadata, failing) = if failing {
            let wrapper = FailingMetadata::new(sqlite);
            (wrapper.clone() as Arc<dyn MetadataStore>, Some(wrapper))
        } else {
            (sqlite, None)
        };

        let mut config = AppConfig {
            storage: StorageConfig::Filesystem {
                path: storage_path.clone(),
            },
            metadata: MetadataConfig::Sqlite {
                path: db_path,
                query_timeout_secs: None,
            },
            ..AppConfig::for_testing()
        };
        modifier(&mut config);

        let state = AppState::new(config, ChunkStore::new(storage), metadata)
            .expect("Invalid test configuration");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            failing,
            faulty,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Create a user with a live session. Returns the user id and bearer secret.
    pub async fn login(&self) -> (UserId, String) {
        let user_id = UserId::new();
        let secret = create_session(&self.state.metadata, user_id).await;
        (user_id, secret)
    }
}
