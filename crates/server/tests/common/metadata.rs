//! Metadata store test utilities.

use async_trait::async_trait;
use musicspot_core::UserId;
use musicspot_metadata::{
    MetadataError, MetadataResult, MetadataStore, SessionRepo, SessionRow, SongRepo, SongRow,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use uuid::Uuid;

use super::fixtures::sha256_hash;

/// Insert a live session for `user_id` and return its bearer secret.
#[allow(dead_code)]
pub async fn create_session(metadata: &Arc<dyn MetadataStore>, user_id: UserId) -> String {
    let secret = format!("test-session-{}", Uuid::new_v4());
    let session = SessionRow {
        session_id: Uuid::new_v4(),
        user_id: *user_id.as_uuid(),
        token_hash: sha256_hash(secret.as_bytes()),
        created_at: OffsetDateTime::now_utc(),
        expires_at: None,
        revoked_at: None,
        last_seen_at: None,
    };
    metadata
        .create_session(&session)
        .await
        .expect("Failed to create session");
    secret
}

/// Metadata store that delegates to an inner store but can be told to reject
/// song creation. Simulates the metadata store failing after an asset write.
#[allow(dead_code)]
pub struct FailingMetadata {
    inner: Arc<dyn MetadataStore>,
    fail_create_song: AtomicBool,
}

#[allow(dead_code)]
impl FailingMetadata {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_create_song: AtomicBool::new(false),
        })
    }

    pub fn fail_create_song(&self, fail: bool) {
        self.fail_create_song.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SongRepo for FailingMetadata {
    async fn create_song(&self, song: &SongRow) -> MetadataResult<()> {
        if self.fail_create_song.load(Ordering::SeqCst) {
            return Err(MetadataError::Internal("injected create_song failure".into()));
        }
        self.inner.create_song(song).await
    }

    async fn get_song(&self, song_id: Uuid) -> MetadataResult<Option<SongRow>> {
        self.inner.get_song(song_id).await
    }

    async fn get_song_by_asset(&self, asset_id: Uuid) -> MetadataResult<Option<SongRow>> {
        self.inner.get_song_by_asset(asset_id).await
    }

    async fn update_song(&self, song: &SongRow) -> MetadataResult<()> {
        self.inner.update_song(song).await
    }

    async fn delete_song(&self, song_id: Uuid) -> MetadataResult<()> {
        self.inner.delete_song(song_id).await
    }

    async fn list_songs(&self) -> MetadataResult<Vec<SongRow>> {
        self.inner.list_songs().await
    }

    async fn list_referenced_asset_ids(&self) -> MetadataResult<Vec<Uuid>> {
        self.inner.list_referenced_asset_ids().await
    }
}

#[async_trait]
impl SessionRepo for FailingMetadata {
    async fn create_session(&self, session: &SessionRow) -> MetadataResult<()> {
        self.inner.create_session(session).await
    }

    async fn get_session_by_hash(&self, token_hash: &str) -> MetadataResult<Option<SessionRow>> {
        self.inner.get_session_by_hash(token_hash).await
    }

    async fn touch_session(
        &self,
        session_id: Uuid,
        seen_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        self.inner.touch_session(session_id, seen_at).await
    }

    async fn revoke_session(
        &self,
        session_id: Uuid,
        revoked_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        self.inner.revoke_session(session_id, revoked_at).await
    }
}

#[async_trait]
impl MetadataStore for FailingMetadata {
    async fn migrate(&self) -> MetadataResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }
}
