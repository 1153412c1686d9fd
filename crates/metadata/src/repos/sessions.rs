//! Session repository.

use crate::error::MetadataResult;
use crate::models::SessionRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for login sessions issued by the account service.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Create a session.
    async fn create_session(&self, session: &SessionRow) -> MetadataResult<()>;

    /// Get a session by token hash.
    async fn get_session_by_hash(&self, token_hash: &str) -> MetadataResult<Option<SessionRow>>;

    /// Update last seen time.
    async fn touch_session(&self, session_id: Uuid, seen_at: OffsetDateTime)
    -> MetadataResult<()>;

    /// Revoke a session.
    async fn revoke_session(
        &self,
        session_id: Uuid,
        revoked_at: OffsetDateTime,
    ) -> MetadataResult<()>;
}
