//! Song repository.

use crate::error::MetadataResult;
use crate::models::SongRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for song metadata records.
#[async_trait]
pub trait SongRepo: Send + Sync {
    /// Insert a new song. Fails with `AlreadyExists` if the id is taken.
    async fn create_song(&self, song: &SongRow) -> MetadataResult<()>;

    /// Get a song by ID.
    async fn get_song(&self, song_id: Uuid) -> MetadataResult<Option<SongRow>>;

    /// Get the song referencing an asset, if any.
    async fn get_song_by_asset(&self, asset_id: Uuid) -> MetadataResult<Option<SongRow>>;

    /// Overwrite the editable fields and `updated_at`.
    ///
    /// `asset_id`, `owner_id` and `created_at` are never changed. `NotFound` if absent.
    async fn update_song(&self, song: &SongRow) -> MetadataResult<()>;

    /// Delete a song. `NotFound` if no row was removed.
    async fn delete_song(&self, song_id: Uuid) -> MetadataResult<()>;

    /// All songs, newest first.
    async fn list_songs(&self) -> MetadataResult<Vec<SongRow>>;

    /// Every asset id referenced by a song.
    async fn list_referenced_asset_ids(&self) -> MetadataResult<Vec<Uuid>>;
}
