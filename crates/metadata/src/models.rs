//! Database models mapping to the metadata schema.

use musicspot_core::{AssetId, Song, SongId, UserId};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Song record.
#[derive(Debug, Clone, FromRow)]
pub struct SongRow {
    pub song_id: Uuid,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub year: Option<i64>,
    pub duration: String,
    pub asset_id: Uuid,
    pub owner_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<&Song> for SongRow {
    fn from(song: &Song) -> Self {
        Self {
            song_id: *song.id.as_uuid(),
            title: song.title.clone(),
            artist: song.artist.clone(),
            album: song.album.clone(),
            genre: song.genre.clone(),
            year: song.year.map(i64::from),
            duration: song.duration.clone(),
            asset_id: *song.asset_id.as_uuid(),
            owner_id: *song.owner_id.as_uuid(),
            created_at: song.created_at,
            updated_at: song.updated_at,
        }
    }
}

impl From<SongRow> for Song {
    fn from(row: SongRow) -> Self {
        Self {
            id: SongId::from_uuid(row.song_id),
            title: row.title,
            artist: row.artist,
            album: row.album,
            genre: row.genre,
            // Only ever written from an i32.
            year: row.year.and_then(|y| i32::try_from(y).ok()),
            duration: row.duration,
            asset_id: AssetId::from_uuid(row.asset_id),
            owner_id: UserId::from_uuid(row.owner_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Login session record. Rows are created by the account service; this crate
/// only looks them up.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub session_id: Uuid,
    pub user_id: Uuid,
    /// SHA-256 hex of the bearer secret.
    pub token_hash: String,
    pub created_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub last_seen_at: Option<OffsetDateTime>,
}

impl SessionRow {
    /// Not revoked and not past its expiry.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_none_or(|expires| expires > now)
    }
}
