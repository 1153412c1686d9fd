//! Song metadata records.

use crate::error::ValidationError;
use crate::ids::{AssetId, SongId, UserId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Editable song metadata as supplied by a client.
///
/// Optional fields default to empty (or absent for `year`) when not supplied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongFields {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub duration: Option<String>,
}

impl SongFields {
    /// Create fields with the two required values.
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    /// Check that title and artist are non-empty after trimming.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() || self.artist.trim().is_empty() {
            return Err(ValidationError::TitleAndArtistRequired);
        }
        Ok(())
    }

    /// Trim required fields and drop blank optional ones.
    pub fn normalized(self) -> Self {
        fn non_blank(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            title: self.title.trim().to_string(),
            artist: self.artist.trim().to_string(),
            album: non_blank(self.album),
            genre: non_blank(self.genre),
            year: self.year,
            duration: non_blank(self.duration),
        }
    }
}

/// A song metadata record. Owns no audio bytes; `asset_id` points into the chunk store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub year: Option<i32>,
    pub duration: String,
    /// Set once at creation to the id returned by a successful chunked write.
    pub asset_id: AssetId,
    /// Uploading user. Immutable.
    pub owner_id: UserId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Song {
    /// Build a new song record for a freshly written asset.
    ///
    /// `fields` are expected to have passed [`SongFields::validate`].
    pub fn new(fields: SongFields, asset_id: AssetId, owner_id: UserId) -> Self {
        let now = OffsetDateTime::now_utc();
        let fields = fields.normalized();
        Self {
            id: SongId::new(),
            title: fields.title,
            artist: fields.artist,
            album: fields.album.unwrap_or_default(),
            genre: fields.genre.unwrap_or_default(),
            year: fields.year,
            duration: fields.duration.unwrap_or_default(),
            asset_id,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the editable fields. The asset reference and owner are untouched.
    pub fn apply_fields(&mut self, fields: SongFields) {
        let fields = fields.normalized();
        self.title = fields.title;
        self.artist = fields.artist;
        self.album = fields.album.unwrap_or_default();
        self.genre = fields.genre.unwrap_or_default();
        self.year = fields.year;
        self.duration = fields.duration.unwrap_or_default();
        self.updated_at = OffsetDateTime::now_utc();
    }
}

/// The authenticated caller of a library operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
}

impl Requester {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    /// Mutations require the caller to own the song.
    pub fn ensure_owner(&self, song: &Song) -> crate::Result<()> {
        if song.owner_id != self.user_id {
            return Err(crate::Error::Forbidden(format!(
                "song {} belongs to another user",
                song.id
            )));
        }
        Ok(())
    }
}
