//! Song library operations spanning the chunk store and the metadata store.
//!
//! The two stores share no transaction. Operations that touch both report what
//! actually happened through explicit outcome types instead of rolling back:
//! - [`UploadOutcome`] for uploads whose song record could not be created
//! - [`DeleteOutcome`] for deletions whose asset was missing or could not be removed
//!
//! Leftovers are found and cleaned up by [`Library::find_orphans`].

mod delete;
mod edit;
pub mod error;
mod reconcile;
mod stream;
mod upload;

pub use delete::DeleteOutcome;
pub use error::{LibraryError, LibraryResult};
pub use reconcile::{OrphanReport, PurgeStats};
pub use upload::UploadOutcome;

use musicspot_core::{Song, SongId};
use musicspot_metadata::{MetadataStore, SongRepo};
use musicspot_storage::ChunkStore;
use std::sync::Arc;

/// Handle over both stores. Cheap to clone.
#[derive(Clone)]
pub struct Library {
    chunks: ChunkStore,
    metadata: Arc<dyn MetadataStore>,
}

impl Library {
    pub fn new(chunks: ChunkStore, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { chunks, metadata }
    }

    /// Look up a song record.
    pub async fn get_song(&self, song_id: &SongId) -> LibraryResult<Song> {
        self.metadata
            .get_song(*song_id.as_uuid())
            .await?
            .map(Song::from)
            .ok_or_else(|| LibraryError::NotFound(format!("song {song_id}")))
    }

    /// Every song, newest first.
    pub async fn list_songs(&self) -> LibraryResult<Vec<Song>> {
        let rows = self.metadata.list_songs().await?;
        Ok(rows.into_iter().map(Song::from).collect())
    }
}
