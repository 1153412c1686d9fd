use super::{Library, LibraryError, LibraryResult};
use crate::metrics;
use musicspot_core::{Requester, SongId};
use musicspot_metadata::SongRepo;
use musicspot_storage::StorageError;
use tracing::{error, info, instrument, warn};

/// Result of a permitted deletion. The song record is gone in every case.
#[derive(Debug)]
pub enum DeleteOutcome {
    /// Asset and song both removed.
    Committed,
    /// The asset was already missing; the record pointed at nothing.
    MetadataStale,
    /// The asset could not be removed and is left for reconciliation.
    AssetOrphaned { error: StorageError },
}

impl DeleteOutcome {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::MetadataStale => "metadata_stale",
            Self::AssetOrphaned { .. } => "asset_orphaned",
        }
    }
}

impl Library {
    /// Delete a song and its asset. Only the owner may delete.
    ///
    /// Asset removal failures do not stop the record from being deleted. When two
    /// deletions race, the loser gets `NotFound`.
    #[instrument(skip(self, requester), fields(user_id = %requester.user_id))]
    pub async fn delete_song(
        &self,
        song_id: &SongId,
        requester: &Requester,
    ) -> LibraryResult<DeleteOutcome> {
        let song = self.get_song(song_id).await?;
        requester.ensure_owner(&song)?;

        let outcome = match self.chunks.delete(&song.asset_id).await {
            Ok(()) => DeleteOutcome::Committed,
            Err(e) if e.is_not_found() => {
                warn!(asset_id = %song.asset_id, "asset already missing");
                DeleteOutcome::MetadataStale
            }
            Err(error) => {
                error!(
                    asset_id = %song.asset_id,
                    error = %error,
                    "asset delete failed, leaving it for reconciliation"
                );
                DeleteOutcome::AssetOrphaned { error }
            }
        };

        self.metadata
            .delete_song(*song_id.as_uuid())
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    LibraryError::NotFound(format!("song {song_id}"))
                } else {
                    LibraryError::Metadata(e)
                }
            })?;

        metrics::SONGS_DELETED
            .with_label_values(&[outcome.as_str()])
            .inc();
        info!(asset_id = %song.asset_id, outcome = outcome.as_str(), "song deleted");
        Ok(outcome)
    }
}
