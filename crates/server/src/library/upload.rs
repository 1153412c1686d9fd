use super::{Library, LibraryError, LibraryResult};
use crate::metrics;
use musicspot_core::{AssetId, Song, UploadRequest, UserId};
use musicspot_metadata::{MetadataError, SongRepo, SongRow};
use musicspot_storage::StorageError;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Result of an upload that passed validation and wrote its asset.
#[derive(Debug)]
pub enum UploadOutcome {
    /// Asset written and song created.
    Committed(Song),
    /// Asset written but the song record could not be created. The asset is left
    /// in place for reconciliation.
    AssetOrphaned {
        asset_id: AssetId,
        error: MetadataError,
    },
}

impl Library {
    /// Validate an upload, store its bytes and create the song owned by `owner_id`.
    ///
    /// A failed segment write returns [`StorageError::WriteFailure`] after the partial
    /// segments are discarded (best effort).
    #[instrument(skip(self, request), fields(owner_id = %owner_id))]
    pub async fn upload(
        &self,
        request: UploadRequest,
        owner_id: UserId,
    ) -> LibraryResult<UploadOutcome> {
        let upload = request.validate().inspect_err(|e| {
            metrics::record_upload_rejected(e);
            debug!(reason = %e, "upload rejected");
        })?;

        let started = Instant::now();
        let size = upload.data.len() as u64;

        let header = match self
            .chunks
            .write(upload.data, &upload.original_name, &upload.content_type)
            .await
        {
            Ok(header) => header,
            Err(err) => {
                metrics::UPLOAD_WRITE_FAILURES.inc();
                error!(error = %err, "asset write failed");
                if let StorageError::WriteFailure { asset_id, .. } = &err {
                    match self.chunks.discard_partial(asset_id).await {
                        Ok(removed) => {
                            debug!(asset_id = %asset_id, removed, "discarded partial asset")
                        }
                        Err(e) => warn!(
                            asset_id = %asset_id,
                            error = %e,
                            "failed to discard partial asset, leaving it for reconciliation"
                        ),
                    }
                }
                return Err(LibraryError::Storage(err));
            }
        };

        let song = Song::new(upload.fields, header.asset_id, owner_id);
        if let Err(error) = self.metadata.create_song(&SongRow::from(&song)).await {
            metrics::UPLOADS_ORPHANED.inc();
            error!(
                asset_id = %header.asset_id,
                error = %error,
                "song record not created, asset orphaned"
            );
            return Ok(UploadOutcome::AssetOrphaned {
                asset_id: header.asset_id,
                error,
            });
        }

        metrics::UPLOADS_COMMITTED.inc();
        metrics::BYTES_UPLOADED.inc_by(size);
        metrics::UPLOAD_DURATION.observe(started.elapsed().as_secs_f64());
        info!(
            song_id = %song.id,
            asset_id = %song.asset_id,
            size,
            segments = header.segment_count,
            "song uploaded"
        );

        Ok(UploadOutcome::Committed(song))
    }
}
