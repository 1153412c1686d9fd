use super::{Library, LibraryError, LibraryResult};
use crate::metrics;
use futures::StreamExt;
use musicspot_core::{AssetHeader, AssetId, SongId};
use musicspot_storage::SegmentStream;
use tracing::{error, instrument};

impl Library {
    /// Open a committed asset by id.
    #[instrument(skip(self))]
    pub async fn open_asset(
        &self,
        asset_id: &AssetId,
    ) -> LibraryResult<(AssetHeader, SegmentStream)> {
        let (header, stream) = self.chunks.read(asset_id).await.map_err(|e| {
            if e.is_not_found() {
                LibraryError::NotFound(format!("asset {asset_id}"))
            } else {
                LibraryError::Storage(e)
            }
        })?;
        metrics::STREAMS_OPENED.inc();
        Ok((header, metered(*asset_id, stream)))
    }

    /// Open the asset behind a song. Serves `GET /songs/{song_id}/stream`.
    ///
    /// Any authenticated caller may stream any song. A song whose asset is gone is an
    /// integrity violation, never an empty stream.
    #[instrument(skip(self))]
    pub async fn open_song(&self, song_id: &SongId) -> LibraryResult<(AssetHeader, SegmentStream)> {
        let song = self.get_song(song_id).await?;
        match self.open_asset(&song.asset_id).await {
            Err(LibraryError::NotFound(_)) => {
                error!(
                    song_id = %song.id,
                    asset_id = %song.asset_id,
                    "song references a missing asset"
                );
                Err(LibraryError::Integrity(format!(
                    "song {} references missing asset {}",
                    song.id, song.asset_id
                )))
            }
            other => other,
        }
    }
}

/// Count bytes as they leave and log the first failure.
fn metered(asset_id: AssetId, stream: SegmentStream) -> SegmentStream {
    Box::pin(stream.inspect(move |item| match item {
        Ok(bytes) => metrics::BYTES_STREAMED.inc_by(bytes.len() as u64),
        Err(e) => {
            metrics::STREAM_ERRORS.inc();
            error!(asset_id = %asset_id, error = %e, "asset stream failed mid-transfer");
        }
    }))
}
