use super::{Library, LibraryError, LibraryResult};
use musicspot_core::{Requester, Song, SongFields, SongId};
use musicspot_metadata::{SongRepo, SongRow};
use tracing::{info, instrument};

impl Library {
    /// Replace a song's editable fields. Only the owner may edit.
    ///
    /// Omitted optional fields are cleared. The asset is never touched.
    #[instrument(skip(self, fields, requester), fields(user_id = %requester.user_id))]
    pub async fn update_song(
        &self,
        song_id: &SongId,
        fields: SongFields,
        requester: &Requester,
    ) -> LibraryResult<Song> {
        let mut song = self.get_song(song_id).await?;
        requester.ensure_owner(&song)?;
        fields.validate()?;

        song.apply_fields(fields);
        self.metadata
            .update_song(&SongRow::from(&song))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    LibraryError::NotFound(format!("song {song_id}"))
                } else {
                    LibraryError::Metadata(e)
                }
            })?;

        info!("song updated");
        Ok(song)
    }
}
