use super::{Library, LibraryResult};
use crate::metrics;
use musicspot_core::{AssetId, SongId};
use musicspot_metadata::SongRepo;
use serde::Serialize;
use std::collections::HashSet;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

/// Disagreements between the chunk store and the metadata store.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    /// Committed assets older than the grace period with no song pointing at them.
    pub orphaned_assets: Vec<AssetId>,
    /// Segment groups with no header, left behind by failed writes.
    pub incomplete_assets: Vec<AssetId>,
    /// Songs whose asset is gone.
    pub dangling_songs: Vec<SongId>,
}

impl OrphanReport {
    pub fn is_empty(&self) -> bool {
        self.orphaned_assets.is_empty()
            && self.incomplete_assets.is_empty()
            && self.dangling_songs.is_empty()
    }
}

/// What a purge removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeStats {
    pub assets_deleted: usize,
    pub incomplete_discarded: usize,
    pub errors: usize,
}

impl Library {
    /// Compare both stores and report what does not line up.
    ///
    /// Assets and segment groups younger than `grace` are skipped so uploads in
    /// flight are not reported. A grace reaching before the earliest representable
    /// time skips everything. Nothing is modified.
    #[instrument(skip(self))]
    pub async fn find_orphans(&self, grace: Duration) -> LibraryResult<OrphanReport> {
        let cutoff = OffsetDateTime::now_utc().checked_sub(grace);

        // Songs are listed before assets so a song created mid-scan cannot make its
        // fresh asset look orphaned.
        let songs = self.metadata.list_songs().await?;
        let referenced: HashSet<AssetId> = self
            .metadata
            .list_referenced_asset_ids()
            .await?
            .into_iter()
            .map(AssetId::from_uuid)
            .collect();

        let headers = self.chunks.list_assets().await?;
        let committed: HashSet<AssetId> = headers.iter().map(|h| h.asset_id).collect();

        let orphaned_assets = headers
            .iter()
            .filter(|h| {
                !referenced.contains(&h.asset_id) && cutoff.is_some_and(|c| h.uploaded_at <= c)
            })
            .map(|h| h.asset_id)
            .collect();

        let incomplete_assets = self
            .chunks
            .list_incomplete()
            .await?
            .into_iter()
            .filter(|a| cutoff.is_some_and(|c| a.last_modified.is_none_or(|t| t <= c)))
            .map(|a| a.asset_id)
            .collect();

        let dangling_songs = songs
            .iter()
            .filter(|s| !committed.contains(&AssetId::from_uuid(s.asset_id)))
            .map(|s| SongId::from_uuid(s.song_id))
            .collect();

        let report = OrphanReport {
            orphaned_assets,
            incomplete_assets,
            dangling_songs,
        };

        metrics::ORPHANS_FOUND
            .with_label_values(&["orphaned_asset"])
            .set(report.orphaned_assets.len() as i64);
        metrics::ORPHANS_FOUND
            .with_label_values(&["incomplete_asset"])
            .set(report.incomplete_assets.len() as i64);
        metrics::ORPHANS_FOUND
            .with_label_values(&["dangling_song"])
            .set(report.dangling_songs.len() as i64);

        for song_id in &report.dangling_songs {
            warn!(song_id = %song_id, "song references a missing asset");
        }
        info!(
            orphaned = report.orphaned_assets.len(),
            incomplete = report.incomplete_assets.len(),
            dangling = report.dangling_songs.len(),
            "reconciliation scan finished"
        );

        Ok(report)
    }

    /// Remove the orphaned and incomplete assets named in `report`.
    ///
    /// Songs are never deleted. Failures are logged and counted, not returned.
    #[instrument(skip(self, report))]
    pub async fn purge_orphans(&self, report: &OrphanReport) -> PurgeStats {
        let mut stats = PurgeStats::default();

        for asset_id in &report.orphaned_assets {
            // Recheck in case a song was attached since the scan.
            match self.metadata.get_song_by_asset(*asset_id.as_uuid()).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    warn!(asset_id = %asset_id, error = %e, "skipping orphan, lookup failed");
                    stats.errors += 1;
                    continue;
                }
            }

            match self.chunks.delete(asset_id).await {
                Ok(()) => stats.assets_deleted += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(asset_id = %asset_id, error = %e, "failed to delete orphaned asset");
                    stats.errors += 1;
                }
            }
        }

        for asset_id in &report.incomplete_assets {
            match self.chunks.discard_partial(asset_id).await {
                Ok(_) => stats.incomplete_discarded += 1,
                Err(e) => {
                    warn!(asset_id = %asset_id, error = %e, "failed to discard incomplete asset");
                    stats.errors += 1;
                }
            }
        }

        metrics::ORPHANS_PURGED.inc_by((stats.assets_deleted + stats.incomplete_discarded) as u64);
        info!(
            assets_deleted = stats.assets_deleted,
            incomplete_discarded = stats.incomplete_discarded,
            errors = stats.errors,
            "orphan purge finished"
        );
        stats
    }
}
