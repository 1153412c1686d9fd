//! Segmented asset storage on top of an [`ObjectStore`].
//!
//! An asset is stored as fixed-size segments under `assets/{id}/segments/` followed by a
//! JSON header at `assets/{id}/header.json`. The header is written last and removed
//! first, so its presence is what makes an asset visible to readers.

use crate::error::{StorageError, StorageResult, WritePosition};
use crate::traits::ObjectStore;
use bytes::Bytes;
use futures::Stream;
use musicspot_core::asset::{self, AssetHeader, SEGMENT_SIZE};
use musicspot_core::AssetId;
use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

/// Ordered, single-pass stream of an asset's segments.
///
/// Each segment is fetched from the object store only when the stream is polled.
pub type SegmentStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Segments with no committed header, as found by a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncompleteAsset {
    pub asset_id: AssetId,
    /// Number of objects found under the asset's prefix.
    pub object_count: usize,
    /// Most recent modification time among those objects, when the backend reports one.
    pub last_modified: Option<OffsetDateTime>,
}

/// Handle to the chunk store. Cheap to clone.
#[derive(Clone)]
pub struct ChunkStore {
    store: Arc<dyn ObjectStore>,
    segment_size: u64,
}

impl ChunkStore {
    /// Create a chunk store using the standard segment size.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            segment_size: SEGMENT_SIZE,
        }
    }

    /// Create a chunk store with a custom segment size. Zero falls back to the default.
    pub fn with_segment_size(store: Arc<dyn ObjectStore>, segment_size: u64) -> Self {
        let segment_size = if segment_size == 0 {
            SEGMENT_SIZE
        } else {
            segment_size
        };
        Self {
            store,
            segment_size,
        }
    }

    /// The underlying object store.
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn segment_size(&self) -> u64 {
        self.segment_size
    }

    /// Store `data` as a new asset and return its committed header.
    ///
    /// Not atomic: on failure the segments written so far stay behind until
    /// [`ChunkStore::discard_partial`] is called for the returned asset id.
    #[instrument(skip(self, data), fields(size = data.len(), asset_id = tracing::field::Empty))]
    pub async fn write(
        &self,
        data: Bytes,
        original_name: &str,
        content_type: &str,
    ) -> StorageResult<AssetHeader> {
        let asset_id = AssetId::new();
        tracing::Span::current().record("asset_id", tracing::field::display(&asset_id));

        let header = AssetHeader::new(
            asset_id,
            original_name,
            content_type,
            data.len() as u64,
            self.segment_size,
        );

        let segment_size = self.segment_size as usize;
        for sequence in 0..header.segment_count {
            let start = sequence as usize * segment_size;
            let end = (start + segment_size).min(data.len());
            let key = asset::segment_key(&asset_id, sequence);
            self.store
                .put(&key, data.slice(start..end))
                .await
                .map_err(|source| StorageError::WriteFailure {
                    asset_id,
                    position: WritePosition::Segment(sequence),
                    source: Box::new(source),
                })?;
        }

        let encoded = serde_json::to_vec(&header)?;
        self.store
            .put(&header.header_key(), Bytes::from(encoded))
            .await
            .map_err(|source| StorageError::WriteFailure {
                asset_id,
                position: WritePosition::Header,
                source: Box::new(source),
            })?;

        debug!(
            segments = header.segment_count,
            total_length = header.total_length,
            "asset committed"
        );
        Ok(header)
    }

    /// Fetch an asset's header.
    pub async fn head(&self, asset_id: &AssetId) -> StorageResult<AssetHeader> {
        let raw = match self.store.get(&asset::header_key(asset_id)).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => {
                return Err(StorageError::NotFound(format!("asset {asset_id}")));
            }
            Err(e) => return Err(e),
        };

        let header: AssetHeader = serde_json::from_slice(&raw)?;
        if header.asset_id != *asset_id {
            return Err(StorageError::Corrupt(format!(
                "header for asset {asset_id} names asset {}",
                header.asset_id
            )));
        }
        Ok(header)
    }

    /// Open an asset for reading.
    ///
    /// Returns `NotFound` when no header exists. A segment that disappears or has the
    /// wrong length while the stream is consumed surfaces as an error item, after
    /// which the stream ends.
    #[instrument(skip(self))]
    pub async fn read(&self, asset_id: &AssetId) -> StorageResult<(AssetHeader, SegmentStream)> {
        let header = self.head(asset_id).await?;
        let stream = segment_stream(self.store.clone(), header.clone());
        Ok((header, stream))
    }

    /// Delete an asset: header first, then every segment.
    ///
    /// Returns `NotFound` if the asset has no header, including when it was already deleted.
    #[instrument(skip(self))]
    pub async fn delete(&self, asset_id: &AssetId) -> StorageResult<()> {
        match self.store.delete(&asset::header_key(asset_id)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                return Err(StorageError::NotFound(format!("asset {asset_id}")));
            }
            Err(e) => return Err(e),
        }

        let removed = self.remove_segments(asset_id).await?;
        debug!(segments = removed, "asset deleted");
        Ok(())
    }

    /// Remove the segments of an asset whose header was never committed.
    ///
    /// Returns the number of objects removed. Refuses committed assets.
    #[instrument(skip(self))]
    pub async fn discard_partial(&self, asset_id: &AssetId) -> StorageResult<usize> {
        if self.store.exists(&asset::header_key(asset_id)).await? {
            return Err(StorageError::AlreadyExists(format!(
                "asset {asset_id} is committed"
            )));
        }
        self.remove_segments(asset_id).await
    }

    async fn remove_segments(&self, asset_id: &AssetId) -> StorageResult<usize> {
        let keys = self.store.list(&asset::segments_prefix(asset_id)).await?;
        let mut removed = 0;
        for key in keys {
            match self.store.delete(&key).await {
                Ok(()) => removed += 1,
                // Another deleter got there first.
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    /// Headers of every committed asset.
    ///
    /// Headers that vanish or fail to decode during the listing are skipped.
    #[instrument(skip(self))]
    pub async fn list_assets(&self) -> StorageResult<Vec<AssetHeader>> {
        let mut ids: Vec<AssetId> = self
            .store
            .list(asset::assets_root())
            .await?
            .iter()
            .filter(|key| key.ends_with("/header.json"))
            .filter_map(|key| asset::asset_id_from_key(key))
            .collect();
        ids.sort();
        ids.dedup();

        let mut headers = Vec::with_capacity(ids.len());
        for asset_id in ids {
            match self.head(&asset_id).await {
                Ok(header) => headers.push(header),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(asset_id = %asset_id, error = %e, "skipping unreadable asset header"),
            }
        }
        Ok(headers)
    }

    /// Asset ids that have segments but no header.
    #[instrument(skip(self))]
    pub async fn list_incomplete(&self) -> StorageResult<Vec<IncompleteAsset>> {
        let mut groups: BTreeMap<AssetId, (bool, Vec<String>)> = BTreeMap::new();
        for key in self.store.list(asset::assets_root()).await? {
            let Some(asset_id) = asset::asset_id_from_key(&key) else {
                continue;
            };
            let entry = groups.entry(asset_id).or_default();
            if key.ends_with("/header.json") {
                entry.0 = true;
            } else {
                entry.1.push(key);
            }
        }

        let mut incomplete = Vec::new();
        for (asset_id, (has_header, keys)) in groups {
            if has_header || keys.is_empty() {
                continue;
            }
            let mut last_modified = None;
            for key in &keys {
                if let Ok(meta) = self.store.head(key).await {
                    last_modified = last_modified.max(meta.last_modified);
                }
            }
            incomplete.push(IncompleteAsset {
                asset_id,
                object_count: keys.len(),
                last_modified,
            });
        }
        Ok(incomplete)
    }

    /// Check the underlying object store.
    pub async fn health_check(&self) -> StorageResult<()> {
        self.store.health_check().await
    }
}

fn segment_stream(store: Arc<dyn ObjectStore>, header: AssetHeader) -> SegmentStream {
    Box::pin(async_stream::try_stream! {
        let asset_id = header.asset_id;
        for sequence in 0..header.segment_count {
            let key = asset::segment_key(&asset_id, sequence);
            let data = store.get(&key).await.map_err(|e| {
                if e.is_not_found() {
                    StorageError::NotFound(format!("asset {asset_id} segment {sequence}"))
                } else {
                    e
                }
            })?;

            yield check_segment_len(&header, sequence, data)?;
        }
    })
}

fn check_segment_len(header: &AssetHeader, sequence: u32, data: Bytes) -> StorageResult<Bytes> {
    let expected = header.segment_len(sequence).unwrap_or_default();
    if data.len() as u64 != expected {
        return Err(StorageError::Corrupt(format!(
            "asset {} segment {sequence}: expected {expected} bytes, found {}",
            header.asset_id,
            data.len()
        )));
    }
    Ok(data)
}
