//! Asset headers and the segment layout used by the chunk store.

use crate::ids::AssetId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Fixed segment size in bytes. The last segment of an asset may be shorter.
pub const SEGMENT_SIZE: u64 = 255 * 1024;

/// Content type served when an asset carries none.
pub const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

const ASSET_PREFIX: &str = "assets/";

/// Committed description of a stored asset.
///
/// Written last, after every segment, so its presence marks the asset complete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHeader {
    pub asset_id: AssetId,
    /// File name as supplied by the uploader.
    pub original_name: String,
    /// MIME type; may be empty.
    pub content_type: String,
    /// Total number of bytes across all segments.
    pub total_length: u64,
    pub segment_size: u64,
    pub segment_count: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

impl AssetHeader {
    /// Describe an asset of `total_length` bytes split at `segment_size`.
    pub fn new(
        asset_id: AssetId,
        original_name: impl Into<String>,
        content_type: impl Into<String>,
        total_length: u64,
        segment_size: u64,
    ) -> Self {
        Self {
            asset_id,
            original_name: original_name.into(),
            content_type: content_type.into(),
            total_length,
            segment_size,
            segment_count: segment_count(total_length, segment_size),
            uploaded_at: OffsetDateTime::now_utc(),
        }
    }

    /// Expected byte length of the segment at `sequence`, or `None` past the end.
    pub fn segment_len(&self, sequence: u32) -> Option<u64> {
        if sequence >= self.segment_count {
            return None;
        }
        let start = u64::from(sequence) * self.segment_size;
        Some((self.total_length - start).min(self.segment_size))
    }

    /// Content type to serve, falling back to `audio/mpeg`.
    pub fn effective_content_type(&self) -> &str {
        if self.content_type.trim().is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            &self.content_type
        }
    }

    /// Object key of this asset's header.
    pub fn header_key(&self) -> String {
        header_key(&self.asset_id)
    }
}

/// Number of segments needed to hold `total_length` bytes.
pub fn segment_count(total_length: u64, segment_size: u64) -> u32 {
    if segment_size == 0 {
        return 0;
    }
    total_length.div_ceil(segment_size) as u32
}

/// Object key of an asset header.
pub fn header_key(asset_id: &AssetId) -> String {
    format!("{ASSET_PREFIX}{asset_id}/header.json")
}

/// Prefix under which an asset's segments are stored.
pub fn segments_prefix(asset_id: &AssetId) -> String {
    format!("{ASSET_PREFIX}{asset_id}/segments/")
}

/// Object key of a single segment. Zero-padded so lexical order matches sequence order.
pub fn segment_key(asset_id: &AssetId, sequence: u32) -> String {
    format!("{ASSET_PREFIX}{asset_id}/segments/{sequence:010}")
}

/// Prefix under which all assets live.
pub fn assets_root() -> &'static str {
    ASSET_PREFIX
}

/// Extract the asset id from any object key under `assets/`.
pub fn asset_id_from_key(key: &str) -> Option<AssetId> {
    let rest = key.strip_prefix(ASSET_PREFIX)?;
    let id = rest.split('/').next()?;
    AssetId::parse(id).ok()
}
