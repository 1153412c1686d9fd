//! Song endpoints: upload, stream, edit, delete and lookup.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::library::UploadOutcome;
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use bytes::BytesMut;
use futures::StreamExt;
use musicspot_core::{
    AssetHeader, AssetId, MAX_UPLOAD_BYTES, Song, SongFields, SongId, UploadRequest,
    UploadedFile, ValidationError,
};
use musicspot_storage::SegmentStream;
use serde::Serialize;

/// Multipart field carrying the audio file.
pub const FILE_FIELD: &str = "songFile";

/// Response for a deleted song.
#[derive(Debug, Serialize)]
pub struct DeleteSongResponse {
    pub song_id: SongId,
    pub deleted: bool,
}

fn parse_song_id(raw: &str) -> ApiResult<SongId> {
    SongId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::Validation(ValidationError::FileTooLarge {
            size: MAX_UPLOAD_BYTES + 1,
            max: MAX_UPLOAD_BYTES,
        })
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Buffer the file part, keeping at most `MAX_UPLOAD_BYTES`.
///
/// Returns the file and whether the body limit cut it short. The declared size
/// counts every byte seen, so an oversized file still fails the size check after
/// the extension check.
async fn read_file_field(mut field: Field<'_>) -> ApiResult<(UploadedFile, bool)> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);

    let mut data = BytesMut::new();
    let mut seen: u64 = 0;
    let mut truncated = false;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                let remaining = MAX_UPLOAD_BYTES.saturating_sub(seen) as usize;
                data.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
                seen += chunk.len() as u64;
            }
            Ok(None) => break,
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                seen = seen.max(MAX_UPLOAD_BYTES + 1);
                truncated = true;
                break;
            }
            Err(e) => return Err(multipart_error(e)),
        }
    }

    let mut file = UploadedFile::new(data.freeze(), original_name);
    file.content_type = content_type;
    file.declared_size = seen;
    Ok((file, truncated))
}

/// Collect the upload form. Unknown fields are skipped.
async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadRequest> {
    let mut request = UploadRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILE_FIELD {
            let (file, truncated) = read_file_field(field).await?;
            request.file = Some(file);
            if truncated {
                // The rest of the body is unreadable past the limit.
                break;
            }
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "title" => request.title = value,
            "artist" => request.artist = value,
            "album" => request.album = Some(value),
            "genre" => request.genre = Some(value),
            "year" => request.year = Some(value),
            "duration" => request.duration = Some(value),
            other => tracing::debug!(field = %other, "ignoring unknown form field"),
        }
    }

    Ok(request)
}

/// POST /songs/upload - Upload a song file with its metadata.
pub async fn upload_song(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    multipart: Multipart,
) -> ApiResult<Json<Song>> {
    let request = read_upload_form(multipart).await?;

    match state.library().upload(request, auth.user_id).await? {
        UploadOutcome::Committed(song) => Ok(Json(song)),
        UploadOutcome::AssetOrphaned { asset_id, error } => Err(ApiError::Internal(format!(
            "song could not be saved for asset {asset_id}: {error}"
        ))),
    }
}

/// Full-body audio response. `Accept-Ranges` is advertised but `Range` requests
/// are answered in full.
fn audio_response(header: AssetHeader, stream: SegmentStream) -> Response {
    // An error item aborts the response body mid-transfer.
    let body = Body::from_stream(stream.map(|r| r.map_err(|e| std::io::Error::other(e.to_string()))));

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, header.effective_content_type().to_string()),
            (CONTENT_LENGTH, header.total_length.to_string()),
            (ACCEPT_RANGES, "bytes".to_string()),
        ],
        body,
    )
        .into_response()
}

/// GET /songs/stream/{asset_id} - Stream an asset's bytes.
pub async fn stream_asset(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    Path(asset_id): Path<String>,
) -> ApiResult<Response> {
    let asset_id = AssetId::parse(&asset_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let (header, stream) = state.library().open_asset(&asset_id).await?;
    Ok(audio_response(header, stream))
}

/// GET /songs/{song_id}/stream - Stream the asset behind a song.
///
/// A song whose asset is missing answers 500, not 404.
pub async fn stream_song(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    Path(song_id): Path<String>,
) -> ApiResult<Response> {
    let song_id = parse_song_id(&song_id)?;
    let (header, stream) = state.library().open_song(&song_id).await?;
    Ok(audio_response(header, stream))
}

/// POST /songs/delete/{song_id} - Delete a song and its asset. Owner only.
pub async fn delete_song(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(song_id): Path<String>,
) -> ApiResult<Json<DeleteSongResponse>> {
    let song_id = parse_song_id(&song_id)?;
    // Asset cleanup problems are logged by the library and left for reconciliation.
    state
        .library()
        .delete_song(&song_id, &auth.requester())
        .await?;

    Ok(Json(DeleteSongResponse {
        song_id,
        deleted: true,
    }))
}

/// POST /songs/edit/{song_id} - Replace a song's metadata. Owner only.
pub async fn edit_song(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(song_id): Path<String>,
    payload: Result<Json<SongFields>, JsonRejection>,
) -> ApiResult<Json<Song>> {
    let song_id = parse_song_id(&song_id)?;
    let Json(fields) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let song = state
        .library()
        .update_song(&song_id, fields, &auth.requester())
        .await?;
    Ok(Json(song))
}

/// GET /songs/{song_id} - Fetch one song.
pub async fn get_song(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    Path(song_id): Path<String>,
) -> ApiResult<Json<Song>> {
    let song_id = parse_song_id(&song_id)?;
    Ok(Json(state.library().get_song(&song_id).await?))
}

/// GET /songs - Every song, newest first.
pub async fn list_songs(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
) -> ApiResult<Json<Vec<Song>>> {
    Ok(Json(state.library().list_songs().await?))
}
