//! Upload validation rules.

use crate::error::ValidationError;
use crate::song::SongFields;
use bytes::Bytes;
use std::path::Path;

/// Largest accepted upload, in bytes (10 MiB, inclusive).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Accepted file extensions, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a"];

/// The audio part of an upload.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub data: Bytes,
    /// Client-supplied file name.
    pub original_name: String,
    /// Client-declared MIME type, if any.
    pub content_type: Option<String>,
    /// Size as observed by the receiver. May exceed `data.len()` when the
    /// receiver stopped buffering an oversized body.
    pub declared_size: u64,
}

impl UploadedFile {
    /// A file whose declared size is its buffered length.
    pub fn new(data: impl Into<Bytes>, original_name: impl Into<String>) -> Self {
        let data = data.into();
        Self {
            declared_size: data.len() as u64,
            data,
            original_name: original_name.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// An upload as received, before validation. Text fields are raw form values.
#[derive(Clone, Debug, Default)]
pub struct UploadRequest {
    pub file: Option<UploadedFile>,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub duration: Option<String>,
}

/// An upload that passed every check.
#[derive(Clone, Debug)]
pub struct ValidatedUpload {
    pub data: Bytes,
    pub original_name: String,
    /// Declared type, or the one implied by the extension.
    pub content_type: String,
    pub fields: SongFields,
}

impl UploadRequest {
    /// Check the upload in order, stopping at the first failure:
    /// file present, extension, size, title/artist, year.
    pub fn validate(self) -> Result<ValidatedUpload, ValidationError> {
        let file = match self.file {
            Some(file) if file.declared_size > 0 && !file.original_name.is_empty() => file,
            _ => return Err(ValidationError::FileRequired),
        };

        let extension = allowed_extension(&file.original_name)
            .ok_or(ValidationError::UnsupportedFileType)?;

        if file.declared_size > MAX_UPLOAD_BYTES {
            return Err(ValidationError::FileTooLarge {
                size: file.declared_size,
                max: MAX_UPLOAD_BYTES,
            });
        }

        let fields = SongFields {
            title: self.title,
            artist: self.artist,
            album: self.album,
            genre: self.genre,
            year: None,
            duration: self.duration,
        };
        fields.validate()?;

        let year = parse_year(self.year.as_deref())?;

        let content_type = file
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| content_type_for(&extension).to_string());

        Ok(ValidatedUpload {
            data: file.data,
            original_name: file.original_name,
            content_type,
            fields: SongFields { year, ..fields }.normalized(),
        })
    }
}

/// Lowercased extension of `name` if it is one of [`ALLOWED_EXTENSIONS`].
pub fn allowed_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Some(ext)
    } else {
        None
    }
}

/// MIME type implied by an allowed extension.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        _ => "audio/mpeg",
    }
}

/// Blank means absent; anything else must be an integer.
pub fn parse_year(raw: Option<&str>) -> Result<Option<i32>, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text
            .parse::<i32>()
            .map(Some)
            .map_err(|_| ValidationError::InvalidYear),
    }
}
