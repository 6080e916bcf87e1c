//! Uploading and serving the photos attached to records.
//!
//! Photos are stored as files named `<user id>-<md5 of contents>.<ext>` in the
//! photo directory, so the same picture uploaded twice is stored once and a
//! file name tells whose photo it is.

use std::{io::ErrorKind, path::PathBuf};

use axum::{
    Extension, Json,
    extract::{FromRef, Multipart, Path, State, multipart::Field},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{AppState, Error, endpoints, endpoints::format_endpoint, user::UserId};

/// The largest photo accepted, in bytes.
pub const MAX_PHOTO_SIZE: usize = 10 * 1024 * 1024;

/// The name of the multipart field holding the photo.
pub const PHOTO_FIELD: &str = "photo";

/// The state needed to store and serve photos.
#[derive(Debug, Clone)]
pub struct PhotoState {
    /// The directory photos are written to.
    pub photo_dir: PathBuf,
}

impl FromRef<AppState> for PhotoState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            photo_dir: state.photo_dir.clone(),
        }
    }
}

/// The image formats that can be attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoKind {
    /// JPEG image.
    Jpeg,
    /// PNG image.
    Png,
    /// WebP image.
    Webp,
    /// HEIC image, the default format of iPhone cameras.
    Heic,
}

impl PhotoKind {
    /// Match a MIME type such as "image/png".
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/heic" | "image/heif" => Some(Self::Heic),
            _ => None,
        }
    }

    /// Match the extension of a file name such as "IMG_0001.HEIC".
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, extension) = file_name.rsplit_once('.')?;

        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "heic" | "heif" => Some(Self::Heic),
            _ => None,
        }
    }

    /// The extension photos of this kind are stored with.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Heic => "heic",
        }
    }

    /// The MIME type photos of this kind are served with.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Heic => "image/heic",
        }
    }
}

/// The file name of a stored photo, used as a record's `photoRef`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PhotoRef(String);

impl PhotoRef {
    /// The stored file name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The result of a photo upload.
///
/// The user backing out of the picker is an ordinary outcome, not an error.
#[derive(Debug, PartialEq)]
pub enum PhotoOutcome {
    /// The photo was written to disk.
    Stored(PhotoRef),
    /// No photo was sent.
    Cancelled,
}

/// The body of a successful upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredPhoto {
    photo_ref: PhotoRef,
    url: String,
}

/// A route handler for uploading a photo as multipart form data.
///
/// Responds with 201 and the photo reference when a photo was stored, or with
/// 204 when the form held no photo.
pub async fn upload_photo(
    State(state): State<PhotoState>,
    Extension(user_id): Extension<UserId>,
    multipart: Multipart,
) -> Result<Response, Error> {
    match receive_photo(&state.photo_dir, user_id, multipart).await? {
        PhotoOutcome::Stored(photo_ref) => {
            let url = format_endpoint(endpoints::PHOTO, photo_ref.as_str());
            Ok((StatusCode::CREATED, Json(StoredPhoto { photo_ref, url })).into_response())
        }
        PhotoOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Read the photo field from `multipart` and store it for `user_id`.
///
/// # Errors
///
/// Returns an [Error::UnsupportedPhotoType] if the file is not an accepted
/// image type, an [Error::MultipartError] if the form is malformed, or an
/// [Error::PhotoStorageError] if the file could not be written.
pub async fn receive_photo(
    photo_dir: &std::path::Path,
    user_id: UserId,
    mut multipart: Multipart,
) -> Result<PhotoOutcome, Error> {
    while let Some(field) = multipart.next_field().await.map_err(|error| {
        tracing::debug!("Could not read multipart form: {error}");
        Error::MultipartError(error.body_text())
    })? {
        if field.name() != Some(PHOTO_FIELD) {
            continue;
        }

        let Some((kind, bytes)) = read_photo_field(field).await? else {
            return Ok(PhotoOutcome::Cancelled);
        };

        let photo_ref = store_photo(photo_dir, user_id, kind, &bytes).await?;
        return Ok(PhotoOutcome::Stored(photo_ref));
    }

    Ok(PhotoOutcome::Cancelled)
}

async fn read_photo_field(field: Field<'_>) -> Result<Option<(PhotoKind, Vec<u8>)>, Error> {
    let content_type = field.content_type().map(str::to_owned);
    let file_name = field.file_name().map(str::to_owned);

    let bytes = field.bytes().await.map_err(|error| {
        tracing::error!("Could not read data from multipart form field: {error}");
        Error::MultipartError(error.body_text())
    })?;

    if bytes.is_empty() {
        return Ok(None);
    }

    let kind = content_type
        .as_deref()
        .and_then(PhotoKind::from_content_type)
        .or_else(|| file_name.as_deref().and_then(PhotoKind::from_file_name))
        .ok_or_else(|| {
            Error::UnsupportedPhotoType(content_type.unwrap_or_else(|| "unknown".to_owned()))
        })?;

    tracing::debug!(
        "Received photo '{}' that is {} bytes",
        file_name.as_deref().unwrap_or_default(),
        bytes.len()
    );

    Ok(Some((kind, bytes.to_vec())))
}

/// Write `bytes` to the photo directory and return the new file's name.
async fn store_photo(
    photo_dir: &std::path::Path,
    user_id: UserId,
    kind: PhotoKind,
    bytes: &[u8],
) -> Result<PhotoRef, Error> {
    let file_name = format!(
        "{user_id}-{:x}.{}",
        md5::compute(bytes),
        kind.extension()
    );

    tokio::fs::create_dir_all(photo_dir)
        .await
        .map_err(|error| Error::PhotoStorageError(error.to_string()))?;
    tokio::fs::write(photo_dir.join(&file_name), bytes)
        .await
        .map_err(|error| Error::PhotoStorageError(error.to_string()))?;

    tracing::info!("Stored photo {file_name} for user {user_id}");

    Ok(PhotoRef(file_name))
}

/// A route handler that serves one of the caller's photos.
///
/// Photos of other users, and names that are not stored photos, get a 404.
pub async fn get_photo(
    State(state): State<PhotoState>,
    Extension(user_id): Extension<UserId>,
    Path(photo_name): Path<String>,
) -> Result<Response, Error> {
    if !is_owned_photo_name(&photo_name, user_id) {
        return Err(Error::NotFound);
    }

    let kind = PhotoKind::from_file_name(&photo_name).ok_or(Error::NotFound)?;

    let bytes = match tokio::fs::read(state.photo_dir.join(&photo_name)).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => return Err(Error::NotFound),
        Err(error) => return Err(Error::PhotoStorageError(error.to_string())),
    };

    Ok(([(CONTENT_TYPE, kind.content_type())], bytes).into_response())
}

/// Whether `photo_name` is a plain file name that belongs to `user_id`.
pub(crate) fn is_owned_photo_name(photo_name: &str, user_id: UserId) -> bool {
    let prefix = format!("{user_id}-");

    photo_name.starts_with(&prefix)
        && !photo_name.contains("..")
        && photo_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Delete the named photos, returning how many files were removed.
///
/// Names that are already gone are skipped.
pub async fn delete_photos(
    photo_dir: &std::path::Path,
    photo_names: &[String],
) -> Result<usize, Error> {
    let mut deleted = 0;

    for photo_name in photo_names {
        match tokio::fs::remove_file(photo_dir.join(photo_name)).await {
            Ok(()) => deleted += 1,
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => return Err(Error::PhotoStorageError(error.to_string())),
        }
    }

    Ok(deleted)
}

/// Delete every photo stored for `user_id`, returning how many were removed.
///
/// A missing photo directory means there is nothing to delete.
pub async fn delete_user_photos(
    photo_dir: &std::path::Path,
    user_id: UserId,
) -> Result<usize, Error> {
    let mut entries = match tokio::fs::read_dir(photo_dir).await {
        Ok(entries) => entries,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(0),
        Err(error) => return Err(Error::PhotoStorageError(error.to_string())),
    };

    let mut deleted = 0;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|error| Error::PhotoStorageError(error.to_string()))?
    {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };

        if !is_owned_photo_name(file_name, user_id) {
            continue;
        }

        tokio::fs::remove_file(entry.path())
            .await
            .map_err(|error| Error::PhotoStorageError(error.to_string()))?;
        deleted += 1;
    }

    Ok(deleted)
}

#[cfg(test)]
mod photo_kind_tests {
    use super::PhotoKind;

    #[test]
    fn content_type_and_file_name_agree() {
        assert_eq!(
            PhotoKind::from_content_type("image/JPEG"),
            Some(PhotoKind::Jpeg)
        );
        assert_eq!(
            PhotoKind::from_file_name("IMG_0001.HEIC"),
            Some(PhotoKind::Heic)
        );
        assert_eq!(PhotoKind::from_content_type("text/csv"), None);
        assert_eq!(PhotoKind::from_file_name("notes"), None);
    }
}
