use std::io;
use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use mediarack_core::sidecar::COVER_BASENAME;

use super::{resolve_request, RequestPath};
use crate::state::AppState;

/// `GET /i/{path}`: the cover image of a directory, or the thumbnail of
/// a media file.
///
/// Thumbnails prefer the current `.webp` next to the file and fall back
/// to a legacy `.jpg` that has not been migrated yet.
pub async fn serve_image(
    State(state): State<AppState>,
    path: Option<Path<String>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = resolve_request(&state, path.as_ref().map(|p| p.0.as_str()))?;

    for (image_path, content_type) in candidates(&request) {
        match tokio::fs::read(&image_path).await {
            Ok(bytes) => {
                return Ok(([(header::CONTENT_TYPE, content_type)], bytes));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string()));
            }
        }
    }
    Err((StatusCode::NOT_FOUND, "no image".to_owned()))
}

fn candidates(request: &RequestPath) -> Vec<(PathBuf, &'static str)> {
    if request.is_dir {
        return vec![(request.abs.join(COVER_BASENAME), "image/jpeg")];
    }
    let parent = request.abs.parent().unwrap_or(std::path::Path::new("."));
    let base = request
        .abs
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    vec![
        (parent.join(format!(".{base}.webp")), "image/webp"),
        (parent.join(format!(".{base}.jpg")), "image/jpeg"),
    ]
}
