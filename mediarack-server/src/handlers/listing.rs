use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mediarack_core::listing;

use super::{expect_dir, internal_error, resolve_request};
use crate::state::AppState;

/// `GET /l/{path}`: the listing projection: titles, child directories
/// with seen flags, media files with trimmed titles.
pub async fn serve_listing(
    State(state): State<AppState>,
    path: Option<Path<String>>,
) -> Result<Json<listing::DirectoryListing>, (StatusCode, String)> {
    let request = resolve_request(&state, path.as_ref().map(|p| p.0.as_str()))?;
    expect_dir(&request)?;
    let listing = listing::build_listing(&request.abs).map_err(internal_error)?;
    Ok(Json(listing))
}
