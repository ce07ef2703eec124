use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mediarack_core::sidecar;

use super::{expect_dir, internal_error, resolve_request};
use crate::state::AppState;

/// `GET /j/{path}`: the reconciled sidecar of a directory, verbatim.
pub async fn serve_json(
    State(state): State<AppState>,
    path: Option<Path<String>>,
) -> Result<Json<sidecar::DirectorySidecar>, (StatusCode, String)> {
    let request = resolve_request(&state, path.as_ref().map(|p| p.0.as_str()))?;
    expect_dir(&request)?;
    let record = sidecar::read_sidecar(&request.abs, true).map_err(internal_error)?;
    Ok(Json(record))
}
