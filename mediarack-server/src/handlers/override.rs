use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mediarack_core::listing::{self, OverrideRequest};
use tracing::debug;

use super::{expect_dir, internal_error, resolve_request};
use crate::state::AppState;

/// `POST /o/{path}`: catalog override and bulk seen toggle.
///
/// With `mark` set, a homogeneous seen map is collapsed to the opposite
/// value. The directory is then re-queued when the id differs from the
/// stored one or `force` is set. Always answers 202.
pub async fn serve_override(
    State(state): State<AppState>,
    path: Option<Path<String>>,
    Json(body): Json<OverrideRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let request = resolve_request(&state, path.as_ref().map(|p| p.0.as_str()))?;
    expect_dir(&request)?;

    debug!(path = %request.rel.display(), ?body, "processing override");
    let queued = listing::apply_override(&state.ingester, &request.abs, request.rel, &body)
        .await
        .map_err(internal_error)?;
    debug!(queued, "override processed");
    Ok(StatusCode::ACCEPTED)
}
