use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use mediarack_core::listing;
use tracing::debug;

use super::{expect_file, internal_error, resolve_request};
use crate::state::AppState;

/// `POST /m/{path}?{bool}`: set the seen bit of one media file.
///
/// The query string is the new state, `true` or `false`. The file must
/// already be tracked in its directory's sidecar; unknown files are 404.
pub async fn serve_mark(
    State(state): State<AppState>,
    path: Option<Path<String>>,
    RawQuery(query): RawQuery,
) -> Result<StatusCode, (StatusCode, String)> {
    let request = resolve_request(&state, path.as_ref().map(|p| p.0.as_str()))?;
    expect_file(&request)?;

    let query = query.unwrap_or_default();
    let seen: bool = query.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("invalid new state {query:?}"),
        )
    })?;

    let dir = request.abs.parent().ok_or((
        StatusCode::BAD_REQUEST,
        format!("{:?} has no parent", request.rel),
    ))?;
    let name = request
        .abs
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    listing::mark_seen(state.ingester.locks(), dir, &name, seen)
        .await
        .map_err(internal_error)?;
    debug!(path = %request.abs.display(), seen, "marked");
    Ok(StatusCode::OK)
}
