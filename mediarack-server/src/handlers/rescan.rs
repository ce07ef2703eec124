use axum::extract::{Path, State};
use axum::http::StatusCode;
use mediarack_core::{IngestError, QueueOptions};

use super::{expect_dir, resolve_request};
use crate::state::AppState;

/// `POST /r/{path}`: force a rescan of a directory.
pub async fn serve_rescan(
    State(state): State<AppState>,
    path: Option<Path<String>>,
) -> Result<StatusCode, (StatusCode, String)> {
    let request = resolve_request(&state, path.as_ref().map(|p| p.0.as_str()))?;
    expect_dir(&request)?;

    state
        .ingester
        .queue(QueueOptions {
            directory: request.rel,
            id: 0,
            force: true,
        })
        .await
        .map_err(|err: IngestError| (StatusCode::BAD_REQUEST, err.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}
