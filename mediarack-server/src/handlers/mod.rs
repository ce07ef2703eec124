//! Request handlers.
//!
//! Every endpoint addresses a path under the media root. Paths are
//! validated by the ingester (canonicalized, strict-descendant check)
//! before any handler touches the filesystem.

pub mod image;
pub mod json;
pub mod listing;
pub mod mark;
pub mod rescan;
pub mod r#override;

use std::fs;
use std::io;
use std::path::PathBuf;

use axum::http::StatusCode;
use mediarack_core::IngestError;
use tracing::{debug, error};

use crate::state::AppState;

/// A validated request path: absolute on disk, relative to the root, and
/// whether it names a directory.
pub(crate) struct RequestPath {
    pub abs: PathBuf,
    pub rel: PathBuf,
    pub is_dir: bool,
}

/// Resolve the wildcard tail of a request URL under the media root.
///
/// An absent or empty tail addresses the root itself. Escapes are 400,
/// missing paths 404, and anything that is neither a directory nor a
/// regular file 400.
pub(crate) fn resolve_request(
    state: &AppState,
    path: Option<&str>,
) -> Result<RequestPath, (StatusCode, String)> {
    let raw = path.unwrap_or("").trim_matches('/');
    let rel = if raw.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(raw)
    };
    let abs = state.ingester.resolve(&rel).map_err(|err| match &err {
        IngestError::PathEscape { .. } => {
            debug!(path = raw, "rejected escaping request path");
            (StatusCode::BAD_REQUEST, format!("invalid path {raw:?}"))
        }
        IngestError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, format!("no such path {raw:?}"))
        }
        _ => {
            error!(path = raw, error = %err, "failed to resolve request path");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to check path {raw:?}"),
            )
        }
    })?;

    let meta = fs::metadata(&abs).map_err(|err| {
        error!(path = %abs.display(), error = %err, "failed to stat request path");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to check path {raw:?}"),
        )
    })?;
    if !meta.is_dir() && !meta.is_file() {
        return Err((StatusCode::BAD_REQUEST, format!("invalid path {raw:?}")));
    }
    Ok(RequestPath {
        abs,
        rel,
        is_dir: meta.is_dir(),
    })
}

pub(crate) fn expect_dir(request: &RequestPath) -> Result<(), (StatusCode, String)> {
    if request.is_dir {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            format!("{:?} is not a directory", request.rel),
        ))
    }
}

pub(crate) fn expect_file(request: &RequestPath) -> Result<(), (StatusCode, String)> {
    if request.is_dir {
        Err((
            StatusCode::BAD_REQUEST,
            format!("{:?} is not a file", request.rel),
        ))
    } else {
        Ok(())
    }
}

/// Map a core error from a read/write path to a response.
pub(crate) fn internal_error(err: IngestError) -> (StatusCode, String) {
    match err {
        IngestError::UnknownFile { name, .. } => {
            (StatusCode::NOT_FOUND, format!("{name:?} is not tracked"))
        }
        err => {
            error!(error = %err, "request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
