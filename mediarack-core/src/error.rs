use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error on {path}: {source}")]
    Io { source: io::Error, path: PathBuf },

    #[error("failed to decode sidecar {path}: {source}")]
    SidecarDecode {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[error("failed to encode sidecar {path}: {source}")]
    SidecarEncode {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[error("catalog error: {0}")]
    Provider(#[from] crate::providers::ProviderError),

    #[error("failed to create thumbnail for {path}: {message}")]
    Thumbnail { path: PathBuf, message: String },

    #[error("path {path} escapes the media root")]
    PathEscape { path: PathBuf },

    #[error("{name} is not tracked in the sidecar for {dir}")]
    UnknownFile { dir: PathBuf, name: String },
}

impl IngestError {
    pub(crate) fn io(source: io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
