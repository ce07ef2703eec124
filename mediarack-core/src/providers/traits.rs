use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to parse {service} response: {message}")]
    Parse {
        service: &'static str,
        message: String,
    },

    #[error("{service} response did not include a title")]
    MissingTitle { service: &'static str },
}

/// One candidate record returned by a catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: i64,
    pub native_title: String,
    pub english_title: String,
    /// URL of a cover image, when the catalog has one.
    pub cover_url: String,
}

/// A remote media catalog.
///
/// Both operations return the candidates in catalog relevance order; an
/// empty list is a definitive "no match", not an error.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Free-text title search.
    async fn search(&self, query: &str) -> Result<Vec<CatalogRecord>, ProviderError>;

    /// Exact lookup by catalog identifier.
    async fn lookup(&self, id: i64) -> Result<Vec<CatalogRecord>, ProviderError>;

    fn name(&self) -> &'static str;
}
