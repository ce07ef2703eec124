//! The AniList GraphQL catalog, the primary lookup service.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::traits::{CatalogProvider, CatalogRecord, ProviderError};

const ANILIST_ENDPOINT: &str = "https://graphql.anilist.co/";

const SEARCH_QUERY: &str = "
    query ($search: String!) {
        Page {
            media(search: $search, type: ANIME) {
                id
                title {
                    romaji
                    english
                    native
                }
                coverImage {
                    medium
                }
            }
        }
    }
";

const LOOKUP_QUERY: &str = "
    query ($id: Int!) {
        Page {
            media(id: $id, type: ANIME) {
                id
                title {
                    romaji
                    english
                    native
                }
                coverImage {
                    medium
                }
            }
        }
    }
";

#[derive(Debug, Deserialize)]
struct AniListResponse {
    data: AniListData,
}

#[derive(Debug, Deserialize)]
struct AniListData {
    #[serde(rename = "Page")]
    page: AniListPage,
}

#[derive(Debug, Deserialize, Default)]
struct AniListPage {
    #[serde(default)]
    media: Vec<AniListMedia>,
}

#[derive(Debug, Deserialize)]
struct AniListMedia {
    id: i64,
    #[serde(default)]
    title: AniListTitle,
    #[serde(default, rename = "coverImage")]
    cover_image: AniListCoverImage,
}

#[derive(Debug, Deserialize, Default)]
struct AniListTitle {
    #[serde(default)]
    english: Option<String>,
    #[serde(default)]
    native: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AniListCoverImage {
    #[serde(default)]
    medium: Option<String>,
}

impl From<AniListMedia> for CatalogRecord {
    fn from(media: AniListMedia) -> Self {
        Self {
            id: media.id,
            native_title: media.title.native.unwrap_or_default(),
            english_title: media.title.english.unwrap_or_default(),
            cover_url: media.cover_image.medium.unwrap_or_default(),
        }
    }
}

pub struct AniListProvider {
    client: Arc<Client>,
}

impl AniListProvider {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    async fn query(&self, query: &str, variables: Value) -> Result<Vec<CatalogRecord>, ProviderError> {
        let response = self
            .client
            .post(ANILIST_ENDPOINT)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                service: "anilist",
                status: status.as_u16(),
                body,
            });
        }

        let output: AniListResponse =
            response
                .json()
                .await
                .map_err(|err| ProviderError::Parse {
                    service: "anilist",
                    message: err.to_string(),
                })?;
        debug!(candidates = output.data.page.media.len(), "anilist response");
        Ok(output
            .data
            .page
            .media
            .into_iter()
            .map(CatalogRecord::from)
            .collect())
    }
}

#[async_trait]
impl CatalogProvider for AniListProvider {
    async fn search(&self, query: &str) -> Result<Vec<CatalogRecord>, ProviderError> {
        debug!(search = query, "querying anilist");
        self.query(SEARCH_QUERY, json!({ "search": query })).await
    }

    async fn lookup(&self, id: i64) -> Result<Vec<CatalogRecord>, ProviderError> {
        debug!(id, "querying anilist");
        self.query(LOOKUP_QUERY, json!({ "id": id })).await
    }

    fn name(&self) -> &'static str {
        "anilist"
    }
}
