//! Chinese title resolution.
//!
//! AniList carries no Chinese titles, so resolution goes through a
//! fallback chain keyed by the AniList id: the Wikidata knowledge graph
//! first (which also yields Bangumi and Bahamut ids), then the Bangumi API,
//! then a scrape of the Bahamut ACG page. A failure in any step is logged
//! and the next step is attempted.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::traits::ProviderError;

const WIKIDATA_ENDPOINT: &str = "https://query.wikidata.org/sparql";
const BANGUMI_URL: &str = "https://api.bgm.tv/v0/subjects/";
const BAHAMUT_URL: &str = "https://acg.gamer.com.tw/acgDetail.php";

/// P8729 = AniList anime id; P5732 = Bangumi subject id;
/// P6367 = Bahamut ACG database id.
const WIKIDATA_QUERY: &str = r#"
    SELECT ?label ?bangumi ?bahamut WHERE {
        ?item p:P8729/ps:P8729 "{id}".
        OPTIONAL {
            ?item rdfs:label ?label.
            FILTER(LANG(?label) = "zh")
        }
        OPTIONAL {
            ?item p:P5732/ps:P5732 ?bangumi.
        }
        OPTIONAL {
            ?item p:P6367/ps:P6367 ?bahamut.
        }
    }
"#;

static BAHAMUT_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<h1>(.*?)</h1>").unwrap());

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize, Default)]
struct SparqlValue {
    #[serde(default)]
    value: String,
}

/// A source of Chinese titles keyed by the primary catalog id.
///
/// The enricher only needs this one operation; tests substitute a scripted
/// source so no resolution traffic leaves the process.
#[async_trait::async_trait]
pub trait ChineseTitleSource: Send + Sync {
    async fn resolve(&self, catalog_id: i64) -> Result<String, ProviderError>;
}

pub struct ChineseTitleResolver {
    client: Arc<Client>,
}

impl ChineseTitleResolver {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ChineseTitleSource for ChineseTitleResolver {
    /// Resolve the Chinese title for the media with the given AniList id.
    async fn resolve(&self, catalog_id: i64) -> Result<String, ProviderError> {
        let query = WIKIDATA_QUERY.replace("{id}", &catalog_id.to_string());
        let response = self
            .client
            .get(WIKIDATA_ENDPOINT)
            .header("Accept", "application/sparql-results+json")
            .query(&[("query", query.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                service: "wikidata",
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let output: SparqlResponse = response.json().await.map_err(|err| ProviderError::Parse {
            service: "wikidata",
            message: err.to_string(),
        })?;
        debug!(
            catalog_id,
            bindings = output.results.bindings.len(),
            "wikidata response"
        );

        for binding in &output.results.bindings {
            let field = |key: &str| {
                binding
                    .get(key)
                    .map(|v| v.value.as_str())
                    .unwrap_or_default()
            };
            if !field("label").is_empty() {
                return Ok(field("label").to_owned());
            }
            if !field("bangumi").is_empty() {
                match self.bangumi_title(field("bangumi")).await {
                    Ok(title) => return Ok(title),
                    Err(err) => warn!(error = %err, "failed to get title from bangumi"),
                }
            }
            if !field("bahamut").is_empty() {
                match self.bahamut_title(field("bahamut")).await {
                    Ok(title) => return Ok(title),
                    Err(err) => warn!(error = %err, "failed to get title from bahamut"),
                }
            }
        }

        Err(ProviderError::MissingTitle { service: "wikidata" })
    }
}

impl ChineseTitleResolver {
    async fn bangumi_title(&self, subject_id: &str) -> Result<String, ProviderError> {
        let url = format!("{BANGUMI_URL}{subject_id}");
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                service: "bangumi",
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let data: serde_json::Value =
            response.json().await.map_err(|err| ProviderError::Parse {
                service: "bangumi",
                message: err.to_string(),
            })?;
        match data.get("name_cn").and_then(|v| v.as_str()) {
            Some(name) if !name.is_empty() => Ok(name.to_owned()),
            _ => Err(ProviderError::MissingTitle { service: "bangumi" }),
        }
    }

    async fn bahamut_title(&self, acg_id: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(BAHAMUT_URL)
            .query(&[("s", acg_id)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                service: "bahamut",
                status: status.as_u16(),
                body: String::new(),
            });
        }
        let body = response.text().await?;
        extract_bahamut_title(&body).ok_or(ProviderError::MissingTitle { service: "bahamut" })
    }
}

fn extract_bahamut_title(body: &str) -> Option<String> {
    BAHAMUT_TITLE
        .captures(body)
        .map(|captures| captures[1].to_owned())
}
