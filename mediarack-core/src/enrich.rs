//! Catalog enrichment for one directory.
//!
//! [`Enricher`] resolves a directory to a stable catalog id and localized
//! titles, and fetches a cover image. All calls are paced through a single
//! global gate: one enrichment may complete per pacing interval, and the
//! gate is held for the whole function body so the floor applies no matter
//! how fast the remote answers.

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{IngestError, Result};
use crate::providers::{CatalogProvider, ChineseTitleResolver, ChineseTitleSource, ProviderError};
use crate::sidecar::{DirectorySidecar, COVER_BASENAME};

/// One enrichment per ten seconds, deliberately far under the stated
/// limits of every remote involved.
pub const DEFAULT_PACE: Duration = Duration::from_secs(10);

static SEASON_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*season\s*0*(\d*)\s*$").unwrap());
static TRAILING_SEASON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+S(\d+)$").unwrap());

/// Derive the catalog search string for a directory.
///
/// A bare `Season N` folder searches as `<parent> <n>`; a trailing ` S<n>`
/// marker is rewritten to ` <n>`; anything else passes through unchanged.
pub fn search_term(abs_dir: &Path) -> String {
    let base = abs_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(captures) = SEASON_DIR.captures(&base) {
        let parent = abs_dir
            .parent()
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        return format!("{} {}", parent, &captures[1]);
    }
    if TRAILING_SEASON.is_match(&base) {
        return TRAILING_SEASON.replace(&base, " $1").into_owned();
    }
    base
}

pub struct Enricher {
    provider: Arc<dyn CatalogProvider>,
    chinese: Arc<dyn ChineseTitleSource>,
    client: Arc<Client>,
    gate: Mutex<()>,
    pace: Duration,
}

impl Enricher {
    pub fn new(provider: Arc<dyn CatalogProvider>, client: Arc<Client>, pace: Duration) -> Self {
        Self {
            provider,
            chinese: Arc::new(ChineseTitleResolver::new(client.clone())),
            client,
            gate: Mutex::new(()),
            pace,
        }
    }

    /// Replace the Chinese title source; tests use a scripted one.
    pub fn with_chinese_source(mut self, source: Arc<dyn ChineseTitleSource>) -> Self {
        self.chinese = source;
        self
    }

    /// Resolve catalog identity and titles for `abs_dir` into `sidecar`.
    ///
    /// Returns immediately when the sidecar already has a catalog id (or
    /// the `-1` negative cache) and `force` is unset; that path costs
    /// neither a rate token nor any network traffic. Otherwise one rate
    /// token is held for at least the pacing interval, except when `token`
    /// is cancelled, in which case the call returns promptly.
    pub async fn enrich(
        &self,
        token: &CancellationToken,
        abs_dir: &Path,
        sidecar: &mut DirectorySidecar,
        force: bool,
        by_id: bool,
    ) -> Result<()> {
        if sidecar.catalog_id != 0 && !force {
            return Ok(());
        }

        let _slot = self.gate.lock().await;
        let floor = tokio::time::sleep(self.pace);
        tokio::pin!(floor);

        let result = tokio::select! {
            result = self.enrich_inner(abs_dir, sidecar, force, by_id) => result,
            _ = token.cancelled() => return Ok(()),
        };

        // The pacing interval is a floor on successful completions, not a
        // mandatory sleep; cancellation releases it early.
        tokio::select! {
            _ = &mut floor => {}
            _ = token.cancelled() => {}
        }
        result
    }

    async fn enrich_inner(
        &self,
        abs_dir: &Path,
        sidecar: &mut DirectorySidecar,
        force: bool,
        by_id: bool,
    ) -> Result<()> {
        let candidates = if by_id && sidecar.catalog_id > 0 {
            debug!(id = sidecar.catalog_id, "looking up catalog entry");
            self.provider.lookup(sidecar.catalog_id).await?
        } else {
            let search = search_term(abs_dir);
            debug!(search, "searching catalog");
            self.provider.search(&search).await?
        };

        // From here on the sidecar changes either way: no match is recorded
        // as the negative cache, a match as the resolved id.
        sidecar.dirty = true;
        let Some(record) = candidates.into_iter().next() else {
            sidecar.catalog_id = -1;
            return Ok(());
        };

        sidecar.catalog_id = record.id;
        if !record.english_title.is_empty() {
            sidecar.english_title = record.english_title.clone();
        }
        if !record.native_title.is_empty() {
            sidecar.native_title = record.native_title.clone();
        }

        if !record.cover_url.is_empty() {
            let cover_path = abs_dir.join(COVER_BASENAME);
            let need_cover = (by_id && force) || !cover_path.exists();
            if need_cover {
                self.fetch_cover(&record.cover_url, &cover_path).await?;
            }
        }

        match self.chinese.resolve(record.id).await {
            Ok(title) => sidecar.chinese_title = title,
            Err(err) => {
                warn!(dir = %abs_dir.display(), error = %err, "failed to get Chinese title")
            }
        }

        Ok(())
    }

    async fn fetch_cover(&self, url: &str, cover_path: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ProviderError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                service: "cover",
                status: status.as_u16(),
                body: String::new(),
            }
            .into());
        }
        let bytes = response.bytes().await.map_err(ProviderError::from)?;
        tokio::fs::write(cover_path, &bytes)
            .await
            .map_err(|source| IngestError::io(source, cover_path))?;
        debug!(path = %cover_path.display(), "wrote cover image");
        Ok(())
    }
}
