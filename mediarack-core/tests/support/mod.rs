//! Shared fixtures for the integration tests: a scripted catalog, a
//! canned Chinese-title source, shell-script stand-ins for the
//! transcoder, and a harness that drives the ingester worker until an
//! observable condition holds.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mediarack_core::providers::{CatalogProvider, CatalogRecord, ChineseTitleSource, ProviderError};
use mediarack_core::{Enricher, Ingester, SidecarLocks, Thumbnailer};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    Search(String),
    Lookup(i64),
}

/// A catalog that always answers with the same record (or no match) and
/// records every call it sees.
pub struct FakeCatalog {
    record: Option<CatalogRecord>,
    calls: Mutex<Vec<CatalogCall>>,
    delay: Duration,
}

impl FakeCatalog {
    pub fn new(record: Option<CatalogRecord>) -> Arc<Self> {
        Arc::new(Self {
            record,
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        })
    }

    pub fn slow(record: Option<CatalogRecord>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            record,
            calls: Mutex::new(Vec::new()),
            delay,
        })
    }

    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self) -> Vec<CatalogRecord> {
        self.record.clone().into_iter().collect()
    }
}

#[async_trait]
impl CatalogProvider for FakeCatalog {
    async fn search(&self, query: &str) -> Result<Vec<CatalogRecord>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push(CatalogCall::Search(query.to_owned()));
        tokio::time::sleep(self.delay).await;
        Ok(self.respond())
    }

    async fn lookup(&self, id: i64) -> Result<Vec<CatalogRecord>, ProviderError> {
        self.calls.lock().unwrap().push(CatalogCall::Lookup(id));
        tokio::time::sleep(self.delay).await;
        Ok(self.respond())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeChinese(pub &'static str);

#[async_trait]
impl ChineseTitleSource for FakeChinese {
    async fn resolve(&self, _catalog_id: i64) -> Result<String, ProviderError> {
        Ok(self.0.to_owned())
    }
}

pub fn record(id: i64) -> CatalogRecord {
    CatalogRecord {
        id,
        native_title: "例のタイトル".to_owned(),
        english_title: "Example Title".to_owned(),
        cover_url: String::new(),
    }
}

/// Drop shell scripts into `bin` that answer like ffprobe/ffmpeg: a fixed
/// 100-second duration and a fixed blob of "frame" bytes.
pub fn fake_transcoder(bin: &Path) -> (String, String) {
    let ffprobe = bin.join("ffprobe");
    fs::write(&ffprobe, "#!/bin/sh\necho 100\n").unwrap();
    let ffmpeg = bin.join("ffmpeg");
    fs::write(&ffmpeg, "#!/bin/sh\nprintf 'RIFF....WEBP'\n").unwrap();
    for script in [&ffprobe, &ffmpeg] {
        fs::set_permissions(script, fs::Permissions::from_mode(0o755)).unwrap();
    }
    (
        ffmpeg.to_string_lossy().into_owned(),
        ffprobe.to_string_lossy().into_owned(),
    )
}

pub struct Harness {
    pub root: TempDir,
    _bin: TempDir,
    pub ingester: Arc<Ingester>,
    pub token: CancellationToken,
    pub catalog: Arc<FakeCatalog>,
}

pub fn harness(catalog: Arc<FakeCatalog>) -> Harness {
    let root = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let (ffmpeg, ffprobe) = fake_transcoder(bin.path());

    let client = Arc::new(reqwest::Client::new());
    let enricher = Arc::new(
        Enricher::new(catalog.clone(), client, Duration::ZERO)
            .with_chinese_source(Arc::new(FakeChinese("中文示例"))),
    );
    let token = CancellationToken::new();
    let ingester = Arc::new(
        Ingester::new(
            root.path(),
            Arc::new(SidecarLocks::new()),
            enricher,
            Thumbnailer::new(ffmpeg, ffprobe),
            token.clone(),
        )
        .unwrap(),
    );
    Harness {
        root,
        _bin: bin,
        ingester,
        token,
        catalog,
    }
}

/// Run the worker until `done` observes the expected state, then cancel
/// and wait for it to wind down. Panics after thirty seconds.
pub async fn drive(harness: &Harness, done: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(30), async {
        let run = harness.ingester.run();
        tokio::pin!(run);
        loop {
            tokio::select! {
                result = &mut run => {
                    result.unwrap();
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(10)) => {
                    if done() {
                        harness.token.cancel();
                    }
                }
            }
        }
    })
    .await
    .expect("worker did not reach the expected state");
}
