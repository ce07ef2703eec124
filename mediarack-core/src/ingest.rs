//! The directory walker and reconciler.
//!
//! A single worker drains the task queue. Per ingest it walks one
//! directory, converges the sidecar, enriches from the catalog when the
//! directory warrants it, schedules thumbnail generation for its media
//! files, and enqueues child directories whose mtime advanced. The worker
//! never holds a sidecar lock while talking to remote services or the
//! transcoder; locks guard only the read-modify-rename publish.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::enrich::Enricher;
use crate::error::{IngestError, Result};
use crate::locks::SidecarLocks;
use crate::queue::{Task, TaskQueue};
use crate::sidecar::{
    self, is_hidden, is_media_name, DirectorySidecar, EXCLUDED_DIR, SIDECAR_BASENAME,
};
use crate::thumbnail::Thumbnailer;

/// An external request to ingest one directory.
#[derive(Debug, Clone, Default)]
pub struct QueueOptions {
    /// Path relative to the media root; `"."` is the root itself.
    pub directory: PathBuf,
    /// Catalog id override; zero means none.
    pub id: i64,
    /// Bypass the negative cache and the mtime gate for this ingest.
    pub force: bool,
}

pub struct Ingester {
    root: PathBuf,
    queue: TaskQueue,
    locks: Arc<SidecarLocks>,
    enricher: Arc<Enricher>,
    thumbnailer: Thumbnailer,
    token: CancellationToken,
}

impl Ingester {
    /// Create an ingester rooted at `root`, which must exist.
    pub fn new(
        root: impl Into<PathBuf>,
        locks: Arc<SidecarLocks>,
        enricher: Arc<Enricher>,
        thumbnailer: Thumbnailer,
        token: CancellationToken,
    ) -> Result<Self> {
        let root = root.into();
        let root = fs::canonicalize(&root).map_err(|source| IngestError::io(source, &root))?;
        Ok(Self {
            root,
            queue: TaskQueue::new(token.clone()),
            locks,
            enricher,
            thumbnailer,
            token,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn locks(&self) -> &SidecarLocks {
        &self.locks
    }

    /// Validate a relative path and resolve it under the media root.
    ///
    /// The joined path is canonicalized and must be the root or a strict
    /// descendant of it; anything else (traversal, symlink escape, a path
    /// that does not exist) is refused.
    pub fn resolve(&self, rel_path: &Path) -> Result<PathBuf> {
        if rel_path.is_absolute() {
            return Err(IngestError::PathEscape {
                path: rel_path.to_path_buf(),
            });
        }
        let joined = self.root.join(rel_path);
        let canonical =
            fs::canonicalize(&joined).map_err(|source| IngestError::io(source, &joined))?;
        if canonical.starts_with(&self.root) {
            Ok(canonical)
        } else {
            Err(IngestError::PathEscape {
                path: rel_path.to_path_buf(),
            })
        }
    }

    /// Queue a directory for ingest. Invalid submissions are refused here,
    /// never enqueued.
    pub async fn queue(&self, options: QueueOptions) -> Result<()> {
        if let Err(err) = self.resolve(&options.directory) {
            warn!(directory = %options.directory.display(), error = %err, "refusing queue submission");
            return Err(err);
        }
        debug!(directory = %options.directory.display(), id = options.id, force = options.force, "queued ingest");
        self.queue
            .submit(Task::Ingest {
                rel_path: options.directory,
                catalog_override: options.id,
                force: options.force,
            })
            .await;
        Ok(())
    }

    /// Drain the task queue until the cancellation token fires.
    ///
    /// Task failures are logged and the worker moves on; only queue
    /// failure (not expected in normal operation) would end the loop
    /// early.
    pub async fn run(&self) -> Result<()> {
        info!(root = %self.root.display(), "ingester waiting for tasks");
        while let Some(task) = self.queue.take().await {
            let result = match &task {
                Task::Ingest {
                    rel_path,
                    catalog_override,
                    force,
                } => self.process_ingest(rel_path, *catalog_override, *force).await,
                Task::Thumbnail { video_path } => self.process_thumbnail(video_path).await,
            };
            if let Err(err) = result {
                error!(?task, error = %err, "task failed");
            }
        }
        Ok(())
    }

    async fn process_ingest(&self, rel_path: &Path, catalog_override: i64, force: bool) -> Result<()> {
        let abs_dir = self.resolve(rel_path)?;
        debug!(directory = %abs_dir.display(), "scanning directory");

        // Scan: one listing pass to find children and the newest mtime.
        let mut directories: HashMap<String, DateTime<Utc>> = HashMap::new();
        let mut files: Vec<String> = Vec::new();
        let mut last_time = DateTime::UNIX_EPOCH;
        let entries =
            fs::read_dir(&abs_dir).map_err(|source| IngestError::io(source, &abs_dir))?;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    error!(directory = %abs_dir.display(), error = %err, "failed to read directory entry");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) {
                continue;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let mtime: DateTime<Utc> = match entry.metadata().and_then(|meta| meta.modified()) {
                Ok(mtime) => mtime.into(),
                Err(err) => {
                    error!(entry = name, error = %err, "failed to read entry metadata");
                    continue;
                }
            };
            if file_type.is_dir() {
                if name == EXCLUDED_DIR {
                    continue;
                }
                directories.insert(name, mtime);
            } else if file_type.is_file() {
                if !is_media_name(&name) {
                    continue;
                }
                files.push(name);
            } else {
                continue;
            }
            if mtime > last_time {
                last_time = mtime;
            }
        }

        // Load: reconcile the sidecar against the same directory state.
        let mut record = sidecar::read_sidecar(&abs_dir, true)?;

        // Catalog gate: media-bearing leaves, forced rescans and id
        // overrides go out to the catalog; errors are logged and the
        // ingest continues so a later force may retry.
        let id_changed = catalog_override != record.catalog_id;
        if force || id_changed || record.has_media() {
            let enriched = if catalog_override != 0 {
                record.catalog_id = catalog_override;
                record.dirty = true;
                self.enricher
                    .enrich(&self.token, &abs_dir, &mut record, force || id_changed, true)
                    .await
            } else {
                self.enricher
                    .enrich(&self.token, &abs_dir, &mut record, force, false)
                    .await
            };
            if let Err(err) = enriched {
                warn!(directory = %abs_dir.display(), error = %err, "enrichment failed");
            }
        }

        // Timestamp gate: newer content (or force) refreshes thumbnails.
        if force || last_time > record.timestamp {
            record.dirty = true;
            record.timestamp = last_time;
            for name in &files {
                self.queue
                    .submit(Task::Thumbnail {
                        video_path: abs_dir.join(name),
                    })
                    .await;
            }
        }

        // Child reconcile: drop vanished children, enqueue changed ones.
        let stale: Vec<String> = record
            .ingested
            .keys()
            .filter(|name| !directories.contains_key(*name))
            .cloned()
            .collect();
        for name in stale {
            record.ingested.remove(&name);
            record.dirty = true;
        }
        for (child, mtime) in &directories {
            let ingested_at = record
                .ingested
                .get(child)
                .copied()
                .unwrap_or(DateTime::UNIX_EPOCH);
            if *mtime > ingested_at {
                self.queue
                    .submit(Task::Ingest {
                        rel_path: rel_path.join(child),
                        catalog_override: 0,
                        force: false,
                    })
                    .await;
                record.ingested.insert(child.clone(), *mtime);
                record.dirty = true;
            }
        }

        // Publish.
        if record.dirty {
            for mtime in record.child_mtimes.values() {
                if *mtime > record.timestamp {
                    record.timestamp = *mtime;
                }
            }
            self.publish(&abs_dir, &mut record).await?;
        } else {
            debug!(directory = %abs_dir.display(), "sidecar unchanged");
        }
        Ok(())
    }

    /// Write the sidecar under the per-directory lock.
    ///
    /// The HTTP layer owns the individual `seen` booleans, and one of them
    /// may have flipped while this ingest was off at the catalog; re-read
    /// the published record inside the critical section and adopt its
    /// values for the files both sides know about.
    async fn publish(&self, abs_dir: &Path, record: &mut DirectorySidecar) -> Result<()> {
        let lock = self.locks.for_dir(abs_dir);
        let _guard = lock.lock().await;
        if abs_dir.join(SIDECAR_BASENAME).exists() {
            let published = sidecar::read_sidecar(abs_dir, false)?;
            for (name, seen) in published.seen {
                if let Some(current) = record.seen.get_mut(&name) {
                    *current = seen;
                }
            }
        }
        sidecar::write_sidecar(abs_dir, record)
    }

    async fn process_thumbnail(&self, video_path: &Path) -> Result<()> {
        let parent = video_path.parent().unwrap_or(Path::new("."));
        let base = video_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let thumb_path = parent.join(format!(".{base}.webp"));
        self.thumbnailer
            .create(&self.token, video_path, &thumb_path)
            .await?;

        // Opportunistic migration away from the old JPEG thumbnails.
        let legacy = parent.join(format!(".{base}.jpg"));
        match fs::remove_file(&legacy) {
            Ok(()) => debug!(path = %legacy.display(), "removed legacy thumbnail"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(IngestError::io(source, &legacy)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CatalogProvider, CatalogRecord, ProviderError};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    struct NoCatalog;

    #[async_trait]
    impl CatalogProvider for NoCatalog {
        async fn search(&self, _query: &str) -> std::result::Result<Vec<CatalogRecord>, ProviderError> {
            Ok(Vec::new())
        }

        async fn lookup(&self, _id: i64) -> std::result::Result<Vec<CatalogRecord>, ProviderError> {
            Ok(Vec::new())
        }

        fn name(&self) -> &'static str {
            "none"
        }
    }

    fn ingester(root: &Path) -> Ingester {
        let client = Arc::new(reqwest::Client::new());
        let enricher = Arc::new(Enricher::new(
            Arc::new(NoCatalog),
            client,
            Duration::ZERO,
        ));
        Ingester::new(
            root,
            Arc::new(SidecarLocks::new()),
            enricher,
            Thumbnailer::default(),
            CancellationToken::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn escaping_paths_are_refused() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("inside")).unwrap();
        let ingester = ingester(root.path());

        assert!(ingester.resolve(Path::new(".")).is_ok());
        assert!(ingester.resolve(Path::new("inside")).is_ok());
        assert!(ingester.resolve(Path::new("../somewhere")).is_err());
        assert!(ingester.resolve(Path::new("inside/../../etc")).is_err());
        assert!(ingester.resolve(outside.path()).is_err());
        assert!(ingester.resolve(Path::new("missing")).is_err());
    }

    #[tokio::test]
    async fn symlinks_out_of_the_root_are_refused() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("escape")).unwrap();
        let ingester = ingester(root.path());

        let err = ingester.resolve(Path::new("escape")).unwrap_err();
        assert!(matches!(err, IngestError::PathEscape { .. }));
    }

    #[tokio::test]
    async fn invalid_submissions_are_not_enqueued() {
        let root = TempDir::new().unwrap();
        let ingester = ingester(root.path());
        let result = ingester
            .queue(QueueOptions {
                directory: PathBuf::from("../elsewhere"),
                id: 0,
                force: false,
            })
            .await;
        assert!(result.is_err());
    }
}
