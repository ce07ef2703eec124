//! Read projections over the sidecar store.
//!
//! Pure query functions consumed by the HTTP layer: a directory listing
//! with affix-trimmed file titles, the seen-bit mark write, and the
//! override flow that re-queues a directory with a catalog id.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::ingest::{Ingester, QueueOptions};
use crate::locks::SidecarLocks;
use crate::sidecar::{self, DirectorySidecar};

#[derive(Debug, Serialize)]
pub struct DirectoryListing {
    pub name: String,
    pub catalog_id: i64,
    pub native_title: String,
    pub english_title: String,
    pub chinese_title: String,
    pub has_media: bool,
    pub directories: Vec<ChildDirectory>,
    pub files: Vec<MediaFileEntry>,
}

#[derive(Debug, Serialize)]
pub struct ChildDirectory {
    pub name: String,
    pub native_title: String,
    pub english_title: String,
    pub chinese_title: String,
    pub has_media: bool,
    /// True when every media file under the child is marked seen.
    pub seen: bool,
}

#[derive(Debug, Serialize)]
pub struct MediaFileEntry {
    pub name: String,
    /// The file name minus the prefix and suffix shared by all siblings.
    pub title: String,
    pub seen: bool,
}

/// Length of the common prefix (or suffix) across `names`, in characters.
///
/// Lists of fewer than two names share nothing, and identical names are
/// deliberately not trimmed to nothing.
fn common_affix_len(names: &[Vec<char>], prefix: bool) -> usize {
    if names.len() < 2 {
        return 0;
    }
    if names.iter().all(|name| *name == names[0]) {
        return 0;
    }
    let mut offset = 0;
    'scan: loop {
        let mut shared: Option<char> = None;
        for name in names {
            if name.len() == offset {
                break 'scan;
            }
            let ch = if prefix {
                name[offset]
            } else {
                name[name.len() - 1 - offset]
            };
            match shared {
                None => shared = Some(ch),
                Some(expected) if expected != ch => break 'scan,
                Some(_) => {}
            }
        }
        offset += 1;
    }
    offset
}

/// Trim the common prefix and suffix off every name. Singleton and empty
/// lists come back unchanged.
fn trimmed_titles(names: &[String]) -> Vec<String> {
    let chars: Vec<Vec<char>> = names.iter().map(|name| name.chars().collect()).collect();
    let prefix = common_affix_len(&chars, true);
    let suffix = common_affix_len(&chars, false);
    chars
        .iter()
        .map(|name| {
            name.iter()
                .skip(prefix)
                .take(name.len().saturating_sub(prefix + suffix))
                .collect()
        })
        .collect()
}

/// Build the listing for `abs_dir`, reconciling its sidecar and reading
/// each child's sidecar for titles and seen state.
pub fn build_listing(abs_dir: &Path) -> Result<DirectoryListing> {
    let record = sidecar::read_sidecar(abs_dir, true)?;
    let name = abs_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut directories = Vec::with_capacity(record.ingested.len());
    for child_name in record.ingested.keys() {
        let child = match sidecar::read_sidecar(&abs_dir.join(child_name), true) {
            Ok(child) => child,
            Err(err) => {
                debug!(child = child_name, error = %err, "failed to read child sidecar");
                DirectorySidecar::default()
            }
        };
        directories.push(ChildDirectory {
            name: child_name.clone(),
            native_title: child.native_title.clone(),
            english_title: child.english_title.clone(),
            chinese_title: child.chinese_title.clone(),
            has_media: child.has_media(),
            seen: child.has_media() && child.fully_seen(),
        });
    }

    let names: Vec<String> = record.seen.keys().cloned().collect();
    let titles = trimmed_titles(&names);
    let mut files: Vec<MediaFileEntry> = names
        .into_iter()
        .zip(titles)
        .map(|(name, title)| {
            let seen = record.seen[&name];
            MediaFileEntry { name, title, seen }
        })
        .collect();
    files.sort_by(|a, b| a.title.cmp(&b.title));

    let has_media = record.has_media();
    Ok(DirectoryListing {
        name,
        catalog_id: record.catalog_id,
        native_title: record.native_title,
        english_title: record.english_title,
        chinese_title: record.chinese_title,
        has_media,
        directories,
        files,
    })
}

/// Flip the seen bit of one media file.
///
/// The file must already be tracked in the directory's sidecar; unknown
/// names are an error (the HTTP layer answers 404) and mutate nothing.
pub async fn mark_seen(
    locks: &SidecarLocks,
    abs_dir: &Path,
    file_name: &str,
    seen: bool,
) -> Result<()> {
    let lock = locks.for_dir(abs_dir);
    let _guard = lock.lock().await;
    let mut record = sidecar::read_sidecar(abs_dir, false)?;
    match record.seen.get_mut(file_name) {
        Some(entry) => *entry = seen,
        None => {
            return Err(IngestError::UnknownFile {
                dir: abs_dir.to_path_buf(),
                name: file_name.to_owned(),
            })
        }
    }
    sidecar::write_sidecar(abs_dir, &record)
}

/// The body of an override request.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OverrideRequest {
    pub id: i64,
    pub force: bool,
    /// Collapse a homogeneous seen map to the opposite value.
    pub mark: bool,
}

/// The override flow: optionally toggle the whole seen map, then queue a
/// re-ingest when the id differs from the stored one or force is set.
/// Returns whether an ingest was queued.
pub async fn apply_override(
    ingester: &Ingester,
    abs_dir: &Path,
    rel_path: PathBuf,
    request: &OverrideRequest,
) -> Result<bool> {
    let mut record: Option<DirectorySidecar> = None;

    if request.mark {
        let lock = ingester.locks().for_dir(abs_dir);
        let _guard = lock.lock().await;
        let mut current = sidecar::read_sidecar(abs_dir, true)?;
        let has_true = current.seen.values().any(|&seen| seen);
        let has_false = current.seen.values().any(|&seen| !seen);
        if !current.seen.is_empty() && (!has_true || !has_false) {
            // All one way: flip the lot.
            let target = !has_true;
            for seen in current.seen.values_mut() {
                *seen = target;
            }
            sidecar::write_sidecar(abs_dir, &current)?;
        }
        record = Some(current);
    }

    let mut existing_id = 0;
    if request.id != 0 {
        let current = match record {
            Some(current) => current,
            None => sidecar::read_sidecar(abs_dir, false)?,
        };
        existing_id = current.catalog_id;
    }

    if request.id != existing_id || request.force {
        ingester
            .queue(QueueOptions {
                directory: rel_path,
                id: request.id,
                force: request.force,
            })
            .await?;
        return Ok(true);
    }
    Ok(false)
}
