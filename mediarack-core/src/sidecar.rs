//! The per-directory sidecar record.
//!
//! Every directory in the library carries a `.info.json` next to its
//! contents: catalog identity, localized titles, the seen-state of its
//! media files and the ingest state of its children. The record on disk is
//! always either the previous snapshot or an atomically renamed new one.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IngestError, Result};

pub const SIDECAR_BASENAME: &str = ".info.json";
pub const COVER_BASENAME: &str = ".cover.jpg";

/// Directory name used by Synology NAS for its own thumbnails; never media.
pub const EXCLUDED_DIR: &str = "@eaDir";

const MEDIA_EXTENSIONS: &[&str] = &[
    "asf", "avi", "f4v", "flv", "mkv", "mov", "mp4", "mpg", "ogv", "rm", "rmvb", "webm", "wmv",
];

/// Whether `name` has a recognized media extension (case-insensitive).
pub fn is_media_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Whether a directory entry should be ignored entirely.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// The persisted state of one library directory.
///
/// `seen` keys are exactly the recognized media files in the directory;
/// `ingested` keys are exactly its non-hidden child directories. Both are
/// converged against the filesystem by [`read_sidecar`] with
/// `reconcile = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySidecar {
    /// Max modification time across child entries at the last successful
    /// ingest of this directory (not its children).
    #[serde(default = "unix_epoch")]
    pub timestamp: DateTime<Utc>,
    /// Catalog identifier; `0` = never looked up, `-1` = negative cache.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub catalog_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub native_title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub english_title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chinese_title: String,
    /// Media files present, true iff the user marked them watched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub seen: BTreeMap<String, bool>,
    /// Child directories present and the mtime last handed to an ingest
    /// task; the epoch means the child is pending its first ingest.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ingested: BTreeMap<String, DateTime<Utc>>,

    /// Whether persistent fields changed since the last load.
    #[serde(skip)]
    pub dirty: bool,
    /// Modification time of each live child entry, from the last reconcile.
    #[serde(skip)]
    pub child_mtimes: HashMap<String, DateTime<Utc>>,
}

fn is_zero(id: &i64) -> bool {
    *id == 0
}

impl Default for DirectorySidecar {
    fn default() -> Self {
        Self {
            timestamp: unix_epoch(),
            catalog_id: 0,
            native_title: String::new(),
            english_title: String::new(),
            chinese_title: String::new(),
            seen: BTreeMap::new(),
            ingested: BTreeMap::new(),
            dirty: false,
            child_mtimes: HashMap::new(),
        }
    }
}

impl DirectorySidecar {
    pub fn has_media(&self) -> bool {
        !self.seen.is_empty()
    }

    /// True when every media file in the directory is marked seen.
    /// Vacuously true for a directory with no media.
    pub fn fully_seen(&self) -> bool {
        self.seen.values().all(|&seen| seen)
    }
}

/// Read the sidecar of `dir`, creating an empty record when none exists.
///
/// With `reconcile` the directory is walked once and the `seen` and
/// `ingested` maps are converged against it: new entries are added with
/// zero values, entries whose file or directory disappeared are dropped,
/// and each live child's mtime lands in the transient `child_mtimes` map.
/// The `dirty` flag is set iff a persistent field was mutated.
///
/// When no sidecar file exists yet, `.NAME.seen` marker files left behind
/// by the previous on-disk format are folded into the `seen` map; they are
/// never written back.
pub fn read_sidecar(dir: &Path, reconcile: bool) -> Result<DirectorySidecar> {
    let sidecar_path = dir.join(SIDECAR_BASENAME);
    let mut migrate = false;
    let mut sidecar = match fs::read(&sidecar_path) {
        Ok(bytes) => {
            serde_json::from_slice::<DirectorySidecar>(&bytes).map_err(|source| {
                IngestError::SidecarDecode {
                    source,
                    path: sidecar_path.clone(),
                }
            })?
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            migrate = true;
            DirectorySidecar::default()
        }
        Err(source) => return Err(IngestError::io(source, sidecar_path)),
    };

    if !reconcile {
        return Ok(sidecar);
    }
    if migrate {
        // No sidecar yet: the reconcile below is its first snapshot and
        // must be published even for an empty directory.
        sidecar.dirty = true;
    }

    let mut present: HashMap<String, bool> = HashMap::new();
    let mut migrating_seen: Vec<String> = Vec::new();

    let entries = fs::read_dir(dir).map_err(|source| IngestError::io(source, dir))?;
    for entry in entries {
        let entry = entry.map_err(|source| IngestError::io(source, dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            if migrate {
                if let Some(marked) = name
                    .strip_prefix('.')
                    .and_then(|rest| rest.strip_suffix(".seen"))
                {
                    if !marked.is_empty() {
                        migrating_seen.push(marked.to_owned());
                    }
                }
            }
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if name == EXCLUDED_DIR {
                if sidecar.ingested.remove(&name).is_some() {
                    sidecar.dirty = true;
                }
                continue;
            }
            if !sidecar.ingested.contains_key(&name) {
                sidecar.ingested.insert(name.clone(), unix_epoch());
                sidecar.dirty = true;
            }
        } else if file_type.is_file() {
            if !is_media_name(&name) {
                continue;
            }
            if !sidecar.seen.contains_key(&name) {
                sidecar.seen.insert(name.clone(), false);
                sidecar.dirty = true;
            }
        } else {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            if let Ok(mtime) = meta.modified() {
                sidecar.child_mtimes.insert(name.clone(), mtime.into());
            }
        }
        present.insert(name, true);
    }

    if migrate {
        for name in migrating_seen {
            if let Some(seen) = sidecar.seen.get_mut(&name) {
                if !*seen {
                    *seen = true;
                    sidecar.dirty = true;
                }
            }
        }
    }

    let stale_dirs: Vec<String> = sidecar
        .ingested
        .keys()
        .filter(|name| !present.contains_key(*name))
        .cloned()
        .collect();
    for name in stale_dirs {
        sidecar.ingested.remove(&name);
        sidecar.dirty = true;
    }
    let stale_files: Vec<String> = sidecar
        .seen
        .keys()
        .filter(|name| !present.contains_key(*name))
        .cloned()
        .collect();
    for name in stale_files {
        sidecar.seen.remove(&name);
        sidecar.dirty = true;
    }

    Ok(sidecar)
}

/// Publish `sidecar` to `dir` atomically.
///
/// The record is encoded into a temporary file in the same directory,
/// flushed, and renamed over `.info.json`; the temporary file is removed
/// on every failure path. Callers only invoke this when `dirty` is set.
pub fn write_sidecar(dir: &Path, sidecar: &DirectorySidecar) -> Result<()> {
    let sidecar_path = dir.join(SIDECAR_BASENAME);
    let mut temp =
        tempfile::NamedTempFile::new_in(dir).map_err(|source| IngestError::io(source, dir))?;
    serde_json::to_writer(&mut temp, sidecar).map_err(|source| IngestError::SidecarEncode {
        source,
        path: sidecar_path.clone(),
    })?;
    temp.flush()
        .map_err(|source| IngestError::io(source, &sidecar_path))?;
    temp.persist(&sidecar_path)
        .map_err(|source| IngestError::io(source.error, &sidecar_path))?;
    debug!(path = %sidecar_path.display(), "published sidecar");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    #[test]
    fn media_extensions_are_case_insensitive() {
        assert!(is_media_name("episode.mkv"));
        assert!(is_media_name("episode.MKV"));
        assert!(is_media_name("movie.WebM"));
        assert!(!is_media_name("notes.txt"));
        assert!(!is_media_name("no-extension"));
    }

    #[test]
    fn missing_sidecar_yields_empty_record() {
        let root = TempDir::new().unwrap();
        let sidecar = read_sidecar(root.path(), false).unwrap();
        assert_eq!(sidecar.catalog_id, 0);
        assert!(sidecar.seen.is_empty());
        assert!(sidecar.ingested.is_empty());
        assert!(!sidecar.dirty);
    }

    #[test]
    fn first_reconcile_of_an_empty_directory_is_dirty() {
        let root = TempDir::new().unwrap();
        let first = read_sidecar(root.path(), true).unwrap();
        assert!(first.dirty);
        write_sidecar(root.path(), &first).unwrap();
        let second = read_sidecar(root.path(), true).unwrap();
        assert!(!second.dirty);
    }

    #[test]
    fn reconcile_tracks_media_files_and_directories() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "a.mkv");
        touch(root.path(), "b.mp4");
        touch(root.path(), "readme.txt");
        touch(root.path(), ".hidden.mkv");
        fs::create_dir(root.path().join("Season 1")).unwrap();
        fs::create_dir(root.path().join("@eaDir")).unwrap();
        fs::create_dir(root.path().join(".git")).unwrap();

        let sidecar = read_sidecar(root.path(), true).unwrap();
        assert!(sidecar.dirty);
        assert_eq!(
            sidecar.seen.keys().collect::<Vec<_>>(),
            vec!["a.mkv", "b.mp4"]
        );
        assert_eq!(sidecar.ingested.keys().collect::<Vec<_>>(), vec!["Season 1"]);
        assert_eq!(sidecar.ingested["Season 1"], DateTime::UNIX_EPOCH);
        assert!(sidecar.child_mtimes.contains_key("a.mkv"));
        assert!(sidecar.child_mtimes.contains_key("Season 1"));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "a.mkv");
        fs::create_dir(root.path().join("extras")).unwrap();

        let first = read_sidecar(root.path(), true).unwrap();
        assert!(first.dirty);
        write_sidecar(root.path(), &first).unwrap();

        let second = read_sidecar(root.path(), true).unwrap();
        assert!(!second.dirty);
        assert_eq!(second.seen, first.seen);
        assert_eq!(second.ingested, first.ingested);
    }

    #[test]
    fn reconcile_drops_stale_entries() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "keep.mkv");
        let mut sidecar = DirectorySidecar::default();
        sidecar.seen.insert("keep.mkv".into(), true);
        sidecar.seen.insert("gone.mkv".into(), false);
        sidecar
            .ingested
            .insert("vanished".into(), DateTime::UNIX_EPOCH);
        write_sidecar(root.path(), &sidecar).unwrap();

        let reconciled = read_sidecar(root.path(), true).unwrap();
        assert!(reconciled.dirty);
        assert_eq!(reconciled.seen.keys().collect::<Vec<_>>(), vec!["keep.mkv"]);
        assert_eq!(reconciled.seen["keep.mkv"], true);
        assert!(reconciled.ingested.is_empty());
    }

    #[test]
    fn seen_marker_files_migrate_once() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "a.mkv");
        touch(root.path(), "b.mkv");
        touch(root.path(), ".a.mkv.seen");

        let sidecar = read_sidecar(root.path(), true).unwrap();
        assert_eq!(sidecar.seen["a.mkv"], true);
        assert_eq!(sidecar.seen["b.mkv"], false);

        // Once a sidecar exists the markers are ignored.
        write_sidecar(root.path(), &sidecar).unwrap();
        touch(root.path(), ".b.mkv.seen");
        let again = read_sidecar(root.path(), true).unwrap();
        assert_eq!(again.seen["b.mkv"], false);
    }

    #[test]
    fn encoding_omits_empty_fields() {
        let sidecar = DirectorySidecar::default();
        let json = serde_json::to_value(&sidecar).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("timestamp"));
        assert_eq!(object.len(), 1, "only timestamp should be present: {json}");

        let mut full = DirectorySidecar::default();
        full.catalog_id = -1;
        full.english_title = "Example".into();
        full.seen.insert("a.mkv".into(), false);
        let json = serde_json::to_value(&full).unwrap();
        assert_eq!(json["catalog_id"], -1);
        assert_eq!(json["english_title"], "Example");
        assert_eq!(json["seen"]["a.mkv"], false);
    }

    #[test]
    fn decode_accepts_omitted_fields() {
        let sidecar: DirectorySidecar =
            serde_json::from_str(r#"{"timestamp":"2024-03-01T00:00:00Z"}"#).unwrap();
        assert_eq!(sidecar.catalog_id, 0);
        assert!(sidecar.seen.is_empty());
    }

    #[test]
    fn corrupt_sidecar_is_an_error() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join(SIDECAR_BASENAME), b"{not json").unwrap();
        let err = read_sidecar(root.path(), true).unwrap_err();
        assert!(matches!(err, IngestError::SidecarDecode { .. }));
    }

    #[test]
    fn write_leaves_no_temporary_files() {
        let root = TempDir::new().unwrap();
        let mut sidecar = DirectorySidecar::default();
        sidecar.seen.insert("a.mkv".into(), true);
        write_sidecar(root.path(), &sidecar).unwrap();

        let names: Vec<String> = fs::read_dir(root.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![SIDECAR_BASENAME.to_owned()]);

        let reread = read_sidecar(root.path(), false).unwrap();
        assert_eq!(reread.seen["a.mkv"], true);
    }
}
