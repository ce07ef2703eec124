//! Per-directory sidecar write locks.
//!
//! The ingester worker and the HTTP mark/override endpoints both rewrite
//! sidecars. Each read-modify-rename sequence must hold the lock for the
//! directory's absolute path.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

/// A process-wide map of async mutexes keyed by absolute directory path.
///
/// Locks are created on first use and never removed; the library tree is
/// bounded and entries are two pointers each.
#[derive(Debug, Default)]
pub struct SidecarLocks {
    locks: DashMap<std::path::PathBuf, Arc<Mutex<()>>>,
}

impl SidecarLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding sidecar writes under `dir`. Hold the guard across
    /// the whole read-modify-rename sequence.
    pub fn for_dir(&self, dir: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(dir.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_path_shares_a_lock() {
        let locks = SidecarLocks::new();
        let a = locks.for_dir(Path::new("/library/show"));
        let b = locks.for_dir(Path::new("/library/show"));
        assert!(Arc::ptr_eq(&a, &b));

        let other = locks.for_dir(Path::new("/library/other"));
        assert!(!Arc::ptr_eq(&a, &other));

        let guard = a.lock().await;
        assert!(b.try_lock().is_err());
        drop(guard);
        assert!(b.try_lock().is_ok());
    }
}
