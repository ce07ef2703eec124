//! The in-process work queue.
//!
//! A LIFO stack: newly discovered subdirectories are processed before
//! already-seen peers, so the region the user just touched resolves first.
//! The queue is not persisted; a seed ingest of the root is submitted
//! shortly after startup.

use std::path::PathBuf;

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One unit of work for the ingester worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Walk one directory (relative to the media root) and reconcile its
    /// sidecar.
    Ingest {
        rel_path: PathBuf,
        catalog_override: i64,
        force: bool,
    },
    /// Produce a still-frame thumbnail for one media file.
    Thumbnail { video_path: PathBuf },
}

#[derive(Debug)]
pub struct TaskQueue {
    pending: Mutex<Vec<Task>>,
    notify: Notify,
    shutdown: CancellationToken,
}

impl TaskQueue {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            notify: Notify::new(),
            shutdown,
        }
    }

    /// Append a task and wake one waiter. A no-op after shutdown.
    pub async fn submit(&self, task: Task) {
        if self.shutdown.is_cancelled() {
            debug!(?task, "dropping task submitted after shutdown");
            return;
        }
        self.pending.lock().await.push(task);
        self.notify.notify_one();
    }

    /// Pop the most recently submitted task, blocking while the queue is
    /// empty. Returns `None` once the shutdown token is cancelled.
    pub async fn take(&self) -> Option<Task> {
        loop {
            if self.shutdown.is_cancelled() {
                return None;
            }
            if let Some(task) = self.pending.lock().await.pop() {
                return Some(task);
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = self.shutdown.cancelled() => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ingest(path: &str) -> Task {
        Task::Ingest {
            rel_path: PathBuf::from(path),
            catalog_override: 0,
            force: false,
        }
    }

    #[tokio::test]
    async fn take_is_lifo() {
        let queue = TaskQueue::new(CancellationToken::new());
        queue.submit(ingest("a")).await;
        queue.submit(ingest("b")).await;
        assert_eq!(queue.take().await, Some(ingest("b")));
        assert_eq!(queue.take().await, Some(ingest("a")));
    }

    #[tokio::test]
    async fn take_blocks_until_submit() {
        let queue = std::sync::Arc::new(TaskQueue::new(CancellationToken::new()));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.take().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.submit(ingest("late")).await;
        assert_eq!(waiter.await.unwrap(), Some(ingest("late")));
    }

    #[tokio::test]
    async fn cancellation_unblocks_take() {
        let token = CancellationToken::new();
        let queue = std::sync::Arc::new(TaskQueue::new(token.clone()));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.take().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_dropped() {
        let token = CancellationToken::new();
        let queue = TaskQueue::new(token.clone());
        token.cancel();
        queue.submit(ingest("ignored")).await;
        assert_eq!(queue.take().await, None);
    }
}
