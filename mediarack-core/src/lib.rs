//! # Mediarack Core
//!
//! The ingestion engine behind the mediarack media server.
//!
//! A media library is a rooted tree of directories holding video files,
//! mutated out-of-band by the user. The engine converges a per-directory
//! `.info.json` sidecar with the filesystem, enriches directories from
//! remote catalogs under a global rate gate, and schedules thumbnail
//! generation through an external transcoder.
//!
//! The pieces, leaves first:
//!
//! - [`sidecar`]: the persisted per-directory record and its atomic
//!   read/reconcile/write cycle.
//! - [`providers`]: remote catalog transports behind the
//!   [`CatalogProvider`] trait.
//! - [`enrich`]: rate-limited catalog resolution, title normalization and
//!   cover download.
//! - [`thumbnail`]: still-frame extraction by spawning ffmpeg.
//! - [`queue`]: the in-process LIFO task queue.
//! - [`ingest`]: the directory walker and reconciler driving all of the
//!   above.
//! - [`listing`]: pure read projections consumed by the HTTP layer.

pub mod enrich;
pub mod error;
pub mod ingest;
pub mod listing;
pub mod locks;
pub mod providers;
pub mod queue;
pub mod sidecar;
pub mod thumbnail;

pub use enrich::Enricher;
pub use error::{IngestError, Result};
pub use ingest::{Ingester, QueueOptions};
pub use listing::DirectoryListing;
pub use locks::SidecarLocks;
pub use providers::{CatalogProvider, CatalogRecord, ProviderError};
pub use queue::{Task, TaskQueue};
pub use sidecar::DirectorySidecar;
pub use thumbnail::Thumbnailer;
