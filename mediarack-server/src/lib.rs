//! # Mediarack Server
//!
//! The HTTP surface over the mediarack ingestion engine.
//!
//! The server only reads sidecars (plus the seen-bit toggle, which writes
//! one back) and forwards ingest requests to the engine's queue. Endpoints:
//!
//! - `GET /j/{path}`: the raw sidecar as JSON
//! - `GET /l/{path}`: the listing projection as JSON
//! - `GET /i/{path}`: cover image for a directory, thumbnail for a file
//! - `POST /m/{path}?{bool}`: set the seen bit of one media file
//! - `POST /o/{path}`: catalog override / bulk mark flow
//! - `POST /r/{path}`: force a rescan of a directory

pub mod config;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::Config;
pub use state::AppState;
