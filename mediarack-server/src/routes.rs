use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{image, json, listing, mark, r#override, rescan};
use crate::state::AppState;

/// Assemble the router. Each endpoint is registered twice so that both
/// the bare prefix (the media root) and a wildcard tail resolve.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/j/", get(json::serve_json))
        .route("/j/{*path}", get(json::serve_json))
        .route("/l/", get(listing::serve_listing))
        .route("/l/{*path}", get(listing::serve_listing))
        .route("/i/", get(image::serve_image))
        .route("/i/{*path}", get(image::serve_image))
        .route("/m/{*path}", post(mark::serve_mark))
        .route("/o/", post(r#override::serve_override))
        .route("/o/{*path}", post(r#override::serve_override))
        .route("/r/", post(rescan::serve_rescan))
        .route("/r/{*path}", post(rescan::serve_rescan))
        .with_state(state)
}
