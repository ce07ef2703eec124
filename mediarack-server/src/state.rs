use std::sync::Arc;

use mediarack_core::Ingester;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ingester: Arc<Ingester>,
}

impl AppState {
    pub fn new(ingester: Arc<Ingester>) -> Self {
        Self { ingester }
    }
}
