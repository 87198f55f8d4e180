// ABOUTME: Shared application state for the notesd HTTP server.
// ABOUTME: Holds the handle of the single persistence actor that every handler talks to.

use std::sync::Arc;

use notes_core::DbActorHandle;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub db: DbActorHandle,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: DbActorHandle) -> Self {
        Self { db }
    }
}
