// ABOUTME: HTTP server for notesd, exposing the persistence machine as a REST API and SSE stream.
// ABOUTME: Uses Axum with a shared actor handle; the editor frontend talks to these routes.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, NotesdConfig};
pub use routes::create_router;
