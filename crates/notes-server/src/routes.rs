// ABOUTME: Route definitions for the notesd HTTP API.
// ABOUTME: Assembles all API routes into a single Axum Router with shared state, tracing, and optional auth.

use axum::Router;
use axum::extract::Request;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;
use crate::auth::BearerAuthLayer;

/// Build the complete Axum router. When `auth_token` is set, every `/api`
/// route requires it.
pub fn create_router(state: SharedState, auth_token: Option<String>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/db", get(api::db::get_db_state))
        .route("/api/db/init", post(api::db::init_db))
        .route("/api/db/events", post(api::db::send_event))
        .route("/api/db/stream", get(api::stream::transition_stream))
        .route(
            "/api/notes",
            get(api::notes::list_notes).post(api::notes::create_note),
        )
        .route(
            "/api/notes/{id}",
            get(api::notes::get_note).put(api::notes::save_note),
        )
        .with_state(state);

    let router = match auth_token {
        Some(token) => router.layer(BearerAuthLayer::new(token)),
        None => router,
    };

    // The editor frontend is served from its own origin
    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
}

/// Request span carrying the path only; the stream's query holds the token.
fn request_span(req: &Request) -> tracing::Span {
    tracing::debug_span!("request", method = %req.method(), path = %req.uri().path())
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
