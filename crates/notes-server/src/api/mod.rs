// ABOUTME: API module grouping the notesd HTTP handlers.
// ABOUTME: Also maps machine outcomes (faults, ignored events, closed actor) onto HTTP responses.

pub mod db;
pub mod notes;
pub mod stream;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use notes_core::{ActorError, DbState, Fault};

/// 500 carrying the fault message stored by the machine.
pub(crate) fn fault_response(fault: &Fault) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": fault.message })),
    )
        .into_response()
}

/// 409 for an event the machine ignored in its current state.
pub(crate) fn ignored_response(state: DbState) -> Response {
    (
        StatusCode::CONFLICT,
        Json(serde_json::json!({
            "error": format!("database is {state}"),
            "state": state,
        })),
    )
        .into_response()
}

pub(crate) fn actor_error_response(err: &ActorError) -> Response {
    tracing::error!("db actor unavailable: {}", err);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}
