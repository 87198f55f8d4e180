// ABOUTME: Database lifecycle handlers: machine snapshot, INIT, and raw event submission.
// ABOUTME: Lets the frontend (re)initialize the store and send events fire-and-forget.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use notes_core::{DbEvent, Dispatch, Settled};

use crate::api::{actor_error_response, fault_response, ignored_response};
use crate::app_state::SharedState;

/// GET /api/db - Current machine state and context.
pub async fn get_db_state(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.db.snapshot().await)
}

/// POST /api/db/init - Send INIT and wait for the connection to settle.
pub async fn init_db(State(state): State<SharedState>) -> impl IntoResponse {
    match state.db.init().await {
        Ok(Settled::Done(db)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "state": "ready", "db": db })),
        )
            .into_response(),
        Ok(Settled::Failed(fault)) => fault_response(&fault),
        Ok(Settled::Ignored { state }) => ignored_response(state),
        Err(e) => actor_error_response(&e),
    }
}

/// POST /api/db/events - Submit any machine event without waiting for its result.
pub async fn send_event(
    State(state): State<SharedState>,
    Json(event): Json<DbEvent>,
) -> impl IntoResponse {
    match state.db.send(event).await {
        Ok(dispatch @ Dispatch::Accepted { .. }) => {
            (StatusCode::ACCEPTED, Json(dispatch)).into_response()
        }
        Ok(dispatch @ Dispatch::Ignored { .. }) => {
            (StatusCode::CONFLICT, Json(dispatch)).into_response()
        }
        Err(e) => actor_error_response(&e),
    }
}
