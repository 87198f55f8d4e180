// ABOUTME: Note CRUD handlers for listing, creating, reading, and saving notes.
// ABOUTME: Each request becomes one machine event and waits for the operation to settle.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use notes_core::{NotePayload, Settled};
use serde::Deserialize;
use ulid::Ulid;

use crate::api::{actor_error_response, fault_response, ignored_response};
use crate::app_state::SharedState;

/// Request body for creating or saving a note.
#[derive(Debug, Deserialize)]
pub struct NoteBody {
    pub content: String,
}

/// GET /api/notes - All notes, most recently updated first.
pub async fn list_notes(State(state): State<SharedState>) -> impl IntoResponse {
    match state.db.get_notes().await {
        Ok(Settled::Done(notes)) => {
            (StatusCode::OK, Json(serde_json::json!({ "notes": notes }))).into_response()
        }
        Ok(Settled::Failed(fault)) => fault_response(&fault),
        Ok(Settled::Ignored { state }) => ignored_response(state),
        Err(e) => actor_error_response(&e),
    }
}

/// POST /api/notes - Create a note under a freshly generated id.
pub async fn create_note(
    State(state): State<SharedState>,
    Json(body): Json<NoteBody>,
) -> impl IntoResponse {
    let id = Ulid::new().to_string();
    match state.db.save_note(NotePayload::new(id, body.content)).await {
        Ok(Settled::Done(note)) => (StatusCode::CREATED, Json(note)).into_response(),
        Ok(Settled::Failed(fault)) => fault_response(&fault),
        Ok(Settled::Ignored { state }) => ignored_response(state),
        Err(e) => actor_error_response(&e),
    }
}

/// GET /api/notes/{id} - A single note, or 404 if it was never saved.
pub async fn get_note(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.db.get_note(id).await {
        Ok(Settled::Done(Some(note))) => (StatusCode::OK, Json(note)).into_response(),
        Ok(Settled::Done(None)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "note not found" })),
        )
            .into_response(),
        Ok(Settled::Failed(fault)) => fault_response(&fault),
        Ok(Settled::Ignored { state }) => ignored_response(state),
        Err(e) => actor_error_response(&e),
    }
}

/// PUT /api/notes/{id} - Upsert the note's content.
pub async fn save_note(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<NoteBody>,
) -> impl IntoResponse {
    match state.db.save_note(NotePayload::new(id, body.content)).await {
        Ok(Settled::Done(note)) => (StatusCode::OK, Json(note)).into_response(),
        Ok(Settled::Failed(fault)) => fault_response(&fault),
        Ok(Settled::Ignored { state }) => ignored_response(state),
        Err(e) => actor_error_response(&e),
    }
}
