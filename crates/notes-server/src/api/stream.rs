// ABOUTME: SSE handler streaming persistence-machine transitions to the frontend.
// ABOUTME: Subscribes to the actor's broadcast channel; each SSE event is named after the target state.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use notes_core::Transition;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::app_state::SharedState;

/// Convert a broadcast receiver into an SSE-compatible stream. Lagged
/// receivers skip the missed transitions.
fn transition_stream_from_receiver(
    rx: tokio::sync::broadcast::Receiver<Transition>,
) -> impl Stream<Item = Result<SseEvent, axum::Error>> {
    BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(transition) => {
                let data = serde_json::to_string(&transition).ok()?;
                Some(Ok(SseEvent::default()
                    .event(transition.to.as_str())
                    .data(data)))
            }
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                tracing::warn!("transition stream lagged by {} messages", n);
                None
            }
        }
    })
}

/// GET /api/db/stream - SSE endpoint for real-time state transitions.
pub async fn transition_stream(State(state): State<SharedState>) -> impl IntoResponse {
    let rx = state.db.subscribe();
    Sse::new(transition_stream_from_receiver(rx)).keep_alive(KeepAlive::default())
}
