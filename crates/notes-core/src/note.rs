// ABOUTME: Defines the Note entity and the payloads carried by persistence events.
// ABOUTME: Notes are keyed by an opaque string id and carry store-assigned timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted text document. `id` is the primary key; `created_at` is fixed
/// on first save and `updated_at` is refreshed by every later save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload of a SAVE_NOTE event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePayload {
    pub id: String,
    pub content: String,
}

impl NotePayload {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// Payload of a GET_NOTE event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteId {
    pub id: String,
}

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}
