// ABOUTME: Defines the external events accepted by the persistence state machine.
// ABOUTME: Events are tagged by SCREAMING_SNAKE_CASE type names on the wire.

use serde::{Deserialize, Serialize};

use crate::note::{NoteId, NotePayload};

/// An event sent to the persistence machine. Payload-carrying events accept a
/// missing payload on the wire; the machine turns that into a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DbEvent {
    Init,
    SaveNote {
        #[serde(default)]
        payload: Option<NotePayload>,
    },
    GetNotes,
    GetNote {
        #[serde(default)]
        payload: Option<NoteId>,
    },
}

impl DbEvent {
    pub fn save_note(id: impl Into<String>, content: impl Into<String>) -> Self {
        DbEvent::SaveNote {
            payload: Some(NotePayload::new(id, content)),
        }
    }

    pub fn get_note(id: impl Into<String>) -> Self {
        DbEvent::GetNote {
            payload: Some(NoteId::new(id)),
        }
    }

    /// The wire name of this event, used in transition records and logs.
    pub fn name(&self) -> &'static str {
        match self {
            DbEvent::Init => "INIT",
            DbEvent::SaveNote { .. } => "SAVE_NOTE",
            DbEvent::GetNotes => "GET_NOTES",
            DbEvent::GetNote { .. } => "GET_NOTE",
        }
    }
}
