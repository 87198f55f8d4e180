// ABOUTME: Pure state machine for the note-persistence lifecycle: states, context, and transitions.
// ABOUTME: transition() handles external events, resolve() folds operation outcomes back into state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::DbEvent;
use crate::fault::Fault;
use crate::gateway::DbHandle;
use crate::note::{Note, NotePayload};

/// The states of the persistence machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbState {
    Idle,
    Connecting,
    Ready,
    Saving,
    GettingNotes,
    GettingNote,
    Error,
}

impl DbState {
    pub fn as_str(self) -> &'static str {
        match self {
            DbState::Idle => "idle",
            DbState::Connecting => "connecting",
            DbState::Ready => "ready",
            DbState::Saving => "saving",
            DbState::GettingNotes => "getting_notes",
            DbState::GettingNote => "getting_note",
            DbState::Error => "error",
        }
    }

    /// True while an operation is in flight.
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            DbState::Connecting | DbState::Saving | DbState::GettingNotes | DbState::GettingNote
        )
    }
}

impl fmt::Display for DbState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data carried alongside the state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbContext {
    pub db: Option<DbHandle>,
    pub notes: Vec<Note>,
    pub error: Option<Fault>,
}

/// Work the actor must run after a successful transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Initialize,
    Save(NotePayload),
    ListNotes,
    GetNote(String),
    /// The event was accepted but cannot be carried out; resolves straight to a fault.
    Reject(Fault),
}

/// The outcome of an operation, fed back through [`DbMachine::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Initialized(DbHandle),
    Saved(Note),
    Listed(Vec<Note>),
    Fetched(Option<Note>),
    Failed(Fault),
}

/// A record of a state change, published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: DbState,
    pub to: DbState,
    pub trigger: String,
    pub at: DateTime<Utc>,
}

impl Transition {
    fn new(from: DbState, to: DbState, trigger: String) -> Self {
        Self {
            from,
            to,
            trigger,
            at: Utc::now(),
        }
    }
}

/// The machine itself: the current state plus its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbMachine {
    pub state: DbState,
    pub context: DbContext,
}

impl Default for DbMachine {
    fn default() -> Self {
        Self {
            state: DbState::Idle,
            context: DbContext::default(),
        }
    }
}

impl DbMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an external event. Returns the transition taken and the operation
    /// to run, or `None` when the current state declares no transition for the
    /// event, in which case state and context are left untouched.
    pub fn transition(&mut self, event: &DbEvent) -> Option<(Transition, Operation)> {
        let (next, operation) = match (self.state, event) {
            (DbState::Idle | DbState::Error, DbEvent::Init) => {
                (DbState::Connecting, Operation::Initialize)
            }
            (DbState::Ready, DbEvent::SaveNote { payload }) => {
                let operation = match payload {
                    Some(payload) => Operation::Save(payload.clone()),
                    None => Operation::Reject(Fault::new("SAVE_NOTE requires an id and content")),
                };
                (DbState::Saving, operation)
            }
            (DbState::Ready, DbEvent::GetNotes) => (DbState::GettingNotes, Operation::ListNotes),
            (DbState::Ready, DbEvent::GetNote { payload }) => {
                let operation = match payload {
                    Some(payload) => Operation::GetNote(payload.id.clone()),
                    None => Operation::Reject(Fault::new("GET_NOTE requires an id")),
                };
                (DbState::GettingNote, operation)
            }
            _ => return None,
        };

        let transition = Transition::new(self.state, next, event.name().to_string());
        self.state = next;
        Some((transition, operation))
    }

    /// Fold an operation outcome into the machine. Returns `None` if the
    /// completion does not belong to the current state.
    pub fn resolve(&mut self, completion: Completion) -> Option<Transition> {
        let from = self.state;
        let next = match (from, completion) {
            (state, Completion::Failed(fault)) if state.is_transitional() => {
                self.context.error = Some(fault);
                DbState::Error
            }
            (DbState::Connecting, Completion::Initialized(db)) => {
                self.context.db = Some(db);
                self.context.error = None;
                DbState::Ready
            }
            (DbState::Saving, Completion::Saved(_)) => DbState::Ready,
            (DbState::GettingNotes, Completion::Listed(notes)) => {
                self.context.notes = notes;
                DbState::Ready
            }
            (DbState::GettingNote, Completion::Fetched(_)) => DbState::Ready,
            _ => return None,
        };

        let trigger = match next {
            DbState::Error => format!("error.{from}"),
            _ => format!("done.{from}"),
        };
        self.state = next;
        Some(Transition::new(from, next, trigger))
    }
}
