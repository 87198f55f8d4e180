// ABOUTME: The database gateway seam used by the persistence actor.
// ABOUTME: Declares the load-or-open handle and the blocking note operations a store must provide.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::note::{Note, NotePayload};

/// Descriptor of a loaded database. Holds where the database lives, not an
/// open connection; gateways re-open per operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbHandle {
    pub location: String,
    pub opened_at: DateTime<Utc>,
}

impl DbHandle {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            opened_at: Utc::now(),
        }
    }
}

/// Blocking note persistence primitives. The actor calls these from the
/// blocking thread pool, one at a time.
pub trait NoteGateway: Send + Sync + 'static {
    type Error: std::error::Error + Send + 'static;

    /// Open or create the database and ensure the notes table exists.
    fn load(&self) -> Result<DbHandle, Self::Error>;

    /// Insert the note, or replace its content and refresh `updated_at` if the
    /// id already exists. Returns the stored row.
    fn upsert_note(&self, db: &DbHandle, payload: &NotePayload) -> Result<Note, Self::Error>;

    /// All notes, most recently updated first.
    fn list_notes(&self, db: &DbHandle) -> Result<Vec<Note>, Self::Error>;

    fn get_note(&self, db: &DbHandle, id: &str) -> Result<Option<Note>, Self::Error>;
}
