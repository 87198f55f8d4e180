// ABOUTME: Test utilities for notes-core, including an in-memory note gateway.
// ABOUTME: Lets tests drive the actor without SQLite and inject failures, panics, and stalls.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use chrono::Utc;
use thiserror::Error;

use crate::gateway::{DbHandle, NoteGateway};
use crate::note::{Note, NotePayload};

/// Error produced by [`MemoryGateway`] when a failure has been injected.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct MemoryGatewayError(pub String);

/// Panic payload used by [`MemoryGateway::panic_next`]. Not a string, so it
/// exercises the unknown-failure path.
#[derive(Debug)]
pub struct InjectedPanic;

#[derive(Default)]
struct Inner {
    notes: HashMap<String, Note>,
    fail_next: Option<String>,
    panic_next: bool,
}

/// A gateway backed by a HashMap. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    inner: Arc<Mutex<Inner>>,
    paused: Arc<(Mutex<bool>, Condvar)>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation fail with the given message.
    pub fn fail_next(&self, message: &str) {
        self.lock().fail_next = Some(message.to_string());
    }

    /// Make the next operation panic.
    pub fn panic_next(&self) {
        self.lock().panic_next = true;
    }

    /// Block every operation until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        let (flag, _) = &*self.paused;
        *flag.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    pub fn resume(&self) {
        let (flag, cvar) = &*self.paused;
        *flag.lock().unwrap_or_else(|e| e.into_inner()) = false;
        cvar.notify_all();
    }

    pub fn note(&self, id: &str) -> Option<Note> {
        self.lock().notes.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait_while_paused(&self) {
        let (flag, cvar) = &*self.paused;
        let guard = flag.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = cvar
            .wait_while(guard, |paused| *paused)
            .unwrap_or_else(|e| e.into_inner());
    }

    /// Common preamble of every operation: honour pause, then injected faults.
    fn enter(&self) -> Result<MutexGuard<'_, Inner>, MemoryGatewayError> {
        self.wait_while_paused();
        let mut inner = self.lock();
        if inner.panic_next {
            inner.panic_next = false;
            drop(inner);
            std::panic::panic_any(InjectedPanic);
        }
        if let Some(message) = inner.fail_next.take() {
            return Err(MemoryGatewayError(message));
        }
        Ok(inner)
    }
}

impl NoteGateway for MemoryGateway {
    type Error = MemoryGatewayError;

    fn load(&self) -> Result<DbHandle, Self::Error> {
        let _inner = self.enter()?;
        Ok(DbHandle::new("memory"))
    }

    fn upsert_note(&self, _db: &DbHandle, payload: &NotePayload) -> Result<Note, Self::Error> {
        let mut inner = self.enter()?;
        let now = Utc::now();
        let note = inner
            .notes
            .entry(payload.id.clone())
            .and_modify(|note| {
                note.content = payload.content.clone();
                note.updated_at = note.updated_at.max(now);
            })
            .or_insert_with(|| Note {
                id: payload.id.clone(),
                content: payload.content.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(note.clone())
    }

    fn list_notes(&self, _db: &DbHandle) -> Result<Vec<Note>, Self::Error> {
        let inner = self.enter()?;
        let mut notes: Vec<Note> = inner.notes.values().cloned().collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(notes)
    }

    fn get_note(&self, _db: &DbHandle, id: &str) -> Result<Option<Note>, Self::Error> {
        let inner = self.enter()?;
        Ok(inner.notes.get(id).cloned())
    }
}
