// ABOUTME: Async actor that drives the persistence state machine and runs gateway operations.
// ABOUTME: Provides DbActorHandle for sending events, awaiting results, and watching transitions.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};

use crate::event::DbEvent;
use crate::fault::Fault;
use crate::gateway::{DbHandle, NoteGateway};
use crate::machine::{Completion, DbMachine, DbState, Operation, Transition};
use crate::note::{Note, NotePayload};

/// Errors that can occur when talking to the actor.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("actor channel closed")]
    ChannelClosed,
}

/// Whether the machine accepted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Dispatch {
    Accepted { from: DbState, to: DbState },
    Ignored { state: DbState },
}

/// The result of an event once its operation has finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    Done(T),
    Failed(Fault),
    /// The machine was in `state`, which declares no transition for the event.
    Ignored { state: DbState },
}

impl<T> Settled<T> {
    pub fn done(self) -> Option<T> {
        match self {
            Settled::Done(value) => Some(value),
            _ => None,
        }
    }
}

/// Narrow a raw completion to the value a typed helper returns.
fn narrow<T>(settled: Settled<Completion>, pick: impl FnOnce(Completion) -> Option<T>) -> Settled<T> {
    match settled {
        Settled::Done(completion) => match pick(completion) {
            Some(value) => Settled::Done(value),
            None => Settled::Failed(Fault::unknown()),
        },
        Settled::Failed(fault) => Settled::Failed(fault),
        Settled::Ignored { state } => Settled::Ignored { state },
    }
}

struct EventMessage {
    event: DbEvent,
    dispatch_tx: oneshot::Sender<Dispatch>,
    settled_tx: Option<oneshot::Sender<Completion>>,
}

/// Public handle for interacting with a DbActor. Cloning is cheap; all clones
/// drive the same machine.
#[derive(Clone)]
pub struct DbActorHandle {
    event_tx: mpsc::Sender<EventMessage>,
    transition_tx: broadcast::Sender<Transition>,
    machine: Arc<RwLock<DbMachine>>,
}

impl DbActorHandle {
    /// Send an event without waiting for its operation to finish.
    pub async fn send(&self, event: DbEvent) -> Result<Dispatch, ActorError> {
        self.dispatch(event, None).await
    }

    pub async fn init(&self) -> Result<Settled<DbHandle>, ActorError> {
        let settled = self.send_and_wait(DbEvent::Init).await?;
        Ok(narrow(settled, |c| match c {
            Completion::Initialized(db) => Some(db),
            _ => None,
        }))
    }

    pub async fn save_note(&self, payload: NotePayload) -> Result<Settled<Note>, ActorError> {
        let event = DbEvent::SaveNote {
            payload: Some(payload),
        };
        let settled = self.send_and_wait(event).await?;
        Ok(narrow(settled, |c| match c {
            Completion::Saved(note) => Some(note),
            _ => None,
        }))
    }

    pub async fn get_notes(&self) -> Result<Settled<Vec<Note>>, ActorError> {
        let settled = self.send_and_wait(DbEvent::GetNotes).await?;
        Ok(narrow(settled, |c| match c {
            Completion::Listed(notes) => Some(notes),
            _ => None,
        }))
    }

    pub async fn get_note(
        &self,
        id: impl Into<String>,
    ) -> Result<Settled<Option<Note>>, ActorError> {
        let settled = self.send_and_wait(DbEvent::get_note(id)).await?;
        Ok(narrow(settled, |c| match c {
            Completion::Fetched(note) => Some(note),
            _ => None,
        }))
    }

    /// Send any event and wait for the raw completion of its operation.
    pub async fn send_and_wait(&self, event: DbEvent) -> Result<Settled<Completion>, ActorError> {
        let (settled_tx, settled_rx) = oneshot::channel();
        match self.dispatch(event, Some(settled_tx)).await? {
            Dispatch::Ignored { state } => Ok(Settled::Ignored { state }),
            Dispatch::Accepted { .. } => {
                match settled_rx.await.map_err(|_| ActorError::ChannelClosed)? {
                    Completion::Failed(fault) => Ok(Settled::Failed(fault)),
                    completion => Ok(Settled::Done(completion)),
                }
            }
        }
    }

    /// Subscribe to the stream of state transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transition_tx.subscribe()
    }

    /// Clone of the current state and context.
    pub async fn snapshot(&self) -> DbMachine {
        self.machine.read().await.clone()
    }

    pub async fn state(&self) -> DbState {
        self.machine.read().await.state
    }

    async fn dispatch(
        &self,
        event: DbEvent,
        settled_tx: Option<oneshot::Sender<Completion>>,
    ) -> Result<Dispatch, ActorError> {
        let (dispatch_tx, dispatch_rx) = oneshot::channel();
        self.event_tx
            .send(EventMessage {
                event,
                dispatch_tx,
                settled_tx,
            })
            .await
            .map_err(|_| ActorError::ChannelClosed)?;
        dispatch_rx.await.map_err(|_| ActorError::ChannelClosed)
    }
}

/// Spawn a new DbActor task over the given gateway, starting in `idle`.
/// The actor runs until every handle has been dropped.
pub fn spawn<G: NoteGateway>(gateway: G) -> DbActorHandle {
    let (event_tx, event_rx) = mpsc::channel::<EventMessage>(64);
    let (done_tx, done_rx) = mpsc::unbounded_channel::<Completion>();
    let (transition_tx, _) = broadcast::channel::<Transition>(256);
    let machine = Arc::new(RwLock::new(DbMachine::new()));

    let handle = DbActorHandle {
        event_tx,
        transition_tx: transition_tx.clone(),
        machine: Arc::clone(&machine),
    };

    let actor = DbActor {
        gateway: Arc::new(gateway),
        machine,
        event_rx,
        done_tx,
        done_rx,
        transition_tx,
        pending: None,
    };

    tokio::spawn(actor.run());

    handle
}

/// The internal actor. At most one operation is in flight; its caller, if
/// any, waits on `pending`.
struct DbActor<G> {
    gateway: Arc<G>,
    machine: Arc<RwLock<DbMachine>>,
    event_rx: mpsc::Receiver<EventMessage>,
    done_tx: mpsc::UnboundedSender<Completion>,
    done_rx: mpsc::UnboundedReceiver<Completion>,
    transition_tx: broadcast::Sender<Transition>,
    pending: Option<oneshot::Sender<Completion>>,
}

impl<G: NoteGateway> DbActor<G> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                message = self.event_rx.recv() => match message {
                    Some(message) => self.handle_event(message).await,
                    None => break,
                },
                Some(completion) = self.done_rx.recv() => self.handle_completion(completion).await,
            }
        }
        tracing::debug!("db actor stopped");
    }

    async fn handle_event(&mut self, message: EventMessage) {
        let EventMessage {
            event,
            dispatch_tx,
            settled_tx,
        } = message;

        let (transition, operation, db) = {
            let mut machine = self.machine.write().await;
            let current = machine.state;
            match machine.transition(&event) {
                Some((transition, operation)) => {
                    (transition, operation, machine.context.db.clone())
                }
                None => {
                    tracing::warn!("ignoring {} in state {}", event.name(), current);
                    // Ignore send error — the caller may have dropped their receiver
                    let _ = dispatch_tx.send(Dispatch::Ignored { state: current });
                    return;
                }
            }
        };

        tracing::info!(
            "{} -> {} on {}",
            transition.from,
            transition.to,
            transition.trigger
        );
        let _ = dispatch_tx.send(Dispatch::Accepted {
            from: transition.from,
            to: transition.to,
        });
        self.pending = settled_tx;
        // Ignore broadcast errors (no active subscribers is fine)
        let _ = self.transition_tx.send(transition);

        self.launch(operation, db);
    }

    async fn handle_completion(&mut self, completion: Completion) {
        let transition = {
            let mut machine = self.machine.write().await;
            machine.resolve(completion.clone())
        };

        let Some(transition) = transition else {
            tracing::warn!("dropping completion that does not match the current state");
            return;
        };

        match &completion {
            Completion::Failed(fault) => tracing::error!("{} failed: {}", transition.from, fault),
            _ => tracing::info!(
                "{} -> {} on {}",
                transition.from,
                transition.to,
                transition.trigger
            ),
        }

        if let Some(settled_tx) = self.pending.take() {
            let _ = settled_tx.send(completion);
        }
        let _ = self.transition_tx.send(transition);
    }

    /// Run the operation on the blocking pool; its outcome arrives on `done_rx`.
    fn launch(&self, operation: Operation, db: Option<DbHandle>) {
        let gateway = Arc::clone(&self.gateway);
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || run_operation(&*gateway, operation, db)).await;
            let completion = match result {
                Ok(completion) => completion,
                Err(err) => Completion::Failed(Fault::from_join_error(err)),
            };
            let _ = done_tx.send(completion);
        });
    }
}

fn run_operation<G: NoteGateway>(
    gateway: &G,
    operation: Operation,
    db: Option<DbHandle>,
) -> Completion {
    let failed = |err: G::Error| Completion::Failed(Fault::from_error(&err));

    match (operation, db) {
        (Operation::Reject(fault), _) => Completion::Failed(fault),
        (Operation::Initialize, _) => gateway.load().map_or_else(failed, Completion::Initialized),
        (Operation::Save(payload), Some(db)) => gateway
            .upsert_note(&db, &payload)
            .map_or_else(failed, Completion::Saved),
        (Operation::ListNotes, Some(db)) => {
            gateway.list_notes(&db).map_or_else(failed, Completion::Listed)
        }
        (Operation::GetNote(id), Some(db)) => gateway
            .get_note(&db, &id)
            .map_or_else(failed, Completion::Fetched),
        (_, None) => Completion::Failed(Fault::new("database not initialized")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::MemoryGateway;

    async fn ready_handle() -> (DbActorHandle, MemoryGateway) {
        let gateway = MemoryGateway::new();
        let handle = spawn(gateway.clone());
        let db = handle
            .init()
            .await
            .unwrap()
            .done()
            .expect("init should succeed");
        assert_eq!(db.location, "memory");
        (handle, gateway)
    }

    #[tokio::test]
    async fn init_connects_and_reaches_ready() {
        let handle = spawn(MemoryGateway::new());
        assert_eq!(handle.state().await, DbState::Idle);

        let settled = handle.init().await.unwrap();
        assert!(matches!(settled, Settled::Done(_)));

        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.state, DbState::Ready);
        assert!(snapshot.context.db.is_some());
        assert!(snapshot.context.error.is_none());
    }

    #[tokio::test]
    async fn save_twice_keeps_one_note_with_latest_content() {
        let (handle, _gateway) = ready_handle().await;

        let first = handle
            .save_note(NotePayload::new("n1", "draft"))
            .await
            .unwrap()
            .done()
            .unwrap();
        let second = handle
            .save_note(NotePayload::new("n1", "final"))
            .await
            .unwrap()
            .done()
            .unwrap();

        assert_eq!(second.content, "final");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);

        let notes = handle.get_notes().await.unwrap().done().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "final");
    }

    #[tokio::test]
    async fn get_notes_caches_list_in_context() {
        let (handle, _gateway) = ready_handle().await;
        handle.save_note(NotePayload::new("a", "1")).await.unwrap();
        handle.save_note(NotePayload::new("b", "2")).await.unwrap();

        let notes = handle.get_notes().await.unwrap().done().unwrap();
        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.context.notes, notes);
        assert_eq!(notes.len(), 2);
    }

    #[tokio::test]
    async fn get_note_for_unknown_id_is_empty_not_fault() {
        let (handle, _gateway) = ready_handle().await;

        let settled = handle.get_note("never-saved").await.unwrap();
        assert_eq!(settled, Settled::Done(None));
        assert_eq!(handle.state().await, DbState::Ready);
    }

    #[tokio::test]
    async fn get_note_does_not_mutate_cached_list() {
        let (handle, _gateway) = ready_handle().await;
        handle.save_note(NotePayload::new("a", "1")).await.unwrap();
        handle.get_notes().await.unwrap();
        handle.save_note(NotePayload::new("b", "2")).await.unwrap();

        let fetched = handle.get_note("b").await.unwrap().done().unwrap();
        assert_eq!(fetched.map(|n| n.content), Some("2".to_string()));

        let cached = handle.snapshot().await.context.notes;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "a");
    }

    #[tokio::test]
    async fn events_before_init_are_ignored() {
        let handle = spawn(MemoryGateway::new());
        let before = handle.snapshot().await;

        let dispatch = handle.send(DbEvent::GetNotes).await.unwrap();
        assert_eq!(dispatch, Dispatch::Ignored { state: DbState::Idle });

        let settled = handle.save_note(NotePayload::new("a", "b")).await.unwrap();
        assert_eq!(settled, Settled::Ignored { state: DbState::Idle });

        assert_eq!(handle.snapshot().await, before);
    }

    #[tokio::test]
    async fn events_during_operation_are_ignored() {
        let (handle, gateway) = ready_handle().await;
        gateway.pause();

        let dispatch = handle.send(DbEvent::GetNotes).await.unwrap();
        assert_eq!(
            dispatch,
            Dispatch::Accepted {
                from: DbState::Ready,
                to: DbState::GettingNotes
            }
        );

        let dispatch = handle.send(DbEvent::save_note("x", "y")).await.unwrap();
        assert_eq!(
            dispatch,
            Dispatch::Ignored {
                state: DbState::GettingNotes
            }
        );
        let dispatch = handle.send(DbEvent::Init).await.unwrap();
        assert_eq!(
            dispatch,
            Dispatch::Ignored {
                state: DbState::GettingNotes
            }
        );

        let mut rx = handle.subscribe();
        gateway.resume();
        let transition = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("operation should settle")
            .unwrap();
        assert_eq!(transition.from, DbState::GettingNotes);
        assert_eq!(transition.to, DbState::Ready);

        // The ignored save never reached the gateway
        assert!(gateway.note("x").is_none());
    }

    #[tokio::test]
    async fn failed_init_enters_error_and_reinit_recovers() {
        let gateway = MemoryGateway::new();
        gateway.fail_next("unable to open database file");
        let handle = spawn(gateway.clone());

        let settled = handle.init().await.unwrap();
        assert_eq!(
            settled,
            Settled::Failed(Fault::new("unable to open database file"))
        );
        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.state, DbState::Error);
        assert_eq!(
            snapshot.context.error.map(|f| f.message),
            Some("unable to open database file".to_string())
        );

        // Only INIT is accepted from error
        let dispatch = handle.send(DbEvent::GetNotes).await.unwrap();
        assert_eq!(dispatch, Dispatch::Ignored { state: DbState::Error });

        let mut rx = handle.subscribe();
        let settled = handle.init().await.unwrap();
        assert!(matches!(settled, Settled::Done(_)));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.from, DbState::Error);
        assert_eq!(first.to, DbState::Connecting);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.to, DbState::Ready);
        assert!(handle.snapshot().await.context.error.is_none());
    }

    #[tokio::test]
    async fn failed_save_enters_error() {
        let (handle, gateway) = ready_handle().await;
        gateway.fail_next("disk I/O error");

        let settled = handle.save_note(NotePayload::new("a", "b")).await.unwrap();
        assert_eq!(settled, Settled::Failed(Fault::new("disk I/O error")));
        assert_eq!(handle.state().await, DbState::Error);
    }

    #[tokio::test]
    async fn save_without_payload_is_a_fault() {
        let (handle, gateway) = ready_handle().await;

        let settled = handle
            .send_and_wait(DbEvent::SaveNote { payload: None })
            .await
            .unwrap();
        assert!(matches!(settled, Settled::Failed(_)));
        assert_eq!(handle.state().await, DbState::Error);
        assert_eq!(gateway.len(), 0);
    }

    #[tokio::test]
    async fn panicking_gateway_is_coerced_to_fault() {
        let (handle, gateway) = ready_handle().await;
        gateway.panic_next();

        let settled = handle.get_notes().await.unwrap();
        assert_eq!(settled, Settled::Failed(Fault::unknown()));
        assert_eq!(handle.state().await, DbState::Error);
    }

    #[tokio::test]
    async fn transitions_are_broadcast_in_order() {
        let handle = spawn(MemoryGateway::new());
        let mut rx = handle.subscribe();

        handle.init().await.unwrap();
        handle.get_notes().await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            let t = rx.recv().await.unwrap();
            seen.push((t.from, t.to, t.trigger));
        }
        assert_eq!(
            seen,
            vec![
                (DbState::Idle, DbState::Connecting, "INIT".to_string()),
                (DbState::Connecting, DbState::Ready, "done.connecting".to_string()),
                (DbState::Ready, DbState::GettingNotes, "GET_NOTES".to_string()),
                (
                    DbState::GettingNotes,
                    DbState::Ready,
                    "done.getting_notes".to_string()
                ),
            ]
        );
    }
}
