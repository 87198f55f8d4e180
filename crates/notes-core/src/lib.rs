// ABOUTME: Core library for notesd, containing the note model and the persistence state machine.
// ABOUTME: Defines events, the pure transition reducer, the gateway seam, and the async actor.

pub mod actor;
pub mod event;
pub mod fault;
pub mod gateway;
pub mod machine;
pub mod note;
pub mod testing;

pub use actor::{ActorError, DbActorHandle, Dispatch, Settled, spawn};
pub use event::DbEvent;
pub use fault::{DEFAULT_FAULT_MESSAGE, Fault};
pub use gateway::{DbHandle, NoteGateway};
pub use machine::{Completion, DbContext, DbMachine, DbState, Operation, Transition};
pub use note::{Note, NoteId, NotePayload};
