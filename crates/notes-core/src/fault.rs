// ABOUTME: Normalized fault value stored in the machine context when an operation fails.
// ABOUTME: Converts gateway errors, panics, and unknown failures into a single message-carrying type.

use std::any::Any;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used when a failure carries nothing presentable.
pub const DEFAULT_FAULT_MESSAGE: &str = "Unknown error";

/// A failure of any persistence operation, reduced to its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct Fault {
    pub message: String,
}

impl Fault {
    /// Build a fault from a message. Blank messages become the default message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            return Self::unknown();
        }
        Self { message }
    }

    pub fn unknown() -> Self {
        Self {
            message: DEFAULT_FAULT_MESSAGE.to_string(),
        }
    }

    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::new(err.to_string())
    }

    /// Convert a panic payload. Only `&str` and `String` payloads keep their text.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(msg) = payload.downcast_ref::<&str>() {
            Self::new(*msg)
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            Self::new(msg.clone())
        } else {
            Self::unknown()
        }
    }

    /// Convert the failure of a blocking task that never produced a result.
    pub fn from_join_error(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::from_panic(err.into_panic())
        } else {
            Self::unknown()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_keeps_error_message() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
        let fault = Fault::from_error(&io);
        assert_eq!(fault.message, "read-only volume");
        assert_eq!(fault.to_string(), "read-only volume");
    }

    #[test]
    fn blank_message_falls_back_to_default() {
        assert_eq!(Fault::new("   ").message, DEFAULT_FAULT_MESSAGE);
        assert_eq!(Fault::new("").message, DEFAULT_FAULT_MESSAGE);
    }

    #[test]
    fn non_string_panic_payload_is_unknown() {
        let fault = Fault::from_panic(Box::new(42_u32));
        assert_eq!(fault, Fault::unknown());

        let fault = Fault::from_panic(Box::new("disk vanished"));
        assert_eq!(fault.message, "disk vanished");

        let fault = Fault::from_panic(Box::new(String::from("lock poisoned")));
        assert_eq!(fault.message, "lock poisoned");
    }

    #[tokio::test]
    async fn panicking_task_becomes_fault() {
        let err = tokio::task::spawn_blocking(|| -> u32 { panic!("gateway blew up") })
            .await
            .unwrap_err();
        let fault = Fault::from_join_error(err);
        assert_eq!(fault.message, "gateway blew up");
    }
}
