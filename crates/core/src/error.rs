//! Registry error model.

use thiserror::Error;

/// Result type used across the registry.
pub type EventterResult<T> = Result<T, EventterError>;

/// Registry-level error.
///
/// Unsubscribing something that is not registered is never an error, so there
/// is no "not found" variant. Failures raised by user callbacks (panics) are not
/// represented here; they unwind straight to the publisher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventterError {
    /// The payload type does not match the type bound to the event name.
    #[error("type mismatch on event '{event}': expected {expected}, found {found}")]
    TypeMismatch {
        event: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A receiver method was dispatched while the receiver was already borrowed
    /// (nested notify reaching a receiver that is currently running).
    #[error("receiver {receiver} is busy while dispatching '{event}'")]
    ReceiverBusy { event: String, receiver: String },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The registry has issued every handle it can; handles are never reused.
    #[error("subscription handles exhausted")]
    HandlesExhausted,
}

impl EventterError {
    pub fn type_mismatch(
        event: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            event: event.into(),
            expected,
            found,
        }
    }

    pub fn receiver_busy(event: impl Into<String>, receiver: impl ToString) -> Self {
        Self::ReceiverBusy {
            event: event.into(),
            receiver: receiver.to_string(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }


    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
}
