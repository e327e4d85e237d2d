//! # Bus Errors
//!
//! Fatal conditions only. Non-fatal conditions (duplicates, leaks) never
//! surface here; they are reported through [`crate::diagnostics`].

use crate::message::MessageType;
use thiserror::Error;

/// Errors surfaced synchronously to the caller of a bus operation.
#[derive(Debug, Error)]
pub enum BusError {
    /// A delivery mode value that does not name any known mode.
    #[error("Invalid delivery mode: {value}")]
    InvalidDeliveryMode { value: String },

    /// No responder is registered for the requested type pair.
    #[error(
        "Can't find any responder with argument of type '{}' and return type '{return_type}'",
        display_argument(.argument_type)
    )]
    ResponderNotFound {
        return_type: MessageType,
        argument_type: Option<MessageType>,
    },

    /// The stored responder could not be recovered as the requested signature.
    #[error(
        "Responder for argument of type '{}' and return type '{return_type}' has an unexpected signature",
        display_argument(.argument_type)
    )]
    ResponderTypeMismatch {
        return_type: MessageType,
        argument_type: Option<MessageType>,
    },

    /// A listener failed while a message was being delivered.
    #[error("Listener for '{message_type}' failed: {source}")]
    Listener {
        message_type: MessageType,
        #[source]
        source: anyhow::Error,
    },

    /// Bus configuration could not be parsed.
    #[error("Invalid bus configuration: {0}")]
    Config(String),
}

fn display_argument(argument_type: &Option<MessageType>) -> String {
    match argument_type {
        Some(ty) => ty.to_string(),
        None => "null".to_string(),
    }
}

/// Result alias used across the bus.
pub type BusResult<T> = Result<T, BusError>;
