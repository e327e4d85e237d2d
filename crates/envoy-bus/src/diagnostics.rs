//! # Diagnostics
//!
//! Non-fatal conditions are reported here and never interrupt control flow.
//! The bus itself never writes output; a [`DiagnosticSink`] decides what to do
//! with each report. [`TracingSink`] is the default.

use crate::message::MessageType;
use crate::responder::ResponderKey;
use std::cell::RefCell;
use std::fmt;
use tracing::{error, warn};

/// How loudly a diagnostic should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A non-fatal condition observed by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The same listener was added twice for one message type. Ignored.
    DuplicateListener { message_type: MessageType },

    /// A responder was added for an already occupied type pair. Rejected.
    DuplicateResponder { key: ResponderKey },

    /// Listeners were still attached when the bus was torn down.
    LeakedListeners { message_types: Vec<MessageType> },

    /// Responders were still registered when the bus was torn down.
    LeakedResponders { keys: Vec<ResponderKey> },

    /// A stored responder could not be invoked with the requested signature.
    ResponderInvocation { key: ResponderKey, reason: String },
}

impl Diagnostic {
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::DuplicateListener { .. }
            | Diagnostic::LeakedListeners { .. }
            | Diagnostic::LeakedResponders { .. } => Severity::Warning,
            Diagnostic::DuplicateResponder { .. } | Diagnostic::ResponderInvocation { .. } => {
                Severity::Error
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DuplicateListener { message_type } => write!(
                f,
                "An attempt to attach a listener to '{message_type}' multiple times was detected. Ignoring"
            ),
            Diagnostic::DuplicateResponder { key } => write!(
                f,
                "An attempt to attach multiple responders with {key} was detected. \
                 Only one responder can be registered at the same time"
            ),
            Diagnostic::LeakedListeners { message_types } => {
                f.write_str(
                    "Some listeners haven't been removed manually. This could lead to memory leaks. \
                     Check for missing remove_listener() calls. List of message types:",
                )?;
                for ty in message_types {
                    write!(f, "\n'{ty}'")?;
                }
                Ok(())
            }
            Diagnostic::LeakedResponders { keys } => {
                f.write_str(
                    "Some responders haven't been removed manually. This could lead to memory leaks. \
                     List of responders:",
                )?;
                for key in keys {
                    write!(f, "\n{key}")?;
                }
                Ok(())
            }
            Diagnostic::ResponderInvocation { key, reason } => {
                write!(f, "Responder with {key} could not be invoked: {reason}")
            }
        }
    }
}

/// Receives non-fatal reports from the bus.
pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

/// Emit a `tracing` event at the level matching a [`Severity`].
macro_rules! at_severity {
    ($severity:expr, $($arg:tt)+) => {
        match $severity {
            Severity::Warning => warn!($($arg)+),
            Severity::Error => error!($($arg)+),
        }
    };
}

/// Forwards every report to `tracing` with structured fields, at the level
/// given by [`Diagnostic::severity`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        let severity = diagnostic.severity();
        match &diagnostic {
            Diagnostic::DuplicateListener { message_type } => {
                at_severity!(severity, message_type = %message_type, "{diagnostic}");
            }
            Diagnostic::DuplicateResponder { key } | Diagnostic::ResponderInvocation { key, .. } => {
                at_severity!(
                    severity,
                    return_type = %key.return_type(),
                    argument_type = %key.argument_label(),
                    "{diagnostic}"
                );
            }
            Diagnostic::LeakedListeners { message_types } => {
                at_severity!(severity, count = message_types.len(), "{diagnostic}");
            }
            Diagnostic::LeakedResponders { keys } => {
                at_severity!(severity, count = keys.len(), "{diagnostic}");
            }
        }
    }
}

/// Records reports in memory. Intended for assertions in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: RefCell<Vec<Diagnostic>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports received so far, oldest first.
    #[must_use]
    pub fn reports(&self) -> Vec<Diagnostic> {
        self.reports.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.reports.borrow_mut().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        self.reports.borrow_mut().push(diagnostic);
    }
}
