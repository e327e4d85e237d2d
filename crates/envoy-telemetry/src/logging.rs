//! Structured logging helpers.
//!
//! Every record carries a `component` field so bus, host and application
//! logs can be told apart in aggregated output.

/// Helper to create structured log entries with consistent formatting.
#[macro_export]
macro_rules! log_event {
    // Info level with component
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    // Warn level with component
    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    // Error level with component
    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    // Debug level with component
    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a message-related event with the message type attached.
#[macro_export]
macro_rules! log_message_event {
    ($level:ident, $component:expr, $msg:expr, $message_type:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            message_type = %$message_type,
            $($($field)*,)?
            $msg
        )
    };
}
