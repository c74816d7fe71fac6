//! Error types for event operations

use thiserror::Error;

/// Event bus specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// Event constructed without a name
    #[error("Event name cannot be empty")]
    EmptyName,

    /// Subscription pattern cannot be compiled
    #[error("Invalid subscription pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern as given
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// Handler failed while processing an event
    #[error("Handler failed for event '{event}': {message}")]
    Handler {
        /// Event name
        event: String,
        /// Failure message
        message: String,
    },

    /// The bus worker could not accept the event
    #[error("Event bus is not accepting events: {0}")]
    Closed(String),
}
