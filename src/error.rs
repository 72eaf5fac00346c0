//! Error types for the parlance chat core.

use crate::capability::CapabilityError;

/// Top-level error type for the chat core.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// A capability negotiation or feature call failed.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// No message with the given id exists in the conversation.
    #[error("unknown message: {0}")]
    UnknownMessage(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Host command contract or routing error.
    #[error("host error: {0}")]
    Host(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChatError>;
