use thiserror::Error;

/// Errors surfaced across the chat facade boundary. Transport and protocol
/// failures never appear here; they are handled by the connection manager's
/// state machine and observed through connection events.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("outbound queue is full")]
    QueueFull,
    #[error("invalid chat config: {0}")]
    InvalidConfig(String),
    #[error("chat session already connected")]
    AlreadyConnected,
    #[error("chat session is not connected")]
    NotConnected,
}
