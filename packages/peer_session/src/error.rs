use thiserror::Error;

/// Errors surfaced while establishing or running a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Every dial attempt was refused or timed out
    #[error("connection failed after {tries} attempts")]
    ConnectionFailed { tries: u32 },
    /// The peer's address did not resolve to anything dialable
    #[error("could not resolve peer address: {0}")]
    UnresolvedAddress(String),
    /// Establishment was cancelled from outside while waiting to retry
    #[error("interrupted while establishing the connection")]
    Interrupted,
    /// The manager already ran a session; sessions are one-shot
    #[error("session was already started")]
    AlreadyStarted,
    /// Transport-level read/write failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
