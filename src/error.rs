use std::sync::Arc;

use crate::{AgentId, EnvelopeId};

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Envelope {0} has no recipient, topic or broadcast target")]
    NoRoute(EnvelopeId),

    #[error("Envelope {0} expired before delivery")]
    Expired(EnvelopeId),

    #[error("Mailbox of agent '{0}' has reached its capacity of {1}")]
    MailboxFull(AgentId, usize),

    #[error("Agent '{0}' is not registered")]
    UnknownAgent(AgentId),

    #[error("Mailbox of agent '{0}' is closed")]
    MailboxClosed(AgentId),

    #[error("Envelope {0} could not be delivered to any recipient")]
    Undelivered(EnvelopeId),

    #[error("Broker is shutting down")]
    ShuttingDown,

    #[error("Invalid priority value: {0}")]
    InvalidPriority(u8),

    #[error("Handler '{0}' failed: {1}")]
    HandlerFailed(Arc<str>, Arc<str>),

    #[error("Handler '{0}' panicked")]
    HandlerPanicked(Arc<str>),

    #[error("Error external to switchboard occurred: {0}")]
    External(Arc<str>),

    #[error("IO Error: {0}")]
    IOError(Arc<std::io::Error>),
}

impl Error {
    /// Wrap any displayable error raised inside a handler or pattern.
    pub fn external(err: impl std::fmt::Display) -> Self {
        Error::External(err.to_string().into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IOError(Arc::new(e))
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::external(e)
    }
}
