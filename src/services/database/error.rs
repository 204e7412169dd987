//! Error types for the connection handle and its dispatch seam.

use thiserror::Error;

use super::traits::Command;

/// Failures of the dispatch channel itself.
///
/// These say nothing about the SQL that was sent; the infrastructure was not
/// available to run it.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("dispatch channel is closed")]
    ChannelClosed,

    #[error("remote side dropped the `{0}` request without replying")]
    NoReply(Command),

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unexpected reply shape: {0}")]
    Protocol(String),

    #[error("protocol version mismatch (expected {expected}, got {found})")]
    VersionMismatch { expected: u32, found: u32 },
}

/// What a `Dispatcher` reports when a command does not produce a reply.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The remote side refused the command; the message is its own.
    #[error("{0}")]
    Rejected(String),
}

impl DispatchError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Errors surfaced to callers of `ConnectionHandle`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid connection string `{input}`: {reason}")]
    InvalidConnectionString { input: String, reason: &'static str },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("connection error during `{command}`: {message}")]
    Connection { command: Command, message: String },

    #[error("query error: {message}")]
    Query { message: String },

    #[error("rows do not match the requested shape: {0}")]
    Decode(#[source] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_connection_string(input: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidConnectionString {
            input: input.into(),
            reason,
        }
    }

    /// Classify a dispatch failure for the command that produced it.
    pub fn from_dispatch(command: Command, err: DispatchError) -> Self {
        match err {
            DispatchError::Transport(e) => Self::Transport(e),
            DispatchError::Rejected(message) if command.is_connection_command() => {
                Self::Connection { command, message }
            }
            DispatchError::Rejected(message) => Self::Query { message },
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }

    /// The remote-provided message, for connection and query failures
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Connection { message, .. } | Self::Query { message } => Some(message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
