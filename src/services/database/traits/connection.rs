//! The remote command dispatch seam.
//!
//! Every handle operation is a single `Dispatcher::send` call. Implementations
//! decide how a command reaches the process that owns the database pools
//! (an in-process channel, a local backend, a test double) and must keep the
//! payload structure intact.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

use crate::services::database::error::DispatchError;

/// Commands understood by the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Load,
    Execute,
    Select,
    Close,
}

impl Command {
    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Execute => "execute",
            Self::Select => "select",
            Self::Close => "close",
        }
    }

    /// Whether a rejection of this command is a connection-level failure
    /// (as opposed to a rejected statement).
    pub fn is_connection_command(&self) -> bool {
        matches!(self, Self::Load | Self::Close)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a mutating statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Number of rows affected
    pub rows_affected: u64,
    /// Generated key, `0` for drivers that cannot report one
    pub last_insert_id: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(rows_affected: u64, last_insert_id: u64) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }
}

/// The single substitutable boundary between client logic and the remote side.
///
/// # Example
///
/// ```ignore
/// use sqlgate::services::database::traits::{Command, Dispatcher};
///
/// async fn ping(dispatcher: &dyn Dispatcher) {
///     let reply = dispatcher
///         .send(Command::Close, serde_json::json!({ "db": "sqlite:test.db" }))
///         .await;
///     // ...
/// }
/// ```
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Send one command and wait for its reply.
    ///
    /// # Errors
    ///
    /// - `DispatchError::Transport` if the channel is unavailable, the remote
    ///   side died before replying, or a payload could not be (de)serialized
    /// - `DispatchError::Rejected` if the remote side refused the command; the
    ///   message is the remote one, verbatim
    async fn send(&self, command: Command, payload: JsonValue) -> Result<JsonValue, DispatchError>;
}

/// A shared dispatcher trait object.
///
/// Handles hold one of these; cloning a handle clones the `Arc`, never the
/// underlying channel.
pub type SharedDispatcher = Arc<dyn Dispatcher>;

#[async_trait]
impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    async fn send(&self, command: Command, payload: JsonValue) -> Result<JsonValue, DispatchError> {
        (**self).send(command, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_names() {
        assert_eq!(Command::Load.name(), "load");
        assert_eq!(Command::Execute.name(), "execute");
        assert_eq!(Command::Select.name(), "select");
        assert_eq!(Command::Close.name(), "close");
        assert_eq!(
            serde_json::to_value(Command::Execute).unwrap(),
            serde_json::json!("execute")
        );
    }

    #[test]
    fn test_connection_commands() {
        assert!(Command::Load.is_connection_command());
        assert!(Command::Close.is_connection_command());
        assert!(!Command::Execute.is_connection_command());
        assert!(!Command::Select.is_connection_command());
    }

    #[test]
    fn test_query_result_creation() {
        let result = QueryResult::new(5, 42);
        assert_eq!(result.rows_affected, 5);
        assert_eq!(result.last_insert_id, 42);
        assert_eq!(
            serde_json::to_value(result).unwrap(),
            serde_json::json!({ "rowsAffected": 5, "lastInsertId": 42 })
        );
    }
}
