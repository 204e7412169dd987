//! Client-side handle to a remote, pooled database connection.
//!
//! A `ConnectionHandle` is an immutable identifier plus an injected
//! `Dispatcher`. It translates `load`/`execute`/`select`/`close` into single
//! dispatcher calls and normalizes the replies.
//!
//! # Example
//!
//! ```ignore
//! use sqlgate::{ConnectionHandle, ConnectionString, Statement};
//!
//! let db = ConnectionHandle::load("sqlite:test.db".parse()?, dispatcher.clone()).await?;
//! db.execute("CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)").await?;
//! let result = db.execute(Statement::new("INSERT INTO t(v) VALUES ($1)").bind("x")).await?;
//! let rows = db.select("SELECT * FROM t").await?;
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::fmt;
use tracing::{debug, warn};

use super::error::{Error, Result, TransportError};
use super::protocol::{self, CloseRequest, LoadRequest, QueryRequest};
use super::traits::{
    Command, ConnectionString, DatabaseType, HandleState, QueryResult, ResultSet,
    SharedDispatcher, Value,
};

/// SQL text plus its positional bind values.
///
/// Building a statement from bare SQL is the "no bind values" case; it sends
/// exactly the same request as an explicitly empty list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub values: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: Vec::new(),
        }
    }

    /// Append the next positional value
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn with_values<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

impl<S: Into<String>, V: Into<Value>> From<(S, Vec<V>)> for Statement {
    fn from((sql, values): (S, Vec<V>)) -> Self {
        Self::new(sql).with_values(values)
    }
}

/// Handle to one logical remote connection.
///
/// Cloning is cheap and clones share the dispatcher. Nothing in a handle
/// changes after construction: `close` does not invalidate it, and what a
/// later call against a closed connection does is up to the remote side.
#[derive(Clone)]
pub struct ConnectionHandle {
    path: ConnectionString,
    state: HandleState,
    dispatcher: SharedDispatcher,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("dispatcher", &"<Dispatcher>")
            .finish()
    }
}

impl ConnectionHandle {
    /// Open (or confirm) the connection on the remote side and return an
    /// established handle.
    ///
    /// The handle keeps the path the remote side echoes back, which may be a
    /// normalized form of `connection`.
    ///
    /// # Errors
    ///
    /// - `Error::Connection` if the remote side could not open the database
    /// - `Error::Transport` if the dispatch channel failed
    pub async fn load(connection: ConnectionString, dispatcher: SharedDispatcher) -> Result<Self> {
        let request = LoadRequest {
            db: connection.as_str().to_string(),
        };
        let reply = send(&dispatcher, Command::Load, connection.as_str(), &request).await?;

        let path = match protocol::decode_load_reply(reply)? {
            Some(canonical) if canonical != connection.as_str() => {
                debug!(input = %connection, canonical = %canonical, "remote side normalized path");
                ConnectionString::new(canonical).map_err(|e| {
                    TransportError::Protocol(format!(
                        "`load` echoed an unusable path: {}",
                        e
                    ))
                })?
            }
            _ => connection,
        };

        Ok(Self {
            path,
            state: HandleState::Established,
            dispatcher,
        })
    }

    /// Build a handle without a round trip.
    ///
    /// The remote side opens the connection when the first command arrives.
    pub fn get(connection: ConnectionString, dispatcher: SharedDispatcher) -> Self {
        Self {
            path: connection,
            state: HandleState::Bound,
            dispatcher,
        }
    }

    /// The connection string every command is sent with
    pub fn path(&self) -> &ConnectionString {
        &self.path
    }

    /// How this handle was constructed
    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn database_type(&self) -> Option<DatabaseType> {
        self.path.database_type()
    }

    pub fn dispatcher(&self) -> &SharedDispatcher {
        &self.dispatcher
    }

    /// Run a mutating statement.
    ///
    /// Placeholder syntax is the caller's business (`$1` for SQLite and
    /// PostgreSQL, `?` for MySQL); the SQL is sent untouched.
    ///
    /// # Errors
    ///
    /// - `Error::Query` if the remote side rejected the statement
    /// - `Error::Transport` if the channel failed or the reply was not a
    ///   `[rowsAffected, lastInsertId]` pair
    pub async fn execute(&self, statement: impl Into<Statement>) -> Result<QueryResult> {
        let request = self.query_request(statement.into());
        let reply = send(&self.dispatcher, Command::Execute, self.path.as_str(), &request).await?;
        Ok(protocol::decode_execute_reply(reply)?)
    }

    /// Run a read statement and return its rows as decoded.
    ///
    /// Column shape is not checked here; see `select_as` for typed rows.
    pub async fn select(&self, statement: impl Into<Statement>) -> Result<ResultSet> {
        let request = self.query_request(statement.into());
        let reply = send(&self.dispatcher, Command::Select, self.path.as_str(), &request).await?;
        Ok(protocol::decode_select_reply(reply)?)
    }

    /// Run a read statement and decode each row into `T`.
    ///
    /// # Errors
    ///
    /// In addition to the `select` errors, `Error::Decode` if a row does not
    /// fit `T`.
    pub async fn select_as<T: DeserializeOwned>(
        &self,
        statement: impl Into<Statement>,
    ) -> Result<Vec<T>> {
        let request = self.query_request(statement.into());
        let reply = send(&self.dispatcher, Command::Select, self.path.as_str(), &request).await?;
        protocol::decode_rows(reply)?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(Error::Decode))
            .collect()
    }

    /// Close this connection's pool on the remote side.
    ///
    /// Returns whatever the remote side reports; closing an unknown or
    /// already-closed connection is its call, not ours.
    pub async fn close(&self) -> Result<bool> {
        let request = CloseRequest {
            db: Some(self.path.as_str().to_string()),
        };
        let reply = send(&self.dispatcher, Command::Close, self.path.as_str(), &request).await?;
        Ok(protocol::decode_close_reply(reply)?)
    }

    /// Ask the remote side to close every pool it manages.
    pub async fn close_all(dispatcher: &SharedDispatcher) -> Result<bool> {
        let reply = send(dispatcher, Command::Close, "*", &CloseRequest::default()).await?;
        Ok(protocol::decode_close_reply(reply)?)
    }

    fn query_request(&self, statement: Statement) -> QueryRequest {
        QueryRequest {
            db: self.path.as_str().to_string(),
            query: statement.sql,
            values: statement.values,
        }
    }
}

async fn send<T: serde::Serialize>(
    dispatcher: &SharedDispatcher,
    command: Command,
    db: &str,
    request: &T,
) -> Result<JsonValue> {
    let payload = protocol::encode(request)?;
    debug!(%command, db, "dispatching");

    dispatcher.send(command, payload).await.map_err(|e| {
        let err = Error::from_dispatch(command, e);
        warn!(%command, db, error = %err, "command failed");
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::error::DispatchError;
    use crate::services::database::traits::Dispatcher;
    use async_lock::Mutex;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Arc;

    type Reply = std::result::Result<JsonValue, DispatchError>;

    /// Records every request and answers from a script.
    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<(Command, JsonValue)>>,
        replies: Mutex<VecDeque<Reply>>,
    }

    impl RecordingDispatcher {
        fn with_replies(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            })
        }

        async fn sent(&self) -> Vec<(Command, JsonValue)> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl Dispatcher for RecordingDispatcher {
        async fn send(&self, command: Command, payload: JsonValue) -> Reply {
            self.sent.lock().await.push((command, payload));
            self.replies
                .lock()
                .await
                .pop_front()
                .unwrap_or(Err(TransportError::ChannelClosed.into()))
        }
    }

    fn conn(s: &str) -> ConnectionString {
        ConnectionString::new(s).unwrap()
    }

    #[test]
    fn test_get_is_lazy() {
        let dispatcher = RecordingDispatcher::with_replies(vec![]);
        let handle = ConnectionHandle::get(conn("sqlite:test.db"), dispatcher.clone());

        assert_eq!(handle.path().as_str(), "sqlite:test.db");
        assert_eq!(handle.state(), HandleState::Bound);
        assert_eq!(handle.database_type(), Some(DatabaseType::SQLite));
        assert!(smol::block_on(dispatcher.sent()).is_empty());
    }

    #[test]
    fn test_load_uses_remote_path() {
        smol::block_on(async {
            let dispatcher =
                RecordingDispatcher::with_replies(vec![Ok(json!("sqlite:data/test.db"))]);
            let handle = ConnectionHandle::load(conn("SQLITE:data/test.db"), dispatcher.clone())
                .await
                .unwrap();

            assert_eq!(handle.state(), HandleState::Established);
            assert_eq!(handle.path().as_str(), "sqlite:data/test.db");
            assert_eq!(
                dispatcher.sent().await,
                vec![(Command::Load, json!({ "db": "SQLITE:data/test.db" }))]
            );
        });
    }

    #[test]
    fn test_load_with_unit_reply_keeps_input() {
        smol::block_on(async {
            let dispatcher = RecordingDispatcher::with_replies(vec![Ok(JsonValue::Null)]);
            let handle = ConnectionHandle::load(conn("mysql://localhost/app"), dispatcher)
                .await
                .unwrap();
            assert_eq!(handle.path().as_str(), "mysql://localhost/app");
        });
    }

    #[test]
    fn test_load_failure_is_connection_error() {
        smol::block_on(async {
            let dispatcher = RecordingDispatcher::with_replies(vec![Err(DispatchError::rejected(
                "unable to open database file",
            ))]);
            let err = ConnectionHandle::load(conn("sqlite:/nope/x.db"), dispatcher)
                .await
                .unwrap_err();

            assert!(err.is_connection());
            assert_eq!(err.remote_message(), Some("unable to open database file"));
        });
    }

    #[test]
    fn test_execute_maps_positional_reply() {
        smol::block_on(async {
            let dispatcher = RecordingDispatcher::with_replies(vec![Ok(json!([1, 7]))]);
            let handle = ConnectionHandle::get(conn("sqlite:test.db"), dispatcher.clone());

            let result = handle
                .execute(Statement::new("INSERT INTO t(v) VALUES ($1)").bind("x"))
                .await
                .unwrap();

            assert_eq!(result, QueryResult::new(1, 7));
            assert_eq!(
                dispatcher.sent().await,
                vec![(
                    Command::Execute,
                    json!({ "db": "sqlite:test.db", "query": "INSERT INTO t(v) VALUES ($1)", "values": ["x"] })
                )]
            );
        });
    }

    #[test]
    fn test_omitted_values_equal_empty_values() {
        smol::block_on(async {
            let dispatcher = RecordingDispatcher::with_replies(vec![
                Ok(json!([0, 0])),
                Ok(json!([0, 0])),
                Ok(json!([])),
                Ok(json!([])),
            ]);
            let handle = ConnectionHandle::get(conn("sqlite:test.db"), dispatcher.clone());

            handle.execute("DELETE FROM t").await.unwrap();
            handle.execute(("DELETE FROM t", Vec::<Value>::new())).await.unwrap();
            handle.select("SELECT * FROM t").await.unwrap();
            handle.select(("SELECT * FROM t", Vec::<Value>::new())).await.unwrap();

            let sent = dispatcher.sent().await;
            assert_eq!(sent[0], sent[1]);
            assert_eq!(sent[2], sent[3]);
            assert_eq!(sent[0].1["values"], json!([]));
            assert_eq!(sent[2].1["values"], json!([]));
        });
    }

    #[test]
    fn test_execute_failure_keeps_remote_message() {
        smol::block_on(async {
            let message = "near \"not\": syntax error";
            let dispatcher =
                RecordingDispatcher::with_replies(vec![Err(DispatchError::rejected(message))]);
            let handle = ConnectionHandle::get(conn("sqlite:test.db"), dispatcher);

            let err = handle.execute("not valid sql").await.unwrap_err();
            assert!(err.is_query());
            assert_eq!(err.remote_message(), Some(message));
        });
    }

    #[test]
    fn test_execute_rejects_named_reply() {
        smol::block_on(async {
            let dispatcher = RecordingDispatcher::with_replies(vec![Ok(
                json!({ "rowsAffected": 1, "lastInsertId": 1 }),
            )]);
            let handle = ConnectionHandle::get(conn("sqlite:test.db"), dispatcher);

            let err = handle.execute("DELETE FROM t").await.unwrap_err();
            assert!(matches!(err, Error::Transport(TransportError::Protocol(_))));
        });
    }

    #[test]
    fn test_transport_failure_is_distinct() {
        smol::block_on(async {
            let dispatcher = RecordingDispatcher::with_replies(vec![]);
            let handle = ConnectionHandle::get(conn("sqlite:test.db"), dispatcher);

            let err = handle.select("SELECT 1").await.unwrap_err();
            assert!(err.is_transport());
            assert!(!err.is_query());
        });
    }

    #[test]
    fn test_select_returns_rows_untouched() {
        smol::block_on(async {
            let dispatcher = RecordingDispatcher::with_replies(vec![Ok(json!([
                { "id": 1, "v": "x" },
                { "id": 2, "v": null, "extra": true }
            ]))]);
            let handle = ConnectionHandle::get(conn("postgres://localhost/app"), dispatcher);

            let rows = handle.select("SELECT * FROM t").await.unwrap();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].get("v"), Some(&Value::Text("x".into())));
            assert_eq!(rows[1].get("v"), Some(&Value::Null));
            assert_eq!(rows[1].get("extra"), Some(&Value::Bool(true)));
        });
    }

    #[test]
    fn test_select_as_decodes_declared_shape() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Todo {
            id: i64,
            title: String,
        }

        smol::block_on(async {
            let dispatcher = RecordingDispatcher::with_replies(vec![
                Ok(json!([{ "id": 1, "title": "write tests" }])),
                Ok(json!([{ "id": "one" }])),
            ]);
            let handle = ConnectionHandle::get(conn("sqlite:todos.db"), dispatcher);

            let todos: Vec<Todo> = handle.select_as("SELECT * FROM todos").await.unwrap();
            assert_eq!(
                todos,
                vec![Todo {
                    id: 1,
                    title: "write tests".into()
                }]
            );

            let err = handle.select_as::<Todo>("SELECT * FROM todos").await.unwrap_err();
            assert!(matches!(err, Error::Decode(_)));
        });
    }

    #[test]
    fn test_close_payloads_differ() {
        smol::block_on(async {
            let dispatcher =
                RecordingDispatcher::with_replies(vec![Ok(json!(true)), Ok(json!(false))]);
            let shared: SharedDispatcher = dispatcher.clone();
            let handle = ConnectionHandle::get(conn("sqlite:test.db"), shared.clone());

            assert!(handle.close().await.unwrap());
            assert!(!ConnectionHandle::close_all(&shared).await.unwrap());

            let sent = dispatcher.sent().await;
            assert_eq!(sent[0], (Command::Close, json!({ "db": "sqlite:test.db" })));
            assert_eq!(sent[1], (Command::Close, json!({})));
            assert!(sent[1].1.get("db").is_none());
        });
    }

    #[test]
    fn test_close_rejection_is_connection_error() {
        smol::block_on(async {
            let dispatcher =
                RecordingDispatcher::with_replies(vec![Err(DispatchError::rejected("not loaded"))]);
            let handle = ConnectionHandle::get(conn("sqlite:test.db"), dispatcher);

            let err = handle.close().await.unwrap_err();
            assert!(matches!(
                err,
                Error::Connection {
                    command: Command::Close,
                    ..
                }
            ));
        });
    }

    #[test]
    fn test_handle_usable_after_close() {
        smol::block_on(async {
            let dispatcher =
                RecordingDispatcher::with_replies(vec![Ok(json!(true)), Ok(json!([0, 0]))]);
            let handle = ConnectionHandle::get(conn("sqlite:test.db"), dispatcher.clone());

            handle.close().await.unwrap();
            handle.execute("DELETE FROM t").await.unwrap();
            assert_eq!(dispatcher.sent().await.len(), 2);
        });
    }
}
