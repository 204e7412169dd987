//! Client handle for remote, pooled SQL connections.
//!
//! A [`ConnectionHandle`] names a database by connection string and sends
//! `load`/`execute`/`select`/`close` through an injected [`Dispatcher`].
//! [`LocalBackend`] is an in-process remote side built on SQLx, reachable
//! through a [`ChannelDispatcher`].

pub mod config;
pub mod logging;
pub mod services;

pub use config::BackendConfig;
pub use services::database::{
    BackendError, ChannelDispatcher, Command, ConnectionHandle, ConnectionString, DatabaseType,
    DispatchError, Dispatcher, Error, HandleState, LocalBackend, Migration, MigrationKind,
    QueryResult, Result, ResultSet, Row, SharedDispatcher, Statement, TransportError, Value,
    serve,
};
