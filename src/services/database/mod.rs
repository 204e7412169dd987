//! Client handle, dispatch seam and the SQLx-backed local backend.

mod backend;
mod channel;
mod error;
mod handle;
mod migrations;

pub mod drivers;
pub mod protocol;
pub mod traits;

pub use backend::{BackendError, LocalBackend};
pub use channel::{ChannelDispatcher, Envelope, serve};
pub use error::{DispatchError, Error, Result, TransportError};
pub use handle::{ConnectionHandle, Statement};
pub use migrations::{Migration, MigrationKind, MigrationList};
pub use traits::{
    Command, ConnectionString, DatabaseType, Dispatcher, HandleState, QueryResult, ResultSet,
    Row, SharedDispatcher, Value,
};
