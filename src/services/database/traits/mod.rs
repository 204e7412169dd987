//! Connection identity, value types and the dispatch seam.
//!
//! This module defines:
//!
//! - **Types** (`types`): Dialect enum, connection string, handle state
//! - **Row/Value** (`row`): Scalar values and result rows as they travel on the wire
//! - **Connection** (`connection`): The `Dispatcher` trait, commands and `QueryResult`

pub mod connection;
pub mod row;
pub mod types;

// Re-export commonly used types
pub use connection::{Command, Dispatcher, QueryResult, SharedDispatcher};

pub use row::{ResultSet, Row, Value};

pub use types::{ConnectionString, DatabaseType, HandleState};
