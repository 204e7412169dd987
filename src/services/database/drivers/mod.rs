//! Database driver implementations behind the local backend.
//!
//! This module contains SQLx-backed drivers for each supported dialect:
//!
//! - **PostgreSQL**: `postgres:`/`postgresql:` URLs
//! - **MySQL**: `mysql:`/`mariadb:` URLs
//! - **SQLite**: `sqlite:` file paths or `:memory:`
//!
//! Each driver implements `DriverConnection`; `ConnectionFactory` picks one
//! from the connection string's scheme.

use async_trait::async_trait;
use sqlx::migrate::{MigrateError, Migrator};
use std::sync::Arc;

use super::traits::{DatabaseType, QueryResult, Row, Value};

mod factory;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use factory::ConnectionFactory;

/// An open connection pool for one database.
///
/// SQL text and bind values go to the driver untouched; placeholder syntax is
/// whatever the dialect expects.
#[async_trait]
pub trait DriverConnection: Send + Sync + std::fmt::Debug {
    fn database_type(&self) -> DatabaseType;

    /// Run a statement and report `(rows_affected, last_insert_id)`.
    async fn execute(&self, sql: &str, values: Vec<Value>) -> Result<QueryResult, sqlx::Error>;

    /// Run a query and return every row in driver order.
    async fn select(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Row>, sqlx::Error>;

    /// Apply pending migrations.
    async fn migrate(&self, migrator: &Migrator) -> Result<(), MigrateError>;

    /// Close the pool, waiting for checked-out connections to return.
    async fn close(&self);
}

/// Shared connection type, cloned out of the backend registry per request.
pub type SharedConnection = Arc<dyn DriverConnection>;
