//! MySQL connection implementation.
//!
//! This module implements the `DriverConnection` trait for MySQL
//! using SQLx's MySqlPool.

use async_trait::async_trait;
use sqlx::MySqlPool;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use std::str::FromStr;
use std::time::Duration;

use super::types::MySqlValueConverter;
use crate::services::database::drivers::DriverConnection;
use crate::services::database::traits::{DatabaseType, QueryResult, Row, Value};

/// MySQL database connection.
///
/// This struct wraps a SQLx MySqlPool and implements the `DriverConnection` trait.
#[derive(Clone)]
pub struct MySqlConnection {
    pool: MySqlPool,
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("pool", &"<MySqlPool>")
            .finish()
    }
}

impl MySqlConnection {
    /// Parse a `mysql://` URL into connect options.
    pub fn build_connect_options(url: &str) -> Result<MySqlConnectOptions, sqlx::Error> {
        MySqlConnectOptions::from_str(url)
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = Self::build_connect_options(url)?;

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DriverConnection for MySqlConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    async fn execute(&self, sql: &str, values: Vec<Value>) -> Result<QueryResult, sqlx::Error> {
        let mut query = sqlx::query(sql);
        for value in values {
            query = MySqlValueConverter::bind(query, value);
        }

        let result = query.execute(&self.pool).await?;
        Ok(QueryResult::new(result.rows_affected(), result.last_insert_id()))
    }

    async fn select(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Row>, sqlx::Error> {
        let mut query = sqlx::query(sql);
        for value in values {
            query = MySqlValueConverter::bind(query, value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(MySqlValueConverter::convert_row).collect())
    }

    async fn migrate(&self, migrator: &Migrator) -> Result<(), MigrateError> {
        migrator.run(&self.pool).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
