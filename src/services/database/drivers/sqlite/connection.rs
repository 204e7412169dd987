//! SQLite connection implementation.
//!
//! This module implements the `DriverConnection` trait for SQLite
//! using SQLx's SqlitePool.

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::types::SqliteValueConverter;
use crate::services::database::drivers::DriverConnection;
use crate::services::database::traits::{DatabaseType, QueryResult, Row, Value};

/// Address that selects a private in-memory database instead of a file.
pub const IN_MEMORY: &str = ":memory:";

/// SQLite database connection.
///
/// Wraps a SQLx SqlitePool. SQLite supports both file-based and in-memory
/// databases.
#[derive(Clone)]
pub struct SqliteConnection {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("pool", &"<SqlitePool>")
            .finish()
    }
}

impl SqliteConnection {
    /// Build options for a database file, created if missing.
    pub fn file_options(path: &Path) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
    }

    /// Build options for an in-memory database.
    ///
    /// Shared cache lets every pooled connection see the same database.
    pub fn memory_options() -> Result<SqliteConnectOptions, sqlx::Error> {
        Ok(SqliteConnectOptions::from_str(IN_MEMORY)?
            .foreign_keys(true)
            .shared_cache(true))
    }

    pub async fn connect(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DriverConnection for SqliteConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    async fn execute(&self, sql: &str, values: Vec<Value>) -> Result<QueryResult, sqlx::Error> {
        let mut query = sqlx::query(sql);
        for value in values {
            query = SqliteValueConverter::bind(query, value);
        }

        let result = query.execute(&self.pool).await?;
        Ok(QueryResult::new(
            result.rows_affected(),
            result.last_insert_rowid().max(0) as u64,
        ))
    }

    async fn select(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Row>, sqlx::Error> {
        let mut query = sqlx::query(sql);
        for value in values {
            query = SqliteValueConverter::bind(query, value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(SqliteValueConverter::convert_row).collect())
    }

    async fn migrate(&self, migrator: &Migrator) -> Result<(), MigrateError> {
        migrator.run(&self.pool).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> SqliteConnection {
        smol::block_on(async {
            SqliteConnection::connect(SqliteConnection::memory_options().unwrap(), 1)
                .await
                .unwrap()
        })
    }

    #[test]
    fn test_execute_reports_rowid() {
        let conn = memory();
        smol::block_on(async {
            conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", vec![])
                .await
                .unwrap();

            let result = conn
                .execute("INSERT INTO t (v) VALUES ($1)", vec![Value::from("a")])
                .await
                .unwrap();
            assert_eq!(result, QueryResult::new(1, 1));

            let result = conn
                .execute("INSERT INTO t (v) VALUES ($1), ($2)", vec!["b".into(), "c".into()])
                .await
                .unwrap();
            assert_eq!(result.rows_affected, 2);
            assert_eq!(result.last_insert_id, 3);
        });
    }

    #[test]
    fn test_select_decodes_storage_classes() {
        let conn = memory();
        smol::block_on(async {
            conn.execute(
                "CREATE TABLE t (i INTEGER, r REAL, s TEXT, b BLOB, f BOOLEAN, n TEXT)",
                vec![],
            )
            .await
            .unwrap();
            conn.execute(
                "INSERT INTO t VALUES ($1, $2, $3, x'00ff', $4, $5)",
                vec![Value::Integer(7), Value::Real(1.5), "x".into(), true.into(), Value::Null],
            )
            .await
            .unwrap();

            let rows = conn.select("SELECT * FROM t", vec![]).await.unwrap();
            assert_eq!(rows.len(), 1);
            let row = &rows[0];
            assert_eq!(row.get("i"), Some(&Value::Integer(7)));
            assert_eq!(row.get("r"), Some(&Value::Real(1.5)));
            assert_eq!(row.get("s"), Some(&Value::Text("x".into())));
            assert_eq!(row.get("b"), Some(&Value::Text("00ff".into())));
            assert_eq!(row.get("f"), Some(&Value::Bool(true)));
            assert_eq!(row.get("n"), Some(&Value::Null));
        });
    }

    #[test]
    fn test_boolean_column_keeps_non_boolean_values() {
        let conn = memory();
        smol::block_on(async {
            conn.execute("CREATE TABLE flags (f BOOLEAN)", vec![])
                .await
                .unwrap();
            conn.execute(
                "INSERT INTO flags VALUES ('yes'), (0.5), ('TRUE'), (0), (NULL)",
                vec![],
            )
            .await
            .unwrap();

            let rows = conn
                .select("SELECT f FROM flags ORDER BY rowid", vec![])
                .await
                .unwrap();
            let values: Vec<_> = rows.iter().map(|row| row.get("f").cloned()).collect();
            assert_eq!(
                values,
                vec![
                    Some(Value::Text("yes".into())),
                    Some(Value::Real(0.5)),
                    Some(Value::Bool(true)),
                    Some(Value::Bool(false)),
                    Some(Value::Null),
                ]
            );
        });
    }

    #[test]
    fn test_select_expression_columns() {
        let conn = memory();
        smol::block_on(async {
            let rows = conn
                .select("SELECT 1 + 1 AS two, 'a' || 'b' AS ab", vec![])
                .await
                .unwrap();
            assert_eq!(rows[0].get("two"), Some(&Value::Integer(2)));
            assert_eq!(rows[0].get("ab"), Some(&Value::Text("ab".into())));
        });
    }

    #[test]
    fn test_invalid_sql_is_error() {
        let conn = memory();
        smol::block_on(async {
            let err = conn.select("SELEC nope", vec![]).await.unwrap_err();
            assert!(err.to_string().contains("syntax error"));
        });
    }
}
