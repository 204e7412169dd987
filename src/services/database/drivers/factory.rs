//! Connection factory for opening database pools.
//!
//! The factory picks a driver from the connection string's database type and
//! applies the backend configuration (base directory, pool size).

use sqlx::migrate::MigrateDatabase;
use sqlx::{MySql, Postgres};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::SharedConnection;
use super::mysql::MySqlConnection;
use super::postgres::PostgresConnection;
use super::sqlite::{IN_MEMORY, SqliteConnection};
use crate::config::BackendConfig;
use crate::services::database::backend::BackendError;
use crate::services::database::traits::{ConnectionString, DatabaseType};

/// Factory for opening driver connections.
///
/// # Example
///
/// ```ignore
/// use sqlgate::services::database::drivers::ConnectionFactory;
///
/// let target = "sqlite:app.db".parse()?;
/// let connection = ConnectionFactory::open(&target, &config).await?;
/// ```
pub struct ConnectionFactory;

impl ConnectionFactory {
    /// Open a pool for `target`.
    ///
    /// SQLite files are created (with their parent directories) if missing.
    /// PostgreSQL and MySQL databases are created if the server reports they
    /// do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The scheme has no driver
    /// - No base directory can be resolved for a SQLite file
    /// - The database cannot be created or connected to
    pub async fn open(
        target: &ConnectionString,
        config: &BackendConfig,
    ) -> Result<SharedConnection, BackendError> {
        let database_type = target
            .database_type()
            .ok_or_else(|| BackendError::UnsupportedScheme(target.scheme().to_string()))?;

        match database_type {
            DatabaseType::SQLite => {
                let options = if Self::sqlite_address(target.address()) == IN_MEMORY {
                    SqliteConnection::memory_options()?
                } else {
                    let base_dir = config.resolved_base_dir().ok_or(BackendError::NoBaseDir)?;
                    let path = Self::sqlite_path(target.address(), &base_dir);
                    if let Some(parent) = path.parent() {
                        async_fs::create_dir_all(parent).await?;
                    }
                    debug!(path = %path.display(), "resolved sqlite file");
                    SqliteConnection::file_options(&path)
                };

                let connection = SqliteConnection::connect(options, config.max_connections).await?;
                Ok(Arc::new(connection))
            }
            DatabaseType::PostgreSQL => {
                Self::ensure_database::<Postgres>(target.as_str()).await?;
                let connection =
                    PostgresConnection::connect(target.as_str(), config.max_connections).await?;
                Ok(Arc::new(connection))
            }
            DatabaseType::MySQL => {
                Self::ensure_database::<MySql>(target.as_str()).await?;
                let connection =
                    MySqlConnection::connect(target.as_str(), config.max_connections).await?;
                Ok(Arc::new(connection))
            }
        }
    }

    /// Resolve a SQLite address against the base directory.
    ///
    /// `sqlite:app.db`, `sqlite://app.db` and `sqlite:///abs/app.db` all work;
    /// absolute paths are used as given.
    pub fn sqlite_path(address: &str, base_dir: &Path) -> PathBuf {
        base_dir.join(Self::sqlite_address(address))
    }

    fn sqlite_address(address: &str) -> &str {
        address.strip_prefix("//").unwrap_or(address)
    }

    async fn ensure_database<DB: MigrateDatabase>(url: &str) -> Result<(), sqlx::Error> {
        if !DB::database_exists(url).await.unwrap_or(false) {
            debug!("creating missing database");
            DB::create_database(url).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_path_resolution() {
        let base = Path::new("/data/sqlgate");

        assert_eq!(
            ConnectionFactory::sqlite_path("app.db", base),
            PathBuf::from("/data/sqlgate/app.db")
        );
        assert_eq!(
            ConnectionFactory::sqlite_path("//nested/app.db", base),
            PathBuf::from("/data/sqlgate/nested/app.db")
        );
        assert_eq!(
            ConnectionFactory::sqlite_path("///tmp/app.db", base),
            PathBuf::from("/tmp/app.db")
        );
    }

    #[test]
    fn test_unknown_scheme_is_unsupported() {
        let target = ConnectionString::new("oracle://scott@db/orcl").unwrap();
        let result = smol::block_on(ConnectionFactory::open(&target, &BackendConfig::default()));

        assert!(matches!(result, Err(BackendError::UnsupportedScheme(ref s)) if s == "oracle"));
    }

    #[test]
    fn test_creates_sqlite_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = BackendConfig {
            base_dir: Some(dir.path().to_path_buf()),
            ..BackendConfig::default()
        };
        let target = ConnectionString::new("sqlite:nested/deeper/app.db").unwrap();

        smol::block_on(async {
            let connection = ConnectionFactory::open(&target, &config).await.unwrap();
            assert_eq!(connection.database_type(), DatabaseType::SQLite);
            connection.close().await;
        });
        assert!(dir.path().join("nested/deeper/app.db").exists());
    }

    #[test]
    fn test_memory_address() {
        let target = ConnectionString::new("sqlite::memory:").unwrap();
        smol::block_on(async {
            let connection = ConnectionFactory::open(&target, &BackendConfig::default())
                .await
                .unwrap();
            let rows = connection.select("SELECT 42 AS answer", vec![]).await.unwrap();
            assert_eq!(rows[0].get("answer").and_then(|v| v.as_i64()), Some(42));
        });
    }
}
