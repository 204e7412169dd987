//! In-process remote side backed by SQLx pools.
//!
//! `LocalBackend` answers the four commands of the wire protocol. Pools are
//! kept in a registry keyed by canonical connection string (scheme
//! lowercased) and opened lazily on first use. Pending migrations for a
//! connection run when its pool is first opened.
//!
//! # Example
//!
//! ```ignore
//! let backend = Arc::new(LocalBackend::new(config).add_migrations("sqlite:app.db", migrations));
//! backend.initialize().await?;
//!
//! let (dispatcher, receiver) = ChannelDispatcher::unbounded();
//! smol::spawn(serve(receiver, backend.clone())).detach();
//! ```

use async_lock::Mutex;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::migrate::{MigrateError, Migrator};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::drivers::{ConnectionFactory, SharedConnection};
use super::error::{DispatchError, TransportError};
use super::migrations::{Migration, MigrationList};
use super::protocol::{self, CloseRequest, ExecuteReply, LoadRequest, QueryRequest};
use super::traits::{Command, ConnectionString, Dispatcher, QueryResult, Row, Value};
use crate::config::BackendConfig;

/// Failures inside the local backend.
///
/// Everything except `Request` reaches the caller as a rejection carrying
/// this error's message.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] MigrateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported database scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("no base directory available for SQLite files")]
    NoBaseDir,

    #[error("{0}")]
    InvalidConnectionString(String),

    /// The payload did not match the command's request shape.
    #[error(transparent)]
    Request(#[from] TransportError),
}

impl From<BackendError> for DispatchError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Request(e) => DispatchError::Transport(e),
            other => DispatchError::rejected(other.to_string()),
        }
    }
}

/// SQLx-backed implementation of the remote side.
pub struct LocalBackend {
    config: BackendConfig,
    instances: Mutex<HashMap<String, SharedConnection>>,
    /// One gate per connection string, held while its pool is being opened
    opening: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    migrations: Mutex<HashMap<String, MigrationList>>,
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("config", &self.config)
            .finish()
    }
}

impl LocalBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            instances: Mutex::new(HashMap::new()),
            opening: Mutex::new(HashMap::new()),
            migrations: Mutex::new(HashMap::new()),
        }
    }

    /// Register migrations for `db`, applied when its pool is first opened.
    ///
    /// Registering twice for the same connection string replaces the list.
    pub fn add_migrations(mut self, db: &str, migrations: Vec<Migration>) -> Self {
        let key = Self::canonical(db)
            .map(|(key, _)| key)
            .unwrap_or_else(|_| db.to_string());
        self.migrations
            .get_mut()
            .insert(key, MigrationList::from(migrations));
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Open every connection listed in `preload`.
    pub async fn initialize(&self) -> Result<(), BackendError> {
        for db in &self.config.preload {
            self.load(db).await?;
        }
        Ok(())
    }

    /// Open (or reuse) the pool for `db` and return its canonical string.
    pub async fn load(&self, db: &str) -> Result<String, BackendError> {
        let (key, target) = Self::canonical(db)?;
        self.connection(key.clone(), &target).await?;
        Ok(key)
    }

    pub async fn execute(
        &self,
        db: &str,
        query: &str,
        values: Vec<Value>,
    ) -> Result<QueryResult, BackendError> {
        let (key, target) = Self::canonical(db)?;
        let connection = self.connection(key, &target).await?;
        Ok(connection.execute(query, values).await?)
    }

    pub async fn select(
        &self,
        db: &str,
        query: &str,
        values: Vec<Value>,
    ) -> Result<Vec<Row>, BackendError> {
        let (key, target) = Self::canonical(db)?;
        let connection = self.connection(key, &target).await?;
        Ok(connection.select(query, values).await?)
    }

    /// Close one pool, or every pool when `db` is `None`.
    ///
    /// Closing a named pool that is not open reports `false`; closing all
    /// always reports `true`.
    pub async fn close(&self, db: Option<&str>) -> Result<bool, BackendError> {
        match db {
            Some(db) => {
                let (key, _) = Self::canonical(db)?;
                let removed = self.instances.lock().await.remove(&key);
                match removed {
                    Some(connection) => {
                        connection.close().await;
                        info!(db = %key, "closed pool");
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            None => {
                let drained: Vec<_> = self.instances.lock().await.drain().collect();
                for (key, connection) in drained {
                    connection.close().await;
                    info!(db = %key, "closed pool");
                }
                Ok(true)
            }
        }
    }

    /// Whether a pool for `db` is currently open.
    pub async fn is_open(&self, db: &str) -> bool {
        match Self::canonical(db) {
            Ok((key, _)) => self.instances.lock().await.contains_key(&key),
            Err(_) => false,
        }
    }

    fn canonical(db: &str) -> Result<(String, ConnectionString), BackendError> {
        let target = ConnectionString::new(db)
            .map_err(|e| BackendError::InvalidConnectionString(e.to_string()))?;
        let key = format!("{}:{}", target.scheme().to_lowercase(), target.address());
        Ok((key, target))
    }

    /// Fetch the pool for `key`, opening it on first use.
    ///
    /// Opening holds that key's gate, never the registry lock.
    async fn connection(
        &self,
        key: String,
        target: &ConnectionString,
    ) -> Result<SharedConnection, BackendError> {
        if let Some(connection) = self.instances.lock().await.get(&key).cloned() {
            return Ok(connection);
        }

        let gate = self.open_gate(&key).await;
        let _opening = gate.lock().await;

        // Another request may have finished opening while we waited.
        if let Some(connection) = self.instances.lock().await.get(&key).cloned() {
            return Ok(connection);
        }

        let connection = ConnectionFactory::open(target, &self.config).await?;
        info!(db = %key, "opened pool");

        if let Err(e) = self.run_migrations(&key, &connection).await {
            connection.close().await;
            return Err(e);
        }

        self.instances.lock().await.insert(key, connection.clone());
        Ok(connection)
    }

    async fn open_gate(&self, key: &str) -> Arc<Mutex<()>> {
        self.opening
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Apply the migrations registered for `key`.
    ///
    /// The list stays registered until a run succeeds.
    async fn run_migrations(
        &self,
        key: &str,
        connection: &SharedConnection,
    ) -> Result<(), BackendError> {
        let registered = self.migrations.lock().await.get(key).cloned();
        let Some(migrations) = registered else {
            return Ok(());
        };

        let versions = migrations.up_versions();
        let migrator = Migrator::new(migrations).await?;
        connection.migrate(&migrator).await?;
        info!(db = %key, ?versions, "migrations up to date");

        self.migrations.lock().await.remove(key);
        Ok(())
    }

    async fn handle(&self, command: Command, payload: JsonValue) -> Result<JsonValue, BackendError> {
        let reply = match command {
            Command::Load => {
                let request: LoadRequest = protocol::decode_request(payload)?;
                JsonValue::String(self.load(&request.db).await?)
            }
            Command::Execute => {
                let request: QueryRequest = protocol::decode_request(payload)?;
                let result = self
                    .execute(&request.db, &request.query, request.values)
                    .await?;
                protocol::encode(&ExecuteReply::from(result))?
            }
            Command::Select => {
                let request: QueryRequest = protocol::decode_request(payload)?;
                let rows = self
                    .select(&request.db, &request.query, request.values)
                    .await?;
                debug!(db = %request.db, rows = rows.len(), "select finished");
                protocol::encode(&rows)?
            }
            Command::Close => {
                let request: CloseRequest = protocol::decode_request(payload)?;
                JsonValue::Bool(self.close(request.db.as_deref()).await?)
            }
        };
        Ok(reply)
    }
}

#[async_trait]
impl Dispatcher for LocalBackend {
    async fn send(&self, command: Command, payload: JsonValue) -> Result<JsonValue, DispatchError> {
        self.handle(command, payload).await.map_err(|e| {
            warn!(%command, error = %e, "rejecting command");
            DispatchError::from(e)
        })
    }
}
