//! Schema migrations registered per connection string.
//!
//! Migrations are handed to SQLx's `Migrator` the first time the local
//! backend opens the matching connection. Only `Up` migrations are applied;
//! `Down` entries are carried so a list can describe both directions.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sqlx::error::BoxDynError;
use sqlx::migrate::{Migration as SqlxMigration, MigrationSource, MigrationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationKind {
    Up,
    Down,
}

impl From<MigrationKind> for MigrationType {
    fn from(kind: MigrationKind) -> Self {
        match kind {
            MigrationKind::Up => Self::ReversibleUp,
            MigrationKind::Down => Self::ReversibleDown,
        }
    }
}

/// One versioned migration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub sql: String,
    pub kind: MigrationKind,
}

impl Migration {
    pub fn up(version: i64, description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            sql: sql.into(),
            kind: MigrationKind::Up,
        }
    }

    pub fn down(version: i64, description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            sql: sql.into(),
            kind: MigrationKind::Down,
        }
    }
}

/// The migrations registered for one connection string.
#[derive(Debug, Clone, Default)]
pub struct MigrationList(pub Vec<Migration>);

impl MigrationList {
    /// Versions of the `Up` migrations, the ones a run may apply.
    pub fn up_versions(&self) -> Vec<i64> {
        self.0
            .iter()
            .filter(|m| m.kind == MigrationKind::Up)
            .map(|m| m.version)
            .collect()
    }
}

impl From<Vec<Migration>> for MigrationList {
    fn from(migrations: Vec<Migration>) -> Self {
        Self(migrations)
    }
}

impl MigrationSource<'static> for MigrationList {
    fn resolve(self) -> BoxFuture<'static, Result<Vec<SqlxMigration>, BoxDynError>> {
        Box::pin(async move {
            let migrations = self
                .0
                .into_iter()
                .filter(|m| m.kind == MigrationKind::Up)
                .map(|m| {
                    SqlxMigration::new(
                        m.version,
                        m.description.into(),
                        m.kind.into(),
                        m.sql.into(),
                        false,
                    )
                })
                .collect();
            Ok(migrations)
        })
    }
}
