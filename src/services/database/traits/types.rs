//! Connection identity types.
//!
//! This module contains:
//! - `DatabaseType` - Enum of the SQL dialects the handle knows about
//! - `ConnectionString` - The `<scheme>:<address>` identifier of a remote connection
//! - `HandleState` - Whether a handle was confirmed by a round trip

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::services::database::error::{Error, Result};

/// Supported database dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    SQLite,
    PostgreSQL,
    MySQL,
}

impl DatabaseType {
    /// Get the display name for this database type
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SQLite => "SQLite",
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
        }
    }

    /// Get all known database types
    pub fn all() -> Vec<DatabaseType> {
        vec![Self::SQLite, Self::PostgreSQL, Self::MySQL]
    }

    /// Resolve a connection string scheme.
    ///
    /// Schemes match case-insensitively; anything else is a driver
    /// identifier this crate does not know about.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_lowercase().as_str() {
            "sqlite" => Some(Self::SQLite),
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "mysql" | "mariadb" => Some(Self::MySQL),
            _ => None,
        }
    }

    /// Canonical scheme string
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::SQLite => "sqlite",
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
        }
    }

    /// Positional placeholder for the `n`th (1-based) bind value.
    ///
    /// The handle never rewrites SQL; this only helps callers build text
    /// that matches the dialect.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::SQLite | Self::PostgreSQL => format!("${}", n),
            Self::MySQL => "?".to_string(),
        }
    }

    /// Whether `execute` can report a generated key.
    ///
    /// PostgreSQL needs a `RETURNING` clause through `select` instead, so its
    /// `last_insert_id` is always `0`.
    pub fn reports_last_insert_id(&self) -> bool {
        !matches!(self, Self::PostgreSQL)
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Identifier of a remote connection, `<scheme>:<address>`.
///
/// The string is forwarded to the remote side verbatim; the dialect tag is
/// resolved once here so call sites never sniff prefixes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionString {
    raw: String,
    scheme_len: usize,
    database_type: Option<DatabaseType>,
}

impl ConnectionString {
    /// Parse and validate a connection string.
    ///
    /// # Errors
    ///
    /// Fails when the input is empty, has no `:` separator or has an empty scheme.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(Error::invalid_connection_string(raw, "connection string is empty"));
        }

        let scheme_len = match raw.find(':') {
            Some(0) => {
                return Err(Error::invalid_connection_string(raw, "scheme is empty"));
            }
            Some(idx) => idx,
            None => {
                return Err(Error::invalid_connection_string(
                    raw,
                    "expected `<scheme>:<address>`",
                ));
            }
        };

        let database_type = DatabaseType::from_scheme(&raw[..scheme_len]);
        Ok(Self {
            raw,
            scheme_len,
            database_type,
        })
    }

    /// The full string as given
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The part before the first `:`
    pub fn scheme(&self) -> &str {
        &self.raw[..self.scheme_len]
    }

    /// The part after the first `:`
    pub fn address(&self) -> &str {
        &self.raw[self.scheme_len + 1..]
    }

    /// Dialect tag, `None` for schemes only the remote side understands
    pub fn database_type(&self) -> Option<DatabaseType> {
        self.database_type
    }

    pub fn into_string(self) -> String {
        self.raw
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for ConnectionString {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for ConnectionString {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl AsRef<str> for ConnectionString {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl Serialize for ConnectionString {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ConnectionString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// How a handle came to exist.
///
/// The distinction is behavioral only: both states carry the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Built without a round trip; the remote side opens on first use
    Bound,
    /// Returned by `load` after the remote side confirmed the connection
    Established,
}
