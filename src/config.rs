//! Local backend configuration.
//!
//! Read from JSON, either handed over directly (`null` meaning "all defaults")
//! or from the file named by `SQLGATE_CONFIG`.
//!
//! ```json
//! {
//!   "base_dir": "/var/lib/myapp",
//!   "preload": ["sqlite:app.db"],
//!   "max_connections": 5
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "SQLGATE_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Directory SQLite paths resolve against
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Connection strings opened by `LocalBackend::initialize`
    #[serde(default)]
    pub preload: Vec<String>,

    /// Pool size per connection string
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            preload: Vec::new(),
            max_connections: default_max_connections(),
        }
    }
}

impl BackendConfig {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Load from `SQLGATE_CONFIG` if set, defaults otherwise.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_path(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    /// `base_dir`, or `<data dir>/sqlgate` when unset.
    pub fn resolved_base_dir(&self) -> Option<PathBuf> {
        self.base_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("sqlgate")))
    }
}
