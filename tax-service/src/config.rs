use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tax_core::db::DbConfig;

/// Overrides the connection string of `[tax_db]`.
pub const TAX_DB_ENV: &str = "TAX_DB_URI";
/// Overrides the connection string of `[rebate_db]`.
pub const REBATE_DB_ENV: &str = "REBATE_DB_URI";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub tax_db: DbConfig,
    pub rebate_db: DbConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Bare level or full `EnvFilter` directive. `RUST_LOG` wins when set.
    pub level: String,
    /// Append log records to this file as well as stdout.
    pub file: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            tax_db: DbConfig {
                backend: "sqlite".to_string(),
                connection_string: "tax_database.db".to_string(),
            },
            rebate_db: DbConfig {
                backend: "sqlite".to_string(),
                connection_string: "rebate_database.db".to_string(),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("invalid service configuration")
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))
    }

    /// Applies `TAX_DB_URI` and `REBATE_DB_URI` from `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides<F>(
        &mut self,
        lookup: F,
    ) where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup(TAX_DB_ENV).filter(|v| !v.trim().is_empty()) {
            self.tax_db.connection_string = uri;
        }
        if let Some(uri) = lookup(REBATE_DB_ENV).filter(|v| !v.trim().is_empty()) {
            self.rebate_db.connection_string = uri;
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
