//! Configuration loading and management

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::core::error::{ConfigError, FynnessError};

/// Environment variable naming the YAML config file
pub const CONFIG_ENV: &str = "FYNNESS_CONFIG";
/// Environment variable overriding `server.bind`
pub const BIND_ENV: &str = "FYNNESS_BIND";
/// Environment variable overriding `storage.database_url`
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Complete configuration of a Fynness server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FynnessConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ledger: LedgerSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Connection string, required for `postgres`
    pub database_url: Option<String>,
}

/// Business knobs of the ledger core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Upper bound on installments per plan
    pub max_installments: u32,
    /// Stored aggregates drifting more than this are corrected by the sweep
    pub drift_tolerance: Decimal,
    /// Whether invoice payments append a cash-flow row when the request is silent
    pub invoice_cash_flow_default: bool,
    /// Buffer size of the event bus
    pub event_capacity: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_installments: 120,
            drift_tolerance: Decimal::new(1, 2),
            invoice_cash_flow_default: true,
            event_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl FynnessConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path))?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            FynnessError::from(ConfigError::ParseError {
                file: Some(path.to_string()),
                message: e.to_string(),
            })
        })?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load from `FYNNESS_CONFIG` (or defaults), then apply env overrides and validate
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_yaml_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `FYNNESS_BIND` / `DATABASE_URL` style overrides from `lookup`
    ///
    /// A database URL switches the backend to postgres.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(BIND_ENV).filter(|v| !v.is_empty()) {
            self.server.bind = bind;
        }
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.storage.database_url = Some(url);
            self.storage.backend = StorageBackend::Postgres;
        }
    }

    pub fn validate(&self) -> Result<(), FynnessError> {
        self.bind_addr()?;

        if self.storage.backend == StorageBackend::Postgres && self.storage.database_url.is_none()
        {
            return Err(invalid("storage.database_url", "", "required for the postgres backend"));
        }
        if self.ledger.max_installments == 0 {
            return Err(invalid("ledger.max_installments", "0", "must be at least 1"));
        }
        if self.ledger.drift_tolerance < Decimal::ZERO {
            return Err(invalid(
                "ledger.drift_tolerance",
                &self.ledger.drift_tolerance.to_string(),
                "must not be negative",
            ));
        }
        if self.ledger.event_capacity == 0 {
            return Err(invalid("ledger.event_capacity", "0", "must be at least 1"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, FynnessError> {
        self.server.bind.parse().map_err(|e: std::net::AddrParseError| {
            invalid("server.bind", &self.server.bind, &e.to_string())
        })
    }
}

fn invalid(field: &str, value: &str, message: &str) -> FynnessError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
    .into()
}
