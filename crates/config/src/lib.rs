//! Tether Configuration
//!
//! TOML-based configuration for the tether client binary. Only
//! `client.service_name` is required; everything else has a default.
//!
//! # Parsing
//!
//! ```
//! use tether_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[client]\nservice_name = \"billing\"").unwrap();
//! assert_eq!(config.client.tail_workers, 2);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [client]
//! service_name = "billing"
//! coordinator = "127.0.0.1:9090"
//!
//! [[client.audiences]]
//! component_name = "kafka"
//! operation_type = "consumer"
//! operation_name = "orders"
//!
//! [log]
//! level = "debug"
//! format = "json"
//! ```

mod client;
mod error;
mod logging;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use client::{AudienceConfig, ClientConfig, ClientKind, DEFAULT_COORDINATOR, OperationKind};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[client]` section
    pub client: ClientConfig,
    /// `[log]` section
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
