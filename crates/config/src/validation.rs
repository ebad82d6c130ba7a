//! Configuration validation
//!
//! Serde fills in defaults; this catches values that parse but cannot work:
//! - `service_name` is set
//! - tail buffer and worker counts are non-zero
//! - intervals are non-zero
//! - announced audiences have names

use crate::Config;
use crate::error::{ConfigError, Result};

const CLIENT: &str = "client";

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let client = &config.client;

    if client.service_name.trim().is_empty() {
        return Err(ConfigError::missing_field(CLIENT, "service_name"));
    }
    if client.coordinator.trim().is_empty() {
        return Err(ConfigError::missing_field(CLIENT, "coordinator"));
    }
    if client.tail_buffer_size == 0 {
        return Err(ConfigError::invalid_value(
            CLIENT,
            "tail_buffer_size",
            "must be at least 1",
        ));
    }
    if client.tail_workers == 0 {
        return Err(ConfigError::invalid_value(
            CLIENT,
            "tail_workers",
            "must be at least 1",
        ));
    }
    if client.reconnect_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            CLIENT,
            "reconnect_interval",
            "must be greater than zero",
        ));
    }
    if client.reap_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            CLIENT,
            "reap_interval",
            "must be greater than zero",
        ));
    }

    for (i, audience) in client.audiences.iter().enumerate() {
        if audience.component_name.is_empty() || audience.operation_name.is_empty() {
            return Err(ConfigError::invalid_value(
                CLIENT,
                "audiences",
                format!("entry {} needs component_name and operation_name", i),
            ));
        }
    }

    Ok(())
}
