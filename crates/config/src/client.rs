//! Client configuration
//!
//! # Example
//!
//! ```toml
//! [client]
//! service_name = "billing"
//! coordinator = "127.0.0.1:9090"
//! client_type = "shim"
//! reconnect_interval = "2s"
//!
//! [[client.audiences]]
//! component_name = "kafka"
//! operation_type = "consumer"
//! operation_name = "orders"
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Default coordinator address
pub const DEFAULT_COORDINATOR: &str = "127.0.0.1:9090";

/// How the client is embedded in the host service
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// Linked into the application (default)
    #[default]
    Sdk,
    /// Sits in front of a client library
    Shim,
}

/// Direction of a data flow
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Reads payloads
    Consumer,
    /// Writes payloads
    Producer,
}

/// One data flow the client announces at registration
///
/// The service name is inherited from `[client]`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AudienceConfig {
    /// Component the flow goes through (kafka, postgres, ...)
    pub component_name: String,
    /// Consumer or producer
    pub operation_type: OperationKind,
    /// Topic, table, queue...
    pub operation_name: String,
}

/// `[client]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name of the host service (required)
    pub service_name: String,

    /// Coordinator TCP address
    /// Default: 127.0.0.1:9090
    pub coordinator: String,

    /// sdk or shim
    pub client_type: ClientKind,

    /// Register in dry-run mode
    pub dry_run: bool,

    /// Backoff between reconnect attempts
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,

    /// Outbound buffer per tail session
    /// Default: 100
    pub tail_buffer_size: usize,

    /// Workers per tail session
    /// Default: 2
    pub tail_workers: usize,

    /// How often dead tail sessions are reaped
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub reap_interval: Duration,

    /// Flows announced at registration
    pub audiences: Vec<AudienceConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            coordinator: DEFAULT_COORDINATOR.to_string(),
            client_type: ClientKind::default(),
            dry_run: false,
            reconnect_interval: Duration::from_secs(5),
            tail_buffer_size: 100,
            tail_workers: 2,
            reap_interval: Duration::from_secs(5),
            audiences: Vec::new(),
        }
    }
}
