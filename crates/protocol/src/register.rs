//! Registration handshake
//!
//! Sent once when the control stream is opened. Not part of the steady-state
//! protocol.

use crate::audience::Audience;

/// Library name reported to the coordinator
pub const LIBRARY_NAME: &str = "tether";

/// Library version reported to the coordinator
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Kind of client embedding this library
///
/// NOTE: These values are used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ClientType {
    /// Not set
    #[default]
    Unset = 0,
    /// Embedded directly in the host application
    Sdk = 1,
    /// Running as a shim in front of a client library
    Shim = 2,
}

impl ClientType {
    /// Parse client type from raw byte value
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Sdk,
            2 => Self::Shim,
            _ => Self::Unset,
        }
    }
}

/// Client metadata sent with the registration request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientInfo {
    pub client_type: ClientType,
    pub library_name: String,
    pub library_version: String,
    pub language: String,
    pub arch: String,
    pub os: String,
}

impl ClientInfo {
    /// Metadata describing this build on the current platform
    pub fn current(client_type: ClientType) -> Self {
        Self {
            client_type,
            library_name: LIBRARY_NAME.into(),
            library_version: LIBRARY_VERSION.into(),
            language: "rust".into(),
            arch: std::env::consts::ARCH.into(),
            os: std::env::consts::OS.into(),
        }
    }
}

/// Registration request sent when opening the control stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterRequest {
    /// Local service identity
    pub service_name: String,
    /// Per-process session id
    pub session_id: String,
    /// Client metadata
    pub client_info: ClientInfo,
    /// Audiences configured at startup
    pub audiences: Vec<Audience>,
    /// Run pipelines without applying their results
    pub dry_run: bool,
}
