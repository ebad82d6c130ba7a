//! Audience identification types
//!
//! An `Audience` names one data flow inside a service (service + component +
//! operation). Pipelines, tails and schemas are all scoped to an audience, and
//! every map in the client is keyed by its canonical `AudienceKey`.

use std::fmt;

/// Direction of the operation an audience describes
///
/// NOTE: These values are used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum OperationType {
    /// Not specified by the caller
    #[default]
    Unspecified = 0,
    /// Reads payloads (e.g. a queue consumer)
    Consumer = 1,
    /// Writes payloads (e.g. a queue producer)
    Producer = 2,
}

impl OperationType {
    /// Parse operation type from raw byte value
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Consumer,
            2 => Self::Producer,
            _ => Self::Unspecified,
        }
    }

    /// Convert to raw byte value
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get the string name of this operation type
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Consumer => "consumer",
            Self::Producer => "producer",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a data flow that pipelines and tails are scoped to
///
/// # Example
///
/// ```
/// use tether_protocol::{Audience, OperationType};
///
/// let aud = Audience::new("billing", "kafka", OperationType::Consumer, "orders");
/// assert_eq!(aud.key().as_str(), "billing:kafka:consumer:orders");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Audience {
    /// Name of the service that owns the flow
    pub service_name: String,
    /// Component the flow goes through (kafka, postgres, ...)
    pub component_name: String,
    /// Producer / consumer
    pub operation_type: OperationType,
    /// Operation name within the component (topic, table, ...)
    pub operation_name: String,
}

impl Audience {
    /// Create a new audience
    pub fn new(
        service_name: impl Into<String>,
        component_name: impl Into<String>,
        operation_type: OperationType,
        operation_name: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            component_name: component_name.into(),
            operation_type,
            operation_name: operation_name.into(),
        }
    }

    /// Canonical map key for this audience
    pub fn key(&self) -> AudienceKey {
        AudienceKey::from(self)
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.service_name, self.component_name, self.operation_type, self.operation_name
        )
    }
}

/// Canonical string identity of an [`Audience`]
///
/// Two audiences are the same entity iff their keys are equal.
///
/// Fields are joined with `:` and not escaped, so names that themselves
/// contain `:` can collide: `("a:b", "c", ..)` and `("a", "b:c", ..)` share
/// a key. Coordinators use the same format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AudienceKey(String);

impl AudienceKey {
    /// Get the key as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Audience> for AudienceKey {
    fn from(aud: &Audience) -> Self {
        Self(aud.to_string())
    }
}

impl fmt::Display for AudienceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AudienceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "audience_test.rs"]
mod tests;
