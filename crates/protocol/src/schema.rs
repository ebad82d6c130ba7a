//! Schema updates published to the coordinator

use bytes::Bytes;

use crate::audience::Audience;

/// Latest inferred schema for an audience
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaUpdate {
    pub audience: Audience,
    /// Schema document (JSON schema bytes, compared byte-exact)
    pub schema: Bytes,
}

impl SchemaUpdate {
    pub fn new(audience: Audience, schema: impl Into<Bytes>) -> Self {
        Self {
            audience,
            schema: schema.into(),
        }
    }
}
