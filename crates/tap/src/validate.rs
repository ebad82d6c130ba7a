//! Structural validation of tail commands
//!
//! Only checks that the command is well formed. Whether the referenced
//! pipeline exists is the registry's concern.

use tether_protocol::{Audience, Command, CommandKind, TailRequest, TailRequestType};

use crate::error::{Result, TapError};

/// Validate a TailStart command, returning its request
pub fn validate_tail_start(command: &Command) -> Result<&TailRequest> {
    match &command.kind {
        Some(CommandKind::TailStart(request)) => {
            validate_tail_request(request, TailRequestType::Start)?;
            Ok(request)
        }
        Some(other) => Err(TapError::invalid(format!(
            "expected tail start, got {}",
            other.as_str()
        ))),
        None => Err(TapError::invalid("empty command")),
    }
}

/// Validate a TailStop command, returning its request
pub fn validate_tail_stop(command: &Command) -> Result<&TailRequest> {
    match &command.kind {
        Some(CommandKind::TailStop(request)) => {
            validate_tail_request(request, TailRequestType::Stop)?;
            Ok(request)
        }
        Some(other) => Err(TapError::invalid(format!(
            "expected tail stop, got {}",
            other.as_str()
        ))),
        None => Err(TapError::invalid("empty command")),
    }
}

/// Validate that every name in an audience is set
pub fn validate_audience(audience: &Audience) -> Result<()> {
    if audience.service_name.is_empty() {
        return Err(TapError::invalid("audience service name cannot be empty"));
    }
    if audience.component_name.is_empty() {
        return Err(TapError::invalid("audience component name cannot be empty"));
    }
    if audience.operation_name.is_empty() {
        return Err(TapError::invalid("audience operation name cannot be empty"));
    }
    Ok(())
}

fn validate_tail_request(request: &TailRequest, expected: TailRequestType) -> Result<()> {
    if request.id.is_empty() {
        return Err(TapError::invalid("tail request id cannot be empty"));
    }
    if request.pipeline_id.is_empty() {
        return Err(TapError::invalid("tail request pipeline id cannot be empty"));
    }
    if request.request_type != expected && request.request_type != TailRequestType::Unset {
        return Err(TapError::invalid(format!(
            "tail request type {:?} does not match command",
            request.request_type
        )));
    }
    validate_audience(&request.audience)
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
