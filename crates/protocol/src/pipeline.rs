//! Pipeline definitions
//!
//! A `Pipeline` is an ordered list of steps attached to one audience by the
//! coordinator. The client only stores pipelines; running the steps is the
//! job of the host's execution engine, which reports each step's outcome back
//! as a `StepResult`.

use bytes::Bytes;

/// Kind of processing a step performs
///
/// NOTE: These values are used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum StepKind {
    /// Unknown or unset step kind
    #[default]
    Unknown = 0,
    /// Inspects payload contents
    Detective = 1,
    /// Rewrites payload contents
    Transform = 2,
    /// Encodes the payload
    Encode = 3,
    /// Decodes the payload
    Decode = 4,
    /// Infers a schema from the payload
    InferSchema = 5,
}

impl StepKind {
    /// Parse step kind from raw byte value
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Detective,
            2 => Self::Transform,
            3 => Self::Encode,
            4 => Self::Decode,
            5 => Self::InferSchema,
            _ => Self::Unknown,
        }
    }

    /// Convert to raw byte value
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One step of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineStep {
    /// Human-readable step name
    pub name: String,
    /// What the step does
    pub kind: StepKind,
    /// Opaque step configuration, interpreted by the execution engine
    pub config: Bytes,
}

impl PipelineStep {
    /// Create a new step
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            config: Bytes::new(),
        }
    }

    /// Set the step configuration
    #[must_use]
    pub fn with_config(mut self, config: impl Into<Bytes>) -> Self {
        self.config = config.into();
        self
    }

    /// Whether this step declares schema inference
    #[inline]
    pub fn infers_schema(&self) -> bool {
        self.kind == StepKind::InferSchema
    }
}

/// An ordered set of steps applied to payloads for one audience
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pipeline {
    /// Pipeline identifier, unique within an audience
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Steps in execution order
    pub steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    #[must_use]
    pub fn with_step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }
}

/// Exit status of one step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ExitCode {
    /// Not set
    #[default]
    Unset = 0,
    /// Step completed successfully
    Success = 1,
    /// Step ran and reported a failure
    Failure = 2,
    /// Step could not run
    InternalError = 3,
}

/// Outcome of running one step, as reported by the execution engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepResult {
    /// Exit status
    pub exit_code: ExitCode,
    /// Step output (for schema inference steps: the inferred schema)
    pub output: Bytes,
    /// Diagnostic message
    pub message: String,
}

impl StepResult {
    /// Successful result with the given output
    pub fn success(output: impl Into<Bytes>) -> Self {
        Self {
            exit_code: ExitCode::Success,
            output: output.into(),
            message: String::new(),
        }
    }

    /// Failed result with a message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            exit_code: ExitCode::Failure,
            output: Bytes::new(),
            message: message.into(),
        }
    }

    /// Whether the step succeeded
    #[inline]
    pub fn is_success(&self) -> bool {
        self.exit_code == ExitCode::Success
    }
}
