//! Commands sent by the coordinator
//!
//! Every command carries the audience it applies to. The payload is optional
//! on the wire: a frame without one decodes to a command with `kind: None`,
//! which handlers reject as empty.

use crate::audience::Audience;
use crate::pipeline::Pipeline;
use crate::tail::TailRequest;

/// Imperative instruction received on the control stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    /// Audience the command targets
    pub audience: Audience,
    /// Command payload (`None` if the coordinator sent an empty command)
    pub kind: Option<CommandKind>,
}

/// Command payload variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Liveness signal, no state change
    KeepAlive,
    /// Attach (or replace) a pipeline
    AttachPipeline(Pipeline),
    /// Remove a pipeline
    DetachPipeline { pipeline_id: String },
    /// Stop running a pipeline without removing it
    PausePipeline { pipeline_id: String },
    /// Resume a paused pipeline
    ResumePipeline { pipeline_id: String },
    /// Start streaming before/after payloads for a pipeline
    TailStart(TailRequest),
    /// Stop a tail
    TailStop(TailRequest),
}

impl CommandKind {
    /// Short stable name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepAlive => "keep_alive",
            Self::AttachPipeline(_) => "attach_pipeline",
            Self::DetachPipeline { .. } => "detach_pipeline",
            Self::PausePipeline { .. } => "pause_pipeline",
            Self::ResumePipeline { .. } => "resume_pipeline",
            Self::TailStart(_) => "tail_start",
            Self::TailStop(_) => "tail_stop",
        }
    }
}

impl Command {
    /// Create a command for an audience
    pub fn new(audience: Audience, kind: CommandKind) -> Self {
        Self {
            audience,
            kind: Some(kind),
        }
    }

    /// Keep-alive command (audience is irrelevant)
    pub fn keep_alive() -> Self {
        Self::new(Audience::default(), CommandKind::KeepAlive)
    }

    /// Attach pipeline command
    pub fn attach(audience: Audience, pipeline: Pipeline) -> Self {
        Self::new(audience, CommandKind::AttachPipeline(pipeline))
    }

    /// Detach pipeline command
    pub fn detach(audience: Audience, pipeline_id: impl Into<String>) -> Self {
        Self::new(
            audience,
            CommandKind::DetachPipeline {
                pipeline_id: pipeline_id.into(),
            },
        )
    }

    /// Pause pipeline command
    pub fn pause(audience: Audience, pipeline_id: impl Into<String>) -> Self {
        Self::new(
            audience,
            CommandKind::PausePipeline {
                pipeline_id: pipeline_id.into(),
            },
        )
    }

    /// Resume pipeline command
    pub fn resume(audience: Audience, pipeline_id: impl Into<String>) -> Self {
        Self::new(
            audience,
            CommandKind::ResumePipeline {
                pipeline_id: pipeline_id.into(),
            },
        )
    }

    /// Tail start command; the command audience is taken from the request
    pub fn tail_start(request: TailRequest) -> Self {
        Self::new(request.audience.clone(), CommandKind::TailStart(request))
    }

    /// Tail stop command; the command audience is taken from the request
    pub fn tail_stop(request: TailRequest) -> Self {
        Self::new(request.audience.clone(), CommandKind::TailStop(request))
    }

    /// Whether this is a keep-alive
    #[inline]
    pub fn is_keep_alive(&self) -> bool {
        matches!(self.kind, Some(CommandKind::KeepAlive))
    }

    /// Name of the payload variant, `"empty"` when absent
    pub fn kind_name(&self) -> &'static str {
        self.kind.as_ref().map_or("empty", CommandKind::as_str)
    }
}
