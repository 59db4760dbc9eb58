//! Stage Trait: single contract for every step of the intake pipeline
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::Context;

/// The three work stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Transcription,
    Analysis,
    TicketCreation,
}

impl PipelineStage {
    /// Pipeline order.
    pub const ALL: [PipelineStage; 3] = [
        PipelineStage::Transcription,
        PipelineStage::Analysis,
        PipelineStage::TicketCreation,
    ];

    /// Human-readable label used in diagnostic and error messages
    pub fn label(self) -> &'static str {
        match self {
            PipelineStage::Transcription => "Transcription",
            PipelineStage::Analysis => "Analysis",
            PipelineStage::TicketCreation => "Ticket Creation",
        }
    }

    /// The stage that runs after this one succeeds
    pub fn next(self) -> StageName {
        match self {
            PipelineStage::Transcription => StageName::Analysis,
            PipelineStage::Analysis => StageName::TicketCreation,
            PipelineStage::TicketCreation => StageName::End,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Node of the pipeline graph.
///
/// `End` is the terminal sentinel: it has no stage behind it and is reachable
/// only from the final stage's success path or from `ErrorHandler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Transcription,
    Analysis,
    TicketCreation,
    ErrorHandler,
    End,
}

impl StageName {
    /// Every node that must be backed by a registered stage.
    pub const EXECUTABLE: [StageName; 4] = [
        StageName::Transcription,
        StageName::Analysis,
        StageName::TicketCreation,
        StageName::ErrorHandler,
    ];

    /// Stable id (ex: "ticket_creation")
    pub fn id(self) -> &'static str {
        match self {
            StageName::Transcription => "transcription",
            StageName::Analysis => "analysis",
            StageName::TicketCreation => "ticket_creation",
            StageName::ErrorHandler => "error_handler",
            StageName::End => "end",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StageName::End)
    }

    /// The work stage behind this node, if any
    pub fn as_pipeline_stage(self) -> Option<PipelineStage> {
        match self {
            StageName::Transcription => Some(PipelineStage::Transcription),
            StageName::Analysis => Some(PipelineStage::Analysis),
            StageName::TicketCreation => Some(PipelineStage::TicketCreation),
            StageName::ErrorHandler | StageName::End => None,
        }
    }
}

impl From<PipelineStage> for StageName {
    fn from(stage: PipelineStage) -> Self {
        match stage {
            PipelineStage::Transcription => StageName::Transcription,
            PipelineStage::Analysis => StageName::Analysis,
            PipelineStage::TicketCreation => StageName::TicketCreation,
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Post-condition a stage left the context in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Output populated, error cleared
    Advanced,
    /// Attempt failed, retry count incremented, budget remains
    RetryPending,
    /// Budget was already spent on entry; no work performed
    Exhausted,
    /// Upstream dependency missing; budget untouched
    Blocked,
    /// Error handler consolidated the failure
    Consolidated,
}

/// Contract of a pipeline stage
pub trait Stage: Send + Sync {
    /// Graph node this stage implements
    fn name(&self) -> StageName;

    /// Executes the stage against the context.
    ///
    /// Modelled business failures are context mutations and return `Ok`.
    /// `Err` is reserved for faults that must abort the invocation.
    fn execute(&self, ctx: &mut Context) -> Result<StageOutcome, StageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// A collaborator raised an unexpected fault
    Fault { stage: StageName, message: String },
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Fault { stage, message } => write!(f, "STAGE/FAULT: {}: {}", stage, message),
        }
    }
}

impl std::error::Error for StageError {}
