//! Intake Core: Context, Stage contract, Transition Policies and Pipeline Engine
//!
//! A single request flows through a fixed pipeline:
//!
//! ```text
//! Transcription → Analysis → TicketCreation → End
//!       ↺              ↺              ↺
//!       └──────────────┴──────────────┴──→ ErrorHandler → End
//! ```
//!
//! Each work stage retries in place until its budget is spent; any
//! unrecoverable state is routed to the error handler, which leaves exactly
//! one consolidated `error_message` in the context.

pub mod config;
pub mod context;
pub mod data_model;
pub mod error;
pub mod policy;
pub mod runner;
pub mod stage;
pub mod work;

pub use config::{PipelineConfig, StageSettings, DEFAULT_RETRY_BUDGET};
pub use context::{AnalysisOutput, Context, OverrideRejection, UNKNOWN_TENANT};
pub use data_model::{RunReport, RunRequest, StageTrace};
pub use error::{ConfigError, EngineError};
pub use runner::PipelineEngine;
pub use stage::{PipelineStage, Stage, StageError, StageName, StageOutcome};
pub use work::{Analyzer, Attempt, TicketSink, Transcriber, WorkFault};

/// Intake engine version
pub const INTAKE_VERSION: &str = env!("CARGO_PKG_VERSION");
