//! Unified Error Model
//!
//! Modelled business failures never appear here: they live in the context.
//! These errors are invocation-level faults or wiring/configuration defects.
use thiserror::Error;

use crate::stage::{StageError, StageName};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("WIRING/missing stage: {0}")]
    MissingStage(StageName),

    #[error("WIRING/duplicate stage: {0}")]
    DuplicateStage(StageName),

    #[error("WIRING/terminal node cannot be backed by a stage: {0}")]
    TerminalStage(StageName),

    #[error("CONFIG/{0}")]
    Config(#[from] ConfigError),

    #[error("RUN/stage {stage} aborted the invocation: {source}")]
    Stage {
        stage: StageName,
        #[source]
        source: StageError,
    },

    #[error("RUN/step limit of {limit} exceeded; a stage is not converging")]
    StepLimitExceeded { limit: usize },

    #[error("RUN/invariant violated: {0}")]
    InvariantViolated(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid: {0}")]
    Invalid(String),
}
