//! Collaborator contracts for the work each stage delegates.
//!
//! Stages own the retry bookkeeping; collaborators only perform one attempt.
//! An attempt either succeeds, fails in a modelled (retryable) way, or raises
//! a [`WorkFault`], which aborts the whole invocation.
//!
//! Plain closures implement every trait, so tests can inject deterministic
//! outcomes:
//!
//! ```
//! use intake_core::{Attempt, Transcriber, WorkFault};
//! use serde_json::{json, Value};
//!
//! let always_fails = |_: &Value, _: &str| -> Result<Attempt<String>, WorkFault> {
//!     Ok(Attempt::Failed("no audio".to_string()))
//! };
//! assert!(always_fails.transcribe(&json!("x"), "t1").unwrap().is_failed());
//! ```
use serde_json::Value;
use thiserror::Error;

use crate::context::AnalysisOutput;

/// Result of a single collaborator attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Succeeded(T),
    /// Modelled failure, eligible for retry
    Failed(String),
}

impl<T> Attempt<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Attempt::Failed(_))
    }
}

/// Unexpected collaborator failure. Never folded into the context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct WorkFault(pub String);

impl WorkFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Speech-to-text (or equivalent) over the original input
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, input: &Value, tenant_id: &str) -> Result<Attempt<String>, WorkFault>;
}

/// Extracts structured insight from a transcription
pub trait Analyzer: Send + Sync {
    fn analyze(
        &self,
        transcription: &str,
        tenant_id: &str,
    ) -> Result<Attempt<AnalysisOutput>, WorkFault>;
}

/// Files a ticket and returns its identifier
pub trait TicketSink: Send + Sync {
    fn create_ticket(
        &self,
        analysis: &AnalysisOutput,
        tenant_id: &str,
    ) -> Result<Attempt<String>, WorkFault>;
}

impl<F> Transcriber for F
where
    F: Fn(&Value, &str) -> Result<Attempt<String>, WorkFault> + Send + Sync,
{
    fn transcribe(&self, input: &Value, tenant_id: &str) -> Result<Attempt<String>, WorkFault> {
        self(input, tenant_id)
    }
}

impl<F> Analyzer for F
where
    F: Fn(&str, &str) -> Result<Attempt<AnalysisOutput>, WorkFault> + Send + Sync,
{
    fn analyze(
        &self,
        transcription: &str,
        tenant_id: &str,
    ) -> Result<Attempt<AnalysisOutput>, WorkFault> {
        self(transcription, tenant_id)
    }
}

impl<F> TicketSink for F
where
    F: Fn(&AnalysisOutput, &str) -> Result<Attempt<String>, WorkFault> + Send + Sync,
{
    fn create_ticket(
        &self,
        analysis: &AnalysisOutput,
        tenant_id: &str,
    ) -> Result<Attempt<String>, WorkFault> {
        self(analysis, tenant_id)
    }
}
