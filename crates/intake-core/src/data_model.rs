//! Data Model: RunRequest, RunReport, StageTrace
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Context;
use crate::stage::{StageName, StageOutcome};

/// One invocation of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Opaque work item (audio reference, raw text, ...)
    pub original_input: Value,
    /// Tenant for attribution; "unknown" when absent
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Initial context field values, validated against the context schema
    #[serde(default, alias = "initial_state_override")]
    pub field_overrides: Option<Map<String, Value>>,
}

impl RunRequest {
    pub fn new(original_input: impl Into<Value>) -> Self {
        Self {
            original_input: original_input.into(),
            tenant_id: None,
            field_overrides: None,
        }
    }

    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field_overrides
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

/// One stage execution, in run order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    /// 1-based position in the run
    pub step: usize,
    pub stage: StageName,
    pub outcome: StageOutcome,
    /// Retry count after execution (work stages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    pub latency_ms: u64,
    pub next: StageName,
}

/// What the engine hands back to the boundary
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline_id: String,
    /// blake3 fingerprint of the original input
    pub input_hash: String,
    pub final_context: Context,
    pub diagnostic_log: Vec<String>,
    pub trace: Vec<StageTrace>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn is_successful(&self) -> bool {
        self.final_context.is_successful
    }

    /// How many times `stage` was entered during the run
    pub fn entries(&self, stage: StageName) -> usize {
        self.trace.iter().filter(|t| t.stage == stage).count()
    }
}
