//! Execution Context: mutable record threaded through every stage
//!
//! One `Context` exists per invocation and is owned by the engine for the
//! whole run. Each work stage has an output, an error and a retry counter;
//! downstream stages also carry a `blocked` flag marking a dependency
//! failure that must not be retried.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::stage::PipelineStage;

/// Tenant recorded when the caller supplies none
pub const UNKNOWN_TENANT: &str = "unknown";

/// Fields callers may not replace through overrides.
const PROTECTED_FIELDS: [&str; 1] = ["diagnostic_log"];

/// Structured result of the analysis stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub sentiment: String,
    pub entities: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub original_input: Value,
    pub tenant_id: String,
    pub trace_id: String,

    pub transcription: Option<String>,
    pub transcription_error: Option<String>,
    pub transcription_retry_count: u32,

    pub analysis_output: Option<AnalysisOutput>,
    pub analysis_error: Option<String>,
    pub analysis_retry_count: u32,
    pub analysis_blocked: bool,

    pub ticket_id: Option<String>,
    pub ticket_creation_error: Option<String>,
    pub ticket_creation_retry_count: u32,
    pub ticket_creation_blocked: bool,

    /// Single consolidated failure reason
    pub error_message: Option<String>,
    pub is_successful: bool,
    /// Append-only, human-readable progress log
    pub diagnostic_log: Vec<String>,
}

/// Why a field override was not applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideRejection {
    UnknownField,
    ProtectedField,
    InvalidValue(String),
}

impl Context {
    pub fn new(tenant_id: Option<String>, original_input: Value) -> Self {
        let tenant_id = normalize_tenant(tenant_id);

        Self {
            original_input,
            tenant_id,
            trace_id: uuid::Uuid::new_v4().to_string(),
            transcription: None,
            transcription_error: None,
            transcription_retry_count: 0,
            analysis_output: None,
            analysis_error: None,
            analysis_retry_count: 0,
            analysis_blocked: false,
            ticket_id: None,
            ticket_creation_error: None,
            ticket_creation_retry_count: 0,
            ticket_creation_blocked: false,
            error_message: None,
            is_successful: false,
            diagnostic_log: Vec::new(),
        }
    }

    /// Appends a tenant-tagged line to the diagnostic log.
    pub fn log(&mut self, message: impl AsRef<str>) {
        let line = format!("Tenant {}: {}", self.tenant_id, message.as_ref());
        self.diagnostic_log.push(line);
    }

    /// Applies caller-supplied initial field values.
    ///
    /// Every key is handled on its own: unknown, protected or ill-typed keys
    /// are logged and skipped, never rejected.
    pub fn apply_overrides(&mut self, overrides: &Map<String, Value>) {
        for (key, value) in overrides {
            match self.apply_override(key, value.clone()) {
                Ok(()) => {
                    tracing::debug!(
                        tenant = %self.tenant_id,
                        field = %key,
                        "initial field overridden"
                    );
                    self.log(format!("Initial field '{}' overridden.", key));
                }
                Err(OverrideRejection::UnknownField) => {
                    tracing::warn!(
                        tenant = %self.tenant_id,
                        field = %key,
                        "unknown key in field overrides"
                    );
                    self.log(format!(
                        "WARNING: Unknown key '{}' in field overrides ignored.",
                        key
                    ));
                }
                Err(OverrideRejection::ProtectedField) => {
                    tracing::warn!(
                        tenant = %self.tenant_id,
                        field = %key,
                        "protected key in field overrides"
                    );
                    self.log(format!(
                        "WARNING: Field '{}' cannot be overridden; ignored.",
                        key
                    ));
                }
                Err(OverrideRejection::InvalidValue(reason)) => {
                    tracing::warn!(
                        tenant = %self.tenant_id,
                        field = %key,
                        %reason,
                        "invalid override value"
                    );
                    self.log(format!(
                        "WARNING: Invalid value for field '{}' ignored: {}",
                        key, reason
                    ));
                }
            }
        }
    }

    /// Replaces one field by name, validated against the context schema.
    pub fn apply_override(&mut self, key: &str, value: Value) -> Result<(), OverrideRejection> {
        if PROTECTED_FIELDS.contains(&key) {
            return Err(OverrideRejection::ProtectedField);
        }

        let mut fields = match serde_json::to_value(&*self) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => {
                return Err(OverrideRejection::InvalidValue(
                    "context did not serialize to an object".to_string(),
                ))
            }
            Err(e) => return Err(OverrideRejection::InvalidValue(e.to_string())),
        };

        if !fields.contains_key(key) {
            return Err(OverrideRejection::UnknownField);
        }
        fields.insert(key.to_string(), value);

        let mut updated: Context = serde_json::from_value(Value::Object(fields))
            .map_err(|e| OverrideRejection::InvalidValue(e.to_string()))?;
        updated.tenant_id = normalize_tenant(Some(updated.tenant_id));
        *self = updated;
        Ok(())
    }

    /// Short, log-safe rendering of the original input
    pub fn input_preview(&self, max_chars: usize) -> String {
        let text = input_text(&self.original_input);
        text.chars().take(max_chars).collect()
    }

    pub fn has_output(&self, stage: PipelineStage) -> bool {
        match stage {
            PipelineStage::Transcription => self.transcription.is_some(),
            PipelineStage::Analysis => self.analysis_output.is_some(),
            PipelineStage::TicketCreation => self.ticket_id.is_some(),
        }
    }

    pub fn error(&self, stage: PipelineStage) -> Option<&str> {
        match stage {
            PipelineStage::Transcription => self.transcription_error.as_deref(),
            PipelineStage::Analysis => self.analysis_error.as_deref(),
            PipelineStage::TicketCreation => self.ticket_creation_error.as_deref(),
        }
    }

    pub fn retry_count(&self, stage: PipelineStage) -> u32 {
        match stage {
            PipelineStage::Transcription => self.transcription_retry_count,
            PipelineStage::Analysis => self.analysis_retry_count,
            PipelineStage::TicketCreation => self.ticket_creation_retry_count,
        }
    }

    /// Whether the stage's error is a dependency failure (never retried)
    pub fn is_blocked(&self, stage: PipelineStage) -> bool {
        match stage {
            PipelineStage::Transcription => false,
            PipelineStage::Analysis => self.analysis_blocked,
            PipelineStage::TicketCreation => self.ticket_creation_blocked,
        }
    }

    /// Records a failed attempt: error set, output cleared, retry counter bumped.
    pub fn record_failure(&mut self, stage: PipelineStage, reason: impl Into<String>) {
        self.clear_output(stage);
        let (error, retries) = self.error_slot(stage);
        *error = Some(reason.into());
        *retries += 1;
    }

    /// Records a permanent failure without consuming budget.
    pub fn record_exhausted(&mut self, stage: PipelineStage, reason: impl Into<String>) {
        self.clear_output(stage);
        let (error, _) = self.error_slot(stage);
        *error = Some(reason.into());
    }

    /// Records a dependency failure. The retry counter is left untouched.
    pub fn record_blocked(&mut self, stage: PipelineStage, reason: impl Into<String>) {
        self.record_exhausted(stage, reason);
        match stage {
            PipelineStage::Transcription => {}
            PipelineStage::Analysis => self.analysis_blocked = true,
            PipelineStage::TicketCreation => self.ticket_creation_blocked = true,
        }
    }

    pub fn clear_error(&mut self, stage: PipelineStage) {
        let (error, _) = self.error_slot(stage);
        *error = None;
        match stage {
            PipelineStage::Transcription => {}
            PipelineStage::Analysis => self.analysis_blocked = false,
            PipelineStage::TicketCreation => self.ticket_creation_blocked = false,
        }
    }

    /// Caps a retry counter, returning `true` when it had to be lowered.
    pub fn cap_retry_count(&mut self, stage: PipelineStage, budget: u32) -> bool {
        let (_, retries) = self.error_slot(stage);
        if *retries > budget {
            *retries = budget;
            true
        } else {
            false
        }
    }

    fn clear_output(&mut self, stage: PipelineStage) {
        match stage {
            PipelineStage::Transcription => self.transcription = None,
            PipelineStage::Analysis => self.analysis_output = None,
            PipelineStage::TicketCreation => self.ticket_id = None,
        }
    }

    fn error_slot(&mut self, stage: PipelineStage) -> (&mut Option<String>, &mut u32) {
        match stage {
            PipelineStage::Transcription => {
                (&mut self.transcription_error, &mut self.transcription_retry_count)
            }
            PipelineStage::Analysis => (&mut self.analysis_error, &mut self.analysis_retry_count),
            PipelineStage::TicketCreation => (
                &mut self.ticket_creation_error,
                &mut self.ticket_creation_retry_count,
            ),
        }
    }
}

/// Blank or missing tenants collapse to [`UNKNOWN_TENANT`].
fn normalize_tenant(tenant_id: Option<String>) -> String {
    tenant_id
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_TENANT.to_string())
}

/// Plain-text rendering of an opaque input: strings unquoted, anything else as JSON.
pub fn input_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_context_defaults() {
        let ctx = Context::new(None, json!("hello"));
        assert_eq!(ctx.tenant_id, UNKNOWN_TENANT);
        assert!(!ctx.is_successful);
        assert!(ctx.error_message.is_none());
        assert!(ctx.diagnostic_log.is_empty());
        for stage in PipelineStage::ALL {
            assert_eq!(ctx.retry_count(stage), 0);
            assert!(ctx.error(stage).is_none());
            assert!(!ctx.has_output(stage));
        }
    }

    #[test]
    fn test_blank_tenant_falls_back_to_unknown() {
        let ctx = Context::new(Some("  ".to_string()), Value::Null);
        assert_eq!(ctx.tenant_id, UNKNOWN_TENANT);
    }

    #[test]
    fn test_blank_tenant_override_falls_back_to_unknown() {
        let mut ctx = Context::new(Some("acme".to_string()), json!("x"));
        for blank in ["", "   "] {
            ctx.apply_override("tenant_id", json!(blank)).unwrap();
            assert_eq!(ctx.tenant_id, UNKNOWN_TENANT);
        }

        ctx.apply_override("tenant_id", json!("globex")).unwrap();
        assert_eq!(ctx.tenant_id, "globex");
        ctx.log("tagged");
        assert_eq!(ctx.diagnostic_log.last().unwrap(), "Tenant globex: tagged");
    }

    #[test]
    fn test_log_is_tagged_with_tenant() {
        let mut ctx = Context::new(Some("acme".to_string()), json!({}));
        ctx.log("Transcription started.");
        assert_eq!(ctx.diagnostic_log, vec!["Tenant acme: Transcription started."]);
    }

    #[test]
    fn test_known_override_applied() {
        let mut ctx = Context::new(Some("t1".to_string()), json!("x"));
        let overrides = json!({ "transcription_retry_count": 1, "transcription": "preset" });
        ctx.apply_overrides(overrides.as_object().unwrap());

        assert_eq!(ctx.transcription_retry_count, 1);
        assert_eq!(ctx.transcription.as_deref(), Some("preset"));
        assert_eq!(ctx.diagnostic_log.len(), 2);
    }

    #[test]
    fn test_unknown_override_ignored_with_warning() {
        let mut ctx = Context::new(Some("t1".to_string()), json!("x"));
        let before = ctx.clone();
        let overrides = json!({ "not_a_field": true });
        ctx.apply_overrides(overrides.as_object().unwrap());

        assert_eq!(ctx.diagnostic_log.len(), 1);
        assert!(ctx.diagnostic_log[0].contains("Unknown key 'not_a_field'"));
        ctx.diagnostic_log.clear();
        assert_eq!(ctx, before);
    }

    #[test]
    fn test_ill_typed_override_ignored() {
        let mut ctx = Context::new(Some("t1".to_string()), json!("x"));
        assert!(matches!(
            ctx.apply_override("analysis_retry_count", json!(-3)),
            Err(OverrideRejection::InvalidValue(_))
        ));
        assert_eq!(ctx.analysis_retry_count, 0);
    }

    #[test]
    fn test_diagnostic_log_cannot_be_overridden() {
        let mut ctx = Context::new(Some("t1".to_string()), json!("x"));
        ctx.log("first");
        assert_eq!(
            ctx.apply_override("diagnostic_log", json!([])),
            Err(OverrideRejection::ProtectedField)
        );
        assert_eq!(ctx.diagnostic_log.len(), 1);
    }

    #[test]
    fn test_record_failure_clears_output_and_counts() {
        let mut ctx = Context::new(None, json!("x"));
        ctx.transcription = Some("stale".to_string());
        ctx.record_failure(PipelineStage::Transcription, "boom");

        assert_eq!(ctx.transcription_error.as_deref(), Some("boom"));
        assert_eq!(ctx.transcription_retry_count, 1);
        assert!(ctx.transcription.is_none());
    }

    #[test]
    fn test_record_blocked_keeps_budget() {
        let mut ctx = Context::new(None, json!("x"));
        ctx.record_blocked(PipelineStage::Analysis, "no transcription");

        assert!(ctx.is_blocked(PipelineStage::Analysis));
        assert_eq!(ctx.analysis_retry_count, 0);

        ctx.clear_error(PipelineStage::Analysis);
        assert!(!ctx.is_blocked(PipelineStage::Analysis));
        assert!(ctx.analysis_error.is_none());
    }

    #[test]
    fn test_cap_retry_count() {
        let mut ctx = Context::new(None, json!("x"));
        ctx.ticket_creation_retry_count = 7;
        assert!(ctx.cap_retry_count(PipelineStage::TicketCreation, 2));
        assert_eq!(ctx.ticket_creation_retry_count, 2);
        assert!(!ctx.cap_retry_count(PipelineStage::TicketCreation, 2));
    }

    #[test]
    fn test_input_preview() {
        let ctx = Context::new(None, json!("abcdefghij"));
        assert_eq!(ctx.input_preview(4), "abcd");

        let ctx = Context::new(None, json!({ "k": 1 }));
        assert_eq!(ctx.input_preview(50), "{\"k\":1}");
    }
}
