//! Terminal failure stage: consolidates everything into one `error_message`
use intake_core::policy::failure_message;
use intake_core::{
    Context, PipelineConfig, PipelineStage, Stage, StageError, StageName, StageOutcome,
};

pub const UNSPECIFIED_ERROR_MESSAGE: &str =
    "An unspecified error occurred and was routed to the error handler.";

/// Reverse pipeline order: the most downstream failure is reported first.
const REPORT_ORDER: [PipelineStage; 3] = [
    PipelineStage::TicketCreation,
    PipelineStage::Analysis,
    PipelineStage::Transcription,
];

/// Picks the single user-facing failure reason. Pure: same context, same answer.
///
/// A pre-set `error_message` always wins. Otherwise stages whose budget is
/// exhausted are preferred over stages that merely hold an error, each group
/// scanned in reverse pipeline order.
pub fn consolidate_error(ctx: &Context, config: &PipelineConfig) -> String {
    if let Some(existing) = &ctx.error_message {
        return existing.clone();
    }

    let exhausted = REPORT_ORDER.iter().find_map(|stage| {
        let error = ctx.error(*stage)?;
        let spent = !ctx.is_blocked(*stage) && ctx.retry_count(*stage) >= config.budget(*stage);
        spent.then(|| failure_message(*stage, error, true))
    });
    if let Some(message) = exhausted {
        return message;
    }

    REPORT_ORDER
        .iter()
        .find_map(|stage| ctx.error(*stage).map(|e| failure_message(*stage, e, false)))
        .unwrap_or_else(|| UNSPECIFIED_ERROR_MESSAGE.to_string())
}

pub struct ErrorHandlerStage {
    config: PipelineConfig,
}

impl ErrorHandlerStage {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }
}

impl Stage for ErrorHandlerStage {
    fn name(&self) -> StageName {
        StageName::ErrorHandler
    }

    fn execute(&self, ctx: &mut Context) -> Result<StageOutcome, StageError> {
        let message = consolidate_error(ctx, &self.config);
        tracing::warn!(
            tenant = %ctx.tenant_id,
            trace_id = %ctx.trace_id,
            error = %message,
            "workflow failed"
        );

        ctx.error_message = Some(message.clone());
        ctx.is_successful = false;
        ctx.log(format!("Workflow ended in error: {}", message));
        Ok(StageOutcome::Consolidated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Context {
        Context::new(Some("t1".to_string()), json!("x"))
    }

    #[test]
    fn test_preset_message_kept() {
        let mut ctx = ctx();
        ctx.error_message = Some("pre-set".to_string());
        ctx.ticket_creation_error = Some("late".to_string());
        ctx.ticket_creation_retry_count = 2;

        assert_eq!(consolidate_error(&ctx, &PipelineConfig::default()), "pre-set");
    }

    #[test]
    fn test_exhausted_preferred_over_current() {
        let mut ctx = ctx();
        ctx.ticket_creation_error = Some("ticket blocked".to_string());
        ctx.ticket_creation_blocked = true;
        ctx.transcription_error = Some("Mock transcription failed.".to_string());
        ctx.transcription_retry_count = 2;

        assert_eq!(
            consolidate_error(&ctx, &PipelineConfig::default()),
            "Transcription failed after multiple retries: Mock transcription failed."
        );
    }

    #[test]
    fn test_reverse_order_among_exhausted() {
        let mut ctx = ctx();
        ctx.analysis_error = Some("Mock analysis failed.".to_string());
        ctx.analysis_retry_count = 2;
        ctx.ticket_creation_error = Some("Mock ticket creation failed.".to_string());
        ctx.ticket_creation_retry_count = 2;

        assert_eq!(
            consolidate_error(&ctx, &PipelineConfig::default()),
            "Ticket Creation failed after multiple retries: Mock ticket creation failed."
        );
    }

    #[test]
    fn test_current_error_fallback() {
        let mut ctx = ctx();
        ctx.analysis_error = Some("No transcription text available for analysis.".to_string());
        ctx.analysis_blocked = true;

        assert_eq!(
            consolidate_error(&ctx, &PipelineConfig::default()),
            "Analysis Error: No transcription text available for analysis."
        );
    }

    #[test]
    fn test_unspecified_fallback() {
        assert_eq!(
            consolidate_error(&ctx(), &PipelineConfig::default()),
            UNSPECIFIED_ERROR_MESSAGE
        );
    }

    #[test]
    fn test_stage_is_idempotent() {
        let stage = ErrorHandlerStage::new(PipelineConfig::default());
        let mut ctx = ctx();
        ctx.analysis_error = Some("Mock analysis failed.".to_string());
        ctx.analysis_retry_count = 2;
        ctx.is_successful = true;

        stage.execute(&mut ctx).unwrap();
        let first = ctx.error_message.clone();
        stage.execute(&mut ctx).unwrap();

        assert_eq!(ctx.error_message, first);
        assert!(!ctx.is_successful);
        assert!(ctx
            .diagnostic_log
            .last()
            .unwrap()
            .starts_with("Tenant t1: Workflow ended in error:"));
    }
}
