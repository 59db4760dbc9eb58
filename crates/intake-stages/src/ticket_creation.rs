use intake_core::{
    Attempt, Context, PipelineStage, Stage, StageError, StageName, StageOutcome, TicketSink,
};

use crate::retry;

/// Final work stage. Its success path is the only place `is_successful` is set.
pub struct TicketCreationStage {
    pub(crate) sink: Box<dyn TicketSink>,
    pub(crate) retry_budget: u32,
}

impl TicketCreationStage {
    pub fn new(sink: impl TicketSink + 'static, retry_budget: u32) -> Self {
        Self {
            sink: Box::new(sink),
            retry_budget,
        }
    }
}

impl Stage for TicketCreationStage {
    fn name(&self) -> StageName {
        StageName::TicketCreation
    }

    fn execute(&self, ctx: &mut Context) -> Result<StageOutcome, StageError> {
        let stage = PipelineStage::TicketCreation;
        ctx.log("Ticket creation started.");

        if ctx.analysis_error.is_some() || ctx.transcription_error.is_some() {
            return Ok(retry::block(
                ctx,
                stage,
                "Skipping ticket creation due to prior errors.",
                "Ticket creation skipped.",
            ));
        }

        let Some(analysis) = ctx.analysis_output.clone() else {
            return Ok(retry::block(
                ctx,
                stage,
                "No analysis output available for ticket creation.",
                "Ticket creation failed: No analysis data.",
            ));
        };

        if ctx.retry_count(stage) >= self.retry_budget {
            return Ok(retry::exhaust(ctx, stage, self.retry_budget));
        }

        let attempt = self
            .sink
            .create_ticket(&analysis, &ctx.tenant_id)
            .map_err(|e| retry::fault(StageName::TicketCreation, e))?;

        match attempt {
            Attempt::Failed(reason) => Ok(retry::retry_pending(ctx, stage, reason)),
            Attempt::Succeeded(ticket_id) => {
                tracing::info!(tenant = %ctx.tenant_id, ticket = %ticket_id, "ticket created");
                ctx.log(format!("Ticket {} created successfully.", ticket_id));
                ctx.ticket_id = Some(ticket_id);
                ctx.clear_error(stage);
                ctx.is_successful = true;
                Ok(StageOutcome::Advanced)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MarkerTicketSink;
    use chrono::{TimeZone, Utc};
    use intake_core::AnalysisOutput;
    use serde_json::json;

    fn fixed_clock() -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn ctx_with_summary(summary: &str) -> Context {
        let mut ctx = Context::new(Some("t1".to_string()), json!("x"));
        ctx.transcription = Some("text".to_string());
        ctx.analysis_output = Some(AnalysisOutput {
            sentiment: "positive".to_string(),
            entities: vec!["mock_entity_1".to_string()],
            summary: summary.to_string(),
        });
        ctx
    }

    #[test]
    fn test_success_marks_run_successful() {
        let stage = TicketCreationStage::new(MarkerTicketSink::new().with_clock(fixed_clock), 2);
        let mut ctx = ctx_with_summary("all good");

        assert_eq!(stage.execute(&mut ctx).unwrap(), StageOutcome::Advanced);
        assert_eq!(ctx.ticket_id.as_deref(), Some("TICKET_t1_1700000000"));
        assert!(ctx.is_successful);
        assert!(ctx
            .diagnostic_log
            .last()
            .unwrap()
            .contains("Ticket TICKET_t1_1700000000 created successfully."));
    }

    #[test]
    fn test_marker_failure_does_not_mark_success() {
        let stage = TicketCreationStage::new(MarkerTicketSink::new(), 2);
        let mut ctx = ctx_with_summary("please fail_ticket");

        assert_eq!(stage.execute(&mut ctx).unwrap(), StageOutcome::RetryPending);
        assert!(!ctx.is_successful);
        assert!(ctx.ticket_id.is_none());
        assert_eq!(ctx.ticket_creation_retry_count, 1);
    }

    #[test]
    fn test_upstream_error_blocks() {
        let stage = TicketCreationStage::new(MarkerTicketSink::new(), 2);
        let mut ctx = ctx_with_summary("fine");
        ctx.analysis_error = Some("Mock analysis failed.".to_string());

        assert_eq!(stage.execute(&mut ctx).unwrap(), StageOutcome::Blocked);
        assert!(ctx.ticket_creation_blocked);
        assert_eq!(ctx.ticket_creation_retry_count, 0);
        assert!(!ctx.is_successful);
    }

    #[test]
    fn test_missing_analysis_blocks() {
        let stage = TicketCreationStage::new(MarkerTicketSink::new(), 2);
        let mut ctx = Context::new(Some("t1".to_string()), json!("x"));

        assert_eq!(stage.execute(&mut ctx).unwrap(), StageOutcome::Blocked);
        assert_eq!(
            ctx.ticket_creation_error.as_deref(),
            Some("No analysis output available for ticket creation.")
        );
    }
}
