//! Retry-gate bookkeeping shared by the work stages
use intake_core::{Context, PipelineStage, StageError, StageName, StageOutcome, WorkFault};

/// Budget already spent on entry: no work, permanent failure stamped.
pub(crate) fn exhaust(ctx: &mut Context, stage: PipelineStage, budget: u32) -> StageOutcome {
    let message = format!("{} failed after multiple retries.", stage.label());
    tracing::warn!(
        tenant = %ctx.tenant_id,
        stage = %stage,
        retries = ctx.retry_count(stage),
        budget,
        "max retries reached"
    );

    ctx.record_exhausted(stage, message.clone());
    if ctx.error_message.is_none() {
        ctx.error_message = Some(message);
    }
    ctx.log(format!("{} failed permanently.", stage.label()));
    StageOutcome::Exhausted
}

/// A modelled attempt failure: counts against the budget.
pub(crate) fn retry_pending(
    ctx: &mut Context,
    stage: PipelineStage,
    reason: String,
) -> StageOutcome {
    tracing::warn!(
        tenant = %ctx.tenant_id,
        stage = %stage,
        attempt = ctx.retry_count(stage) + 1,
        %reason,
        "attempt failed"
    );

    ctx.record_failure(stage, reason);
    ctx.log(format!("{} failed. Retrying...", stage.label()));
    StageOutcome::RetryPending
}

/// A dependency is missing: recorded as the stage's own, non-retryable error.
pub(crate) fn block(
    ctx: &mut Context,
    stage: PipelineStage,
    reason: &str,
    log_line: &str,
) -> StageOutcome {
    tracing::info!(tenant = %ctx.tenant_id, stage = %stage, %reason, "stage blocked");
    ctx.record_blocked(stage, reason);
    ctx.log(log_line);
    StageOutcome::Blocked
}

pub(crate) fn fault(stage: StageName, fault: WorkFault) -> StageError {
    StageError::Fault {
        stage,
        message: fault.to_string(),
    }
}
