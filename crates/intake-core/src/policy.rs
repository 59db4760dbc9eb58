//! Transition policies: choose the next stage from the post-execution context
//!
//! Each work stage shares one shape:
//!
//! 1. error set, not blocked, `retry_count < budget` → same stage
//! 2. error set → pre-fill `error_message` (first writer wins) → error handler
//! 3. no error → next stage in pipeline order
//!
//! The final stage additionally checks for an earlier `error_message` and
//! for the success flag before reaching `End`.
use crate::config::PipelineConfig;
use crate::context::Context;
use crate::stage::{PipelineStage, StageName};

/// Message for a final stage that neither succeeded nor recorded an error
pub const UNHANDLED_STATE_MESSAGE: &str = "Unhandled state after ticket creation.";

/// Dispatches to the policy of `current`.
pub fn next_stage(current: StageName, ctx: &mut Context, config: &PipelineConfig) -> StageName {
    match current {
        StageName::Transcription => after_transcription(ctx, config),
        StageName::Analysis => after_analysis(ctx, config),
        StageName::TicketCreation => after_ticket_creation(ctx, config),
        StageName::ErrorHandler | StageName::End => StageName::End,
    }
}

pub fn after_transcription(ctx: &mut Context, config: &PipelineConfig) -> StageName {
    after_work_stage(PipelineStage::Transcription, ctx, config)
}

pub fn after_analysis(ctx: &mut Context, config: &PipelineConfig) -> StageName {
    after_work_stage(PipelineStage::Analysis, ctx, config)
}

pub fn after_ticket_creation(ctx: &mut Context, config: &PipelineConfig) -> StageName {
    let stage = PipelineStage::TicketCreation;
    if let Some(next) = retry_or_escalate(stage, ctx, config) {
        return next;
    }

    if ctx.error_message.is_some() {
        decide(
            ctx,
            stage,
            StageName::ErrorHandler,
            "Ticket creation reached with a prior error, routing to error handler.",
        );
        return StageName::ErrorHandler;
    }

    if ctx.is_successful {
        decide(
            ctx,
            stage,
            StageName::End,
            "Ticket creation succeeded, workflow complete.",
        );
        return StageName::End;
    }

    ctx.error_message = Some(UNHANDLED_STATE_MESSAGE.to_string());
    decide(
        ctx,
        stage,
        StageName::ErrorHandler,
        "Unhandled ticket creation state, routing to error handler.",
    );
    StageName::ErrorHandler
}

/// Failure wording shared by policies and the error handler
pub fn failure_message(stage: PipelineStage, error: &str, exhausted: bool) -> String {
    if exhausted {
        format!("{} failed after multiple retries: {}", stage.label(), error)
    } else {
        format!("{} Error: {}", stage.label(), error)
    }
}

fn after_work_stage(stage: PipelineStage, ctx: &mut Context, config: &PipelineConfig) -> StageName {
    if let Some(next) = retry_or_escalate(stage, ctx, config) {
        return next;
    }

    let next = stage.next();
    let message = format!("{} succeeded, continuing to {}.", stage.label(), next);
    decide(ctx, stage, next, &message);
    next
}

/// Steps 1 and 2. `None` means the stage holds no error.
fn retry_or_escalate(
    stage: PipelineStage,
    ctx: &mut Context,
    config: &PipelineConfig,
) -> Option<StageName> {
    let error = ctx.error(stage)?.to_string();
    let budget = config.budget(stage);
    let retries = ctx.retry_count(stage);
    let blocked = ctx.is_blocked(stage);

    if !blocked && retries < budget {
        let message = format!(
            "Retrying {} (attempt {} of {}).",
            stage.label(),
            retries + 1,
            budget
        );
        decide(ctx, stage, stage.into(), &message);
        return Some(stage.into());
    }

    if ctx.error_message.is_none() {
        ctx.error_message = Some(failure_message(stage, &error, !blocked));
    }

    let reason = if blocked {
        "dependency missing"
    } else {
        "retries exhausted"
    };
    let message = format!(
        "{} failed ({}), routing to error handler.",
        stage.label(),
        reason
    );
    decide(ctx, stage, StageName::ErrorHandler, &message);
    Some(StageName::ErrorHandler)
}

fn decide(ctx: &mut Context, stage: PipelineStage, next: StageName, message: &str) {
    tracing::info!(
        tenant = %ctx.tenant_id,
        trace_id = %ctx.trace_id,
        stage = %stage,
        next = %next,
        "{}",
        message
    );
    ctx.log(format!("Decision: {}", message));
}
