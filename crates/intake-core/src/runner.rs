//! Pipeline Engine: sequences stages and policies from entry to `End`
use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;

use crate::config::PipelineConfig;
use crate::context::Context;
use crate::data_model::{RunReport, RunRequest, StageTrace};
use crate::error::EngineError;
use crate::policy;
use crate::stage::{PipelineStage, Stage, StageName};

pub struct PipelineEngine {
    stages: HashMap<StageName, Box<dyn Stage>>,
    config: PipelineConfig,
    pipeline_id: String,
}

impl PipelineEngine {
    /// Wires the engine. Each executable node must be backed by exactly one stage.
    pub fn new(stages: Vec<Box<dyn Stage>>, config: PipelineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let mut by_name: HashMap<StageName, Box<dyn Stage>> = HashMap::new();
        for stage in stages {
            let name = stage.name();
            if name.is_terminal() {
                return Err(EngineError::TerminalStage(name));
            }
            if by_name.insert(name, stage).is_some() {
                return Err(EngineError::DuplicateStage(name));
            }
        }

        if let Some(missing) = StageName::EXECUTABLE
            .iter()
            .find(|name| !by_name.contains_key(*name))
        {
            return Err(EngineError::MissingStage(*missing));
        }

        let pipeline_id = StageName::EXECUTABLE
            .iter()
            .map(|s| s.id())
            .collect::<Vec<_>>()
            .join("→");

        Ok(Self {
            stages: by_name,
            config,
            pipeline_id,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Builds a fresh context from the request and runs it.
    pub fn run(&self, request: RunRequest) -> Result<RunReport, EngineError> {
        let mut ctx = Context::new(request.tenant_id, request.original_input);
        if let Some(overrides) = &request.field_overrides {
            ctx.apply_overrides(overrides);
        }
        self.run_context(ctx)
    }

    /// Runs an already-built context to a terminal stage.
    ///
    /// Modelled failures end up in the returned context; `Err` means the
    /// invocation itself failed.
    pub fn run_context(&self, mut ctx: Context) -> Result<RunReport, EngineError> {
        let started = Instant::now();
        let span = tracing::info_span!(
            "workflow",
            tenant = %ctx.tenant_id,
            trace_id = %ctx.trace_id,
            pipeline = %self.pipeline_id
        );
        let _guard = span.enter();

        let input_hash = hash_input(&ctx.original_input);
        self.cap_retry_counts(&mut ctx);

        let limit = self.config.step_limit();
        let mut trace: Vec<StageTrace> = Vec::new();
        let mut current = StageName::Transcription;

        tracing::info!(input_hash = %input_hash, "workflow started");

        while !current.is_terminal() {
            if trace.len() >= limit {
                tracing::error!(limit, stage = %current, "step limit exceeded");
                return Err(EngineError::StepLimitExceeded { limit });
            }

            let stage = self
                .stages
                .get(&current)
                .ok_or(EngineError::MissingStage(current))?;

            let stage_start = Instant::now();
            let outcome = stage.execute(&mut ctx).map_err(|source| {
                tracing::error!(stage = %current, error = %source, "stage fault");
                EngineError::Stage {
                    stage: current,
                    source,
                }
            })?;
            let next = policy::next_stage(current, &mut ctx, &self.config);

            trace.push(StageTrace {
                step: trace.len() + 1,
                stage: current,
                outcome,
                retry_count: current.as_pipeline_stage().map(|s| ctx.retry_count(s)),
                latency_ms: stage_start.elapsed().as_millis() as u64,
                next,
            });

            current = next;
        }

        check_terminal(&ctx)?;

        let summary = match (&ctx.ticket_id, &ctx.error_message) {
            (Some(ticket), None) => {
                format!("Workflow finished successfully with ticket {}.", ticket)
            }
            (None, None) => "Workflow finished successfully.".to_string(),
            (_, Some(error)) => format!("Workflow finished with error: {}", error),
        };
        ctx.log(&summary);

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            success = ctx.is_successful,
            steps = trace.len(),
            duration_ms,
            "workflow finished"
        );

        Ok(RunReport {
            pipeline_id: self.pipeline_id.clone(),
            input_hash,
            diagnostic_log: ctx.diagnostic_log.clone(),
            final_context: ctx,
            trace,
            duration_ms,
        })
    }

    fn cap_retry_counts(&self, ctx: &mut Context) {
        for stage in PipelineStage::ALL {
            let budget = self.config.budget(stage);
            if ctx.cap_retry_count(stage, budget) {
                tracing::warn!(stage = %stage, budget, "retry count above budget capped");
                ctx.log(format!(
                    "WARNING: {} retry count capped at budget {}.",
                    stage.label(),
                    budget
                ));
            }
        }
    }
}

/// Exactly one of success / consolidated error at `End`.
fn check_terminal(ctx: &Context) -> Result<(), EngineError> {
    match (ctx.is_successful, ctx.error_message.is_some()) {
        (true, false) | (false, true) => Ok(()),
        (true, true) => Err(EngineError::InvariantViolated(
            "run ended both successful and with an error message".to_string(),
        )),
        (false, false) => Err(EngineError::InvariantViolated(
            "run ended neither successful nor with an error message".to_string(),
        )),
    }
}

fn hash_input(value: &Value) -> String {
    format!("blake3:{}", blake3::hash(value.to_string().as_bytes()))
}
