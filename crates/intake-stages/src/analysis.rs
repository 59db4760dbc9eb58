use intake_core::{
    Analyzer, Attempt, Context, PipelineStage, Stage, StageError, StageName, StageOutcome,
};

use crate::retry;

/// Runs the analyzer over a successful transcription.
pub struct AnalysisStage {
    pub(crate) analyzer: Box<dyn Analyzer>,
    pub(crate) retry_budget: u32,
}

impl AnalysisStage {
    pub fn new(analyzer: impl Analyzer + 'static, retry_budget: u32) -> Self {
        Self {
            analyzer: Box::new(analyzer),
            retry_budget,
        }
    }
}

impl Stage for AnalysisStage {
    fn name(&self) -> StageName {
        StageName::Analysis
    }

    fn execute(&self, ctx: &mut Context) -> Result<StageOutcome, StageError> {
        let stage = PipelineStage::Analysis;
        ctx.log("Analysis started.");

        if ctx.transcription_error.is_some() {
            return Ok(retry::block(
                ctx,
                stage,
                "Skipping analysis due to transcription error.",
                "Analysis skipped due to prior error.",
            ));
        }

        let transcription = ctx
            .transcription
            .as_deref()
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        let Some(transcription) = transcription else {
            return Ok(retry::block(
                ctx,
                stage,
                "No transcription text available for analysis.",
                "Analysis failed: No transcription.",
            ));
        };

        if ctx.retry_count(stage) >= self.retry_budget {
            return Ok(retry::exhaust(ctx, stage, self.retry_budget));
        }

        let attempt = self
            .analyzer
            .analyze(&transcription, &ctx.tenant_id)
            .map_err(|e| retry::fault(StageName::Analysis, e))?;

        match attempt {
            Attempt::Failed(reason) => Ok(retry::retry_pending(ctx, stage, reason)),
            Attempt::Succeeded(output) => {
                tracing::info!(
                    tenant = %ctx.tenant_id,
                    sentiment = %output.sentiment,
                    entities = output.entities.len(),
                    "analysis successful"
                );
                ctx.analysis_output = Some(output);
                ctx.clear_error(stage);
                ctx.log("Analysis successful.");
                Ok(StageOutcome::Advanced)
            }
        }
    }
}
