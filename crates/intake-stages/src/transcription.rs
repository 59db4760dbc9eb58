use intake_core::{
    Attempt, Context, PipelineStage, Stage, StageError, StageName, StageOutcome, Transcriber,
};

use crate::retry;

/// Characters of the original input echoed into the diagnostic log
const INPUT_PREVIEW_CHARS: usize = 50;

/// Entry stage: turns the original input into text.
pub struct TranscriptionStage {
    pub(crate) transcriber: Box<dyn Transcriber>,
    pub(crate) retry_budget: u32,
}

impl TranscriptionStage {
    pub fn new(transcriber: impl Transcriber + 'static, retry_budget: u32) -> Self {
        Self {
            transcriber: Box::new(transcriber),
            retry_budget,
        }
    }
}

impl Stage for TranscriptionStage {
    fn name(&self) -> StageName {
        StageName::Transcription
    }

    fn execute(&self, ctx: &mut Context) -> Result<StageOutcome, StageError> {
        let stage = PipelineStage::Transcription;
        let preview = ctx.input_preview(INPUT_PREVIEW_CHARS);
        ctx.log(format!("Transcription started for input: {}...", preview));

        if ctx.retry_count(stage) >= self.retry_budget {
            return Ok(retry::exhaust(ctx, stage, self.retry_budget));
        }

        let attempt = self
            .transcriber
            .transcribe(&ctx.original_input, &ctx.tenant_id)
            .map_err(|e| retry::fault(StageName::Transcription, e))?;

        match attempt {
            Attempt::Failed(reason) => Ok(retry::retry_pending(ctx, stage, reason)),
            Attempt::Succeeded(text) => {
                tracing::info!(
                    tenant = %ctx.tenant_id,
                    chars = text.len(),
                    "transcription successful"
                );
                ctx.transcription = Some(text);
                ctx.clear_error(stage);
                ctx.log("Transcription successful.");
                Ok(StageOutcome::Advanced)
            }
        }
    }
}
