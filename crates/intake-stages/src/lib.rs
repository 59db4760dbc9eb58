//! Intake Stages: the concrete steps of the intake workflow.
//!
//! The stages own the retry bookkeeping and delegate the actual work to
//! collaborators (`Transcriber`, `Analyzer`, `TicketSink`). The marker-based
//! collaborators in [`mock`] are the defaults; real integrations replace them
//! through [`EngineBuilder`].
//!
//! # Pipeline Flow
//!
//! ```text
//! Input → Transcription → Analysis → TicketCreation → End
//!              ↓              ↓             ↓
//!              └──────────────┴─────────────┴──→ ErrorHandler → End
//! ```

mod analysis;
mod error_handler;
pub mod mock;
mod retry;
mod ticket_creation;
mod transcription;

pub use analysis::AnalysisStage;
pub use error_handler::{consolidate_error, ErrorHandlerStage, UNSPECIFIED_ERROR_MESSAGE};
pub use ticket_creation::TicketCreationStage;
pub use transcription::TranscriptionStage;

use intake_core::{
    Analyzer, EngineError, PipelineConfig, PipelineEngine, Stage, TicketSink, Transcriber,
};
use mock::{MarkerAnalyzer, MarkerTicketSink, MarkerTranscriber};

/// Wires the four stages around the given collaborators.
///
/// Retry budgets come from `config`, so stage gates and policy gates agree.
pub struct EngineBuilder {
    config: PipelineConfig,
    transcriber: Box<dyn Transcriber>,
    analyzer: Box<dyn Analyzer>,
    ticket_sink: Box<dyn TicketSink>,
}

impl EngineBuilder {
    /// Starts from the marker collaborators, with latency taken from `config`.
    pub fn new(config: PipelineConfig) -> Self {
        let transcriber =
            MarkerTranscriber::new().with_latency(config.transcription.simulated_latency());
        let analyzer = MarkerAnalyzer::new().with_latency(config.analysis.simulated_latency());
        let ticket_sink =
            MarkerTicketSink::new().with_latency(config.ticket_creation.simulated_latency());

        Self {
            config,
            transcriber: Box::new(transcriber),
            analyzer: Box::new(analyzer),
            ticket_sink: Box::new(ticket_sink),
        }
    }

    pub fn transcriber(mut self, transcriber: impl Transcriber + 'static) -> Self {
        self.transcriber = Box::new(transcriber);
        self
    }

    pub fn analyzer(mut self, analyzer: impl Analyzer + 'static) -> Self {
        self.analyzer = Box::new(analyzer);
        self
    }

    pub fn ticket_sink(mut self, ticket_sink: impl TicketSink + 'static) -> Self {
        self.ticket_sink = Box::new(ticket_sink);
        self
    }

    pub fn stages(self) -> Vec<Box<dyn Stage>> {
        let config = self.config;
        vec![
            Box::new(TranscriptionStage {
                transcriber: self.transcriber,
                retry_budget: config.transcription.retry_budget,
            }),
            Box::new(AnalysisStage {
                analyzer: self.analyzer,
                retry_budget: config.analysis.retry_budget,
            }),
            Box::new(TicketCreationStage {
                sink: self.ticket_sink,
                retry_budget: config.ticket_creation.retry_budget,
            }),
            Box::new(ErrorHandlerStage::new(config)),
        ]
    }

    pub fn build(self) -> Result<PipelineEngine, EngineError> {
        let config = self.config.clone();
        PipelineEngine::new(self.stages(), config)
    }
}

/// The default stages in the order `transcription → analysis → ticket → error handler`.
pub fn default_stages(config: &PipelineConfig) -> Vec<Box<dyn Stage>> {
    EngineBuilder::new(config.clone()).stages()
}

/// Engine over the marker collaborators.
pub fn default_engine(config: PipelineConfig) -> Result<PipelineEngine, EngineError> {
    EngineBuilder::new(config).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::{RunRequest, StageName};
    use serde_json::json;

    #[test]
    fn test_default_stages_cover_the_graph() {
        let names: Vec<StageName> = default_stages(&PipelineConfig::default())
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, StageName::EXECUTABLE.to_vec());
    }

    #[test]
    fn test_default_engine_runs() {
        let engine = default_engine(PipelineConfig::default()).unwrap();
        let report = engine.run(RunRequest::new(json!("hello")).for_tenant("t1")).unwrap();
        assert!(report.is_successful());
    }
}
