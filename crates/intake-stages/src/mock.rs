//! Reference collaborators with marker-triggered failures.
//!
//! Each one fails while its marker appears in the text it inspects, which
//! makes retry and escalation paths reproducible from the request alone:
//!
//! | Collaborator | Inspects | Marker |
//! |--------------|----------|--------|
//! | [`MarkerTranscriber`] | original input | `fail_transcription` |
//! | [`MarkerAnalyzer`] | transcription | `fail_analysis` |
//! | [`MarkerTicketSink`] | analysis summary | `fail_ticket` |
use std::time::Duration;

use chrono::{DateTime, Utc};
use intake_core::context::input_text;
use intake_core::{AnalysisOutput, Analyzer, Attempt, TicketSink, Transcriber, WorkFault};
use serde_json::Value;

pub const TRANSCRIPTION_FAILURE_MARKER: &str = "fail_transcription";
pub const ANALYSIS_FAILURE_MARKER: &str = "fail_analysis";
pub const TICKET_FAILURE_MARKER: &str = "fail_ticket";

/// Characters of the transcription kept in the mock summary
const SUMMARY_PREVIEW_CHARS: usize = 120;

fn simulate_work(latency: Duration) {
    if !latency.is_zero() {
        std::thread::sleep(latency);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkerTranscriber {
    latency: Duration,
}

impl MarkerTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Transcriber for MarkerTranscriber {
    fn transcribe(&self, input: &Value, _tenant_id: &str) -> Result<Attempt<String>, WorkFault> {
        simulate_work(self.latency);

        let text = input_text(input);
        if text.contains(TRANSCRIPTION_FAILURE_MARKER) {
            return Ok(Attempt::Failed("Mock transcription failed.".to_string()));
        }
        Ok(Attempt::Succeeded(format!(
            "This is a mock transcription for input: {}",
            text
        )))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkerAnalyzer {
    latency: Duration,
}

impl MarkerAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Analyzer for MarkerAnalyzer {
    fn analyze(
        &self,
        transcription: &str,
        _tenant_id: &str,
    ) -> Result<Attempt<AnalysisOutput>, WorkFault> {
        simulate_work(self.latency);

        if transcription.contains(ANALYSIS_FAILURE_MARKER) {
            return Ok(Attempt::Failed("Mock analysis failed.".to_string()));
        }

        let preview: String = transcription.chars().take(SUMMARY_PREVIEW_CHARS).collect();
        Ok(Attempt::Succeeded(AnalysisOutput {
            sentiment: "positive".to_string(),
            entities: vec!["mock_entity_1".to_string(), "mock_entity_2".to_string()],
            summary: format!("Mock summary of: {}...", preview),
        }))
    }
}

/// Issues `TICKET_<tenant>_<unix seconds>` identifiers.
#[derive(Debug, Clone)]
pub struct MarkerTicketSink {
    latency: Duration,
    clock: fn() -> DateTime<Utc>,
}

impl Default for MarkerTicketSink {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            clock: Utc::now,
        }
    }
}

impl MarkerTicketSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }
}

impl TicketSink for MarkerTicketSink {
    fn create_ticket(
        &self,
        analysis: &AnalysisOutput,
        tenant_id: &str,
    ) -> Result<Attempt<String>, WorkFault> {
        simulate_work(self.latency);

        if analysis.summary.contains(TICKET_FAILURE_MARKER) {
            return Ok(Attempt::Failed("Mock ticket creation failed.".to_string()));
        }
        let issued_at = (self.clock)().timestamp();
        Ok(Attempt::Succeeded(format!("TICKET_{}_{}", tenant_id, issued_at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transcriber_renders_structured_input() {
        let attempt = MarkerTranscriber::new()
            .transcribe(&json!({ "audio": "call.wav" }), "t1")
            .unwrap();
        assert_eq!(
            attempt,
            Attempt::Succeeded(
                "This is a mock transcription for input: {\"audio\":\"call.wav\"}".to_string()
            )
        );
    }

    #[test]
    fn test_marker_inside_structured_input() {
        let attempt = MarkerTranscriber::new()
            .transcribe(&json!({ "note": "fail_transcription" }), "t1")
            .unwrap();
        assert!(attempt.is_failed());
    }

    #[test]
    fn test_summary_keeps_ticket_marker_reachable() {
        let transcription = "This is a mock transcription for input: fail_ticket";
        let Attempt::Succeeded(output) = MarkerAnalyzer::new().analyze(transcription, "t1").unwrap()
        else {
            panic!("analysis should succeed");
        };
        assert!(output.summary.contains(TICKET_FAILURE_MARKER));

        let attempt = MarkerTicketSink::new().create_ticket(&output, "t1").unwrap();
        assert!(attempt.is_failed());
    }

    #[test]
    fn test_ticket_id_format() {
        let analysis = AnalysisOutput {
            sentiment: "neutral".to_string(),
            entities: vec![],
            summary: "ok".to_string(),
        };
        let attempt = MarkerTicketSink::new()
            .create_ticket(&analysis, "acme")
            .unwrap();
        let Attempt::Succeeded(id) = attempt else {
            panic!("ticket creation should succeed");
        };
        let suffix = id.strip_prefix("TICKET_acme_").unwrap();
        assert!(suffix.parse::<i64>().unwrap() > 0);
    }
}
