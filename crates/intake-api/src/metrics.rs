//! Prometheus registry for workflow runs, served on `/metrics`.
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Label values of `intake_workflow_runs_total`
pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_ERROR: &str = "error";
pub const OUTCOME_FAULT: &str = "fault";
pub const OUTCOME_UNAVAILABLE: &str = "unavailable";

pub struct Metrics {
    registry: Registry,
    runs: IntCounterVec,
    duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let runs = IntCounterVec::new(
            Opts::new("intake_workflow_runs_total", "Workflow invocations by outcome"),
            &["outcome"],
        )?;
        let duration = Histogram::with_opts(HistogramOpts::new(
            "intake_workflow_duration_seconds",
            "Wall-clock time of one workflow invocation",
        ))?;

        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            runs,
            duration,
        })
    }

    pub fn record_run(&self, outcome: &str, seconds: f64) {
        self.runs.with_label_values(&[outcome]).inc();
        self.duration.observe(seconds);
    }

    pub fn record_unavailable(&self) {
        self.runs.with_label_values(&[OUTCOME_UNAVAILABLE]).inc();
    }

    pub fn runs(&self, outcome: &str) -> u64 {
        self.runs.with_label_values(&[outcome]).get()
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_run(OUTCOME_SUCCESS, 0.2);
        metrics.record_run(OUTCOME_ERROR, 0.1);

        let text = metrics.encode().unwrap();
        assert!(text.contains("intake_workflow_runs_total{outcome=\"success\"} 1"));
        assert!(text.contains("intake_workflow_duration_seconds_count 2"));
        assert_eq!(metrics.runs(OUTCOME_ERROR), 1);
    }
}
