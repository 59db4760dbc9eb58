//! Pipeline configuration: per-stage retry budgets and simulated latency
//!
//! Loaded from YAML; every field is optional and falls back to the defaults
//! below.
//!
//! ```yaml
//! transcription:
//!   retry_budget: 3
//!   simulated_latency_ms: 1000
//! ticket_creation:
//!   retry_budget: 1
//! ```
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::stage::PipelineStage;

pub const DEFAULT_RETRY_BUDGET: u32 = 2;
pub const MAX_RETRY_BUDGET: u32 = 100;
pub const MAX_SIMULATED_LATENCY_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageSettings {
    /// Maximum failed attempts before the stage fails permanently
    pub retry_budget: u32,
    /// Fixed delay the reference collaborators sleep per attempt
    pub simulated_latency_ms: u64,
}

impl StageSettings {
    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            simulated_latency_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub transcription: StageSettings,
    pub analysis: StageSettings,
    pub ticket_creation: StageSettings,
}

impl PipelineConfig {
    /// Same retry budget for every stage
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        for stage in PipelineStage::ALL {
            self.settings_mut(stage).retry_budget = budget;
        }
        self
    }

    pub fn with_stage(mut self, stage: PipelineStage, settings: StageSettings) -> Self {
        *self.settings_mut(stage) = settings;
        self
    }

    pub fn settings(&self, stage: PipelineStage) -> &StageSettings {
        match stage {
            PipelineStage::Transcription => &self.transcription,
            PipelineStage::Analysis => &self.analysis,
            PipelineStage::TicketCreation => &self.ticket_creation,
        }
    }

    pub fn budget(&self, stage: PipelineStage) -> u32 {
        self.settings(stage).retry_budget
    }

    /// Upper bound on stage executions in one run.
    ///
    /// Each work stage can be entered at most `budget + 1` times, and the
    /// error handler once.
    pub fn step_limit(&self) -> usize {
        PipelineStage::ALL
            .iter()
            .map(|s| self.budget(*s) as usize + 1)
            .sum::<usize>()
            + 1
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for stage in PipelineStage::ALL {
            let settings = self.settings(stage);
            if settings.retry_budget > MAX_RETRY_BUDGET {
                return Err(ConfigError::Invalid(format!(
                    "{} retry_budget {} exceeds maximum {}",
                    stage, settings.retry_budget, MAX_RETRY_BUDGET
                )));
            }
            if settings.simulated_latency_ms > MAX_SIMULATED_LATENCY_MS {
                return Err(ConfigError::Invalid(format!(
                    "{} simulated_latency_ms {} exceeds maximum {}",
                    stage, settings.simulated_latency_ms, MAX_SIMULATED_LATENCY_MS
                )));
            }
        }
        Ok(())
    }

    fn settings_mut(&mut self, stage: PipelineStage) -> &mut StageSettings {
        match stage {
            PipelineStage::Transcription => &mut self.transcription,
            PipelineStage::Analysis => &mut self.analysis,
            PipelineStage::TicketCreation => &mut self.ticket_creation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        for stage in PipelineStage::ALL {
            assert_eq!(config.budget(stage), DEFAULT_RETRY_BUDGET);
            assert_eq!(config.settings(stage).simulated_latency(), Duration::ZERO);
        }
        assert_eq!(config.step_limit(), 10);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "\
transcription:
  retry_budget: 3
  simulated_latency_ms: 1000
ticket_creation:
  retry_budget: 1
";
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.budget(PipelineStage::Transcription), 3);
        assert_eq!(config.transcription.simulated_latency_ms, 1000);
        assert_eq!(config.budget(PipelineStage::Analysis), DEFAULT_RETRY_BUDGET);
        assert_eq!(config.budget(PipelineStage::TicketCreation), 1);
    }

    #[test]
    fn test_unknown_yaml_key_rejected() {
        let err = PipelineConfig::from_yaml_str("transcription:\n  retries: 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_budget_over_limit_rejected() {
        let config = PipelineConfig::default().with_retry_budget(MAX_RETRY_BUDGET + 1);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_file("/nonexistent/intake.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/intake.yaml"));
    }
}
