//! Service configuration from the environment.
use std::path::PathBuf;

use intake_core::{ConfigError, PipelineConfig};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8787";
pub const ADDR_ENV: &str = "INTAKE_ADDR";
pub const CONFIG_PATH_ENV: &str = "INTAKE_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Listen address
    pub addr: String,
    /// Optional YAML pipeline configuration
    pub pipeline_config_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            pipeline_config_path: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            addr: get(ADDR_ENV).unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            pipeline_config_path: get(CONFIG_PATH_ENV).map(PathBuf::from),
        }
    }

    pub fn load_pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        match &self.pipeline_config_path {
            Some(path) => PipelineConfig::from_file(path),
            None => Ok(PipelineConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let config = ServiceConfig::from_lookup(|_| None);
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.load_pipeline_config().unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_values_from_lookup() {
        let env: HashMap<&str, &str> = [
            (ADDR_ENV, "127.0.0.1:9000"),
            (CONFIG_PATH_ENV, "/etc/intake/pipeline.yaml"),
        ]
        .into_iter()
        .collect();
        let config = ServiceConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(
            config.pipeline_config_path,
            Some(PathBuf::from("/etc/intake/pipeline.yaml"))
        );
    }

    #[test]
    fn test_blank_value_is_unset() {
        let config = ServiceConfig::from_lookup(|_| Some("  ".to_string()));
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert!(config.pipeline_config_path.is_none());
    }

    #[test]
    fn test_loads_pipeline_fixture() {
        let config = ServiceConfig {
            pipeline_config_path: Some(PathBuf::from(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../../testing/fixtures/pipeline.yaml"
            ))),
            ..ServiceConfig::default()
        };
        let pipeline = config.load_pipeline_config().unwrap();

        assert_eq!(pipeline.transcription.retry_budget, 1);
        assert_eq!(pipeline.analysis.retry_budget, 3);
        assert_eq!(pipeline.ticket_creation.retry_budget, 0);
        assert_eq!(pipeline.step_limit(), 8);
    }

    #[test]
    fn test_missing_pipeline_file_is_an_error() {
        let config = ServiceConfig {
            pipeline_config_path: Some(PathBuf::from("/nonexistent/pipeline.yaml")),
            ..ServiceConfig::default()
        };
        assert!(matches!(
            config.load_pipeline_config(),
            Err(ConfigError::Read { .. })
        ));
    }
}
