//! Domain-specific configuration modules

pub mod execution;
pub mod languages;
pub mod logging;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main polyrun configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PolyrunConfig {
    /// Code execution configuration, including the language table
    #[serde(default)]
    pub execution: execution::ExecutionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl PolyrunConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.execution.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = PolyrunConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_round_trips_and_validates() {
        let sample = PolyrunConfig::generate_sample();
        assert!(sample.contains("execution:"));
        assert!(sample.contains("logging:"));

        let parsed: PolyrunConfig = serde_yaml::from_str(&sample).unwrap();
        assert!(parsed.validate_all().is_ok());
        assert_eq!(parsed.execution.languages.len(), 5);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let parsed: PolyrunConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(parsed.execution.default_language, "java");
        assert!(parsed.validate_all().is_ok());
    }
}
