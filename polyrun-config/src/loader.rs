//! Configuration loading and environment variable handling

use crate::domains::languages::LanguageStrategy;
use crate::domains::PolyrunConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "POLYRUN".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML (or `.json`) file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<PolyrunConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let mut config: PolyrunConfig = if is_json {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        if let Some(base) = path.parent() {
            resolve_bridge_scripts(&mut config, base);
        }
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Parse a YAML document, then apply environment overrides and validate
    pub fn from_yaml_str(&self, content: &str) -> ConfigResult<PolyrunConfig> {
        let mut config: PolyrunConfig = serde_yaml::from_str(content)?;
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<PolyrunConfig> {
        let mut config = PolyrunConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<PolyrunConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut PolyrunConfig) -> ConfigResult<()> {
        self.apply_execution_overrides(&mut config.execution)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply execution config overrides
    fn apply_execution_overrides(
        &self,
        config: &mut crate::domains::execution::ExecutionConfig,
    ) -> ConfigResult<()> {
        if let Ok(dir) = self.get_env_var("SCRATCH_DIR") {
            config.scratch_dir = Some(PathBuf::from(dir));
        }

        if let Ok(language) = self.get_env_var("DEFAULT_LANGUAGE") {
            config.default_language = language;
        }

        if let Ok(timeout) = self.get_env_var("COMPILE_TIMEOUT_MS") {
            config.compile_timeout_ms = timeout.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid COMPILE_TIMEOUT_MS: {}", e))
            })?;
        }

        if let Ok(timeout) = self.get_env_var("RUN_TIMEOUT_MS") {
            let timeout_ms: u64 = timeout
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid RUN_TIMEOUT_MS: {}", e)))?;
            for language in &mut config.languages {
                language.timeout_ms = timeout_ms;
            }
        }

        if let Ok(path) = self.get_env_var("BRIDGE_SCRIPT") {
            for language in &mut config.languages {
                if let LanguageStrategy::Bridge { script, .. } = &mut language.strategy {
                    *script = Some(PathBuf::from(&path));
                }
            }
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        use crate::domains::logging::{LogFormat, LogLevel};

        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

/// Make relative bridge scripts relative to the directory holding the config file
fn resolve_bridge_scripts(config: &mut PolyrunConfig, base: &Path) {
    for language in &mut config.execution.languages {
        if let LanguageStrategy::Bridge {
            script: Some(script), ..
        } = &mut language.strategy
        {
            if script.is_relative() {
                *script = base.join(&*script);
            }
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
