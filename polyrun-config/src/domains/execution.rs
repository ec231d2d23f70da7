//! Code execution configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::domains::languages::LanguageConfig;
use crate::error::ConfigResult;
use crate::validation::{validate_enum_choice, validate_positive, validate_required_string, Validatable};

/// Code execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Directory under which per-execution workspaces are created.
    /// Defaults to `<system temp>/polyrun`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,

    /// Language used when a request does not name one
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Wall-clock limit for compiler invocations
    #[serde(default = "default_compile_timeout_ms")]
    pub compile_timeout_ms: u64,

    /// Output reported when a successful program prints nothing
    #[serde(default = "default_empty_output_message")]
    pub empty_output_message: String,

    /// Supported languages
    #[serde(default = "LanguageConfig::defaults")]
    pub languages: Vec<LanguageConfig>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            default_language: default_language(),
            compile_timeout_ms: default_compile_timeout_ms(),
            empty_output_message: default_empty_output_message(),
            languages: LanguageConfig::defaults(),
        }
    }
}

impl ExecutionConfig {
    /// Resolved scratch directory
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("polyrun"))
    }
}

impl Validatable for ExecutionConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.compile_timeout_ms, "compile_timeout_ms", self.domain_name())?;
        validate_required_string(&self.empty_output_message, "empty_output_message", self.domain_name())?;

        if self.languages.is_empty() {
            return Err(self.validation_error("At least one language must be configured"));
        }

        let mut seen = HashSet::new();
        for language in &self.languages {
            language.validate()?;
            for id in language.identifiers() {
                if !seen.insert(id.to_lowercase()) {
                    return Err(self.validation_error(format!(
                        "language identifier '{}' is defined more than once",
                        id
                    )));
                }
            }
        }

        let identifiers: Vec<&str> = self.languages.iter().flat_map(|l| l.identifiers()).collect();
        validate_enum_choice(&self.default_language, &identifiers, "default_language", self.domain_name())?;

        if let Some(dir) = &self.scratch_dir {
            if dir.is_relative() {
                log::warn!("scratch_dir {:?} is relative to the working directory", dir);
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "execution"
    }
}

// Default value functions
fn default_language() -> String {
    "java".to_string()
}

fn default_compile_timeout_ms() -> u64 {
    10_000
}

fn default_empty_output_message() -> String {
    "Program executed successfully (no output)".to_string()
}
