//! The execution engine and its executor trait

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use polyrun_config::ExecutionConfig;

use crate::bridge::{missing_script_error, run_bridge, BridgeMode};
use crate::compile::compile;
use crate::error::ExecutionError;
use crate::execute::execute;
use crate::profile::{LanguageProfile, LanguageRegistry};
use crate::result::{ExecutionRequest, ExecutionResult, StageOutput};
use crate::workspace::WorkspaceManager;

/// Code executor trait for different execution strategies
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Execute a request. Failures are reported inside the result.
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult;

    /// Check if executor is healthy
    async fn health_check(&self) -> Result<(), ExecutionError>;
}

/// Compiles and runs submitted code against a fixed language table
///
/// Holds no mutable state beyond the lazily created scratch directory, so a
/// single engine can be shared across tasks behind an `Arc`.
#[derive(Debug)]
pub struct ExecutionEngine {
    registry: LanguageRegistry,
    workspaces: WorkspaceManager,
    compile_timeout: Duration,
    default_language: String,
    empty_output_message: String,
}

impl ExecutionEngine {
    /// Create an engine from configuration
    pub fn new(config: &ExecutionConfig) -> Result<Self, ExecutionError> {
        let registry = LanguageRegistry::from_config(config)?;
        Self::from_registry(registry, config)
    }

    /// Create an engine around an already built registry
    pub fn from_registry(registry: LanguageRegistry, config: &ExecutionConfig) -> Result<Self, ExecutionError> {
        registry.resolve(&config.default_language).map_err(|_| {
            ExecutionError::ConfigurationError(format!(
                "default language '{}' is not registered",
                config.default_language
            ))
        })?;

        for profile in registry.languages() {
            if let Some(script) = profile.missing_bridge_script() {
                warn!("Bridge script for '{}' not found: {}", profile.name, script.display());
            }
        }

        debug!(
            "Execution engine ready with {} languages, scratch dir {}",
            registry.len(),
            config.scratch_dir().display()
        );

        Ok(Self {
            registry,
            workspaces: WorkspaceManager::new(config.scratch_dir()),
            compile_timeout: Duration::from_millis(config.compile_timeout_ms),
            default_language: config.default_language.clone(),
            empty_output_message: config.empty_output_message.clone(),
        })
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Run the pipeline for one request, returning the raw stage outcome
    pub async fn run(&self, request: &ExecutionRequest) -> Result<StageOutput, ExecutionError> {
        if request.code.trim().is_empty() {
            return Err(ExecutionError::InvalidRequest("code must not be empty".to_string()));
        }

        let language = request.language.as_deref().unwrap_or(&self.default_language);
        let profile = self.registry.resolve(language)?;

        if profile.is_bridge() {
            let mode = if request.ast {
                BridgeMode::Ast
            } else {
                BridgeMode::Interpret
            };
            return run_bridge(profile, &request.code, mode).await;
        }
        if request.ast {
            return Err(ExecutionError::AstUnsupported(profile.name.clone()));
        }

        self.run_in_workspace(profile, &request.code).await.map(StageOutput::Text)
    }

    async fn run_in_workspace(&self, profile: &LanguageProfile, code: &str) -> Result<String, ExecutionError> {
        let workspace = self.workspaces.allocate(profile, code).await?;
        let id = workspace.id();

        let outcome = async {
            if profile.requires_compilation() {
                compile(profile, &workspace, self.compile_timeout).await?;
                debug!("Workspace {}: compile succeeded", id);
            }
            execute(profile, &workspace, code).await
        }
        .await;

        match &outcome {
            Ok(_) => debug!("Workspace {}: succeeded", id),
            Err(e) if e.is_program_failure() => debug!("Workspace {}: program failed: {}", id, e),
            Err(e) => warn!("Workspace {}: engine failure: {}", id, e),
        }

        workspace.release().await;
        outcome
    }
}

#[async_trait]
impl CodeExecutor for ExecutionEngine {
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let outcome = self.run(&request).await;
        ExecutionResult::from_outcome(outcome, &self.empty_output_message)
    }

    /// The scratch directory must be creatable and every bridge script present
    async fn health_check(&self) -> Result<(), ExecutionError> {
        self.workspaces.ensure_scratch_dir().await?;
        for profile in self.registry.languages() {
            if let Some(script) = profile.missing_bridge_script() {
                return Err(missing_script_error(profile, script));
            }
        }
        Ok(())
    }
}
