//! External bridge: hands source to a dedicated interpreter/parser process
//!
//! The bridge reads the whole program on stdin. In plain mode it prints the
//! program's output; in AST mode (the profile's flag appended) it prints a
//! JSON syntax tree. Anything on stderr, or a non-zero exit, is a failure.

use std::path::Path;
use tracing::debug;

use crate::error::{ExecutionError, Stage};
use crate::process::run_process;
use crate::profile::{LanguageKind, LanguageProfile, TemplateContext};
use crate::result::StageOutput;

/// What the bridge process is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// Interpret the program and return its output
    Interpret,
    /// Return the program's syntax tree as JSON
    Ast,
}

pub async fn run_bridge(
    profile: &LanguageProfile,
    code: &str,
    mode: BridgeMode,
) -> Result<StageOutput, ExecutionError> {
    let LanguageKind::ExternalBridge { ast_flag, script } = &profile.kind else {
        return Err(ExecutionError::ConfigurationError(format!(
            "language '{}' has no external bridge",
            profile.name
        )));
    };
    if let Some(missing) = profile.missing_bridge_script() {
        return Err(missing_script_error(profile, missing));
    }

    let mut spec = profile.run.render(&TemplateContext {
        script: script.as_deref(),
        ..Default::default()
    });
    if mode == BridgeMode::Ast {
        spec.args.push(ast_flag.clone());
    }
    spec.stdin = Some(code.to_string());

    debug!("Bridge {} running in {:?} mode", profile.name, mode);
    let outcome = run_process(spec, profile.timeout).await?;

    if outcome.timed_out {
        return Err(ExecutionError::TimeoutError {
            stage: Stage::Bridge,
            timeout_ms: profile.timeout_ms(),
        });
    }
    if !outcome.success() || !outcome.stderr.trim().is_empty() {
        let stderr = if outcome.stderr.trim().is_empty() {
            "failed".to_string()
        } else {
            outcome.stderr
        };
        return Err(ExecutionError::ParserBridgeError { stderr });
    }

    let stdout = outcome.stdout.trim();
    match mode {
        BridgeMode::Interpret => Ok(StageOutput::Text(stdout.to_string())),
        BridgeMode::Ast => serde_json::from_str(stdout)
            .map(StageOutput::Ast)
            .map_err(|e| ExecutionError::MalformedAstError(e.to_string())),
    }
}

pub(crate) fn missing_script_error(profile: &LanguageProfile, script: &Path) -> ExecutionError {
    ExecutionError::ConfigurationError(format!(
        "bridge script for '{}' not found: {}",
        profile.name,
        script.display()
    ))
}
