//! Compile stage for compiled languages

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::{ExecutionError, Stage};
use crate::process::{run_process, ProcessOutcome};
use crate::profile::{LanguageKind, LanguageProfile, TemplateContext};
use crate::workspace::Workspace;

/// Compile the workspace source into its reserved artifact path
///
/// Any output on stderr fails the compilation, warnings included.
pub async fn compile(
    profile: &LanguageProfile,
    workspace: &Workspace,
    timeout: Duration,
) -> Result<PathBuf, ExecutionError> {
    let LanguageKind::Compiled { compile } = &profile.kind else {
        return Err(ExecutionError::ConfigurationError(format!(
            "language '{}' is not compiled",
            profile.name
        )));
    };
    let artifact = workspace
        .artifact_path()
        .ok_or_else(|| ExecutionError::WorkspaceError(format!("workspace {} has no artifact path", workspace.id())))?;

    let spec = compile.render(&TemplateContext {
        source: Some(workspace.source_path()),
        artifact: Some(artifact),
        workspace: Some(workspace.root()),
        script: None,
        code: None,
    });

    debug!("Compiling {} in workspace {}", profile.name, workspace.id());
    let outcome = run_process(spec, timeout).await?;

    if outcome.timed_out {
        return Err(ExecutionError::TimeoutError {
            stage: Stage::Compile,
            timeout_ms: timeout.as_millis() as u64,
        });
    }
    if !outcome.success() || !outcome.stderr.trim().is_empty() {
        return Err(ExecutionError::CompileError {
            diagnostics: diagnostics(&outcome),
        });
    }

    debug!("Compiled {} in {:?}", profile.name, outcome.duration);
    Ok(artifact.to_path_buf())
}

fn diagnostics(outcome: &ProcessOutcome) -> String {
    if !outcome.stderr.trim().is_empty() {
        outcome.stderr.clone()
    } else if !outcome.stdout.trim().is_empty() {
        outcome.stdout.clone()
    } else {
        match outcome.exit_code {
            Some(code) => format!("Compiler exited with code {}", code),
            None => "Compiler terminated by signal".to_string(),
        }
    }
}
