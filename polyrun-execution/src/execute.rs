//! Execute stage: runs an interpreter or a compiled artifact

use tracing::debug;

use crate::error::{ExecutionError, Stage};
use crate::process::run_process;
use crate::profile::{LanguageKind, LanguageProfile, TemplateContext};
use crate::workspace::Workspace;
use polyrun_config::SourceDelivery;

/// Run the program held in `workspace` and return its trimmed stdout
///
/// The process runs with the workspace as its working directory and the
/// profile's timeout.
pub async fn execute(profile: &LanguageProfile, workspace: &Workspace, code: &str) -> Result<String, ExecutionError> {
    let mut spec = profile.run.render(&TemplateContext {
        source: Some(workspace.source_path()),
        artifact: workspace.artifact_path(),
        workspace: Some(workspace.root()),
        script: None,
        code: Some(code),
    });
    if let LanguageKind::Interpreted {
        delivery: SourceDelivery::Stdin,
    } = profile.kind
    {
        spec.stdin = Some(code.to_string());
    }

    debug!("Running {} in workspace {}", profile.name, workspace.id());
    let outcome = run_process(spec, profile.timeout).await?;

    if outcome.timed_out {
        return Err(ExecutionError::TimeoutError {
            stage: Stage::Run,
            timeout_ms: profile.timeout_ms(),
        });
    }
    if !outcome.success() {
        return Err(ExecutionError::RuntimeError {
            exit_code: outcome.exit_code,
            stderr: outcome.stderr,
        });
    }

    debug!("{} finished in {:?}", profile.name, outcome.duration);
    Ok(outcome.stdout.trim().to_string())
}
