//! Error types for code execution

use std::fmt;
use thiserror::Error;

/// Pipeline stage that hit a limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Run,
    Bridge,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Compile => f.write_str("Compilation"),
            Stage::Run => f.write_str("Execution"),
            Stage::Bridge => f.write_str("Parser bridge"),
        }
    }
}

/// Code execution errors
///
/// Compiler, runtime and bridge diagnostics are rendered verbatim so callers
/// can show the exact tool output.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{diagnostics}")]
    CompileError { diagnostics: String },

    #[error("{}", runtime_message(.exit_code, .stderr))]
    RuntimeError { exit_code: Option<i32>, stderr: String },

    #[error("{stage} timed out after {timeout_ms}ms")]
    TimeoutError { stage: Stage, timeout_ms: u64 },

    #[error("Workspace error: {0}")]
    WorkspaceError(String),

    #[error("Failed to start '{program}': {message}")]
    SpawnError { program: String, message: String },

    #[error("Process I/O error: {0}")]
    ProcessIo(String),

    #[error("{stderr}")]
    ParserBridgeError { stderr: String },

    #[error("Parser returned malformed AST: {0}")]
    MalformedAstError(String),

    #[error("AST mode is not supported for language: {0}")]
    AstUnsupported(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl ExecutionError {
    /// Whether the failure was caused by the submitted code rather than by
    /// the engine or its environment
    pub fn is_program_failure(&self) -> bool {
        matches!(
            self,
            ExecutionError::CompileError { .. }
                | ExecutionError::RuntimeError { .. }
                | ExecutionError::TimeoutError { .. }
                | ExecutionError::ParserBridgeError { .. }
                | ExecutionError::MalformedAstError(_)
        )
    }
}

fn runtime_message(exit_code: &Option<i32>, stderr: &str) -> String {
    if !stderr.trim().is_empty() {
        return stderr.to_string();
    }
    match exit_code {
        Some(code) => format!("Process exited with code {}", code),
        None => "Process terminated by signal".to_string(),
    }
}

// Convert from config errors
impl From<polyrun_config::ConfigError> for ExecutionError {
    fn from(err: polyrun_config::ConfigError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_are_verbatim() {
        let err = ExecutionError::CompileError {
            diagnostics: "main.cpp:1:1: error: expected unqualified-id\n".to_string(),
        };
        assert_eq!(err.to_string(), "main.cpp:1:1: error: expected unqualified-id\n");

        let err = ExecutionError::ParserBridgeError {
            stderr: "Unexpected token".to_string(),
        };
        assert_eq!(err.to_string(), "Unexpected token");
    }

    #[test]
    fn test_runtime_message_fallbacks() {
        let err = ExecutionError::RuntimeError {
            exit_code: Some(3),
            stderr: "  \n".to_string(),
        };
        assert_eq!(err.to_string(), "Process exited with code 3");

        let err = ExecutionError::RuntimeError {
            exit_code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "Process terminated by signal");

        let err = ExecutionError::RuntimeError {
            exit_code: Some(1),
            stderr: "Traceback (most recent call last):".to_string(),
        };
        assert_eq!(err.to_string(), "Traceback (most recent call last):");
    }

    #[test]
    fn test_timeout_message() {
        let err = ExecutionError::TimeoutError {
            stage: Stage::Run,
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "Execution timed out after 5000ms");
        assert!(err.is_program_failure());
        assert!(!ExecutionError::UnsupportedLanguage("cobol".into()).is_program_failure());
    }
}
