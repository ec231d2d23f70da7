//! Request and response shapes, and normalization of stage outcomes

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ExecutionError;

/// A request to run (or parse) a piece of source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,

    /// Language identifier; the engine's default language when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Request a syntax tree instead of program output
    #[serde(default)]
    pub ast: bool,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: Some(language.into()),
            ast: false,
        }
    }

    pub fn with_ast(mut self, ast: bool) -> Self {
        self.ast = ast;
        self
    }
}

/// What a successful stage produced
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Text(String),
    Ast(JsonValue),
}

/// The uniform response for every execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast: Option<JsonValue>,
}

impl ExecutionResult {
    pub fn output(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            ast: None,
        }
    }

    pub fn ast(ast: JsonValue) -> Self {
        Self {
            success: true,
            output: None,
            error: None,
            ast: Some(ast),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            ast: None,
        }
    }

    /// Assemble the response for a finished pipeline
    ///
    /// Empty text output is replaced with `empty_output_message`.
    pub fn from_outcome(outcome: Result<StageOutput, ExecutionError>, empty_output_message: &str) -> Self {
        match outcome {
            Ok(StageOutput::Text(text)) if text.is_empty() => Self::output(empty_output_message),
            Ok(StageOutput::Text(text)) => Self::output(text),
            Ok(StageOutput::Ast(tree)) => Self::ast(tree),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}
