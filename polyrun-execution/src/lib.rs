//! polyrun execution engine
//!
//! Takes arbitrary source text and a language identifier, compiles it when
//! the language requires it, runs it under a wall-clock timeout and reports a
//! uniform success/error result. Every execution owns a private workspace
//! directory that is removed on every exit path.

pub mod bridge;
pub mod compile;
pub mod error;
pub mod execute;
pub mod executor;
pub mod process;
pub mod profile;
pub mod result;
pub mod workspace;

// Re-export main types
pub use bridge::BridgeMode;
pub use error::{ExecutionError, Stage};
pub use executor::{CodeExecutor, ExecutionEngine};
pub use process::{run_process, ProcessOutcome, ProcessSpec};
pub use profile::{CommandTemplate, LanguageKind, LanguageProfile, LanguageRegistry, TemplateContext};
pub use result::{ExecutionRequest, ExecutionResult, StageOutput};
pub use workspace::{Workspace, WorkspaceManager};

pub use polyrun_config::SourceDelivery;
