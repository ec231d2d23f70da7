//! Domain-driven configuration for polyrun
//!
//! Configuration is split by functional domain (execution, languages,
//! logging), loaded from YAML with `POLYRUN_*` environment overrides and
//! validated before use.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    execution::ExecutionConfig,
    languages::{CommandConfig, LanguageConfig, LanguageStrategy, SourceDelivery},
    logging::{LogFormat, LogLevel, LogOutput, LoggingConfig},
    PolyrunConfig,
};
