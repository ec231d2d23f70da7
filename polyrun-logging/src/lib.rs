//! Logging setup for polyrun
//!
//! Installs a global `tracing` subscriber configured from
//! [`polyrun_config::LoggingConfig`]. Library crates only emit events through
//! the `tracing` macros; binaries call one of the init functions once.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_stderr_logging};
