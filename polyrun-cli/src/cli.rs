//! CLI argument parsing definitions

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where the source code comes from
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "code"])))]
pub struct SourceArgs {
    /// Read the source code from a file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Source code given inline
    #[arg(long, value_name = "CODE")]
    pub code: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile (if needed) and run a program, printing its output
    Run {
        /// Language identifier; inferred from the file extension or the
        /// configured default when omitted
        #[arg(long, short, value_name = "LANGUAGE")]
        language: Option<String>,

        #[command(flatten)]
        source: SourceArgs,

        /// Print the full JSON response instead of the output
        #[arg(long)]
        json: bool,
    },

    /// Print the syntax tree of a program produced by the language's bridge
    Ast {
        /// Language identifier
        #[arg(long, short, value_name = "LANGUAGE", default_value = "java")]
        language: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Serve newline-delimited JSON requests on stdin, one response line per request
    Stdio,

    /// List the supported languages
    Languages,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration in use
    Show {
        /// Path to configuration file (optional, uses default loading logic)
        #[arg(long, value_name = "PATH")]
        config_file: Option<PathBuf>,

        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}

impl Commands {
    /// Commands whose stdout carries program or machine-readable output and
    /// must not carry log lines
    pub fn wants_quiet_stdout(&self) -> bool {
        match self {
            Commands::Run { .. } | Commands::Ast { .. } | Commands::Stdio => true,
            Commands::Config {
                config_cmd: ConfigCommands::Show { .. },
            } => true,
            _ => false,
        }
    }
}
