use anyhow::Result;
use polyrun_config::{LogFormat, LogOutput, LoggingConfig};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Build an env filter from a level or directive string, falling back to
/// `RUST_LOG` and then `info`
pub fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging from configuration
///
/// `level_override` (typically the `--log-level` flag) takes precedence over
/// the configured level.
pub fn init_logging_from_config(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let level = level_override
        .map(str::to_string)
        .unwrap_or_else(|| config.level.to_string());
    let env_filter = build_env_filter(&level);

    let writer = make_writer(config.output);
    let base = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(config.include_target)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Text => base.with_ansi(config.output == LogOutput::Stdout).boxed(),
    };

    // Use try_init to avoid panic if global subscriber already set
    if tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize stderr-only logging, keeping stdout free for protocol output
///
/// Defaults to `error` so that only failures reach the terminal.
pub fn init_stderr_logging(log_level: Option<&str>) -> Result<()> {
    let env_filter = build_env_filter(log_level.unwrap_or("error"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

fn make_writer(output: LogOutput) -> BoxMakeWriter {
    match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
    }
}
