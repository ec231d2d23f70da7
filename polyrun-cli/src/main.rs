use anyhow::{Context, Result};
use clap::Parser;
use polyrun_config::{ConfigLoader, PolyrunConfig};
use polyrun_execution::{
    CodeExecutor, CommandTemplate, ExecutionEngine, ExecutionRequest, ExecutionResult, LanguageKind,
    LanguageRegistry,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

mod cli;
mod stdio;
use cli::{Cli, Commands, ConfigCommands, SourceArgs};

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&PathBuf>) -> Result<PolyrunConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                info!("Loading configuration from: {:?}", path);
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                warn!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

fn build_engine(config: &PolyrunConfig) -> Result<ExecutionEngine> {
    ExecutionEngine::new(&config.execution).context("Failed to create execution engine")
}

fn read_source(source: &SourceArgs) -> Result<String> {
    match (&source.file, &source.code) {
        (Some(path), _) => fs::read_to_string(path).context(format!("Failed to read source file {:?}", path)),
        (None, Some(code)) => Ok(code.clone()),
        (None, None) => Err(anyhow::anyhow!("Either --file or --code is required")),
    }
}

/// Pick the language whose source extension matches `path`
fn infer_language(registry: &LanguageRegistry, path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    registry
        .languages()
        .iter()
        .find(|profile| profile.file_extension.as_deref() == Some(extension.as_str()))
        .map(|profile| profile.name.clone())
}

/// Print a failed result and exit non-zero
fn exit_with_failure(result: &ExecutionResult) -> ! {
    eprintln!("{}", result.error.as_deref().unwrap_or("Execution failed"));
    std::process::exit(1);
}

async fn handle_run(config: &PolyrunConfig, language: Option<&String>, source: &SourceArgs, json: bool) -> Result<()> {
    let engine = build_engine(config)?;
    let code = read_source(source)?;

    let language = language
        .cloned()
        .or_else(|| source.file.as_deref().and_then(|p| infer_language(engine.registry(), p)));
    debug!(
        "Running {} program",
        language.as_deref().unwrap_or(&config.execution.default_language)
    );

    let request = ExecutionRequest {
        code,
        language,
        ast: false,
    };
    let result = engine.execute(request).await;

    if json {
        let formatted = serde_json::to_string_pretty(&result).context("Failed to format result as JSON")?;
        println!("{}", formatted);
        if !result.success {
            std::process::exit(1);
        }
        return Ok(());
    }

    match &result.output {
        Some(output) if result.success => {
            println!("{}", output);
            Ok(())
        }
        _ => exit_with_failure(&result),
    }
}

async fn handle_ast(config: &PolyrunConfig, language: &str, source: &SourceArgs) -> Result<()> {
    let engine = build_engine(config)?;
    let code = read_source(source)?;

    let result = engine
        .execute(ExecutionRequest::new(language, code).with_ast(true))
        .await;

    match &result.ast {
        Some(ast) if result.success => {
            let formatted = serde_json::to_string_pretty(ast).context("Failed to format AST as JSON")?;
            println!("{}", formatted);
            Ok(())
        }
        _ => exit_with_failure(&result),
    }
}

async fn handle_stdio(config: &PolyrunConfig) -> Result<()> {
    let engine = build_engine(config)?;
    engine
        .health_check()
        .await
        .context("Execution engine is not healthy (POLYRUN_BRIDGE_SCRIPT sets the bridge script)")?;

    let executor: Arc<dyn CodeExecutor> = Arc::new(engine);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let handled = stdio::serve(executor, stdin, tokio::io::stdout()).await?;
    debug!("Served {} requests", handled);
    Ok(())
}

/// The unrendered command, placeholders included
fn command_line(template: &CommandTemplate) -> String {
    std::iter::once(template.program())
        .chain(template.args().iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn handle_languages(config: &PolyrunConfig) -> Result<()> {
    let registry = LanguageRegistry::from_config(&config.execution).context("Failed to build language registry")?;

    println!(
        "{:<12} {:<16} {:<12} {:>8}  {}",
        "LANGUAGE", "ALIASES", "KIND", "TIMEOUT", "COMMAND"
    );
    for profile in registry.languages() {
        let kind = match &profile.kind {
            LanguageKind::Interpreted { .. } => "interpreted",
            LanguageKind::Compiled { .. } => "compiled",
            LanguageKind::ExternalBridge { .. } => "bridge",
        };
        let default_marker = if profile.name.eq_ignore_ascii_case(&config.execution.default_language) {
            " (default)"
        } else {
            ""
        };
        println!(
            "{:<12} {:<16} {:<12} {:>6}ms  {}{}",
            profile.name,
            profile.aliases.join(","),
            kind,
            profile.timeout_ms(),
            command_line(&profile.run),
            default_marker
        );
        if let Some(script) = profile.missing_bridge_script() {
            println!("{:<12} ⚠️  bridge script not found: {}", "", script.display());
        }
    }
    Ok(())
}

/// Handle configuration validation
fn handle_config_validate(config_file: &PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!("Configuration file not found: {:?}", config_file));
    }

    match load_config(Some(config_file)) {
        Ok(_config) => {
            println!("✅ Configuration file is valid");
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {:#}", e);
            error!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

/// Handle configuration generation
fn handle_config_generate(output: &PathBuf, force: bool) -> Result<()> {
    info!("Generating configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    fs::write(output, PolyrunConfig::generate_sample()).context("Failed to write configuration file")?;

    println!("✅ Configuration generated at: {:?}", output);
    println!("🔧 Validate with: polyrun config validate --config-file {:?}", output);
    Ok(())
}

/// Handle configuration display
fn handle_config_show(config_file: Option<&PathBuf>, format: &str) -> Result<()> {
    let config = load_config(config_file)?;
    let value = serde_json::to_value(&config).context("Failed to serialize config")?;

    match format.to_lowercase().as_str() {
        "yaml" | "yml" => {
            let yaml_output = serde_yaml::to_string(&value).context("Failed to serialize to YAML")?;
            println!("{}", yaml_output);
        }
        "json" => {
            let json_output = serde_json::to_string_pretty(&value).context("Failed to serialize to JSON")?;
            println!("{}", json_output);
        }
        _ => {
            return Err(anyhow::anyhow!(
                "Unknown output format: {}. Valid formats: yaml, json",
                format
            ));
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first
    let config = load_config(cli.config.as_ref())?;

    // Machine-readable commands keep stdout clean
    let quiet_stdout = cli.command.as_ref().is_some_and(Commands::wants_quiet_stdout);
    if quiet_stdout {
        polyrun_logging::init_stderr_logging(cli.log_level.as_deref())?;
    } else {
        polyrun_logging::init_logging_from_config(&config.logging, cli.log_level.as_deref())?;
    }

    debug!("polyrun CLI starting");

    match &cli.command {
        Some(Commands::Run { language, source, json }) => handle_run(&config, language.as_ref(), source, *json).await,
        Some(Commands::Ast { language, source }) => handle_ast(&config, language, source).await,
        Some(Commands::Stdio) => handle_stdio(&config).await,
        Some(Commands::Languages) => handle_languages(&config),
        Some(Commands::Config { config_cmd }) => match config_cmd {
            ConfigCommands::Validate { config_file } => handle_config_validate(config_file),
            ConfigCommands::Generate { output, force } => handle_config_generate(output, *force),
            ConfigCommands::Show { config_file, format } => handle_config_show(config_file.as_ref(), format),
        },
        None => {
            // If no subcommand is provided, print help
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyrun_config::ExecutionConfig;

    #[test]
    fn test_infer_language_from_extension() {
        let registry = LanguageRegistry::from_config(&ExecutionConfig::default()).unwrap();
        assert_eq!(infer_language(&registry, Path::new("hello.CPP")).as_deref(), Some("cpp"));
        assert_eq!(infer_language(&registry, Path::new("src/Main.java")).as_deref(), Some("java"));
        assert_eq!(infer_language(&registry, Path::new("script.rb")), None);
        assert_eq!(infer_language(&registry, Path::new("Makefile")), None);
    }

    #[test]
    fn test_command_line_keeps_placeholders() {
        let registry = LanguageRegistry::from_config(&ExecutionConfig::default()).unwrap();
        assert_eq!(command_line(&registry.resolve("python").unwrap().run), "python3 -c {code}");
        assert_eq!(command_line(&registry.resolve("java").unwrap().run), "python3 {script}");
        assert_eq!(command_line(&registry.resolve("c").unwrap().run), "{artifact}");
    }

    #[test]
    fn test_read_source_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.py");
        fs::write(&path, "print('hello')").unwrap();

        let source = SourceArgs {
            file: Some(path),
            code: None,
        };
        assert_eq!(read_source(&source).unwrap(), "print('hello')");

        let source = SourceArgs {
            file: None,
            code: Some("print(2)".to_string()),
        };
        assert_eq!(read_source(&source).unwrap(), "print(2)");
    }

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs/polyrun.yaml");

        handle_config_generate(&path, false).unwrap();
        assert!(handle_config_generate(&path, false).is_err());
        handle_config_generate(&path, true).unwrap();

        let loaded = ConfigLoader::with_prefix("CLIGEN").from_file(&path).unwrap();
        assert_eq!(loaded.execution.languages.len(), 5);
    }
}
