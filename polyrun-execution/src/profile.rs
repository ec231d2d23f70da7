//! Language profiles and the registry that resolves them

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use polyrun_config::domains::languages::{
    ARTIFACT_PLACEHOLDER, CODE_PLACEHOLDER, SCRIPT_PLACEHOLDER, SOURCE_PLACEHOLDER, WORKSPACE_PLACEHOLDER,
};
use polyrun_config::{CommandConfig, ExecutionConfig, LanguageConfig, LanguageStrategy, SourceDelivery};

use crate::error::ExecutionError;
use crate::process::ProcessSpec;

/// A program plus argument template with `{source}`, `{artifact}`, `{code}`,
/// `{workspace}` and `{script}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

/// Values substituted into a [`CommandTemplate`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateContext<'a> {
    pub source: Option<&'a Path>,
    pub artifact: Option<&'a Path>,
    pub workspace: Option<&'a Path>,
    pub script: Option<&'a Path>,
    pub code: Option<&'a str>,
}

impl CommandTemplate {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Substitute placeholders, producing a process invocation without stdin
    pub fn render(&self, ctx: &TemplateContext<'_>) -> ProcessSpec {
        ProcessSpec {
            program: substitute(&self.program, ctx),
            args: self.args.iter().map(|arg| substitute(arg, ctx)).collect(),
            stdin: None,
            cwd: ctx.workspace.map(Path::to_path_buf),
        }
    }
}

impl From<&CommandConfig> for CommandTemplate {
    fn from(config: &CommandConfig) -> Self {
        Self::new(config.program.clone(), config.args.iter().cloned())
    }
}

// `{code}` is substituted last so that source text is never rescanned.
fn substitute(template: &str, ctx: &TemplateContext<'_>) -> String {
    let mut value = template.to_string();
    let paths = [
        (SOURCE_PLACEHOLDER, ctx.source),
        (ARTIFACT_PLACEHOLDER, ctx.artifact),
        (WORKSPACE_PLACEHOLDER, ctx.workspace),
        (SCRIPT_PLACEHOLDER, ctx.script),
    ];
    for (placeholder, path) in paths {
        if let Some(path) = path {
            value = value.replace(placeholder, &path.to_string_lossy());
        }
    }
    if let Some(code) = ctx.code {
        value = value.replace(CODE_PLACEHOLDER, code);
    }
    value
}

/// Execution strategy of a language
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageKind {
    /// Run directly by an interpreter
    Interpreted { delivery: SourceDelivery },
    /// Compiled into an artifact that is then executed
    Compiled { compile: CommandTemplate },
    /// Delegated to an external interpreter/AST process over stdin/stdout
    ExternalBridge { ast_flag: String, script: Option<PathBuf> },
}

/// Immutable description of how to compile, run or bridge one language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    pub name: String,
    pub aliases: Vec<String>,
    pub kind: LanguageKind,
    pub run: CommandTemplate,
    pub file_extension: Option<String>,
    pub timeout: Duration,
}

impl LanguageProfile {
    pub fn requires_compilation(&self) -> bool {
        matches!(self.kind, LanguageKind::Compiled { .. })
    }

    pub fn is_bridge(&self) -> bool {
        matches!(self.kind, LanguageKind::ExternalBridge { .. })
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// The bridge script, when one is configured but absent from disk
    pub fn missing_bridge_script(&self) -> Option<&Path> {
        match &self.kind {
            LanguageKind::ExternalBridge {
                script: Some(script), ..
            } if !script.is_file() => Some(script),
            _ => None,
        }
    }
}

impl From<&LanguageConfig> for LanguageProfile {
    fn from(config: &LanguageConfig) -> Self {
        let kind = match &config.strategy {
            LanguageStrategy::Interpreted { delivery } => LanguageKind::Interpreted { delivery: *delivery },
            LanguageStrategy::Compiled { compile } => LanguageKind::Compiled {
                compile: CommandTemplate::from(compile),
            },
            LanguageStrategy::Bridge { ast_flag, script } => LanguageKind::ExternalBridge {
                ast_flag: ast_flag.clone(),
                script: script.clone(),
            },
        };

        Self {
            name: config.name.to_lowercase(),
            aliases: config.aliases.iter().map(|a| a.to_lowercase()).collect(),
            kind,
            run: CommandTemplate::from(&config.run),
            file_extension: config.extension.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// Read-only table of supported languages, keyed case-insensitively by name
/// and alias
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    profiles: Vec<LanguageProfile>,
    index: HashMap<String, usize>,
}

impl LanguageRegistry {
    /// Build a registry, rejecting duplicate identifiers
    pub fn new(profiles: Vec<LanguageProfile>) -> Result<Self, ExecutionError> {
        let mut index = HashMap::new();
        for (position, profile) in profiles.iter().enumerate() {
            let identifiers = std::iter::once(&profile.name).chain(profile.aliases.iter());
            for id in identifiers {
                if index.insert(id.to_lowercase(), position).is_some() {
                    return Err(ExecutionError::ConfigurationError(format!(
                        "language identifier '{}' is registered more than once",
                        id
                    )));
                }
            }
        }
        Ok(Self { profiles, index })
    }

    /// Build the registry from the execution configuration's language table
    pub fn from_config(config: &ExecutionConfig) -> Result<Self, ExecutionError> {
        Self::new(config.languages.iter().map(LanguageProfile::from).collect())
    }

    /// Resolve a language identifier (case-insensitive exact match)
    pub fn resolve(&self, language: &str) -> Result<&LanguageProfile, ExecutionError> {
        self.index
            .get(&language.trim().to_lowercase())
            .map(|&position| &self.profiles[position])
            .ok_or_else(|| ExecutionError::UnsupportedLanguage(language.to_string()))
    }

    /// Registered profiles, in configuration order
    pub fn languages(&self) -> &[LanguageProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn default_registry() -> LanguageRegistry {
        LanguageRegistry::from_config(&ExecutionConfig::default()).unwrap()
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = default_registry();
        assert_eq!(registry.resolve("Python").unwrap().name, "python");
        assert_eq!(registry.resolve("JAVA").unwrap().name, "java");
        assert_eq!(registry.resolve("c++").unwrap().name, "cpp");
        assert_eq!(registry.resolve("js").unwrap().name, "javascript");
    }

    #[test]
    fn test_resolve_unknown_language() {
        let registry = default_registry();
        match registry.resolve("brainfuck") {
            Err(ExecutionError::UnsupportedLanguage(name)) => assert_eq!(name, "brainfuck"),
            other => panic!("expected UnsupportedLanguage, got {:?}", other),
        }
        assert!(registry.resolve("").is_err());
        assert!(registry.resolve("pyth").is_err());
    }

    #[test]
    fn test_default_kinds() {
        let registry = default_registry();
        assert_eq!(registry.len(), 5);
        assert!(registry.resolve("java").unwrap().is_bridge());
        assert!(registry.resolve("c").unwrap().requires_compilation());
        assert_eq!(
            registry.resolve("javascript").unwrap().kind,
            LanguageKind::Interpreted { delivery: SourceDelivery::Stdin }
        );
        assert_eq!(registry.resolve("python").unwrap().timeout_ms(), 5_000);
    }

    #[test]
    fn test_duplicate_identifiers_rejected() {
        let profile = LanguageProfile {
            name: "sh".to_string(),
            aliases: vec!["SH".to_string()],
            kind: LanguageKind::Interpreted { delivery: SourceDelivery::Stdin },
            run: CommandTemplate::new("sh", Vec::<String>::new()),
            file_extension: None,
            timeout: Duration::from_secs(1),
        };
        assert!(matches!(
            LanguageRegistry::new(vec![profile]),
            Err(ExecutionError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let template = CommandTemplate::new("g++", ["{source}", "-o", "{artifact}", "-I{workspace}"]);
        let source = PathBuf::from("/scratch/abc/main.cpp");
        let artifact = PathBuf::from("/scratch/abc/program");
        let workspace = PathBuf::from("/scratch/abc");
        let spec = template.render(&TemplateContext {
            source: Some(&source),
            artifact: Some(&artifact),
            workspace: Some(&workspace),
            script: None,
            code: None,
        });

        assert_eq!(spec.program, "g++");
        assert_eq!(
            spec.args,
            vec!["/scratch/abc/main.cpp", "-o", "/scratch/abc/program", "-I/scratch/abc"]
        );
        assert_eq!(spec.cwd, Some(workspace));
        assert!(spec.stdin.is_none());
    }

    #[test]
    fn test_code_is_not_rescanned() {
        let template = CommandTemplate::new("python3", ["-c", "{code}"]);
        let source = PathBuf::from("/scratch/x/main.py");
        let spec = template.render(&TemplateContext {
            source: Some(&source),
            code: Some("print('{source}')"),
            ..Default::default()
        });
        assert_eq!(spec.args[1], "print('{source}')");
        assert!(spec.cwd.is_none());
    }

    #[test]
    fn test_missing_bridge_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("parser.py");
        let mut profile = default_registry().resolve("java").unwrap().clone();
        profile.kind = LanguageKind::ExternalBridge {
            ast_flag: "--ast".to_string(),
            script: Some(script.clone()),
        };
        assert_eq!(profile.missing_bridge_script(), Some(script.as_path()));

        std::fs::write(&script, "print('ok')").unwrap();
        assert_eq!(profile.missing_bridge_script(), None);

        let spec = profile.run.render(&TemplateContext {
            script: Some(&script),
            ..Default::default()
        });
        assert_eq!(spec.program, "python3");
        assert_eq!(spec.args, vec![script.to_string_lossy().into_owned()]);

        assert_eq!(default_registry().resolve("c").unwrap().missing_bridge_script(), None);
    }
}
