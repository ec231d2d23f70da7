//! Language table configuration
//!
//! Each entry describes how one language is compiled, interpreted or handed
//! to an external bridge process. Command arguments may reference the
//! placeholders below; they are substituted per execution.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};

/// Path of the source file inside the execution workspace
pub const SOURCE_PLACEHOLDER: &str = "{source}";
/// Path reserved for the compiled artifact
pub const ARTIFACT_PLACEHOLDER: &str = "{artifact}";
/// The submitted source text itself
pub const CODE_PLACEHOLDER: &str = "{code}";
/// The workspace directory
pub const WORKSPACE_PLACEHOLDER: &str = "{workspace}";
/// The script run by a bridge language
pub const SCRIPT_PLACEHOLDER: &str = "{script}";

/// A program and its argument template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandConfig {
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

    /// Whether the program or any argument references `placeholder`
    pub fn references(&self, placeholder: &str) -> bool {
        self.program.contains(placeholder) || self.args.iter().any(|a| a.contains(placeholder))
    }
}

/// How an interpreter receives the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceDelivery {
    /// Inline, through an "evaluate this string" flag (`{code}`)
    Argument,
    /// As a path to the source file written in the workspace (`{source}`)
    File,
    /// Piped to the interpreter's standard input
    Stdin,
}

/// Execution strategy of a language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LanguageStrategy {
    Interpreted {
        delivery: SourceDelivery,
    },
    Compiled {
        compile: CommandConfig,
    },
    /// Delegated to an external interpreter/AST process over stdin/stdout
    Bridge {
        #[serde(default = "default_ast_flag")]
        ast_flag: String,
        /// File the bridge program runs, substituted for `{script}` and
        /// required to exist before the bridge is started
        #[serde(default, skip_serializing_if = "Option::is_none")]
        script: Option<PathBuf>,
    },
}

/// One supported language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Primary identifier, matched case-insensitively
    pub name: String,

    /// Alternative identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    /// Source file extension, without the leading dot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Wall-clock limit for the run (or bridge) process
    #[serde(default = "default_run_timeout_ms")]
    pub timeout_ms: u64,

    pub strategy: LanguageStrategy,

    /// Interpreter, artifact or bridge invocation
    pub run: CommandConfig,
}

impl LanguageConfig {
    /// All identifiers this language answers to
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// The built-in language table
    pub fn defaults() -> Vec<LanguageConfig> {
        vec![
            LanguageConfig {
                name: "java".to_string(),
                aliases: vec![],
                extension: Some("java".to_string()),
                timeout_ms: 10_000,
                strategy: LanguageStrategy::Bridge {
                    ast_flag: default_ast_flag(),
                    script: Some(default_bridge_script()),
                },
                run: CommandConfig::new("python3", [SCRIPT_PLACEHOLDER]),
            },
            LanguageConfig {
                name: "python".to_string(),
                aliases: vec!["py".to_string(), "python3".to_string()],
                extension: Some("py".to_string()),
                timeout_ms: default_run_timeout_ms(),
                strategy: LanguageStrategy::Interpreted {
                    delivery: SourceDelivery::Argument,
                },
                run: CommandConfig::new("python3", ["-c", CODE_PLACEHOLDER]),
            },
            LanguageConfig {
                name: "javascript".to_string(),
                aliases: vec!["js".to_string(), "node".to_string()],
                extension: Some("js".to_string()),
                timeout_ms: default_run_timeout_ms(),
                strategy: LanguageStrategy::Interpreted {
                    delivery: SourceDelivery::Stdin,
                },
                run: CommandConfig::new("node", Vec::<String>::new()),
            },
            LanguageConfig {
                name: "c".to_string(),
                aliases: vec![],
                extension: Some("c".to_string()),
                timeout_ms: default_run_timeout_ms(),
                strategy: LanguageStrategy::Compiled {
                    compile: CommandConfig::new("gcc", [SOURCE_PLACEHOLDER, "-o", ARTIFACT_PLACEHOLDER]),
                },
                run: CommandConfig::new(ARTIFACT_PLACEHOLDER, Vec::<String>::new()),
            },
            LanguageConfig {
                name: "cpp".to_string(),
                aliases: vec!["c++".to_string()],
                extension: Some("cpp".to_string()),
                timeout_ms: default_run_timeout_ms(),
                strategy: LanguageStrategy::Compiled {
                    compile: CommandConfig::new("g++", [SOURCE_PLACEHOLDER, "-o", ARTIFACT_PLACEHOLDER]),
                },
                run: CommandConfig::new(ARTIFACT_PLACEHOLDER, Vec::<String>::new()),
            },
        ]
    }
}

impl Validatable for LanguageConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.name, "name", self.domain_name())?;
        if self.identifiers().any(|id| id.chars().any(char::is_whitespace)) {
            return Err(self.validation_error(format!(
                "language '{}' has an identifier containing whitespace",
                self.name
            )));
        }

        validate_required_string(&self.run.program, "run.program", self.domain_name())?;
        validate_positive(self.timeout_ms, "timeout_ms", self.domain_name())?;

        match &self.strategy {
            LanguageStrategy::Interpreted { delivery } => {
                let required = match delivery {
                    SourceDelivery::Argument => Some(CODE_PLACEHOLDER),
                    SourceDelivery::File => Some(SOURCE_PLACEHOLDER),
                    SourceDelivery::Stdin => None,
                };
                if let Some(placeholder) = required {
                    if !self.run.references(placeholder) {
                        return Err(self.validation_error(format!(
                            "language '{}' must reference {} in its run command",
                            self.name, placeholder
                        )));
                    }
                }
            }
            LanguageStrategy::Compiled { compile } => {
                validate_required_string(&compile.program, "compile.program", self.domain_name())?;
                if !compile.references(SOURCE_PLACEHOLDER) || !compile.references(ARTIFACT_PLACEHOLDER) {
                    return Err(self.validation_error(format!(
                        "language '{}' compile command must reference both {} and {}",
                        self.name, SOURCE_PLACEHOLDER, ARTIFACT_PLACEHOLDER
                    )));
                }
                if self.extension.is_none() {
                    return Err(self.validation_error(format!(
                        "compiled language '{}' requires a source extension",
                        self.name
                    )));
                }
            }
            LanguageStrategy::Bridge { ast_flag, script } => {
                validate_required_string(ast_flag, "ast_flag", self.domain_name())?;
                if script.is_some() && !self.run.references(SCRIPT_PLACEHOLDER) {
                    return Err(self.validation_error(format!(
                        "bridge language '{}' sets a script but its run command does not reference {}",
                        self.name, SCRIPT_PLACEHOLDER
                    )));
                }
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "execution.languages"
    }
}

// Default value functions
pub(crate) fn default_run_timeout_ms() -> u64 {
    5_000
}

fn default_ast_flag() -> String {
    "--ast".to_string()
}

/// Relative to the working directory, or to the config file when loaded from one
pub(crate) fn default_bridge_script() -> PathBuf {
    PathBuf::from("parser/java_parser.py")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(name: &str) -> LanguageConfig {
        LanguageConfig::defaults()
            .into_iter()
            .find(|l| l.name == name)
            .unwrap()
    }

    #[test]
    fn test_default_languages_validate() {
        for language in LanguageConfig::defaults() {
            assert!(language.validate().is_ok(), "{} should validate", language.name);
        }
    }

    #[test]
    fn test_default_strategies() {
        assert!(matches!(find("java").strategy, LanguageStrategy::Bridge { .. }));
        assert_eq!(
            find("python").strategy,
            LanguageStrategy::Interpreted { delivery: SourceDelivery::Argument }
        );
        assert_eq!(
            find("javascript").strategy,
            LanguageStrategy::Interpreted { delivery: SourceDelivery::Stdin }
        );
        assert!(matches!(find("cpp").strategy, LanguageStrategy::Compiled { .. }));
        assert!(find("cpp").identifiers().any(|id| id == "c++"));
    }

    #[test]
    fn test_argument_delivery_requires_code_placeholder() {
        let mut python = find("python");
        python.run.args = vec!["-c".to_string()];
        let err = python.validate().unwrap_err();
        assert!(err.to_string().contains("{code}"));
    }

    #[test]
    fn test_compiled_requires_artifact_placeholder() {
        let mut c = find("c");
        c.strategy = LanguageStrategy::Compiled {
            compile: CommandConfig::new("gcc", [SOURCE_PLACEHOLDER]),
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_strategy_yaml_shape() {
        let yaml = r#"
name: rust
extension: rs
timeout_ms: 2000
strategy:
  kind: compiled
  compile:
    program: rustc
    args: ["{source}", "-o", "{artifact}"]
run:
  program: "{artifact}"
"#;
        let language: LanguageConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(language.validate().is_ok());
        assert!(language.aliases.is_empty());
        assert!(language.run.args.is_empty());
        match language.strategy {
            LanguageStrategy::Compiled { compile } => assert_eq!(compile.program, "rustc"),
            other => panic!("unexpected strategy: {:?}", other),
        }
    }

    #[test]
    fn test_bridge_ast_flag_defaults() {
        let yaml = r#"
name: java
strategy:
  kind: bridge
run:
  program: python3
  args: ["parser/java_parser.py"]
"#;
        let language: LanguageConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(language.timeout_ms, 5_000);
        assert_eq!(
            language.strategy,
            LanguageStrategy::Bridge {
                ast_flag: "--ast".to_string(),
                script: None,
            }
        );
    }

    #[test]
    fn test_bridge_script_must_be_referenced() {
        let mut java = find("java");
        assert!(java.run.references(SCRIPT_PLACEHOLDER));

        java.run = CommandConfig::new("python3", ["parser/java_parser.py"]);
        let err = java.validate().unwrap_err();
        assert!(err.to_string().contains("{script}"));
    }
}
