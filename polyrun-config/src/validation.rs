//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate an enum choice (case-insensitive)
pub fn validate_enum_choice<T>(value: &str, valid_choices: &[T], field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: AsRef<str>,
{
    let valid: Vec<&str> = valid_choices.iter().map(|c| c.as_ref()).collect();

    if !valid.iter().any(|&v| v.eq_ignore_ascii_case(value)) {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!(
                "{} has invalid value '{}'. Valid choices: {}",
                field_name,
                value,
                valid.join(", ")
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required_string() {
        assert!(validate_required_string("python3", "program", "languages").is_ok());
        assert!(validate_required_string("", "program", "languages").is_err());
        assert!(validate_required_string("   ", "program", "languages").is_err());
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(1u64, "timeout_ms", "execution").is_ok());

        let err = validate_positive(0u64, "timeout_ms", "execution").unwrap_err();
        assert!(err.to_string().contains("timeout_ms must be greater than 0"));
        assert!(err.to_string().contains("execution"));
    }

    #[test]
    fn test_validate_enum_choice() {
        let choices = ["java", "python"];
        assert!(validate_enum_choice("JAVA", &choices, "default_language", "execution").is_ok());

        let err = validate_enum_choice("cobol", &choices, "default_language", "execution").unwrap_err();
        assert!(err.to_string().contains("Valid choices: java, python"));
    }
}
