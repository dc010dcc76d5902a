//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::FailoverConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<FailoverConfig, ConfigError> {
    let config: FailoverConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<FailoverConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;

    tracing::debug!(
        path = %path.display(),
        services = config.services.len(),
        "Configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [rate_limit]
            capacity = 2
            refill_rate = 1.0

            [[services]]
            name = "ledger"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.rate_limit.capacity, 2);
        assert_eq!(config.services[0].name, "ledger");
    }

    #[test]
    fn test_errors_are_classified() {
        let missing = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io(_)));

        let bad_syntax = parse_config("retry = [").unwrap_err();
        assert!(matches!(bad_syntax, ConfigError::Parse(_)));

        let invalid = parse_config("[retry]\nmax_attempts = 0").unwrap_err();
        assert!(matches!(invalid, ConfigError::Validation(ref v) if v.len() == 1));
        assert!(invalid.to_string().starts_with("Validation failed: retry.max_attempts"));
    }

    #[test]
    fn test_sources_are_chained() {
        use std::error::Error as _;

        let missing = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(missing.source().is_some());

        let invalid = parse_config(
            "[retry]\nmax_attempts = 0\n[rate_limit]\ncapacity = 0",
        )
        .unwrap_err();
        assert!(invalid.source().is_none());
        assert!(invalid.to_string().contains(", rate_limit.capacity"));
    }
}
