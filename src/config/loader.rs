//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::LbConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config validation failed: {}", join_errors(.0))]
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
pub fn parse_config(content: &str) -> Result<LbConfig, ConfigError> {
    let config: LbConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LbConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        port = 8080

        [[backends]]
        url = "http://127.0.0.1:8081"
        weight = 1

        [[backends]]
        url = "http://127.0.0.1:8082"

        [circuit_breaker]
        failure_threshold = 3
    "#;

    #[test]
    fn test_parse_with_defaults() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[1].weight, 1);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.open_duration_secs, 10);
        assert_eq!(config.health_check.interval_secs, 10);
        assert_eq!(config.health_check.timeout_secs, 2);
        assert_eq!(config.health_check.path, "/health");
    }

    #[test]
    fn test_validation_failure_is_reported() {
        let err = parse_config("[server]\nport = 70000\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert!(errors.contains(&ValidationError::InvalidPort(70000)));
                assert!(errors.contains(&ValidationError::NoBackends));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_config("[[backends]\nurl = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
