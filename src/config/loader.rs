//! Configuration loading from disk and command line.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::cli::Cli;
use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file into a configuration, without validating it.
pub fn load_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Resolve the effective configuration: defaults, then the optional file,
/// then environment and flags. The result is validated.
pub fn resolve(cli: &Cli) -> Result<GatewayConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_file(path)?,
        None => GatewayConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::config::schema::{AuthMode, PacingStrategy};

    fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
        let config = load_file(path)?;
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let file = write_config(
            r#"
            [upstream]
            base_id = "appFile"
            api_key = "file-key"
            auth_mode = "query"

            [rate_limit]
            requests_per_second = 2
            pacing = "burst"
            "#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.upstream.base_id, "appFile");
        assert_eq!(config.upstream.auth_mode, AuthMode::Query);
        assert_eq!(config.rate_limit.requests_per_second, 2);
        assert_eq!(config.rate_limit.pacing, PacingStrategy::Burst);
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
    }

    #[test]
    fn file_without_credentials_fails_validation() {
        let file = write_config("[rate_limit]\nrequests_per_second = 3\n");
        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let file = write_config("[upstream\n");
        assert!(matches!(load_file(file.path()), Err(ConfigError::Parse(_))));
    }
}
