//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::MiddlewareConfig;
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

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<MiddlewareConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<MiddlewareConfig, ConfigError> {
    let config: MiddlewareConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::UnsupportedConvention;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(
            config.lifespan.unsupported,
            UnsupportedConvention::ExplicitOrEarlyError
        );
        assert!(config.lifespan.include_error_chain);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn parses_sections() {
        let config = parse_config(
            r#"
            [lifespan]
            unsupported = "explicit"
            include_error_chain = false
            channel_capacity = 4

            [observability]
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.lifespan.unsupported, UnsupportedConvention::Explicit);
        assert!(!config.lifespan.include_error_chain);
        assert_eq!(config.lifespan.channel_capacity, 4);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn rejects_unknown_convention() {
        let err = parse_config("[lifespan]\nunsupported = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn surfaces_validation_errors() {
        let err = parse_config("[lifespan]\nchannel_capacity = 0\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: lifespan.channel_capacity must be at least 1"
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
