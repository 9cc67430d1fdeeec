//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::PortalConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

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
pub fn parse_config(content: &str) -> Result<PortalConfig, ConfigError> {
    let config: PortalConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PortalConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.app.items_per_page, 10);
        assert_eq!(config.session.cookie_name, "pasha_session");
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = parse_config(
            r#"
            [app]
            base_path = "/pasha-benefits"
            items_per_page = 25

            [[accounts]]
            email = "admin@pasha.org"
            password = "changeme123"
            first_name = "Ada"
            last_name = "Admin"
            role = "admin"
            "#,
        )
        .unwrap();
        assert_eq!(config.app.base_path, "/pasha-benefits");
        assert_eq!(config.app.items_per_page, 25);
        assert_eq!(config.accounts.len(), 1);
    }

    #[test]
    fn test_parse_and_validation_errors() {
        assert!(matches!(parse_config("[app"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            parse_config("[app]\nitems_per_page = 0"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
