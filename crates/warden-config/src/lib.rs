//! Configuration parsing and validation for wardend
//!
//! TOML configuration with:
//! - a `[daemon]` section (paths, poll interval, retention)
//! - a `[default]` policy and per-user `[users.<name>]` policies
//! - compact duration strings ("2h", "90m") and time ranges ("09:00-17:00")
//! - per-user fields filled down from the default policy when unset

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Config::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = r#"
            [users.alice]
            daily_limit = "2h"
            enabled = true
        "#;

        let config = parse_config(config).unwrap();
        assert_eq!(config.users.len(), 1);
        assert!(config.users.contains_key("alice"));
    }

    #[test]
    fn reject_wrong_version() {
        let config = r#"
            config_version = 99

            [users.alice]
            enabled = true
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_bad_duration() {
        let config = r#"
            [users.alice]
            daily_limit = "two hours"
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [default]
            daily_limit = "2h"
            allowed_hours = "09:00-17:00"
            enabled = true
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(config.default.enabled);
    }
}
