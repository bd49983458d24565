//! Configuration management for mdeonboard
//!
//! Settings are loaded from environment variables with defaults. Command-line
//! flags take precedence over everything here.
//!
//! # Environment Variables
//!
//! - `MDEONBOARD_OUTPUT`: Output file path - default:
//!   `/etc/opt/microsoft/mdatp/mdatp_onboard.json`
//! - `MDEONBOARD_LOG_LEVEL`: Logging level - default: "info"
//! - `MDEONBOARD_LOG_JSON`: Emit logs as JSON (true|false) - default: "false"

use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_OUTPUT_PATH: &str = "/etc/opt/microsoft/mdatp/mdatp_onboard.json";
const DEFAULT_LOG_LEVEL: &str = "info";

pub const OUTPUT_ENV: &str = "MDEONBOARD_OUTPUT";
pub const LOG_LEVEL_ENV: &str = "MDEONBOARD_LOG_LEVEL";
pub const LOG_JSON_ENV: &str = "MDEONBOARD_LOG_JSON";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardConfig {
    /// Where the onboarding JSON is written
    pub output_path: PathBuf,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    pub log_json: bool,
}

impl Default for OnboardConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
        }
    }
}

impl OnboardConfig {
    /// Load configuration from `MDEONBOARD_*` variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let output_path = env::var(OUTPUT_ENV)
            .map(PathBuf::from)
            .unwrap_or(defaults.output_path);

        let log_level = env::var(LOG_LEVEL_ENV)
            .unwrap_or(defaults.log_level)
            .to_lowercase();

        let log_json = match env::var(LOG_JSON_ENV) {
            Ok(v) => parse_bool(&v).ok_or_else(|| ConfigError::ParseError {
                field: LOG_JSON_ENV.to_string(),
                error: format!("expected true or false, got '{}'", v),
            })?,
            Err(_) => defaults.log_json,
        };

        Ok(Self {
            output_path,
            log_level,
            log_json,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Output path cannot be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl fmt::Display for OnboardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mdeonboard Configuration:")?;
        writeln!(f, "  Output: {}", self.output_path.display())?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(f, "  Log JSON: {}", self.log_json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn remove(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = vec![
            EnvGuard::remove(OUTPUT_ENV),
            EnvGuard::remove(LOG_LEVEL_ENV),
            EnvGuard::remove(LOG_JSON_ENV),
        ];

        let config = OnboardConfig::from_env().unwrap();
        assert_eq!(config, OnboardConfig::default());
        assert_eq!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = vec![
            EnvGuard::set(OUTPUT_ENV, "/tmp/onboard.json"),
            EnvGuard::set(LOG_LEVEL_ENV, "DEBUG"),
            EnvGuard::set(LOG_JSON_ENV, "true"),
        ];

        let config = OnboardConfig::from_env().unwrap();
        assert_eq!(config.output_path, PathBuf::from("/tmp/onboard.json"));
        assert_eq!(config.log_level, "debug");
        assert!(config.log_json);
    }

    #[test]
    #[serial]
    fn test_invalid_log_json() {
        let _guard = EnvGuard::set(LOG_JSON_ENV, "sometimes");
        assert!(matches!(
            OnboardConfig::from_env(),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let config = OnboardConfig {
            log_level: "loud".to_string(),
            ..OnboardConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_empty_output() {
        let config = OnboardConfig {
            output_path: PathBuf::new(),
            ..OnboardConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_display() {
        let text = OnboardConfig::default().to_string();
        assert!(text.contains(DEFAULT_OUTPUT_PATH));
        assert!(text.contains("Log Level: info"));
    }
}
