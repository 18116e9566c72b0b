// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for spanlog.
//!
//! Log emission and span operations never fail: unknown span ids, missing
//! subscribers and failing sinks are all benign. Errors only arise when
//! parsing user input (levels, output kinds) and loading configuration,
//! using `thiserror` for the definitions and `anyhow` for propagation.

use thiserror::Error;

/// Errors raised while interpreting diagnostics settings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticsError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Unknown log output: {0}")]
    UnknownOutput(String),
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl ConfigError {
    /// Create an invalid value error for a named setting.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

impl From<DiagnosticsError> for ConfigError {
    fn from(err: DiagnosticsError) -> Self {
        match err {
            DiagnosticsError::InvalidLevel(value) => Self::invalid_value("level", value),
            DiagnosticsError::UnknownOutput(value) => Self::invalid_value("output", value),
        }
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ConfigError = io_err.into();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let err: ConfigError = result.unwrap_err().into();
        assert!(matches!(err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_config_error_from_invalid_level() {
        let err: ConfigError = DiagnosticsError::InvalidLevel("loud".to_string()).into();
        assert_eq!(err.to_string(), "Invalid value for level: loud");
    }

    #[test]
    fn test_error_display() {
        let err = DiagnosticsError::UnknownOutput("file".to_string());
        assert_eq!(err.to_string(), "Unknown log output: file");
    }
}
