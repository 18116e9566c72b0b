// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! [`ConfigFile`] is the partial shape read from JSON or YAML files; every
//! field is optional so files can be layered. [`DiagnosticsConfig`] is the
//! fully resolved result used to build loggers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::logger::{LogOutput, LoggerConfig};
use crate::types::LogLevel;

/// Configuration as written in a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    /// Baseline level for new loggers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,

    /// Prefix console lines with a timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_timestamps: Option<bool>,

    /// Color the level token on the console
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_colors: Option<bool>,

    /// Target used when none is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_target: Option<String>,

    /// Baseline level overrides for specific targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<BTreeMap<String, LogLevel>>,
}

/// Fully resolved diagnostics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsConfig {
    pub level: LogLevel,
    pub with_timestamps: bool,
    pub with_colors: bool,
    pub default_target: String,
    #[serde(rename = "targets")]
    pub target_levels: BTreeMap<String, LogLevel>,

    /// Sink for every logger created from this config. Not serializable.
    #[serde(skip)]
    pub output: LogOutput,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamps: true,
            with_colors: true,
            default_target: "default".to_string(),
            target_levels: BTreeMap::new(),
            output: LogOutput::Console,
        }
    }
}

impl DiagnosticsConfig {
    /// Config tuned for local debugging: DEBUG level, timestamps and colors.
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            ..Self::default()
        }
    }

    /// Config for tests: TRACE level, plain output.
    pub fn testing() -> Self {
        Self {
            level: LogLevel::Trace,
            with_timestamps: false,
            with_colors: false,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.with_colors = enabled;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.with_timestamps = enabled;
        self
    }

    /// Baseline level for `target`, honoring per-target overrides.
    pub fn level_for(&self, target: &str) -> LogLevel {
        self.target_levels
            .get(target)
            .copied()
            .unwrap_or(self.level)
    }

    /// Settings for a new logger on `target`.
    pub fn logger_config(&self, target: &str) -> LoggerConfig {
        LoggerConfig {
            level: self.level_for(target),
            target: target.to_string(),
            with_timestamps: self.with_timestamps,
            with_colors: self.with_colors,
            output: self.output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_parses_camel_case() {
        let file: ConfigFile = serde_json::from_str(
            r#"{"level": "debug", "withColors": false, "targets": {"db": "trace"}}"#,
        )
        .unwrap();

        assert_eq!(file.level, Some(LogLevel::Debug));
        assert_eq!(file.with_colors, Some(false));
        assert_eq!(file.targets.unwrap()["db"], LogLevel::Trace);
        assert!(file.with_timestamps.is_none());
    }

    #[test]
    fn test_level_for_target_override() {
        let mut config = DiagnosticsConfig::default();
        config.target_levels.insert("db".to_string(), LogLevel::Trace);

        assert_eq!(config.level_for("db"), LogLevel::Trace);
        assert_eq!(config.level_for("http"), LogLevel::Info);
    }

    #[test]
    fn test_logger_config() {
        let config = DiagnosticsConfig::testing();
        let logger = config.logger_config("auth");

        assert_eq!(logger.target, "auth");
        assert_eq!(logger.level, LogLevel::Trace);
        assert!(!logger.with_colors);
        assert!(!logger.with_timestamps);
        assert!(logger.output.is_console());
    }

    #[test]
    fn test_serialize_skips_output() {
        let value = serde_json::to_value(DiagnosticsConfig::default()).unwrap();
        assert_eq!(value["level"], "info");
        assert_eq!(value["defaultTarget"], "default");
        assert!(value.get("output").is_none());
    }

    #[test]
    fn test_resolved_config_reads_back_as_config_file() {
        let mut config = DiagnosticsConfig::default();
        config.target_levels.insert("db".to_string(), LogLevel::Trace);

        let json = serde_json::to_string(&config).unwrap();
        let file: ConfigFile = serde_json::from_str(&json).unwrap();

        assert_eq!(file.targets.unwrap()["db"], LogLevel::Trace);
        assert_eq!(file.default_target.as_deref(), Some("default"));
    }
}
