// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use crate::error::ConfigError;
use crate::types::LogLevel;

use super::types::{ConfigFile, DiagnosticsConfig};

/// Environment variable holding the baseline level.
pub const ENV_LEVEL: &str = "SPANLOG_LEVEL";
/// Environment variable toggling timestamps.
pub const ENV_TIMESTAMPS: &str = "SPANLOG_TIMESTAMPS";
/// Environment variable toggling colors.
pub const ENV_COLORS: &str = "SPANLOG_COLORS";
/// Conventional variable disabling colors when set to anything non-empty.
pub const ENV_NO_COLOR: &str = "NO_COLOR";

/// Overrides taken from the environment (or the command line).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub level: Option<LogLevel>,
    pub with_timestamps: Option<bool>,
    pub with_colors: Option<bool>,
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = lookup(ENV_LEVEL)
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.parse::<LogLevel>())
            .transpose()?;

        let with_timestamps = lookup(ENV_TIMESTAMPS)
            .map(|v| parse_bool(ENV_TIMESTAMPS, &v))
            .transpose()?;

        let no_color = lookup(ENV_NO_COLOR).is_some_and(|v| !v.is_empty());
        let with_colors = if no_color {
            Some(false)
        } else {
            lookup(ENV_COLORS)
                .map(|v| parse_bool(ENV_COLORS, &v))
                .transpose()?
        };

        Ok(Self {
            level,
            with_timestamps,
            with_colors,
        })
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid_value(field, other)),
    }
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment / CLI overrides
/// 2. Local config (.spanlog.local.json)
/// 3. Workspace config (.spanlog.json)
/// 4. Global config (~/.spanlog/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<ConfigFile>,
    workspace: Option<ConfigFile>,
    local: Option<ConfigFile>,
    overrides: EnvOverrides,
) -> DiagnosticsConfig {
    let mut result = DiagnosticsConfig::default();

    for config in [global, workspace, local].into_iter().flatten() {
        apply_config_file(&mut result, config);
    }

    apply_overrides(&mut result, &overrides);

    result
}

/// Layer one file on top of `result`.
pub fn apply_config_file(result: &mut DiagnosticsConfig, config: ConfigFile) {
    if let Some(level) = config.level {
        result.level = level;
    }
    if let Some(enabled) = config.with_timestamps {
        result.with_timestamps = enabled;
    }
    if let Some(enabled) = config.with_colors {
        result.with_colors = enabled;
    }
    if let Some(target) = config.default_target {
        result.default_target = target;
    }
    if let Some(targets) = config.targets {
        result.target_levels.extend(targets);
    }
}

/// Apply environment / CLI overrides on top of `result`.
pub fn apply_overrides(result: &mut DiagnosticsConfig, overrides: &EnvOverrides) {
    if let Some(level) = overrides.level {
        result.level = level;
    }
    if let Some(enabled) = overrides.with_timestamps {
        result.with_timestamps = enabled;
    }
    if let Some(enabled) = overrides.with_colors {
        result.with_colors = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = merge_config(None, None, None, EnvOverrides::default());
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.with_timestamps);
        assert_eq!(config.default_target, "default");
    }

    #[test]
    fn test_precedence() {
        let global = ConfigFile {
            level: Some(LogLevel::Error),
            with_colors: Some(false),
            default_target: Some("global".to_string()),
            ..Default::default()
        };
        let workspace = ConfigFile {
            level: Some(LogLevel::Warn),
            targets: Some(BTreeMap::from([("db".to_string(), LogLevel::Trace)])),
            ..Default::default()
        };
        let local = ConfigFile {
            level: Some(LogLevel::Debug),
            ..Default::default()
        };
        let overrides = EnvOverrides {
            with_timestamps: Some(false),
            ..Default::default()
        };

        let config = merge_config(Some(global), Some(workspace), Some(local), overrides);

        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.with_colors);
        assert!(!config.with_timestamps);
        assert_eq!(config.default_target, "global");
        assert_eq!(config.level_for("db"), LogLevel::Trace);
    }

    #[test]
    fn test_env_overrides_win_over_files() {
        let workspace = ConfigFile {
            level: Some(LogLevel::Warn),
            ..Default::default()
        };
        let overrides = EnvOverrides::from_lookup(lookup(&[(ENV_LEVEL, "trace")])).unwrap();

        let config = merge_config(None, Some(workspace), None, overrides);
        assert_eq!(config.level, LogLevel::Trace);
    }

    #[test]
    fn test_env_parsing() {
        let overrides = EnvOverrides::from_lookup(lookup(&[
            (ENV_LEVEL, "DEBUG"),
            (ENV_TIMESTAMPS, "off"),
            (ENV_COLORS, "yes"),
        ]))
        .unwrap();

        assert_eq!(overrides.level, Some(LogLevel::Debug));
        assert_eq!(overrides.with_timestamps, Some(false));
        assert_eq!(overrides.with_colors, Some(true));
    }

    #[test]
    fn test_no_color_wins() {
        let overrides =
            EnvOverrides::from_lookup(lookup(&[(ENV_COLORS, "true"), (ENV_NO_COLOR, "1")])).unwrap();
        assert_eq!(overrides.with_colors, Some(false));
    }

    #[test]
    fn test_invalid_env_values() {
        assert!(matches!(
            EnvOverrides::from_lookup(lookup(&[(ENV_LEVEL, "loud")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            EnvOverrides::from_lookup(lookup(&[(ENV_TIMESTAMPS, "maybe")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(EnvOverrides::from_lookup(lookup(&[])).unwrap().is_empty());
    }
}
