// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration for diagnostics.
//!
//! Settings are loaded from several sources and merged:
//! - Global config: ~/.spanlog/config.json
//! - Workspace config: .spanlog.json, .spanlog.yaml or .spanlog/config.json
//! - Local config: .spanlog.local.json (gitignored, for personal overrides)
//! - Environment: SPANLOG_LEVEL, SPANLOG_TIMESTAMPS, SPANLOG_COLORS, NO_COLOR
//!
//! Precedence is environment > local > workspace > global > defaults.

mod loader;
mod merger;
mod types;

pub use loader::{
    get_global_config_path, load_config_file, load_global_config, load_local_config,
    load_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE, LOCAL_CONFIG_FILE,
};
pub use merger::{
    apply_config_file, apply_overrides, merge_config, EnvOverrides, ENV_COLORS, ENV_LEVEL,
    ENV_NO_COLOR, ENV_TIMESTAMPS,
};
pub use types::{ConfigFile, DiagnosticsConfig};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge all configuration sources for a workspace.
pub fn load_config(workspace_root: &Path) -> Result<DiagnosticsConfig, ConfigError> {
    load_config_with(workspace_root, EnvOverrides::from_env()?)
}

/// Load all file sources for a workspace and apply the given overrides.
pub fn load_config_with(
    workspace_root: &Path,
    overrides: EnvOverrides,
) -> Result<DiagnosticsConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;
    let local = load_local_config(workspace_root)?;

    Ok(merge_config(global, workspace, local, overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogLevel;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_with_no_files() {
        let temp = TempDir::new().unwrap();
        let result = load_config_with(temp.path(), EnvOverrides::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_local_overrides_workspace() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".spanlog.json"),
            r#"{"level": "warn", "defaultTarget": "app"}"#,
        )
        .unwrap();
        std::fs::write(temp.path().join(LOCAL_CONFIG_FILE), r#"{"level": "trace"}"#).unwrap();

        let config = load_config_with(temp.path(), EnvOverrides::default()).unwrap();
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.default_target, "app");
    }

    #[test]
    fn test_overrides_applied_last() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".spanlog.json"), r#"{"withColors": true}"#).unwrap();

        let overrides = EnvOverrides {
            with_colors: Some(false),
            ..Default::default()
        };
        let config = load_config_with(temp.path(), overrides).unwrap();
        assert!(!config.with_colors);
    }
}
