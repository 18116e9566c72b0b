// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::ConfigFile;

/// Workspace config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[
    ".spanlog.json",
    ".spanlog.yaml",
    ".spanlog.yml",
    ".spanlog/config.json",
];

/// Local config file name (for per-directory overrides).
pub const LOCAL_CONFIG_FILE: &str = ".spanlog.local.json";

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".spanlog";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config file path (~/.spanlog/config.json).
pub fn get_global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

/// Load global configuration, if present.
pub fn load_global_config() -> Result<Option<ConfigFile>, ConfigError> {
    match get_global_config_path() {
        Some(path) => load_optional(&path),
        None => Ok(None),
    }
}

/// Load workspace configuration from the first config file found in
/// `workspace_root`, searching [`CONFIG_FILES`] in order.
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load local configuration from .spanlog.local.json.
pub fn load_local_config(workspace_root: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    load_optional(&workspace_root.join(LOCAL_CONFIG_FILE))
}

/// Load a configuration file. YAML when the extension says so, JSON otherwise.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

fn load_optional(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(path).map(Some)
}
