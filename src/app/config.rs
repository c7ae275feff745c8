use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;

/// Knobs for the condition generator. `default()` is the conservative
/// cross-device profile the generator assumes when callers pass nothing
/// special.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchingOptions {
    pub enable_parent_context: bool,
    pub enable_child_context: bool,
    pub enable_descendant_search: bool,
    pub max_depth: i32,
    pub prioritize_semantic_fields: bool,
    pub exclude_positional_fields: bool,
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self {
            enable_parent_context: true,
            enable_child_context: true,
            enable_descendant_search: false,
            max_depth: 2,
            prioritize_semantic_fields: true,
            exclude_positional_fields: true,
        }
    }
}

impl MatchingOptions {
    /// Portable conditions that survive resolution and layout differences
    /// between devices.
    pub fn cross_device() -> Self {
        Self::default()
    }

    /// Widen the scan to descendants for list items and other containers
    /// whose identifying text sits below the anchor node.
    pub fn smart_hierarchy() -> Self {
        Self {
            enable_descendant_search: true,
            max_depth: 3,
            ..Self::default()
        }
    }

    /// Pin the element as tightly as possible on this exact device,
    /// positional fields included.
    pub fn precise() -> Self {
        Self {
            exclude_positional_fields: false,
            ..Self::default()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "cross-device" | "cross_device" => Some(Self::cross_device()),
            "smart-hierarchy" | "smart_hierarchy" => Some(Self::smart_hierarchy()),
            "precise" => Some(Self::precise()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatcherConfig {
    #[serde(default)]
    pub matching: MatchingOptions,
    #[serde(default)]
    pub log_level: String,
    #[serde(default)]
    pub output_path: String,
    #[serde(default)]
    pub version: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            matching: MatchingOptions::default(),
            log_level: "INFO".to_string(),
            output_path: String::new(),
            version: "0.1.0".to_string(),
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("UIMATCH_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".uimatch_config.json")
}

pub fn backup_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".uimatch_config.backup.json")
}

pub fn load_config() -> Result<MatcherConfig, AppError> {
    load_config_from_path(&config_path())
}

pub fn save_config(config: &MatcherConfig) -> Result<(), AppError> {
    save_config_to_path(config, &config_path(), &backup_config_path())
}

pub fn load_config_from_path(path: &Path) -> Result<MatcherConfig, AppError> {
    if !path.exists() {
        return Ok(MatcherConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), ""))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), ""))?;
    let mut config: MatcherConfig = serde_json::from_value(value.clone()).unwrap_or_default();
    config = apply_legacy_overrides(config, &value);
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &MatcherConfig,
    path: &Path,
    backup_path: &Path,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), ""))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), ""))?;
    Ok(())
}

/// Earlier builds stored the matching knobs flat at the top level.
fn apply_legacy_overrides(
    mut config: MatcherConfig,
    value: &serde_json::Value,
) -> MatcherConfig {
    if let Some(flag) = value
        .get("exclude_positional_fields")
        .and_then(|v| v.as_bool())
    {
        config.matching.exclude_positional_fields = flag;
    }
    if let Some(flag) = value.get("enable_parent_context").and_then(|v| v.as_bool()) {
        config.matching.enable_parent_context = flag;
    }
    if let Some(flag) = value.get("enable_child_context").and_then(|v| v.as_bool()) {
        config.matching.enable_child_context = flag;
    }
    if let Some(depth) = value.get("max_depth").and_then(|v| v.as_i64()) {
        config.matching.max_depth = depth as i32;
    }
    if let Some(level) = value.get("log_level").and_then(|v| v.as_str()) {
        if !level.is_empty() {
            config.log_level = level.to_string();
        }
    }
    if let Some(output_path) = value.get("output_path").and_then(|v| v.as_str()) {
        if !output_path.is_empty() {
            config.output_path = output_path.to_string();
        }
    }
    config
}

fn validate_config(mut config: MatcherConfig) -> MatcherConfig {
    if !(1..=5).contains(&config.matching.max_depth) {
        config.matching.max_depth = 2;
    }
    if config.log_level.trim().is_empty() {
        config.log_level = "INFO".to_string();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_generator_contract() {
        let options = MatchingOptions::default();
        assert!(options.enable_parent_context);
        assert!(options.enable_child_context);
        assert!(!options.enable_descendant_search);
        assert_eq!(options.max_depth, 2);
        assert!(options.prioritize_semantic_fields);
        assert!(options.exclude_positional_fields);
    }

    #[test]
    fn presets_resolve_by_name() {
        assert_eq!(
            MatchingOptions::preset("cross-device"),
            Some(MatchingOptions::cross_device())
        );
        let smart = MatchingOptions::preset("smart_hierarchy").expect("preset");
        assert!(smart.enable_descendant_search);
        assert_eq!(smart.max_depth, 3);
        let precise = MatchingOptions::preset("precise").expect("preset");
        assert!(!precise.exclude_positional_fields);
        assert_eq!(MatchingOptions::preset("nope"), None);
    }

    #[test]
    fn merges_legacy_flat_keys() {
        let value = serde_json::json!({
            "exclude_positional_fields": false,
            "max_depth": 4,
            "log_level": "debug",
            "output_path": "/tmp/out"
        });
        let mut config: MatcherConfig = serde_json::from_value(value.clone()).unwrap_or_default();
        config = apply_legacy_overrides(config, &value);
        assert!(!config.matching.exclude_positional_fields);
        assert_eq!(config.matching.max_depth, 4);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.output_path, "/tmp/out");
    }

    #[test]
    fn clamps_invalid_values() {
        let mut config = MatcherConfig::default();
        config.matching.max_depth = 99;
        config.log_level = "  ".to_string();
        let validated = validate_config(config);
        assert_eq!(validated.matching.max_depth, 2);
        assert_eq!(validated.log_level, "INFO");
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let backup = dir.path().join("config.backup.json");

        let mut config = MatcherConfig::default();
        config.matching.enable_descendant_search = true;
        config.matching.max_depth = 3;
        save_config_to_path(&config, &path, &backup).expect("save");
        let loaded = load_config_from_path(&path).expect("load");
        assert_eq!(loaded, config);

        save_config_to_path(&config, &path, &backup).expect("save again");
        assert!(backup.exists());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = load_config_from_path(&dir.path().join("absent.json")).expect("load");
        assert_eq!(loaded, MatcherConfig::default());
    }
}
