// SPDX-License-Identifier: Apache-2.0

//! Watch Configuration
//!
//! Loaded from `schema-watch.json` in the data directory; every field has a
//! default so a missing file or a partial file both work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::error::{EngineError, EngineResult};
use crate::observer::rules::{builtin_rules, RuleSet};
use crate::observer::types::MatchRule;

pub const CONFIG_FILE_NAME: &str = "schema-watch.json";

/// A table whose column set is checked at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedTable {
    pub name: String,
    pub columns: Vec<String>,
}

/// Configuration for the statement observer and the startup checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Whether the index-creation observer is installed at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Match rules, in evaluation order
    #[serde(default = "builtin_rules")]
    pub rules: Vec<MatchRule>,
    /// Frames kept for the warning record's caller chain
    #[serde(default = "default_warn_depth")]
    pub warn_chain_depth: usize,
    /// Frames kept for the error record's full stack
    #[serde(default = "default_error_depth")]
    pub error_chain_depth: usize,
    /// Source locations containing one of these (any casing) are library frames
    #[serde(default = "default_library_markers")]
    pub library_markers: Vec<String>,
    /// Source locations containing one of these are third-party frames
    #[serde(default = "default_dependency_markers")]
    pub dependency_markers: Vec<String>,
    /// Disable to log statements without any call chain
    #[serde(default = "default_true")]
    pub capture_call_chain: bool,
    /// Tables whose columns are verified at startup
    #[serde(default = "default_expected_tables")]
    pub expected_tables: Vec<ExpectedTable>,
}

fn default_true() -> bool {
    true
}

fn default_warn_depth() -> usize {
    10
}

fn default_error_depth() -> usize {
    15
}

fn default_library_markers() -> Vec<String> {
    vec!["sqlx".to_string()]
}

fn default_dependency_markers() -> Vec<String> {
    vec![
        ".cargo/registry".to_string(),
        ".cargo/git".to_string(),
        "/rustc/".to_string(),
    ]
}

fn default_expected_tables() -> Vec<ExpectedTable> {
    vec![ExpectedTable {
        name: "upload_files".to_string(),
        columns: [
            "id",
            "tenant_id",
            "type",
            "storage_type",
            "key",
            "name",
            "size",
            "extension",
            "mime_type",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect(),
    }]
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: builtin_rules(),
            warn_chain_depth: default_warn_depth(),
            error_chain_depth: default_error_depth(),
            library_markers: default_library_markers(),
            dependency_markers: default_dependency_markers(),
            capture_call_chain: true,
            expected_tables: default_expected_tables(),
        }
    }
}

impl WatchConfig {
    /// Load configuration from `data_dir`, falling back to defaults when absent
    pub fn load(data_dir: &Path) -> EngineResult<Self> {
        let config_path = data_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            debug!("No schema-watch config file found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| EngineError::config(format!("Failed to read config: {}", e)))?;

        let config: WatchConfig = serde_json::from_str(&content)
            .map_err(|e| EngineError::config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        info!("Loaded schema-watch configuration from {:?}", config_path);
        Ok(config)
    }

    /// Save configuration to `data_dir`
    pub fn save(&self, data_dir: &Path) -> EngineResult<()> {
        let config_path = data_dir.join(CONFIG_FILE_NAME);

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&config_path, content)
            .map_err(|e| EngineError::config(format!("Failed to write config: {}", e)))?;

        debug!("Saved schema-watch configuration to {:?}", config_path);
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.warn_chain_depth == 0 || self.error_chain_depth == 0 {
            return Err(EngineError::config("Call chain depths must be positive"));
        }
        RuleSet::new(self.rules.clone()).map(|_| ())
    }
}

/// `SCHEMA_WATCH_DATA_DIR`, or `~/.schema-watch`
pub fn data_directory() -> PathBuf {
    if let Some(dir) = std::env::var_os("SCHEMA_WATCH_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_default()
        .join(".schema-watch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::types::Severity;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = WatchConfig::load(dir.path()).unwrap();

        assert!(config.enabled);
        assert_eq!(config.warn_chain_depth, 10);
        assert_eq!(config.error_chain_depth, 15);
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.expected_tables[0].name, "upload_files");
        assert_eq!(config.expected_tables[0].columns.len(), 9);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "warn_chain_depth": 4, "rules": [
                { "id": "drop", "pattern": "DROP INDEX", "severity": "error" }
            ] }"#,
        )
        .unwrap();

        let config = WatchConfig::load(dir.path()).unwrap();
        assert_eq!(config.warn_chain_depth, 4);
        assert_eq!(config.error_chain_depth, 15);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].severity, Severity::Error);
        assert_eq!(config.library_markers, vec!["sqlx".to_string()]);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = WatchConfig::default();
        config.capture_call_chain = false;
        config.save(dir.path()).unwrap();

        let loaded = WatchConfig::load(dir.path()).unwrap();
        assert!(!loaded.capture_call_chain);
        assert_eq!(loaded.rules, config.rules);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        assert!(matches!(
            WatchConfig::load(dir.path()),
            Err(EngineError::ConfigError { .. })
        ));

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{ "error_chain_depth": 0 }"#)
            .unwrap();
        assert!(WatchConfig::load(dir.path()).is_err());
    }
}
