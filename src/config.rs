//! Configuration for the outline engine.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{OutlineError, Result};
use crate::tree::OutlineMode;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What deleting a node that still has children does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletePolicy {
    /// Refuse the delete; children would otherwise be orphaned.
    #[default]
    Reject,
    /// Remove the node with its whole subtree and hide every entry.
    DropSubtree,
}

impl FromStr for DeletePolicy {
    type Err = OutlineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(DeletePolicy::Reject),
            "drop-subtree" | "drop" => Ok(DeletePolicy::DropSubtree),
            other => Err(OutlineError::Config(format!(
                "unknown delete policy '{}', expected 'reject' or 'drop-subtree'",
                other
            ))),
        }
    }
}

/// Outline editing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSettings {
    /// Outline shown when a document opens.
    #[serde(default)]
    pub default_mode: OutlineMode,

    /// Handling of deletes on nodes with children.
    #[serde(default)]
    pub delete_policy: DeletePolicy,

    /// Open the only top-level item of a freshly shown outline.
    #[serde(default = "default_auto_expand")]
    pub auto_expand_single_root: bool,
}

fn default_auto_expand() -> bool {
    true
}

impl Default for OutlineSettings {
    fn default() -> Self {
        Self {
            default_mode: OutlineMode::default(),
            delete_policy: DeletePolicy::default(),
            auto_expand_single_root: default_auto_expand(),
        }
    }
}

/// Search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Maximum number of results per search.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    20
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub outline: OutlineSettings,

    #[serde(default)]
    pub search: SearchSettings,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (OUTLINE_DEFAULT_MODE, OUTLINE_DELETE_POLICY,
    ///    OUTLINE_AUTO_EXPAND, OUTLINE_SEARCH_LIMIT)
    /// 2. Config file (~/.config/page-outline/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| OutlineError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML config; missing sections and keys take their defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| OutlineError::Config(format!("Failed to parse config file: {}", e)))
    }

    fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply `OUTLINE_*` overrides looked up by name. A value that does not
    /// parse is a config error naming the variable.
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("OUTLINE_DEFAULT_MODE") {
            self.outline.default_mode = parse_override("OUTLINE_DEFAULT_MODE", &mode)?;
        }

        if let Some(policy) = lookup("OUTLINE_DELETE_POLICY") {
            self.outline.delete_policy = parse_override("OUTLINE_DELETE_POLICY", &policy)?;
        }

        if let Some(expand) = lookup("OUTLINE_AUTO_EXPAND") {
            self.outline.auto_expand_single_root = parse_override("OUTLINE_AUTO_EXPAND", &expand)?;
        }

        if let Some(limit) = lookup("OUTLINE_SEARCH_LIMIT") {
            self.search.max_results = parse_override("OUTLINE_SEARCH_LIMIT", &limit)?;
        }

        Ok(())
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "page-outline")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.search.max_results == 0 {
            return Err(OutlineError::Config(
                "search.max_results must be at least 1. Set OUTLINE_SEARCH_LIMIT or fix the config file."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| OutlineError::Config(format!("invalid {} '{}': {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.outline.default_mode, OutlineMode::AiToc);
        assert_eq!(config.outline.delete_policy, DeletePolicy::Reject);
        assert!(config.outline.auto_expand_single_root);
        assert_eq!(config.search.max_results, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("outline:\n  default_mode: bookmarks\n").unwrap();
        assert_eq!(config.outline.default_mode, OutlineMode::Bookmarks);
        assert_eq!(config.outline.delete_policy, DeletePolicy::Reject);
        assert_eq!(config.search.max_results, 20);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = "outline:\n  default_mode: ai-toc\n  delete_policy: drop-subtree\n  auto_expand_single_root: false\nsearch:\n  max_results: 5\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.outline.delete_policy, DeletePolicy::DropSubtree);
        assert!(!config.outline.auto_expand_single_root);
        assert_eq!(config.search.max_results, 5);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let result = Config::from_yaml("outline: [unclosed");
        assert!(matches!(result, Err(OutlineError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "search:\n  max_results: 3\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.search.max_results, 3);
    }

    #[test]
    fn test_validate_rejects_zero_results() {
        let mut config = Config::default();
        config.search.max_results = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_delete_policy_parsing() {
        assert_eq!("drop".parse::<DeletePolicy>().ok(), Some(DeletePolicy::DropSubtree));
        assert_eq!("Reject".parse::<DeletePolicy>().ok(), Some(DeletePolicy::Reject));
        assert!("promote".parse::<DeletePolicy>().is_err());
    }

    #[test]
    fn test_overrides_apply_every_variable() {
        let mut config = Config::default();
        config
            .apply_overrides(overrides(&[
                ("OUTLINE_DEFAULT_MODE", "bookmarks"),
                ("OUTLINE_DELETE_POLICY", "drop-subtree"),
                ("OUTLINE_AUTO_EXPAND", "false"),
                ("OUTLINE_SEARCH_LIMIT", " 7 "),
            ]))
            .unwrap();

        assert_eq!(config.outline.default_mode, OutlineMode::Bookmarks);
        assert_eq!(config.outline.delete_policy, DeletePolicy::DropSubtree);
        assert!(!config.outline.auto_expand_single_root);
        assert_eq!(config.search.max_results, 7);
    }

    #[test]
    fn test_invalid_override_is_config_error_for_every_variable() {
        for (key, value) in [
            ("OUTLINE_DEFAULT_MODE", "sideways"),
            ("OUTLINE_DELETE_POLICY", "promote"),
            ("OUTLINE_AUTO_EXPAND", "yes please"),
            ("OUTLINE_SEARCH_LIMIT", "lots"),
        ] {
            let mut config = Config::default();
            let result = config.apply_overrides(overrides(&[(key, value)]));
            match result {
                Err(OutlineError::Config(message)) => assert!(message.contains(key), "{}", message),
                other => panic!("{} = {:?} gave {:?}", key, value, other),
            }
        }
    }

    #[test]
    fn test_no_overrides_keeps_file_values() {
        let mut config = Config::from_yaml("search:\n  max_results: 3\n").unwrap();
        config.apply_overrides(overrides(&[])).unwrap();
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.outline.default_mode, OutlineMode::AiToc);
    }
}
