//! Configuration management for uitree CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uitree::ObjectLayout;

/// Type name searched for when neither the command line nor the config names one
pub const DEFAULT_TYPE_NAME: &str = "UIRoot";

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Root type name
    pub type_name: Option<String>,
    /// Layout overrides; unset fields keep the CPython 2.7 defaults
    pub layout: Option<ObjectLayout>,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("uitree");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file, or the default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config file")?;
        if let Some(layout) = &config.layout {
            layout.validate().context("Invalid [layout] in config file")?;
        }
        Ok(config)
    }

    /// Get the root type name, falling back to the built-in default
    pub fn get_type_name(&self) -> &str {
        self.type_name.as_deref().unwrap_or(DEFAULT_TYPE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uitree::ChildrenLocator;

    #[test]
    fn test_config_path_exists() {
        let result = Config::config_path();
        assert!(result.is_ok());
    }

    #[test]
    fn test_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.get_type_name(), "UIRoot");
        assert!(config.layout.is_none());
    }

    #[test]
    fn test_config_with_layout_table() {
        let config = Config::parse(
            r#"
            type_name = "UIRootX"

            [layout]
            string_type_name = "unicode"

            [layout.children]
            kind = "dict_path"
            keys = ["children", "_childrenObjects"]
            "#,
        )
        .unwrap();

        assert_eq!(config.get_type_name(), "UIRootX");
        let layout = config.layout.unwrap();
        assert_eq!(layout.string_type_name, "unicode");
        assert_eq!(layout.type_pointer_offset, 8);
        assert!(matches!(layout.children, ChildrenLocator::DictPath { .. }));
    }

    #[test]
    fn test_invalid_layout_in_config_is_rejected() {
        assert!(Config::parse("[layout]\ndict_slot_stride = 0").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "type_name = \"Desktop\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.get_type_name(), "Desktop");
        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }
}
