//! Configuration management.

use crate::error::{Result, XmError};
use crate::paths;
use crate::translator::LATEST_FORMAT_VERSION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for a [`DomainStore`](crate::store::DomainStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one configuration file per domain
    pub config_dir: PathBuf,
    /// Configuration-format version spoken by the local toolstack
    pub format_version: u32,
    /// Minimum seconds between two directory scans
    pub refresh_interval_secs: u64,
    /// Longest path `define` will write to
    pub max_path_len: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            config_dir: paths::config_dir(),
            format_version: LATEST_FORMAT_VERSION,
            refresh_interval_secs: 10,
            max_path_len: 4096,
        }
    }
}

impl StoreConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Load configuration from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| XmError::io(path, e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            XmError::invalid_arg(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| XmError::io(parent, e))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| XmError::invalid_arg(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| XmError::io(path, e))
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=LATEST_FORMAT_VERSION).contains(&self.format_version) {
            return Err(XmError::invalid_arg(format!(
                "format_version must be between 1 and {}, got {}",
                LATEST_FORMAT_VERSION, self.format_version
            )));
        }
        if self.max_path_len == 0 {
            return Err(XmError::invalid_arg("max_path_len must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(config.format_version, 3);
        assert_eq!(config.refresh_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_save_and_partial_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.json");
        let config = StoreConfig { config_dir: "/srv/xen".into(), format_version: 2, ..Default::default() };
        config.save(&path).unwrap();
        assert_eq!(StoreConfig::load(&path).unwrap(), config);

        std::fs::write(&path, r#"{ "refresh_interval_secs": 0 }"#).unwrap();
        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded.refresh_interval_secs, 0);
        assert_eq!(loaded.max_path_len, 4096);
    }

    #[test]
    fn test_rejects_bad_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "format_version": 9 }"#).unwrap();
        assert!(matches!(StoreConfig::load(&path), Err(XmError::InvalidArgument { .. })));
    }
}
