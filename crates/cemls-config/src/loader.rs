//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.cemls/config.toml`
//! 2. Local config: `.cemls/config.toml` (in workspace)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{CemConfig, ConfigOverrides};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration directory name, both global and workspace-local.
const CONFIG_DIR: &str = ".cemls";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.cemls`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<CemConfig>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.cemls`).
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(CONFIG_DIR)),
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a workspace.
    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a workspace with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<CemConfig, ConfigError> {
        let mut config = CemConfig::default();

        if let Some(global) = self.load_global()? {
            config = global;
        }

        if let Some(local) = self.load_local(workspace_root)? {
            config = merge_configs(config, local);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<CemConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        let config = read_config_file(&global_path)?;
        self.global_config = Some(config.clone());
        Ok(Some(config))
    }

    /// Load only the workspace-local configuration.
    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<CemConfig>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);
        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }
        read_config_file(&local_path).map(Some)
    }
}

fn read_config_file(path: &Path) -> Result<CemConfig, ConfigError> {
    debug!("Loading config from {:?}", path);
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge `overlay` onto `base`, field group by field group.
///
/// An overlay group that differs from the defaults wins wholesale; this
/// keeps merging predictable without per-field tracking.
fn merge_configs(base: CemConfig, overlay: CemConfig) -> CemConfig {
    let defaults = CemConfig::default();
    CemConfig {
        analysis: if overlay.analysis != defaults.analysis {
            overlay.analysis
        } else {
            base.analysis
        },
        logging: if overlay.logging != defaults.logging {
            overlay.logging
        } else {
            base.logging
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) {
        let config_dir = dir.join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn defaults_when_nothing_exists() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();

        let mut loader = ConfigLoader::with_global_dir(home.path().join(CONFIG_DIR));
        let config = loader.load(workspace.path(), None).unwrap();
        assert_eq!(config, CemConfig::default());
    }

    #[test]
    fn local_overrides_global() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();

        let global_dir = home.path().join(CONFIG_DIR);
        fs::create_dir_all(&global_dir).unwrap();
        fs::write(
            global_dir.join(CONFIG_FILE_NAME),
            "[logging]\nlevel = \"warn\"\n[analysis]\nmax_transitive_depth = 8\n",
        )
        .unwrap();
        write_config(workspace.path(), "[logging]\nlevel = \"debug\"\n");

        let mut loader = ConfigLoader::with_global_dir(global_dir);
        let config = loader.load(workspace.path(), None).unwrap();

        // Local logging wins; analysis comes from the global file.
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.analysis.max_transitive_depth, 8);
    }

    #[test]
    fn overrides_win_over_files() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_config(workspace.path(), "[logging]\nlevel = \"debug\"\n");

        let mut loader = ConfigLoader::with_global_dir(home.path().join(CONFIG_DIR));
        let overrides = ConfigOverrides {
            log_level: Some("error".to_string()),
            ..Default::default()
        };
        let config = loader.load(workspace.path(), Some(&overrides)).unwrap();
        assert_eq!(config.logging.level, "error");
    }

    #[test]
    fn malformed_local_config_is_an_error() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_config(workspace.path(), "logging = 3\n");

        let mut loader = ConfigLoader::with_global_dir(home.path().join(CONFIG_DIR));
        let result = loader.load(workspace.path(), None);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn invalid_merged_config_fails_validation() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_config(workspace.path(), "[logging]\nlevel = \"shout\"\n");

        let mut loader = ConfigLoader::with_global_dir(home.path().join(CONFIG_DIR));
        let result = loader.load(workspace.path(), None);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
