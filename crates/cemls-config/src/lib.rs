//! CEM Language Server Configuration
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.cemls/config.toml`
//! - Local config: `.cemls/config.toml` (in workspace)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the language server.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct CemConfig {
    /// Module graph and manifest analysis configuration
    pub analysis: AnalysisConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Analysis configuration for the module graph and manifest loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Breadth-first depth cap for transitive element resolution.
    /// Values at or below zero fall back to the built-in default.
    pub max_transitive_depth: i64,

    /// Extra manifest files to load in addition to discovered ones
    /// (workspace-relative paths).
    pub manifests: Vec<PathBuf>,

    /// Skip scanning `node_modules` for installed package manifests.
    pub skip_node_modules: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_transitive_depth: 5,
            manifests: Vec::new(),
            skip_node_modules: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional; stderr when unset)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level
    pub log_level: Option<String>,

    /// Override the transitive depth cap
    pub max_transitive_depth: Option<i64>,

    /// Override node_modules scanning
    pub skip_node_modules: Option<bool>,
}

impl CemConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(depth) = overrides.max_transitive_depth {
            self.analysis.max_transitive_depth = depth;
        }
        if let Some(skip) = overrides.skip_node_modules {
            self.analysis.skip_node_modules = skip;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown logging.level '{}'; valid values: {}",
                self.logging.level,
                LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}
