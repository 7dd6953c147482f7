//! Configuration for the Carto CLI.
//!
//! Provides the [`CartoConfig`] struct that loads from TOML files,
//! environment variables, and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `CARTO_CONFIG` environment variable
//! 3. XDG default: `~/.config/carto/config.toml`
//! 4. Built-in defaults

use carto::{CartographerConfig, EngineConfig, IndexConfig, NavigatorConfig};
use carto_core::traits::ConfigProvider;
use carto_core::{Error, Result};
use confyg::{Confygery, env};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CARTO_CONFIG";

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration for the Carto CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CartoConfig {
    /// Project name, used for env var prefixes and default paths.
    pub project_name: String,

    /// Base path for all project data.
    pub base_path: Option<String>,

    /// Vector index settings.
    pub index: IndexConfig,

    /// Navigator settings.
    pub navigator: NavigatorConfig,

    /// Cartographer settings.
    pub cartographer: CartographerConfig,
}

impl Default for CartoConfig {
    fn default() -> Self {
        Self {
            project_name: "carto".to_string(),
            base_path: None,
            index: IndexConfig::default(),
            navigator: NavigatorConfig::default(),
            cartographer: CartographerConfig::default(),
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl CartoConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level("CARTO");
        env_opts.add_section("index");
        env_opts.add_section("navigator");
        env_opts.add_section("cartographer");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;

        log::debug!("Loaded configuration for project '{}'", config.project_name);
        Ok(config)
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("carto").join("config.toml"))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Engine configuration with the index directory resolved against
    /// [`ConfigProvider::data_path`] when not set explicitly.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let config = EngineConfig {
            index: self.index.clone(),
            navigator: self.navigator.clone(),
            cartographer: self.cartographer.clone(),
        }
        .with_provider(self)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// ConfigProvider implementation
// ============================================================================

impl ConfigProvider for CartoConfig {
    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn base_path(&self) -> Result<PathBuf> {
        match &self.base_path {
            Some(p) => Ok(PathBuf::from(p)),
            None => std::env::current_dir()
                .map_err(|e| Error::config(format!("Could not determine base path: {e}"))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
