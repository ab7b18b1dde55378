//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/brandpulse/config.toml)
//! 3. Project config (.brandpulse/config.toml)
//! 4. Explicit `--config` file
//! 5. Environment variables (BRANDPULSE_* prefix, `__` separates sections)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{MonitorError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → explicit file → env vars
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(MonitorError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            debug!("Loading explicit config from: {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        // e.g. BRANDPULSE_STORAGE__RETRY_LIMIT -> storage.retry_limit
        figment = figment.merge(Env::prefixed("BRANDPULSE_").split("__").lowercase(true));

        Self::extract(figment)
    }

    /// Load configuration from a specific file only (no env, no global files)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| MonitorError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/brandpulse/)
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "brandpulse").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(".brandpulse")
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render the effective configuration (secrets are never serialized)
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| MonitorError::Config(e.to_string()))
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Write a starter config. Existing files are kept unless `force` is set.
    pub fn init(global: bool, force: bool) -> Result<PathBuf> {
        let path = if global {
            Self::global_config_path().ok_or_else(|| {
                MonitorError::config("Cannot determine global config directory")
            })?
        } else {
            Self::project_config_path()
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if !path.exists() || force {
            fs::write(&path, Self::default_config_template())?;
            info!("Created config: {}", path.display());
        } else {
            info!("Config exists: {}", path.display());
        }

        Ok(path)
    }

    fn default_config_template() -> &'static str {
        r#"# BrandPulse Configuration
# API keys are read from OPENAI_API_KEY, PERPLEXITY_API_KEY and GEMINI_API_KEY
# unless set here. The Sheets token falls back to GOOGLE_SHEETS_ACCESS_TOKEN.

version = "1.0"

[brand]
target_brand = "DataTobiz"
brand_variations = ["DataTobiz", "Data Tobiz", "Data-Tobiz", "datatobiz.com"]

[monitor]
enabled_providers = ["openai", "perplexity", "gemini"]
per_provider_timeout_seconds = 60.0
enable_ranking_detection = true
enable_cost_tracking = true

[ranking]
max_position = 20

[storage]
backend = "google-sheets"
worksheet_name = "Brand_Monitoring_New"
retry_limit = 3
"#
    }
}
