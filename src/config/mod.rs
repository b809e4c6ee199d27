//! Configuration file management
//!
//! Loads TOML configuration files and provides application settings.
//! Default config path: ~/.config/bseat/config.toml

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{DRM_CARD_PREFIX, DRM_SUBSYSTEM};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session settings
    pub session: SessionConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Host binary settings
    pub host: HostConfig,
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// udev subsystem the hotplug monitor listens on
    pub hotplug_subsystem: String,
    /// sysname prefix of display cards ("card" matches card0, card1, ...)
    pub card_prefix: String,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// env_logger filter, overridden by RUST_LOG
    /// Examples: "info", "bseat=debug", "warn,bseat::input=trace"
    pub filter: String,
}

/// Host binary settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Ctrl+Alt+F1..F12 switches VT
    pub vt_switch: bool,
    /// Send READY=1 / STOPPING=1 to systemd
    pub notify_systemd: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hotplug_subsystem: DRM_SUBSYSTEM.to_string(),
            card_prefix: DRM_CARD_PREFIX.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            vt_switch: true,
            notify_systemd: true,
        }
    }
}

/// Where the loaded config came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(PathBuf),
    Defaults,
    /// Unreadable or invalid file; defaults were used
    Failed(PathBuf, String),
}

impl LoadOutcome {
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => info!("Loaded config: {}", path.display()),
            Self::Defaults => info!("Using built-in default config"),
            Self::Failed(path, e) => warn!("Failed to load config {}: {}", path.display(), e),
        }
    }
}

impl Config {
    /// System-wide config path
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/bseat/config.toml";

    /// Get the path that would be used for loading config
    /// Returns None if using built-in defaults
    pub fn config_path() -> Option<PathBuf> {
        // 1. BSEAT_CONFIG environment variable
        if let Ok(path) = std::env::var("BSEAT_CONFIG") {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        // 2. User config: ~/.config/bseat/config.toml
        if let Some(config_path) = Self::user_config_path() {
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // 3. System config: /etc/bseat/config.toml
        let system_config = Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bseat").join("config.toml"))
    }

    /// Load configuration with priority:
    /// 1. BSEAT_CONFIG environment variable
    /// 2. ~/.config/bseat/config.toml (user config)
    /// 3. /etc/bseat/config.toml (system config)
    /// 4. Built-in defaults
    ///
    /// Runs before the logger is installed; log the outcome afterwards.
    pub fn load() -> (Self, LoadOutcome) {
        let Some(path) = Self::config_path() else {
            return (Self::default(), LoadOutcome::Defaults);
        };
        match Self::load_from_file(&path) {
            Ok(config) => (config, LoadOutcome::Loaded(path)),
            Err(e) => (Self::default(), LoadOutcome::Failed(path, format!("{:#}", e))),
        }
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Write the default config to the user config path
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub fn write_default(force: bool) -> Result<PathBuf> {
        let path = Self::user_config_path()
            .ok_or_else(|| anyhow::anyhow!("Config directory not found"))?;
        if path.exists() && !force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                path.display()
            );
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote default config: {}", path.display());
        Ok(path)
    }

    /// Warn about values the session cannot work with
    pub fn validate(&self) {
        if self.session.hotplug_subsystem.is_empty() {
            warn!("session.hotplug_subsystem is empty, no hotplug event will match");
        }
        if self.session.card_prefix.is_empty() {
            warn!("session.card_prefix is empty, no card name will match");
        }
    }
}
