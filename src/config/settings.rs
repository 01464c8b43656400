//! Companion settings
//!
//! Read-only JSON file under the XDG config dir, then environment overrides,
//! then command-line overrides. A missing or broken file falls back to
//! defaults; nothing is ever written back.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::Cli;
use crate::constants::{env, hearthstone};
use crate::log_config::LogZone;
use crate::paths;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    #[default]
    Terminal,
    Log,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Display name of the client in the process list
    pub target_name: String,
    pub wine_prefix: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
    pub log_config_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub prompt: PromptMode,
    /// Zones required in log.config and tailed by the pipeline
    pub zones: Vec<LogZone>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_name: hearthstone::APPLICATION_NAME.to_string(),
            wine_prefix: None,
            install_dir: None,
            log_config_path: None,
            log_dir: None,
            prompt: PromptMode::default(),
            zones: LogZone::ALL.to_vec(),
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::FILENAME);
        path
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse settings JSON")
    }

    /// Load settings from `path` (or the default location) and apply env overrides
    pub fn load(path: Option<&Path>) -> Self {
        let config_path = path.map_or_else(Self::config_path, Path::to_path_buf);

        let mut settings = match fs::read_to_string(&config_path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(settings) => {
                    info!(path = %config_path.display(), "Loaded settings");
                    settings
                }
                Err(e) => {
                    error!(path = %config_path.display(), error = ?e, "Invalid settings file, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                debug!(path = %config_path.display(), error = %e, "No settings file, using defaults");
                Self::default()
            }
        };

        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate();
        settings
    }

    /// Apply environment-style overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(target) = lookup(env::TARGET) {
            self.target_name = target;
        }
        if let Some(path) = lookup(env::LOG_CONFIG) {
            self.log_config_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup(env::LOG_DIR) {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(prefix) = lookup(env::WINE_PREFIX) {
            self.wine_prefix = Some(PathBuf::from(prefix));
        }
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(target) = &cli.target {
            self.target_name = target.clone();
        }
        if let Some(path) = &cli.log_config {
            self.log_config_path = Some(path.clone());
        }
        if let Some(dir) = &cli.log_dir {
            self.log_dir = Some(dir.clone());
        }
        if cli.no_prompt {
            self.prompt = PromptMode::Log;
        }
        self.validate();
    }

    /// Normalize values that would make the companion useless
    pub fn validate(&mut self) {
        let trimmed = self.target_name.trim();
        if trimmed.is_empty() {
            warn!(using = hearthstone::APPLICATION_NAME, "Empty target_name, using default");
            self.target_name = hearthstone::APPLICATION_NAME.to_string();
        } else if trimmed.len() != self.target_name.len() {
            self.target_name = trimmed.to_string();
        }

        if self.zones.is_empty() {
            warn!("No zones configured, enabling all zones");
            self.zones = LogZone::ALL.to_vec();
        }
        let count = self.zones.len();
        self.zones.sort_unstable();
        self.zones.dedup();
        if self.zones.len() != count {
            debug!(zones = ?self.zones, "Removed duplicate zones");
        }
    }

    pub fn wine_prefix(&self) -> PathBuf {
        self.wine_prefix
            .clone()
            .unwrap_or_else(paths::default_wine_prefix)
    }

    /// Explicit install dir if set (warning when it does not look valid), else auto-detected
    pub fn install_dir(&self) -> Option<PathBuf> {
        match &self.install_dir {
            Some(dir) => {
                if !paths::validate_install_dir(dir) {
                    warn!(path = %dir.display(), "Configured install_dir does not contain the client executable");
                }
                Some(dir.clone())
            }
            None => paths::find_install_dir(&self.wine_prefix()),
        }
    }

    pub fn log_config_path(&self) -> PathBuf {
        self.log_config_path.clone().unwrap_or_else(|| {
            let user = std::env::var(env::USER).ok();
            paths::default_log_config_path(&self.wine_prefix(), user.as_deref())
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        if let Some(dir) = &self.log_dir {
            return dir.clone();
        }
        match self.install_dir() {
            Some(install) => paths::default_log_dir(&install),
            None => {
                let fallback = paths::fallback_log_dir(&self.wine_prefix());
                warn!(path = %fallback.display(), "Client install not found, assuming default log directory");
                fallback
            }
        }
    }
}
