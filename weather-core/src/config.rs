use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::{error::WeatherError, model::Unit};

pub const ENV_API_KEY: &str = "SENIVERSE_API_KEY";
pub const ENV_BASE_URL: &str = "SENIVERSE_BASE_URL";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";

/// Settings for the Seniverse client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeniverseConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Connect + read timeout for one upstream call.
    pub timeout_secs: u64,
    pub default_language: String,
    pub default_unit: Unit,
}

impl Default for SeniverseConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.seniverse.com/v3".to_string(),
            timeout_secs: 10,
            default_language: crate::model::DEFAULT_LANGUAGE.to_string(),
            default_unit: Unit::C,
        }
    }
}

impl SeniverseConfig {
    /// Returns the API key, failing when it is absent or blank.
    pub fn require_api_key(&self) -> Result<&str, WeatherError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(WeatherError::Config(format!(
                "No Seniverse API key configured.\n\
                 Hint: set {ENV_API_KEY} or run `weather-server configure`."
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [seniverse]
/// api_key = "..."
///
/// [server]
/// port = 8000
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub seniverse: SeniverseConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(cfg)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlay values looked up by variable name (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY) {
            self.seniverse.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.seniverse.base_url = url;
        }
        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_PORT} value '{port}'"))?;
        }
        Ok(())
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-stream", "weather-server")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.seniverse.api_key = Some(api_key);
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
