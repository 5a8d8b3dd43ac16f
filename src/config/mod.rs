use crate::capture::CaptureMode;
use crate::global;
use crate::session::RecorderVariant;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recorder: RecorderConfig,
    pub capture: CaptureConfig,
    pub api: ApiConfig,
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Which recorder to run: "audio", "video" or "switchable"
    pub variant: RecorderVariant,
    /// Starting mode of a switchable recorder. Ignored by fixed variants.
    pub default_mode: CaptureMode,
    /// Period of the elapsed-time tick
    pub tick_interval_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            variant: RecorderVariant::Switchable,
            default_mode: CaptureMode::Audio,
            tick_interval_ms: 1000,
        }
    }
}

impl RecorderConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture backend. Only "synthetic" ships with the service.
    pub backend: String,
    pub chunk_interval_ms: u64,
    pub chunk_size_bytes: usize,
    /// Simulated permission-prompt latency
    pub acquire_delay_ms: u64,
    pub deny_permission: bool,
    pub camera_available: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: "synthetic".to_string(),
            chunk_interval_ms: 250,
            chunk_size_bytes: 4096,
            acquire_delay_ms: 0,
            deny_permission: false,
            camera_available: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3838,
        }
    }
}

impl ApiConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Where `mediarec download` saves recordings. Defaults to the platform
    /// Downloads directory.
    pub directory: Option<PathBuf>,
}

impl DownloadConfig {
    pub fn resolve_directory(&self) -> Result<PathBuf> {
        match &self.directory {
            Some(dir) => Ok(dir.clone()),
            None => global::download_dir(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    fn validate(&self) -> Result<()> {
        if self.recorder.tick_interval_ms == 0 {
            bail!("recorder.tick_interval_ms must be greater than zero");
        }
        if self.capture.backend != "synthetic" {
            bail!(
                "Unknown capture backend '{}' (supported: synthetic)",
                self.capture.backend
            );
        }
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
