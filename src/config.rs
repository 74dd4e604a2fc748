use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::debrid::{CredentialProvider, DEFAULT_BASE_URL};
use crate::download::DownloadOptions;
use crate::download::external::{DEFAULT_CONNECTIONS, DEFAULT_MIN_SPLIT_SIZE};
use crate::error::Error;
use crate::probe::ARIA2_BINARY;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub torrent: TorrentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_true")]
    pub use_aria2: bool,
    #[serde(default = "default_true")]
    pub auto_install_aria2: bool,
    #[serde(default = "default_aria2_binary")]
    pub aria2_binary: String,
    #[serde(default = "default_connections")]
    pub connections: u8,
    #[serde(default = "default_min_split_size")]
    pub min_split_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// 0 waits forever
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

// Default value functions
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_output_dir() -> String {
    ".".to_string()
}
fn default_true() -> bool {
    true
}
fn default_aria2_binary() -> String {
    ARIA2_BINARY.to_string()
}
fn default_connections() -> u8 {
    DEFAULT_CONNECTIONS
}
fn default_min_split_size() -> String {
    DEFAULT_MIN_SPLIT_SIZE.to_string()
}
fn default_poll_interval_secs() -> u64 {
    5
}
fn default_max_wait_secs() -> u64 {
    6 * 60 * 60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            use_aria2: default_true(),
            auto_install_aria2: default_true(),
            aria2_binary: default_aria2_binary(),
            connections: default_connections(),
            min_split_size: default_min_split_size(),
        }
    }
}

impl Default for TorrentConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

impl ApiConfig {
    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Token with everything but the last four characters hidden
    pub fn masked_token(&self) -> String {
        let token = self.token.trim();
        if token.is_empty() {
            return "<not set>".to_string();
        }
        let visible: String = token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{}", visible)
    }
}

impl CredentialProvider for ApiConfig {
    fn bearer_token(&self) -> crate::Result<String> {
        if !self.has_token() {
            return Err(Error::Authorization(
                "no API token configured, run 'rdebrid setup' first".to_string(),
            ));
        }
        Ok(self.token.trim().to_string())
    }
}

impl Config {
    /// Orchestrator options, with an optional output directory override
    pub fn download_options(&self, output_dir: Option<&str>) -> DownloadOptions {
        let max_wait = match self.torrent.max_wait_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        DownloadOptions {
            output_directory: PathBuf::from(output_dir.unwrap_or(&self.download.output_dir)),
            poll_interval: Duration::from_secs(self.torrent.poll_interval_secs),
            max_poll_wait: max_wait,
        }
    }
}

pub struct ConfigManager {
    config_dir: PathBuf,
    config_file: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load the config from the platform config directory, creating a default one
    pub fn new() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("", "", "rdebrid").context("Failed to determine config directory")?;

        Self::with_path(project_dirs.config_dir().join("config.toml"))
    }

    /// Load (or create) the config at an explicit location
    pub fn with_path(config_file: impl Into<PathBuf>) -> Result<Self> {
        let config_file = config_file.into();
        let config_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
        }

        let config = if config_file.exists() {
            Self::load_config(&config_file)?
        } else {
            let default_config = Config::default();
            Self::save_config(&config_file, &default_config)?;
            default_config
        };

        Ok(Self {
            config_dir,
            config_file,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn save(&self) -> Result<()> {
        Self::save_config(&self.config_file, &self.config)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn set_token(&mut self, token: &str) {
        self.config.api.token = token.trim().to_string();
    }

    fn load_config(config_file: &Path) -> Result<Config> {
        let content = fs::read_to_string(config_file)
            .with_context(|| format!("Failed to read config file: {:?}", config_file))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_file))?;

        Ok(config)
    }

    fn save_config(config_file: &Path, config: &Config) -> Result<()> {
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(config_file, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_file))?;

        Ok(())
    }

    /// Validate the current configuration
    pub fn validate(&self) -> crate::Result<()> {
        let config = &self.config;

        if config.api.base_url.trim().is_empty() {
            return Err(Error::Configuration("api.base_url cannot be empty".into()));
        }

        if config.api.timeout_secs == 0 {
            return Err(Error::Configuration(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        if !(1..=16).contains(&config.download.connections) {
            return Err(Error::Configuration(
                "download.connections must be between 1 and 16".into(),
            ));
        }

        if config.download.aria2_binary.trim().is_empty() {
            return Err(Error::Configuration(
                "download.aria2_binary cannot be empty".into(),
            ));
        }

        if config.download.min_split_size.trim().is_empty() {
            return Err(Error::Configuration(
                "download.min_split_size cannot be empty".into(),
            ));
        }

        if config.torrent.poll_interval_secs == 0 {
            return Err(Error::Configuration(
                "torrent.poll_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}
