//! Configuration management.
//!
//! Configuration is read from a TOML file (see [`find_config_file`]) and
//! overridden by `SCHOLAR_SYNC__<SECTION>__<KEY>` environment variables.

pub mod file_config;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sync::DEFAULT_CHUNK_SIZE;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Library service connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Bulk ingestion settings
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Result view settings
    #[serde(default)]
    pub view: ViewConfig,

    /// Background refresh timers
    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Library service connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the versioned API, e.g. `http://localhost:8000/api/v2`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout. Searches fan out to five providers, so this is generous.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Semantic Scholar key forwarded as `x-api-key`
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            api_key: default_api_key(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api/v2".to_string()
}

fn default_timeout() -> u64 {
    180
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_api_key() -> Option<String> {
    std::env::var("SEMANTIC_SCHOLAR_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Bulk ingestion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Papers per bulk ingest request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Result view settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            items_per_page: default_items_per_page(),
        }
    }
}

fn default_items_per_page() -> usize {
    100
}

/// Background refresh settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_library_interval")]
    pub library_interval_secs: u64,

    #[serde(default = "default_stats_interval")]
    pub download_stats_interval_secs: u64,

    /// Page size of the library listing
    #[serde(default = "default_library_limit")]
    pub library_limit: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            library_interval_secs: default_library_interval(),
            download_stats_interval_secs: default_stats_interval(),
            library_limit: default_library_limit(),
        }
    }
}

fn default_library_interval() -> u64 {
    5
}

fn default_stats_interval() -> u64 {
    10
}

fn default_library_limit() -> u32 {
    100
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` switches the subscriber to JSON lines
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Chunk size, never zero
    pub fn chunk_size(&self) -> usize {
        self.ingest.chunk_size.max(1)
    }

    /// Page size, never zero
    pub fn items_per_page(&self) -> usize {
        self.view.items_per_page.max(1)
    }
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix("SCHOLAR_SYNC")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

/// Look for a config file in the working directory, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("scholar-sync.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("scholar-sync").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Default configuration (env-derived API key, built-in defaults)
pub fn get_config() -> Config {
    Config::default()
}
