//! Writing configuration files.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8000/api/v2"
//! timeout_secs = 180
//! connect_timeout_secs = 10
//! # api_key = "semantic-scholar-key"
//!
//! [ingest]
//! chunk_size = 100
//!
//! [view]
//! items_per_page = 100
//!
//! [refresh]
//! library_interval_secs = 5
//! download_stats_interval_secs = 10
//! library_limit = 100
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;

use super::Config;

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file already exists: {0}")]
    AlreadyExists(String),
}

/// Render a configuration as pretty TOML
pub fn render(config: &Config) -> Result<String, ConfigFileError> {
    Ok(toml::to_string_pretty(config)?)
}

/// Save a configuration to `path`, creating parent directories
pub fn save(config: &Config, path: &Path) -> Result<(), ConfigFileError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render(config)?)?;
    Ok(())
}

/// Write the default configuration, refusing to overwrite an existing file.
///
/// The API key is never written out; it stays in the environment.
pub fn write_default(path: &Path) -> Result<(), ConfigFileError> {
    if path.exists() {
        return Err(ConfigFileError::AlreadyExists(path.display().to_string()));
    }

    let mut config = Config::default();
    config.api.api_key = None;
    save(&config, path)
}
