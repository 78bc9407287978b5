//! Configuration loading and folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: compiled defaults apply and the
//! returned [`ConfigSource`] says so.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ELOPIX_CONFIG";

/// How an item's identity is derived from its path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityScheme {
    /// Bare file name (`cat.png`). Compatible with existing rating documents,
    /// but two files with the same name in different folders share a record.
    #[default]
    FileName,
    /// Path relative to the image root (`pets/cat.png`)
    RelativePath,
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder scanned for images
    #[serde(default)]
    pub image_root: Option<PathBuf>,

    /// Folder holding ratings.json and blacklist.json
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Identity derivation for catalog entries
    #[serde(default)]
    pub identity: IdentityScheme,

    /// Default number of entries returned by the top-ranked view
    #[serde(default = "default_top_rank_count")]
    pub top_rank_count: usize,

    /// Periodic autosave interval in seconds (0 disables autosave)
    #[serde(default)]
    pub autosave_interval_secs: u64,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub prefetch: PrefetchConfig,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            image_root: None,
            data_folder: None,
            port: default_port(),
            identity: IdentityScheme::default(),
            top_rank_count: default_top_rank_count(),
            autosave_interval_secs: 0,
            selection: SelectionConfig::default(),
            prefetch: PrefetchConfig::default(),
            assets: AssetsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Pair selection tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Size of the least-compared pool pairs are sampled from
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
        }
    }
}

/// Prefetch pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Number of prepared pairs buffered ahead of the user
    #[serde(default = "default_prefetch_capacity")]
    pub capacity: usize,

    /// Delay before retrying after an asset failed to prepare
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Delay before retrying when fewer than two items are eligible
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            capacity: default_prefetch_capacity(),
            retry_backoff_ms: default_retry_backoff_ms(),
            idle_backoff_ms: default_idle_backoff_ms(),
        }
    }
}

/// Asset preparation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Files larger than this are rejected instead of loaded
    #[serde(default = "default_max_asset_bytes")]
    pub max_bytes: u64,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_asset_bytes(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    5790
}

fn default_top_rank_count() -> usize {
    10
}

fn default_pool_size() -> usize {
    20
}

fn default_prefetch_capacity() -> usize {
    5
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_idle_backoff_ms() -> u64 {
    500
}

fn default_max_asset_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML config text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the ranking core cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.selection.pool_size < 2 {
            return Err(Error::Config(format!(
                "selection.pool_size must be at least 2 (got {})",
                self.selection.pool_size
            )));
        }
        if self.prefetch.capacity == 0 {
            return Err(Error::Config("prefetch.capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Load configuration
///
/// An explicit path (CLI or `ELOPIX_CONFIG`) must exist and parse. Without
/// one, the platform config locations are tried and a missing file falls
/// back to defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    if let Some(path) = explicit {
        let config = TomlConfig::from_file(path)?;
        return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        let config = TomlConfig::from_file(&path)?;
        return Ok((config, ConfigSource::Env(path)));
    }

    match find_config_file() {
        Some(path) => {
            let config = TomlConfig::from_file(&path)?;
            Ok((config, ConfigSource::Discovered(path)))
        }
        None => Ok((TomlConfig::default(), ConfigSource::Defaults)),
    }
}

/// Where [`load_config`] found its settings
///
/// Returned so the caller can log it once tracing is initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path given on the command line
    Explicit(PathBuf),
    /// Path named by [`CONFIG_ENV_VAR`]
    Env(PathBuf),
    /// Platform config file
    Discovered(PathBuf),
    /// No file found
    Defaults,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::Discovered(path) => {
                info!("Loaded configuration from {}", path.display())
            }
            ConfigSource::Env(path) => {
                info!("Loaded configuration from {} ({})", path.display(), CONFIG_ENV_VAR)
            }
            ConfigSource::Defaults => warn!("No config file found, using compiled defaults"),
        }
    }
}

/// Locate the platform config file, if one exists
///
/// Linux checks `~/.config/elopix/config.toml`, then `/etc/elopix/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("elopix").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/elopix/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// Resolve a folder setting following the priority order
pub fn resolve_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
    fallback: impl FnOnce() -> PathBuf,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    // Priority 4: compiled default
    fallback()
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/elopix
        dirs::data_local_dir()
            .map(|d| d.join("elopix"))
            .unwrap_or_else(|| PathBuf::from("./elopix_data"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/elopix
        dirs::data_dir()
            .map(|d| d.join("elopix"))
            .unwrap_or_else(|| PathBuf::from("./elopix_data"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\elopix
        dirs::data_local_dir()
            .map(|d| d.join("elopix"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\elopix"))
    } else {
        PathBuf::from("./elopix_data")
    }
}

/// OS-dependent default image folder (the user's Pictures directory)
pub fn default_image_root() -> PathBuf {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("."))
}
