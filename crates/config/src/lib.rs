#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for modsite
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/modsite/config.toml)
//! - Environment variables
//! - CLI flags

pub mod constants;

use constants::{
    DEFAULT_DB_FILE, DEFAULT_FETCH_INFO_LINGER_SECS, DEFAULT_FETCH_TIMEOUT_SECS,
    DEFAULT_MAX_COMPOSITE_ELEMENTS, DEFAULT_MAX_DOCUMENTATION_HTML, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_MAX_IMPORTS_PER_PACKAGE, DEFAULT_MAX_LITERAL_LEN, DEFAULT_MAX_MODULE_ZIP_SIZE,
    DEFAULT_PROXY_URL, MIB,
};
use modsite_errors::{ConfigError, Error};
use modsite_types::BuildContext;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub admission: AdmissionConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Limits applied while fetching and processing a module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64, // bytes
    #[serde(default = "default_max_documentation_html")]
    pub max_documentation_html: u64, // bytes
    #[serde(default = "default_max_literal_len")]
    pub max_literal_len: usize,
    #[serde(default = "default_max_composite_elements")]
    pub max_composite_elements: usize,
    #[serde(default = "default_max_imports_per_package")]
    pub max_imports_per_package: usize,
    #[serde(default = "default_max_module_zip_size")]
    pub max_module_zip_size: u64, // bytes
    #[serde(default = "default_fetch_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_fetch_info_linger")]
    pub fetch_info_linger: u64, // seconds
    #[serde(default = "default_build_contexts")]
    pub build_contexts: Vec<String>,
}

/// Load shedding configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdmissionConfig {
    /// Total zip bytes (in MiB) allowed in flight. No shedding when unset.
    pub max_in_flight_zip_mi: Option<u64>,
}

/// Module proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_url")]
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64, // seconds
}

/// Work queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_workers")]
    pub workers: usize, // 0 = auto-detect
    /// When set, tasks are POSTed to this URL instead of run in-process.
    pub dispatch_url: Option<String>,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    pub db_path: Option<PathBuf>,
}

// Default implementations

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_documentation_html: DEFAULT_MAX_DOCUMENTATION_HTML,
            max_literal_len: DEFAULT_MAX_LITERAL_LEN,
            max_composite_elements: DEFAULT_MAX_COMPOSITE_ELEMENTS,
            max_imports_per_package: DEFAULT_MAX_IMPORTS_PER_PACKAGE,
            max_module_zip_size: DEFAULT_MAX_MODULE_ZIP_SIZE,
            timeout: DEFAULT_FETCH_TIMEOUT_SECS,
            fetch_info_linger: DEFAULT_FETCH_INFO_LINGER_SECS,
            build_contexts: default_build_contexts(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PROXY_URL.to_string(),
            timeout: 300, // 5 minutes
            retries: 3,
            retry_delay: 1, // 1 second
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            dispatch_url: None,
        }
    }
}

// Default value functions for serde
fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_max_documentation_html() -> u64 {
    DEFAULT_MAX_DOCUMENTATION_HTML
}

fn default_max_literal_len() -> usize {
    DEFAULT_MAX_LITERAL_LEN
}

fn default_max_composite_elements() -> usize {
    DEFAULT_MAX_COMPOSITE_ELEMENTS
}

fn default_max_imports_per_package() -> usize {
    DEFAULT_MAX_IMPORTS_PER_PACKAGE
}

fn default_max_module_zip_size() -> u64 {
    DEFAULT_MAX_MODULE_ZIP_SIZE
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_fetch_info_linger() -> u64 {
    DEFAULT_FETCH_INFO_LINGER_SECS
}

fn default_build_contexts() -> Vec<String> {
    BuildContext::defaults()
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_proxy_url() -> String {
    DEFAULT_PROXY_URL.to_string()
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1 // 1 second
}

fn default_workers() -> usize {
    0
}

impl FetchConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    #[must_use]
    pub fn fetch_info_linger(&self) -> Duration {
        Duration::from_secs(self.fetch_info_linger)
    }

    /// Parse the configured build contexts
    ///
    /// # Errors
    ///
    /// Returns an error if an entry is not of the form `goos/goarch` or the
    /// list is empty.
    pub fn build_contexts(&self) -> Result<Vec<BuildContext>, Error> {
        if self.build_contexts.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "fetch.build_contexts".to_string(),
                value: "[]".to_string(),
            }
            .into());
        }
        self.build_contexts
            .iter()
            .map(|s| {
                BuildContext::parse(s).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        field: "fetch.build_contexts".to_string(),
                        value: s.clone(),
                    }
                    .into()
                })
            })
            .collect()
    }
}

impl AdmissionConfig {
    /// Shedding budget in bytes, if shedding is enabled.
    #[must_use]
    pub fn max_in_flight_bytes(&self) -> Option<u64> {
        self.max_in_flight_zip_mi.map(|mi| mi.saturating_mul(MIB))
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("modsite").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_vars(|name| std::env::var(name).ok())
    }

    fn merge_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), Error> {
        // MODSITE_PROXY_URL
        if let Some(url) = var("MODSITE_PROXY_URL") {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: "MODSITE_PROXY_URL".to_string(),
                    value: url,
                }
                .into());
            }
            self.proxy.url = url;
        }

        // MODSITE_DB_PATH
        if let Some(path) = var("MODSITE_DB_PATH") {
            self.store.db_path = Some(PathBuf::from(path));
        }

        // MODSITE_WORKERS
        if let Some(workers) = var("MODSITE_WORKERS") {
            self.queue.workers = workers.parse().map_err(|_| ConfigError::InvalidValue {
                field: "MODSITE_WORKERS".to_string(),
                value: workers,
            })?;
        }

        // MODSITE_MAX_IN_FLIGHT_ZIP_MI
        if let Some(mi) = var("MODSITE_MAX_IN_FLIGHT_ZIP_MI") {
            let parsed: u64 = mi.parse().map_err(|_| ConfigError::InvalidValue {
                field: "MODSITE_MAX_IN_FLIGHT_ZIP_MI".to_string(),
                value: mi,
            })?;
            self.admission.max_in_flight_zip_mi = Some(parsed);
        }

        // MODSITE_FETCH_TIMEOUT
        if let Some(secs) = var("MODSITE_FETCH_TIMEOUT") {
            self.fetch.timeout = secs.parse().map_err(|_| ConfigError::InvalidValue {
                field: "MODSITE_FETCH_TIMEOUT".to_string(),
                value: secs,
            })?;
        }

        Ok(())
    }

    /// Get the database path (with default)
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.store.db_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("modsite")
                .join(DEFAULT_DB_FILE)
        })
    }
}

/// Directory for debug log files
#[must_use]
pub fn logs_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("modsite")
        .join("logs")
}

/// Calculate worker count based on CPU count
#[must_use]
pub fn calculate_workers(config_value: usize) -> usize {
    if config_value > 0 {
        config_value // User override
    } else {
        // Fetches are mostly network-bound
        (num_cpus::get() * 2).max(1)
    }
}
