//! TOML-based configuration persistence.
//!
//! Reads and writes [`AppConfig`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\antscan\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/antscan/config.toml` or `~/.config/antscan/config.toml`
//! - macOS:    `~/Library/Application Support/antscan/config.toml`
//!
//! ```toml
//! [scanner]
//! api_port = 4028
//! query_timeout_ms = 2000
//! probe_timeout_ms = 3000
//! max_in_flight = 32
//! log_level = "info"
//!
//! [[groups]]
//! name = "container-1"
//! ip_ranges = ["10.4.101.0/24", "10.4.102.1-50"]
//! gateway = "10.4.101.1"
//! ```
//!
//! Every field has a serde default, so an empty file, a file from an older
//! release, and a missing file all load.
//!
//! # Legacy container file
//!
//! Earlier tooling kept groups in a JSON object keyed by group name:
//!
//! ```json
//! { "container-1": { "ip_ranges": ["10.4.101.0/24"], "mikrotik_ip": "10.4.101.1" } }
//! ```
//!
//! [`import_legacy_containers`] reads that file into [`ScanGroup`]s.  An empty
//! `mikrotik_ip` means the group has no gateway.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use antscan_core::{ScanGroup, DEFAULT_API_PORT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::application::run_scan::DEFAULT_MAX_IN_FLIGHT;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The legacy container file is not the expected JSON object.
    #[error("failed to parse legacy container file {path}: {source}")]
    Legacy {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A group is missing its name or its ranges.
    #[error("invalid group: {0}")]
    InvalidGroup(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub groups: Vec<ScanGroup>,
}

/// Scan tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannerConfig {
    /// TCP port of the device API.
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Deadline for one device query, connect through last byte.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// Outer bound for one gateway ping.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Maximum concurrent device connections.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ScannerConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}
fn default_query_timeout_ms() -> u64 {
    2000
}
fn default_probe_timeout_ms() -> u64 {
    3000
}
fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            query_timeout_ms: default_query_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            max_in_flight: default_max_in_flight(),
            log_level: default_log_level(),
        }
    }
}

// ── Group management ──────────────────────────────────────────────────────────

impl AppConfig {
    pub fn find_group(&self, name: &str) -> Option<&ScanGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Adds `group`, replacing any group with the same name in place.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidGroup`] when the name is blank or the
    /// group has no range expressions.
    pub fn upsert_group(&mut self, group: ScanGroup) -> Result<(), ConfigError> {
        if group.name.trim().is_empty() {
            return Err(ConfigError::InvalidGroup("name must not be empty".to_string()));
        }
        if group.ip_ranges.is_empty() {
            return Err(ConfigError::InvalidGroup(format!(
                "group '{}' needs at least one range",
                group.name
            )));
        }

        match self.groups.iter_mut().find(|g| g.name == group.name) {
            Some(existing) => *existing = group,
            None => self.groups.push(group),
        }
        Ok(())
    }

    /// Removes the named group.  Returns `false` if there was none.
    pub fn remove_group(&mut self, name: &str) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| g.name != name);
        self.groups.len() != before
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the platform path.  See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Persists `config` to the platform path.  See [`save_config_to`].
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(&config_file_path()?, config)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Legacy import ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LegacyContainer {
    #[serde(default)]
    ip_ranges: Vec<String>,
    #[serde(default)]
    mikrotik_ip: Option<String>,
}

/// Reads a legacy JSON container file into scan groups, sorted by name.
///
/// Range strings are trimmed and blank ones dropped.  A gateway that is not
/// an IPv4 address is dropped with a warning; the group is still imported.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Legacy`] if it is not a JSON object of containers.
pub fn import_legacy_containers(path: &Path) -> Result<Vec<ScanGroup>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let containers: BTreeMap<String, LegacyContainer> =
        serde_json::from_str(&content).map_err(|source| ConfigError::Legacy {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(containers
        .into_iter()
        .map(|(name, container)| legacy_to_group(name, container))
        .collect())
}

fn legacy_to_group(name: String, container: LegacyContainer) -> ScanGroup {
    let ranges = container
        .ip_ranges
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    let gateway = container
        .mikrotik_ip
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| match s.parse::<Ipv4Addr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                warn!(group = %name, gateway = s, "ignoring gateway that is not an IPv4 address");
                None
            }
        });

    ScanGroup {
        name,
        ip_ranges: ranges,
        gateway,
    }
}

/// Resolves the platform config base directory including the `antscan` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("antscan"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("antscan"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("antscan"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
