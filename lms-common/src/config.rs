//! Configuration loading and settings resolution
//!
//! Every setting resolves in this order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or malformed TOML file is never fatal to the shared settings:
//! the caller logs it and the remaining tiers apply.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable naming an explicit config file
pub const ENV_CONFIG: &str = "LMS_CONFIG";
/// Environment variable overriding the database path
pub const ENV_DATABASE: &str = "LMS_DATABASE";
/// Environment variable overriding the bind address
pub const ENV_BIND_ADDRESS: &str = "LMS_BIND_ADDRESS";
/// Environment variable overriding the HTTP port
pub const ENV_PORT: &str = "LMS_PORT";
/// Environment variable holding the bearer token secret
pub const ENV_API_SECRET: &str = "LMS_API_SECRET";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
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

fn default_log_level() -> String {
    "info".to_string()
}

/// Shared keys of `config.toml`
///
/// Service-specific sections (such as `[[plans]]`) are read by the service
/// from the same file with [`load_toml_section`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub api_secret: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub port: u16,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            database_path: default_data_dir().join("lms.db"),
            bind_address: "127.0.0.1".to_string(),
            port: 5780,
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub database_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub api_secret: Option<String>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub port: u16,
    /// HS256 secret for bearer tokens; `None` disables authentication
    pub api_secret: Option<String>,
}

/// Resolve settings from command line, environment, TOML and defaults
pub fn resolve_settings(cli: &CliOverrides, toml_config: &TomlConfig) -> Settings {
    let defaults = CompiledDefaults::for_current_platform();

    let database_path = cli
        .database_path
        .clone()
        .or_else(|| env_value(ENV_DATABASE).map(PathBuf::from))
        .or_else(|| toml_config.database_path.clone())
        .unwrap_or(defaults.database_path);

    let bind_address = cli
        .bind_address
        .clone()
        .or_else(|| env_value(ENV_BIND_ADDRESS))
        .or_else(|| toml_config.bind_address.clone())
        .unwrap_or(defaults.bind_address);

    let port = cli
        .port
        .or_else(|| {
            env_value(ENV_PORT).and_then(|p| match p.parse::<u16>() {
                Ok(port) => Some(port),
                Err(e) => {
                    warn!("Ignoring {}={}: {}", ENV_PORT, p, e);
                    None
                }
            })
        })
        .or(toml_config.port)
        .unwrap_or(defaults.port);

    let api_secret = cli
        .api_secret
        .clone()
        .or_else(|| env_value(ENV_API_SECRET))
        .or_else(|| toml_config.api_secret.clone())
        .filter(|s| !s.trim().is_empty());

    Settings {
        database_path,
        bind_address,
        port,
        api_secret,
    }
}

/// Locate the config file
///
/// Explicit path first, then `LMS_CONFIG`, then the per-user file, then the
/// system-wide file. Returns `None` when nothing exists.
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Some(path) = env_value(ENV_CONFIG) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("lms").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/lms/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Deserialize the whole TOML file at `path` into `T`
pub fn load_toml_section<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the shared TOML keys
///
/// `None` (no config file anywhere) yields the defaults. A file that cannot
/// be read or parsed is an error; callers log it and continue with
/// `TomlConfig::default()`.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    match path {
        Some(path) => load_toml_section(path),
        None => Ok(TomlConfig::default()),
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/lms (or /var/lib/lms for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("lms"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/lms"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/lms
        dirs::data_dir()
            .map(|d| d.join("lms"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/lms"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\lms
        dirs::data_local_dir()
            .map(|d| d.join("lms"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\lms"))
    } else {
        PathBuf::from("./lms_data")
    }
}
