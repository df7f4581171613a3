//! Configuration loading and root folder resolution
//!
//! A missing or malformed TOML file never prevents startup: the problem is
//! logged and compiled defaults are used instead.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SBN_ROOT_FOLDER";

/// Default admin service bind address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5780";
/// Default broadcast server base URL
pub const DEFAULT_BROADCAST_SERVER_URL: &str = "http://127.0.0.1:8080";
/// Default transport timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default background audit period (seconds)
pub const DEFAULT_AUDIT_INTERVAL_SECS: u64 = 3600;

/// TOML configuration file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: String,
    pub broadcast_server_url: String,
    pub request_timeout_secs: u64,
    pub logging: LoggingConfig,
    pub audit: AuditConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            broadcast_server_url: DEFAULT_BROADCAST_SERVER_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            logging: LoggingConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[audit]` section: periodic detection-only integrity audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub playlist_ids: Vec<i64>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: DEFAULT_AUDIT_INTERVAL_SECS,
            playlist_ids: Vec::new(),
        }
    }
}

/// Parse TOML text into a config
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load a TOML config file, falling back to defaults
///
/// Missing file: info + defaults. Unreadable or invalid file: warning +
/// defaults.
pub fn load_toml_config(path: &Path) -> TomlConfig {
    if !path.exists() {
        info!("Config file {} not found, using defaults", path.display());
        return TomlConfig::default();
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(Error::from)
        .and_then(|content| parse_toml_config(&content));

    match parsed {
        Ok(config) => {
            info!("Loaded config file {}", path.display());
            config
        }
        Err(e) => {
            warn!("Ignoring config file {}: {}", path.display(), e);
            TomlConfig::default()
        }
    }
}

/// Locate the module's config file
///
/// Linux: `~/.config/sbn/<module>.toml`, then `/etc/sbn/<module>.toml`.
/// Other platforms: the user config directory only.
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);
    let user_config = dirs::config_dir().map(|d| d.join("sbn").join(&file_name));

    if cfg!(target_os = "linux") {
        if let Some(path) = &user_config {
            if path.exists() {
                return user_config;
            }
        }
        let system_config = PathBuf::from("/etc/sbn").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
        None
    } else {
        user_config.filter(|p| p.exists())
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable `SBN_ROOT_FOLDER`
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/sbn (or /var/lib/sbn for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("sbn"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/sbn"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("sbn"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/sbn"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("sbn"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\sbn"))
    } else {
        PathBuf::from("./sbn_data")
    }
}

/// Create the root folder if needed and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path, db_file_name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder)?;
    Ok(root_folder.join(db_file_name))
}
