//! Effective admin service configuration
//!
//! Merges command-line overrides with the TOML file. Per-setting priority:
//! command line (or its environment variable) > TOML > compiled default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sbn_common::config::{resolve_root_folder, AuditConfig, TomlConfig};

/// Database file inside the root folder
pub const DB_FILE_NAME: &str = "sbn-admin.db";

/// Settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub broadcast_server_url: Option<String>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub root_folder: PathBuf,
    pub bind_addr: String,
    pub broadcast_server_url: String,
    pub request_timeout: Duration,
    pub log_level: String,
    pub audit: AuditConfig,
}

impl AdminConfig {
    pub fn resolve(cli: CliOverrides, toml: TomlConfig) -> Self {
        let root_folder = resolve_root_folder(cli.root_folder.as_deref(), &toml);

        Self {
            root_folder,
            bind_addr: non_blank(cli.bind_addr).unwrap_or(toml.bind_addr),
            broadcast_server_url: non_blank(cli.broadcast_server_url)
                .unwrap_or(toml.broadcast_server_url),
            // A zero timeout would fail every request
            request_timeout: Duration::from_secs(toml.request_timeout_secs.max(1)),
            log_level: toml.logging.level,
            audit: toml.audit,
        }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
