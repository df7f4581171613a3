//! Unit tests for configuration and graceful degradation
//!
//! Tests that manipulate SBN_ROOT_FOLDER are marked #[serial] so they do not
//! race each other on the process environment.

use sbn_common::config::{
    default_root_folder, load_toml_config, parse_toml_config, prepare_root_folder,
    resolve_root_folder, TomlConfig, DEFAULT_BIND_ADDR, DEFAULT_BROADCAST_SERVER_URL,
    ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
fn test_defaults() {
    let config = TomlConfig::default();
    assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    assert_eq!(config.broadcast_server_url, DEFAULT_BROADCAST_SERVER_URL);
    assert_eq!(config.request_timeout_secs, 30);
    assert_eq!(config.logging.level, "info");
    assert!(!config.audit.enabled);
    assert!(config.root_folder.is_none());
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = parse_toml_config(
        r#"
        broadcast_server_url = "http://radio.local:9000"

        [audit]
        enabled = true
        playlist_ids = [42, 7]
        "#,
    )
    .unwrap();

    assert_eq!(config.broadcast_server_url, "http://radio.local:9000");
    assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    assert!(config.audit.enabled);
    assert_eq!(config.audit.playlist_ids, vec![42, 7]);
    assert_eq!(config.audit.interval_secs, 3600);
}

#[test]
fn test_invalid_toml_is_error_when_parsing() {
    assert!(parse_toml_config("bind_addr = [").is_err());
}

#[test]
fn test_missing_file_uses_defaults() {
    let config = load_toml_config(Path::new("/nonexistent/sbn/sbn-admin.toml"));
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_malformed_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sbn-admin.toml");
    std::fs::write(&path, "request_timeout_secs = \"soon\"").unwrap();

    assert_eq!(load_toml_config(&path), TomlConfig::default());
}

#[test]
fn test_valid_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sbn-admin.toml");
    std::fs::write(
        &path,
        "root_folder = \"/srv/sbn\"\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let config = load_toml_config(&path);
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/sbn")));
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_resolver_cli_beats_env_and_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/sbn-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/sbn-toml")),
        ..TomlConfig::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/tmp/sbn-cli")), &toml);
    assert_eq!(resolved, PathBuf::from("/tmp/sbn-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/sbn-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/sbn-toml")),
        ..TomlConfig::default()
    };

    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/tmp/sbn-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_toml_then_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/sbn-toml")),
        ..TomlConfig::default()
    };
    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/tmp/sbn-toml"));
    assert_eq!(
        resolve_root_folder(None, &TomlConfig::default()),
        default_root_folder()
    );
}

#[test]
fn test_prepare_root_folder_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("sbn");

    let db_path = prepare_root_folder(&root, "sbn-admin.db").unwrap();
    assert!(root.is_dir());
    assert_eq!(db_path, root.join("sbn-admin.db"));
}
