//! sbn-admin - store broadcast network admin service
//!
//! Serves the admin HTTP API: frequency rules, the broadcast calendar and
//! playlist integrity reconciliation against the broadcast server.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use sbn_admin::audit::spawn_audit_task;
use sbn_admin::config::{AdminConfig, CliOverrides, DB_FILE_NAME};
use sbn_admin::{build_router, AppState, BroadcastServerClient, EVENT_BUS_CAPACITY};
use sbn_common::config::{default_config_path, load_toml_config, prepare_root_folder, ROOT_FOLDER_ENV};
use sbn_common::db::init_database;
use sbn_common::events::EventBus;

#[derive(Parser, Debug)]
#[command(name = "sbn-admin", about = "Store broadcast network admin service", version)]
struct Args {
    /// Root folder holding the admin database
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(short, long, env = "SBN_ADMIN_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "SBN_ADMIN_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Broadcast server base URL
    #[arg(long, env = "SBN_BROADCAST_SERVER_URL")]
    broadcast_server_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| default_config_path("sbn-admin"));
    let toml_config = config_path
        .as_deref()
        .map(load_toml_config)
        .unwrap_or_default();

    let config = AdminConfig::resolve(
        CliOverrides {
            root_folder: args.root_folder,
            bind_addr: args.bind_addr,
            broadcast_server_url: args.broadcast_server_url,
        },
        toml_config,
    );

    // RUST_LOG wins over the config file level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!(
        "Starting SBN admin service (sbn-admin) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    let db_path = prepare_root_folder(config.root_folder(), DB_FILE_NAME)
        .with_context(|| format!("Cannot create root folder {}", config.root_folder().display()))?;
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let client = BroadcastServerClient::new(&config.broadcast_server_url, config.request_timeout)?;
    info!("Broadcast server: {}", client.base_url());

    let events = EventBus::new(EVENT_BUS_CAPACITY);
    let state = AppState::new(pool, client, events.clone());

    let _audit = spawn_audit_task(state.reconciler.clone(), events, config.audit.clone());

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Cannot bind {}", config.bind_addr))?;
    info!("sbn-admin listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
