// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! `mimicd` — a reference binary wiring the engine to file-backed storage,
//! the static-token auth provider, and the JSON-merge-patch schema applier
//! (given here as runnable defaults rather than production
//! implementations). A real deployment
//! swaps `--auth-token`/the JSON schema for its own `AuthProvider` and
//! `SchemaApplier` and links `mimic_server::serve` directly; this binary
//! exists so the engine can be started and driven end-to-end.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mimic_core::{Permission, SystemClock};
use mimic_engine::{DocumentRegistry, EngineConfig, EngineDeps};
use mimic_schema_json::{JsonMergePatchApplier, JsonObjectPresenceValidator, StaticTokenAuthProvider};
use mimic_server::{ConnectionDeps, ServerConfig};
use mimic_storage::{FileColdStorage, FileHotStorage};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Start the Mimic document-sync engine's WebSocket listener.
#[derive(Parser, Debug)]
#[command(name = "mimicd", version, about)]
struct Cli {
    /// Address to bind the WebSocket listener on.
    #[arg(long, default_value = "127.0.0.1:8787")]
    listen: SocketAddr,

    /// URL prefix for the document route (default `/mimic`).
    #[arg(long, default_value = "/mimic")]
    base_path: String,

    /// Directory for file-backed snapshot and WAL storage.
    #[arg(long, default_value = "./mimic-data")]
    data_dir: PathBuf,

    /// Accept one token, granting write permission to any client presenting
    /// it. Meant for local runs and the example client only — production
    /// deployments bring their own `AuthProvider`.
    #[arg(long, default_value = "dev-token")]
    auth_token: String,

    /// Enable the presence registry (opt-in).
    #[arg(long)]
    presence: bool,

    /// Eviction threshold for an idle document runtime, in seconds.
    #[arg(long, default_value_t = 300)]
    max_idle_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    std::fs::create_dir_all(cli.data_dir.join("snapshots"))?;
    std::fs::create_dir_all(cli.data_dir.join("wal"))?;

    let deps = EngineDeps {
        cold: Arc::new(FileColdStorage::new(cli.data_dir.join("snapshots"))),
        hot: Arc::new(FileHotStorage::new(cli.data_dir.join("wal"))),
        schema: Arc::new(JsonMergePatchApplier::new()),
    };

    let engine_config = EngineConfig {
        max_idle: Duration::from_secs(cli.max_idle_secs),
        presence_enabled: cli.presence,
        ..EngineConfig::default()
    };

    let registry = DocumentRegistry::new(deps, SystemClock, engine_config);

    let auth = Arc::new(
        StaticTokenAuthProvider::new().with_token(cli.auth_token.clone(), None, Permission::Write),
    );
    let presence_validator = cli
        .presence
        .then(|| Arc::new(JsonObjectPresenceValidator::new()) as Arc<dyn mimic_core::PresenceValidator>);

    let server_config = ServerConfig {
        base_path: cli.base_path.clone(),
        ..ServerConfig::default()
    };

    let connection_deps = Arc::new(ConnectionDeps {
        registry: registry.clone(),
        auth,
        schema: Arc::new(JsonMergePatchApplier::new()),
        presence_validator,
        heartbeat_interval: server_config.heartbeat_interval,
        heartbeat_timeout: server_config.heartbeat_timeout,
    });

    let listener = TcpListener::bind(cli.listen).await?;
    tracing::info!(addr = %cli.listen, base_path = %cli.base_path, "mimicd starting");

    let shutdown = CancellationToken::new();
    let serve_shutdown = shutdown.clone();
    let serve_task = tokio::spawn(mimic_server::serve(
        listener,
        server_config.base_path.clone(),
        connection_deps,
        serve_shutdown,
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    shutdown.cancel();
    let _ = serve_task.await;
    registry.shutdown().await;

    Ok(())
}
