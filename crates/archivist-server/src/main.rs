//! # archivist
//!
//! Chat message archiver.
//!
//! This binary provides:
//! - **Event bridge** reading chat events as JSON lines on stdin and writing
//!   reply instructions as JSON lines on stdout
//! - **Ingestion** of guild text messages into SQLite, one revision per edit
//! - **Command console** letting admins manage ignore and access lists
//! - **REST API** (axum) for filtered, redacted reads of the archive

mod api;
mod archive;
mod auth;
mod bridge;
mod config;
mod console;
mod error;
mod ingest;
mod log_sink;
mod query;
mod reply;
mod snapshot;
mod visibility;

use std::sync::Arc;

use archivist_store::Database;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::archive::Archive;
use crate::bridge::Bridge;
use crate::config::ServerConfig;
use crate::console::Console;
use crate::ingest::Ingestor;
use crate::snapshot::SnapshotWriter;
use crate::visibility::VisibilityStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    // stdout carries bridge replies, so human-readable logs go to stderr.
    let (store_layer, log_rx) = log_sink::channel();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,archivist=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(store_layer)
        .init();

    info!("Starting archivist v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        http_enabled = config.http_enabled,
        http_addr = %config.http_addr,
        admins = config.admins.len(),
        api_tokens = config.api_tokens.len(),
        prefix = %config.command_prefix,
        max_limit = config.max_limit,
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let archive = Archive::new(db);

    // Buffered log lines start flowing into the archive from here on.
    log_sink::spawn_writer(log_rx, archive.clone());

    let visibility = Arc::new(VisibilityStore::load(
        config.ignore_file.clone(),
        config.settings_file.clone(),
        config.forbidden.clone(),
        SnapshotWriter::spawn(),
    )?);

    // -----------------------------------------------------------------------
    // 4. Spawn the event bridge
    // -----------------------------------------------------------------------
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if let Err(e) = bridge::write_replies(reply_rx, tokio::io::stdout()).await {
            tracing::error!(error = %e, "reply writer failed");
        }
    });

    let bridge = Bridge::new(
        Ingestor::new(archive.clone(), visibility.clone()),
        Console::new(&config, visibility.clone()),
        reply_tx,
    );
    let mut bridge_task = tokio::spawn(bridge.run(BufReader::new(tokio::io::stdin())));

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_enabled = config.http_enabled;
    let http_addr = config.http_addr;
    let app_state = AppState {
        archive,
        visibility: visibility.clone(),
        config: Arc::new(config),
    };

    let http = async move {
        if http_enabled {
            api::serve(app_state, http_addr).await
        } else {
            info!("HTTP API disabled");
            std::future::pending().await
        }
    };

    // Without the API, the process lives only as long as the event stream.
    let result = tokio::select! {
        result = http => result,
        joined = &mut bridge_task, if !http_enabled => {
            match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(e.into()),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "archivist stopped with an error");
    }

    visibility.save_ignore();
    visibility.save_settings();
    visibility.flush().await;
    info!(
        snapshots_written = visibility.writer().completed(),
        snapshots_failed = visibility.writer().failed(),
        "Shutdown complete"
    );

    result
}
