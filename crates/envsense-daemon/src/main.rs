//! envsense daemon
//!
//! Polls the configured environmental sensors in the background and serves
//! their latest readings over HTTP and D-Bus.

mod acquisition;
mod config;
mod dbus;
mod state;
mod web;

use anyhow::{Context, Result};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        let config = Config::load(&config_path).context("Failed to load configuration")?;
        info!("Loaded configuration from: {}", config_path);
        config
    } else {
        warn!(
            "Configuration file {} not found, using built-in defaults",
            config_path
        );
        Config::default()
    };

    // Setup Unix signal handlers
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    // Bind before starting any acquisition loop
    let listener = if config.web.enable {
        let addr: SocketAddr = config.listen.parse().context("Invalid listen address")?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("HTTP API listening on http://{}", addr);
        Some(listener)
    } else {
        info!("HTTP API disabled");
        None
    };

    // Start one acquisition loop per sensor
    let state = Arc::new(AppState::start(&config)?);
    info!("Polling {} sensors", state.sensor_count());

    // Shutdown requests from D-Bus
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    // Keep a clone of shutdown_tx to prevent the channel from closing if D-Bus fails
    let _shutdown_tx_keepalive = shutdown_tx.clone();

    // Start D-Bus service
    let _dbus_connection =
        match dbus::run_dbus_server(state.clone(), shutdown_tx, config.dbus.bus).await {
            Ok(conn) => {
                info!("D-Bus service started");
                Some(conn)
            }
            Err(e) => {
                warn!(
                    "Failed to start D-Bus service: {}. Continuing without D-Bus.",
                    e
                );
                None
            }
        };

    let stop = async {
        tokio::select! {
            _ = shutdown_rx.recv() => "D-Bus quit request",
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    };

    let exit = match listener {
        Some(listener) => {
            let app = web::create_router(state.clone());
            wait_for_exit(axum::serve(listener, app).into_future(), stop).await
        }
        None => wait_for_exit(std::future::pending(), stop).await,
    };

    match exit {
        Exit::Requested(reason) => info!("Shutting down ({})", reason),
        Exit::ServerFailed(e) => error!("HTTP server failed: {}. Shutting down", e),
    }

    state.shutdown().await;
    Ok(())
}

/// Why the daemon stopped serving.
#[derive(Debug, PartialEq)]
enum Exit {
    /// A signal or D-Bus quit request.
    Requested(&'static str),
    /// The HTTP server ended on its own.
    ServerFailed(String),
}

/// Waits for the HTTP server to end or for a stop request, whichever is first.
async fn wait_for_exit<S, F>(server: S, stop: F) -> Exit
where
    S: Future<Output = std::io::Result<()>>,
    F: Future<Output = &'static str>,
{
    tokio::select! {
        result = server => match result {
            Ok(()) => Exit::ServerFailed("server stopped unexpectedly".to_string()),
            Err(e) => Exit::ServerFailed(e.to_string()),
        },
        reason = stop => Exit::Requested(reason),
    }
}
