//! ble-proxyd - BLE Vehicle Proxy Daemon
//!
//! Accepts vehicle commands over HTTP and relays them to the configured car.
//!
//! Usage:
//!   ble-proxyd [OPTIONS] [config.toml]
//!
//! Without a config file the daemon listens on 0.0.0.0:80 and talks to the
//! built-in simulated vehicle.

use std::path::PathBuf;

use anyhow::Context;
use ble_proxy_api::{create_router, AppState};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::ProxyConfig;

#[derive(Parser, Debug)]
#[command(name = "ble-proxyd")]
#[command(about = "HTTP proxy relaying vehicle commands over Bluetooth LE")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration file, as a positional argument
    #[arg(value_name = "CONFIG", conflicts_with = "config")]
    config_file: Option<PathBuf>,

    /// Listen address, `host:port` or `:port`; overrides server.listen
    #[arg(short, long)]
    address: Option<String>,

    /// Debug logging, including per-request traces
    #[arg(long)]
    debug: bool,
}

fn init_logging(config: &ProxyConfig, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.default_log_filter(debug).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = args.config.or(args.config_file);
    let mut config = match &config_path {
        Some(path) => ProxyConfig::load(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(address) = args.address {
        config.server.listen = address;
    }
    let listen = config.listen_address()?;

    init_logging(&config, args.debug);

    tracing::info!("Starting ble-proxyd");
    match &config_path {
        Some(path) => tracing::info!("Loaded config from: {}", path.display()),
        None => tracing::info!("No config file provided, using defaults"),
    }
    tracing::warn!("Using simulated vehicle transport; no radio is used");

    let state =
        AppState::new(config.build_transport()).with_command_timeout(config.command_timeout());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    tracing::info!(
        timeout_secs = config.command.timeout_secs,
        "Listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down...");
}
