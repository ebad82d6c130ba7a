//! Tether - control-plane client daemon
//!
//! Registers the configured service and its audiences with the coordinator,
//! then keeps the control session alive until SIGINT or SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! tether --config configs/tether.toml
//! tether --config configs/tether.toml --log-level debug
//! tether --coordinator 10.0.0.5:9090
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tether_client::{Client, ClientOptions};
use tether_config::{ClientConfig, ClientKind, Config, LogFormat, OperationKind};
use tether_protocol::{Audience, ClientType, OperationType};
use tether_tap::TailConfig;
use tether_transport::{TcpTransport, TcpTransportConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tether - control-plane client daemon
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "configs/tether.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overrides [log] level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Coordinator address, overrides [client] coordinator
    #[arg(long)]
    coordinator: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(coordinator) = cli.coordinator {
        config.client.coordinator = coordinator;
    }

    // CLI flag > config file
    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(config.log.level.as_str());
    init_logging(level, config.log.format)?;

    run(config.client).await
}

async fn run(config: ClientConfig) -> Result<()> {
    let transport = Arc::new(TcpTransport::new(TcpTransportConfig::new(
        config.coordinator.clone(),
    )));
    let shutdown = CancellationToken::new();

    let client = Client::start_with_shutdown(client_options(&config), transport, shutdown.clone())
        .await
        .with_context(|| format!("registering with coordinator {}", config.coordinator))?;

    info!(
        coordinator = %config.coordinator,
        audiences = config.audiences.len(),
        "tether running"
    );

    wait_for_shutdown().await?;

    info!("shutting down");
    shutdown.cancel();
    client.join().await;
    Ok(())
}

/// Map the `[client]` section onto client options
fn client_options(config: &ClientConfig) -> ClientOptions {
    let client_type = match config.client_type {
        ClientKind::Sdk => ClientType::Sdk,
        ClientKind::Shim => ClientType::Shim,
    };

    let tail = TailConfig::default()
        .with_buffer_size(config.tail_buffer_size)
        .with_workers(config.tail_workers)
        .with_reconnect_interval(config.reconnect_interval)
        .with_reap_interval(config.reap_interval);

    config.audiences.iter().fold(
        ClientOptions::new(config.service_name.clone())
            .with_client_type(client_type)
            .with_dry_run(config.dry_run)
            .with_reconnect_interval(config.reconnect_interval)
            .with_tail_config(tail),
        |options, audience| {
            let operation_type = match audience.operation_type {
                OperationKind::Consumer => OperationType::Consumer,
                OperationKind::Producer => OperationType::Producer,
            };
            options.with_audience(Audience::new(
                config.service_name.clone(),
                audience.component_name.clone(),
                operation_type,
                audience.operation_name.clone(),
            ))
        },
    )
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("installing SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => result.context("installing Ctrl+C handler")?,
            _ = terminate.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.context("installing Ctrl+C handler")
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    match format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init(),
    }

    Ok(())
}
