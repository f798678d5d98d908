//! Command-line entry point for the intercept proxy.
//!
//! Loads an optional TOML config, applies command-line overrides, logs every
//! exchange and runs until SIGINT/SIGTERM.

use std::path::PathBuf;

use clap::Parser;

use intercept_proxy::config::{apply_overrides, load_config, ConfigOverrides, ProxyConfig};
use intercept_proxy::lifecycle::shutdown_signal;
use intercept_proxy::observability::{init_logging, AccessLog};
use intercept_proxy::ProxyService;

#[derive(Parser)]
#[command(name = "intercept-proxy")]
#[command(about = "Programmable HTTP/1.x forward proxy", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface to bind, overrides the config file
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    let config = apply_overrides(
        config,
        ConfigOverrides {
            host: cli.host,
            port: cli.port,
            log_level: cli.log_level,
        },
    )?;

    init_logging(&config.observability.log_level);
    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        max_connections = config.listener.max_connections,
        upstream_timeout_ms = config.timeouts.upstream_ms,
        max_buffered_body_bytes = config.limits.max_buffered_body_bytes,
        "Configuration loaded"
    );

    let host = config.listener.host.clone();
    let port = config.listener.port;
    let service = ProxyService::new(config).with_observer(AccessLog);
    service.listen(&host, port).await?;

    shutdown_signal().await;
    service.close().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
