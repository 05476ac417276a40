//! mirror-proxy
//!
//! A rewriting HTTP forward proxy with a container-registry mode.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────────┐
//!                         │                   MIRROR PROXY                    │
//!                         │                                                   │
//!     Client Request      │  ┌─────────┐    ┌──────────┐    ┌──────────────┐  │
//!     ────────────────────┼─▶│  http   │───▶│ routing  │───▶│   upstream   │──┼──▶ Origin /
//!                         │  │ server  │    │  router  │    │ forwarder or │  │    Registry /
//!                         │  └─────────┘    └──────────┘    │   registry   │  │    Blob storage
//!                         │                                 └──────┬───────┘  │
//!     Client Response     │  ┌─────────┐    ┌──────────┐           │          │
//!     ◀───────────────────┼──│response │◀───│ rewrite  │◀──────────┘          │
//!                         │  │ headers │    │ html/css │                      │
//!                         │  └─────────┘    └──────────┘                      │
//!                         │                                                   │
//!                         │  config · stats · observability · lifecycle       │
//!                         └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mirror_proxy::config::{load_config, ProxyConfig};
use mirror_proxy::lifecycle::{wait_for_signal, Shutdown};
use mirror_proxy::observability::{logging, metrics};
use mirror_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "mirror-proxy", version, about = "Rewriting forward proxy and registry mirror")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mirror-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        registry = %config.registry.upstream_url,
        request_timeout_secs = config.timeouts.request_secs,
        direct_hosts = config.rewrite.direct_hosts.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
