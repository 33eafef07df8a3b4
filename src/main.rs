//! Chat proxy binary.
//!
//! ```text
//!     Browser ──▶ /api/chat ──▶ token provider ──▶ forwarder ──▶ upstream chat service
//!             ──▶ /*        ──▶ static front end (entry document fallback)
//! ```
//!
//! Configuration comes from an optional TOML file overlaid with environment
//! variables (`TARGET_CLOUD_RUN_URL`, `GOOGLE_AUTH_ENABLED`, `ALLOWED_ORIGINS`,
//! `PORT`, `STATIC_FILES_DIR`, ...).

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use chat_proxy::config;
use chat_proxy::observability::{logging, metrics};
use chat_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "chat-proxy")]
#[command(about = "Reverse proxy for a chat front end and its upstream service", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration and `PORT`.
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match config::load_with_env(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("chat-proxy: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind.to_string();
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "chat-proxy starting");

    if !config.upstream.is_configured() {
        tracing::warn!("TARGET_CLOUD_RUN_URL is not set; /api/chat will answer 500");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    HttpServer::new(config).run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
