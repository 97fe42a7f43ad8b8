//! Moonraker upload-preprocessing proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                 PREPROCESSING PROXY                   │
//!                     │                                                       │
//!   Client Request    │  ┌─────────┐    ┌──────────┐                          │
//!   ──────────────────┼─▶│  http   │───▶│ routing  │──┐                       │
//!                     │  │ server  │    │ classify │  │                       │
//!                     │  └─────────┘    └──────────┘  │                       │
//!                     │            ┌──────────────────┴──────────┐            │
//!                     │            ▼                             ▼            │
//!                     │   ┌─────────────────┐          ┌──────────────────┐   │
//!                     │   │ upload intercept│          │   pass-through   │   │
//!                     │   │ stage → rules → │          │ streamed relay   │   │
//!                     │   │ multipart resend│          │                  │   │
//!                     │   └────────┬────────┘          └────────┬─────────┘   │
//!                     │            └──────────────┬─────────────┘             │
//!   Client Response   │                           ▼                           │
//!   ◀─────────────────┼────────────────── upstream clients ◀──────────────────┼── Moonraker
//!                     │                                                       │
//!                     │  config (TOML + hot reload) · observability · lifecycle│
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use preprocess_proxy::config::{load_config, ConfigWatcher};
use preprocess_proxy::lifecycle::signals::spawn_signal_handler;
use preprocess_proxy::observability::{logging, metrics};
use preprocess_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "preprocess-proxy")]
#[command(about = "Reverse proxy that rewrites G-code uploads before they reach Moonraker", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable debug logging for the proxy.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    config.observability.verbose |= args.verbose;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "preprocess-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        upload_paths = ?config.upload.paths,
        rules = config.rule_chain().len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Hold the watcher for the lifetime of the process.
    let (watcher, config_updates) = ConfigWatcher::new(&args.config);
    let _watcher = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload unavailable");
            None
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
