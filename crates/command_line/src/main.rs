//! Command line tool for the switchboard signaling relay, see
//! [switchboard_server::ServerConfig] for configuration details.
//!
//! # Installation
//!
//! ```no_run
//! cargo install switchboard
//! ```
//!
//! # Server
//!
//! Start the relay with a config file:
//!
//! ```no_run
//! switchboard config.toml
//! ```

use anyhow::Result;
use axum_server::Handle;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use std::{net::SocketAddr, str::FromStr};
use switchboard_server::{ServerConfig, SignalingServer};

const DEFAULT_BIND: &str = "0.0.0.0:12776";

/// Websocket signaling relay server.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct SignalingService {
    /// Bind to host:port, overriding the config file.
    #[clap(short, long)]
    bind: Option<String>,

    /// Config file to load.
    config: PathBuf,
}

/// Start the server.
async fn start_server(
    bind: Option<String>,
    mut config: ServerConfig,
) -> Result<()> {
    // A platform assigned port supersedes any configured endpoint
    // and implies TLS is terminated upstream.
    let bind = if let Ok(port) = std::env::var("PORT") {
        config.tls = None;
        format!("0.0.0.0:{}", port)
    } else {
        bind.or_else(|| config.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_owned())
    };

    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
            shutdown
                .graceful_shutdown(Some(Duration::from_secs(5)));
        }
    });

    let addr = SocketAddr::from_str(&bind)?;
    let server = SignalingServer::new(config);
    server.start(addr, handle).await?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{
        layer::SubscriberExt, util::SubscriberInitExt,
    };
    let default = if verbose {
        "switchboard=debug,switchboard_server=debug"
    } else {
        "switchboard=info,switchboard_server=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| default.into()),
        ))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

async fn run() -> Result<()> {
    let args = SignalingService::parse();
    let config = ServerConfig::load(&args.config).await?;
    init_tracing(config.verbose);
    start_server(args.bind, config).await
}

#[doc(hidden)]
#[tokio::main]
pub async fn main() {
    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
