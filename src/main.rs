//! Caching Proxy - A forwarding HTTP proxy with an in-memory object cache
//!
//! Usage: `caching_proxy <port>`

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caching_proxy::api::serve_admin;
use caching_proxy::{Config, ProxyServer, SharedCache};

/// Forwarding HTTP proxy with an in-memory LRU cache.
#[derive(Parser, Debug)]
#[command(name = "caching_proxy", version, about)]
struct Cli {
    /// Port to accept client connections on
    port: u16,
}

/// Main entry point for the caching proxy.
///
/// # Startup Sequence
/// 1. Parse the listening port from the command line
/// 2. Initialize tracing subscriber for logging
/// 3. Load limits from environment variables
/// 4. Create the shared cache
/// 5. Start the admin API if `ADMIN_PORT` is set
/// 6. Run the accept loop until Ctrl+C or SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caching_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env(cli.port);
    info!(
        "Configuration loaded: port={}, max_cache_size={}, max_object_size={}, max_header_size={}",
        config.listen_port, config.max_cache_size, config.max_object_size, config.max_header_size
    );

    let cache = Arc::new(SharedCache::from_config(&config));

    if let Some(admin_port) = config.admin_port {
        let admin_cache = cache.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_admin(admin_port, admin_cache).await {
                error!(error = %e, "Admin API stopped");
            }
        });
    }

    let server = ProxyServer::bind(&config, cache)
        .await
        .with_context(|| format!("failed to bind port {}", config.listen_port))?;
    info!("Proxy listening on {}", server.local_addr()?);

    server.run_until(shutdown_signal()).await;

    info!("Proxy shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed, that signal source is ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
