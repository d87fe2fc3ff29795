//! cluster-client-ip server.
//!
//! Serves a client report on every path, after replacing the client address
//! with `X-Cluster-Client-Ip` when the connection comes from a trusted load
//! balancer.
//!
//! ```text
//! cluster-client-ip --config server.toml
//! cluster-client-ip --directives zeus.conf --bind 0.0.0.0:8080 --watch
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use cluster_client_ip::config::watcher::ConfigWatcher;
use cluster_client_ip::config::ConfigSource;
use cluster_client_ip::http::HttpServer;
use cluster_client_ip::lifecycle::{signals, Shutdown};
use cluster_client_ip::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "cluster-client-ip")]
#[command(about = "Trust X-Cluster-Client-Ip from known load balancers", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directive file (ZeusEnable, ZeusLoadBalancerIP); replaces [real_ip].
    #[arg(short, long)]
    directives: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Reload the trust configuration when the files change.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let source = ConfigSource {
        config: cli.config,
        directives: cli.directives,
    };
    let mut config = source.load()?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);

    tracing::info!("cluster-client-ip v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        enabled = config.real_ip.enabled,
        load_balancers = ?config.real_ip.load_balancer_ips,
        "Configuration loaded"
    );
    if config.real_ip.enabled && config.real_ip.load_balancer_ips.is_empty() {
        tracing::warn!("Client address substitution enabled but no load balancers configured");
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Keep the watcher alive for the life of the server.
    let (_watcher, config_updates) = if cli.watch {
        let (watcher, updates) = ConfigWatcher::new(source);
        (Some(watcher.run()?), updates)
    } else {
        let (_, updates) = mpsc::unbounded_channel();
        (None, updates)
    };

    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
