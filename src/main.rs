use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clusterpulse::dependencies::Dependencies;
use clusterpulse::hub::ws_route;
use clusterpulse::observe::KubeObserver;
use clusterpulse::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clusterpulse=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ClusterPulse v{}", clusterpulse::VERSION);

    // Load configuration
    let config = Config::from_env()?;
    info!(
        backend = %config.storage.backend,
        metrics_interval = config.kubernetes.metrics_interval_seconds,
        "Loaded configuration"
    );

    // Connect to the cluster and wire the pipeline
    let observer = Arc::new(KubeObserver::connect().await?);
    let deps = Dependencies::build(config, observer).await?;
    deps.start().await;

    // Serve the WebSocket endpoint
    let addr: SocketAddr = format!("{}:{}", deps.config.server.host, deps.config.server.port)
        .parse()
        .expect("Invalid server address");
    info!("Serving WebSocket endpoint on {}/ws", addr);

    let server = tokio::spawn(warp::serve(ws_route(deps.hub.clone())).run(addr));

    // Graceful shutdown on Ctrl+C
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                warn!("WebSocket server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    deps.stop().await;
    info!("ClusterPulse shut down cleanly");
    Ok(())
}
