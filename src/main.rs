use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use portico::balancer::LoadBalancer;
use portico::cache::{self, TtlStore};
use portico::config::Config;
use portico::metrics;
use portico::proxy::{http_client, GatewayServer, RequestHandler};

#[derive(Parser)]
#[command(name = "portico")]
#[command(about = "An HTTP reverse-proxy gateway with prefix routing and health-checked balancing")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portico=info".into()),
        )
        .init();

    info!("starting portico gateway");

    let config = Config::from_file(&args.config)
        .await
        .with_context(|| format!("failed to load config from {}", args.config))?;

    if config.proto == "http3" {
        warn!("proto=http3 requires the HTTP/3 listener; serving HTTP/1.1 here");
    }

    metrics::init().context("failed to install metrics recorder")?;
    http_client::init(config.request_timeout_secs);

    let (load_balancer, cancel) = LoadBalancer::new(&config)?;

    let store = Arc::new(TtlStore::new(
        cache::DEFAULT_ENTRY_TTL,
        cache::DEFAULT_SWEEP_INTERVAL,
    ));

    let handler = RequestHandler::new(&config, Arc::new(load_balancer), Arc::clone(&store));
    let server = GatewayServer::new(config.socket_addr()?, handler);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = server.run(shutdown_rx);
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => {
            result?;
        }
        _ = signal::ctrl_c() => {
            warn!("received CTRL+C, shutting down gracefully");
            let _ = shutdown_tx.send(true);
            run.await?;
        }
    }

    cancel.cancel();
    store.stop();

    info!("portico shutdown complete");
    Ok(())
}
