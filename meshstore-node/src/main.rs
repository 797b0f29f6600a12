//! meshstore storage node daemon.

use clap::Parser;
use meshstore_node::bandwidth::BandwidthAccountant;
use meshstore_node::heartbeat::HeartbeatSender;
use meshstore_node::registration::register;
use meshstore_node::server::NodeServer;
use meshstore_node::NodeConfig;
use meshstore_storage::MemoryChunkStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(if config.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(true)
        .init();

    info!(
        node_id = %config.node_id,
        listen = format!("{}:{}", config.host, config.port),
        coordinator = %config.coordinator_addr(),
        "starting meshstore storage node"
    );

    let store: Arc<dyn meshstore_storage::ChunkStore> =
        Arc::new(MemoryChunkStore::new(config.capacity_bytes));
    let bandwidth = Arc::new(BandwidthAccountant::new(config.bandwidth_bps));

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let actual_port = listener.local_addr()?.port();

    if let Err(e) = register(
        &config.coordinator_addr(),
        &config.node_id,
        &config.host,
        actual_port,
        config.capacity_bytes,
        config.bandwidth_bps,
    )
    .await
    {
        error!(error = %e, "initial registration with coordinator failed");
        std::process::exit(2);
    }

    let server = Arc::new(NodeServer {
        node_id: config.node_id.clone(),
        store: store.clone(),
        bandwidth: bandwidth.clone(),
        verify_on_read: config.verify_on_read,
    });
    let server_handle = tokio::spawn(server.serve(listener));

    let heartbeat = Arc::new(HeartbeatSender {
        node_id: config.node_id.clone(),
        coordinator_addr: config.coordinator_addr(),
        store: store.clone(),
        bandwidth: bandwidth.clone(),
        interval: config.heartbeat_interval(),
    });
    let heartbeat_handle = heartbeat.start();

    shutdown_signal().await;
    // The wire protocol has no explicit deregister message; shutdown is
    // "deregistration" only in the sense that this node simply stops
    // heartbeating, and the coordinator's failure timeout takes it from
    // there, same as an unannounced crash.
    info!(node_id = %config.node_id, "shutting down; coordinator will detect via heartbeat timeout");

    heartbeat_handle.abort();
    server_handle.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
