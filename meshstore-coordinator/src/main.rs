//! meshstore cluster coordinator daemon.

use clap::Parser;
use meshstore_coordinator::download::DownloadCoordinator;
use meshstore_coordinator::events;
use meshstore_coordinator::gc::{GcSweeper, UnclaimedChunks};
use meshstore_coordinator::manifest_store::ManifestStore;
use meshstore_coordinator::monitor::{HeartbeatMonitor, MonitorState};
use meshstore_coordinator::placement::Placement;
use meshstore_coordinator::rebalance::{LoadAdapter, ReplicaIndexAdapter, TransferAdapter};
use meshstore_coordinator::registry::NodeRegistry;
use meshstore_coordinator::replica_index::ReplicaIndex;
use meshstore_coordinator::service::CoordinatorService;
use meshstore_coordinator::upload::UploadCoordinator;
use meshstore_coordinator::CoordinatorConfig;
use meshstore_rebalancer::{RebalancerConfig, ReplicationEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CoordinatorConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(if config.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(true)
        .init();

    info!(
        listen = format!("{}:{}", config.host, config.port),
        replication_factor = config.replication_factor,
        "starting meshstore coordinator"
    );

    let registry = Arc::new(NodeRegistry::new());
    let replica_index = Arc::new(ReplicaIndex::new());
    let manifests = Arc::new(ManifestStore::new());
    let placement = Arc::new(Placement::new(registry.clone(), config.placement_strategy));
    let unclaimed_chunks = Arc::new(UnclaimedChunks::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (event_tx, event_rx) = events::channel();

    let monitor = Arc::new(HeartbeatMonitor {
        state: Arc::new(MonitorState::new()),
        tick_interval: config.tick_interval(),
        failure_timeout: config.failure_timeout(),
        events: event_tx.clone(),
    });

    let rebalancer_config = RebalancerConfig {
        replication_factor: config.replication_factor,
        sweep_interval: config.sweep_interval(),
        max_parallel: config.max_rereplication_parallel,
        max_attempts: 3,
        backoff_base: Duration::from_secs(5),
        backoff_cap: Duration::from_secs(300),
    };
    let engine = Arc::new(ReplicationEngine::new(
        rebalancer_config,
        Arc::new(ReplicaIndexAdapter(replica_index.clone())),
        placement.clone(),
        Arc::new(LoadAdapter(registry.clone())),
        Arc::new(TransferAdapter),
    ));
    let (sweep_handle, trigger_tx) = engine.clone().spawn(shutdown_rx.clone());

    let gc_sweeper = Arc::new(GcSweeper {
        unclaimed: unclaimed_chunks.clone(),
        registry: registry.clone(),
        sweep_interval: config.gc_sweep_interval(),
        grace_period: config.gc_grace_period(),
    });
    let gc_handle = gc_sweeper.spawn(shutdown_rx.clone());

    // Any node-failure/recovery/suspect-chunk event also wakes the
    // re-replication sweep early, decoupled from the monitor via the
    // broadcast bus.
    let mut bus_rx = event_rx;
    let bus_trigger = trigger_tx.clone();
    let mut bus_shutdown = shutdown_rx.clone();
    let bus_registry = registry.clone();
    let bus_replica_index = replica_index.clone();
    let event_relay = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = bus_rx.recv() => {
                    match event {
                        Ok(events::NodeEvent::Failed(node_id)) => {
                            bus_registry.set_status(&node_id, meshstore_core::node::NodeStatus::Failed);
                            let orphaned = bus_replica_index.remove_node(&node_id);
                            info!(
                                node_id = %node_id,
                                orphaned_chunks = orphaned.len(),
                                "node failure event observed; triggering re-replication sweep"
                            );
                            let _ = bus_trigger.try_send(());
                        }
                        Ok(events::NodeEvent::SuspectChunk(key)) => {
                            info!(key = %key, "suspect chunk reported; triggering re-replication sweep");
                            let _ = bus_trigger.try_send(());
                        }
                        Ok(events::NodeEvent::Recovered(_)) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = bus_shutdown.changed() => {
                    if *bus_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let monitor_handle = monitor.clone().spawn(shutdown_rx.clone());

    let upload = Arc::new(UploadCoordinator {
        manifests: manifests.clone(),
        replica_index: replica_index.clone(),
        placement: placement.clone(),
        registry: registry.clone(),
        max_put_retries: config.max_put_retries,
    });
    let download = Arc::new(DownloadCoordinator {
        manifests: manifests.clone(),
        replica_index: replica_index.clone(),
        registry: registry.clone(),
        suspect_events: event_tx.clone(),
    });

    let service = Arc::new(CoordinatorService {
        registry: registry.clone(),
        replica_index: replica_index.clone(),
        monitor: monitor.clone(),
        upload,
        download,
        gc: unclaimed_chunks.clone(),
        default_replication: config.replication_factor,
        rereplication_trigger: trigger_tx,
    });

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let service_handle = tokio::spawn(service.serve(listener));

    shutdown_signal().await;
    info!("shutting down coordinator");
    let _ = shutdown_tx.send(true);

    service_handle.abort();
    let _ = sweep_handle.await;
    let _ = gc_handle.await;
    let _ = monitor_handle.await;
    let _ = event_relay.await;
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
