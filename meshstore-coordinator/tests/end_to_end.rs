//! End-to-end scenarios: a real coordinator and real storage nodes,
//! talking over loopback TCP through the framed wire protocol, with no
//! shortcuts through library internals except to construct the cluster
//! and to simulate bit-rot on one replica.

use bytes::Bytes;
use meshstore_coordinator::config::PlacementStrategy;
use meshstore_coordinator::download::DownloadCoordinator;
use meshstore_coordinator::events;
use meshstore_coordinator::gc::UnclaimedChunks;
use meshstore_coordinator::manifest_store::ManifestStore;
use meshstore_coordinator::monitor::{HeartbeatMonitor, MonitorState};
use meshstore_coordinator::placement::Placement;
use meshstore_coordinator::rebalance::{LoadAdapter, ReplicaIndexAdapter, TransferAdapter};
use meshstore_coordinator::registry::NodeRegistry;
use meshstore_coordinator::replica_index::ReplicaIndex;
use meshstore_coordinator::service::CoordinatorService;
use meshstore_coordinator::upload::UploadCoordinator;
use meshstore_core::chunk::ChunkKey;
use meshstore_core::ids::{FileId, NodeId};
use meshstore_core::node::NodeStatus;
use meshstore_node::bandwidth::BandwidthAccountant;
use meshstore_node::heartbeat::HeartbeatSender;
use meshstore_node::server::NodeServer;
use meshstore_protocol::frame::{parse_payload, read_body, read_frame, write_body, write_frame};
use meshstore_protocol::messages::*;
use meshstore_protocol::MessageKind;
use meshstore_rebalancer::{RebalancerConfig, ReplicationEngine};
use meshstore_storage::{ChunkStore, DeleteOutcome, GetOutcome, MemoryChunkStore, PutOutcome, StorageStats};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

// ===== cluster harness =====

struct TestCoordinator {
    addr: String,
    replica_index: Arc<ReplicaIndex>,
    gc: Arc<UnclaimedChunks>,
    #[allow(dead_code)]
    shutdown_tx: watch::Sender<bool>,
}

async fn spawn_coordinator(
    replication_factor: u32,
    tick_interval: Duration,
    failure_timeout: Duration,
    sweep_interval: Duration,
) -> TestCoordinator {
    let registry = Arc::new(NodeRegistry::new());
    let replica_index = Arc::new(ReplicaIndex::new());
    let manifests = Arc::new(ManifestStore::new());
    let placement = Arc::new(Placement::new(registry.clone(), PlacementStrategy::Diverse));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (event_tx, event_rx) = events::channel();

    let monitor = Arc::new(HeartbeatMonitor {
        state: Arc::new(MonitorState::new()),
        tick_interval,
        failure_timeout,
        events: event_tx.clone(),
    });

    let rebalancer_config = RebalancerConfig {
        replication_factor,
        sweep_interval,
        max_parallel: 4,
        max_attempts: 3,
        backoff_base: Duration::from_millis(50),
        backoff_cap: Duration::from_secs(1),
    };
    let engine = Arc::new(ReplicationEngine::new(
        rebalancer_config,
        Arc::new(ReplicaIndexAdapter(replica_index.clone())),
        placement.clone(),
        Arc::new(LoadAdapter(registry.clone())),
        Arc::new(TransferAdapter),
    ));
    let (_sweep_handle, trigger_tx) = engine.spawn(shutdown_rx.clone());

    let mut bus_rx = event_rx;
    let bus_trigger = trigger_tx.clone();
    let mut bus_shutdown = shutdown_rx.clone();
    let bus_registry = registry.clone();
    let bus_replica_index = replica_index.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = bus_rx.recv() => {
                    match event {
                        Ok(events::NodeEvent::Failed(node_id)) => {
                            bus_registry.set_status(&node_id, NodeStatus::Failed);
                            bus_replica_index.remove_node(&node_id);
                            let _ = bus_trigger.try_send(());
                        }
                        Ok(events::NodeEvent::SuspectChunk(_)) => {
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

    let _monitor_handle = monitor.clone().spawn(shutdown_rx.clone());

    let upload = Arc::new(UploadCoordinator {
        manifests: manifests.clone(),
        replica_index: replica_index.clone(),
        placement: placement.clone(),
        registry: registry.clone(),
        max_put_retries: 3,
    });
    let download = Arc::new(DownloadCoordinator {
        manifests: manifests.clone(),
        replica_index: replica_index.clone(),
        registry: registry.clone(),
        suspect_events: event_tx.clone(),
    });

    let gc = Arc::new(UnclaimedChunks::new());

    let service = Arc::new(CoordinatorService {
        registry,
        replica_index: replica_index.clone(),
        monitor,
        upload,
        download,
        gc: gc.clone(),
        default_replication: replication_factor,
        rereplication_trigger: trigger_tx,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(service.serve(listener));

    TestCoordinator { addr, replica_index, gc, shutdown_tx }
}

struct TestNode {
    node_id: NodeId,
    bandwidth: Arc<BandwidthAccountant>,
    heartbeat_handle: JoinHandle<()>,
}

async fn spawn_node(
    node_id: &str,
    coordinator_addr: &str,
    capacity_bytes: u64,
    store: Arc<dyn ChunkStore>,
) -> TestNode {
    let bandwidth = Arc::new(BandwidthAccountant::new(1_000_000_000));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    let server = Arc::new(NodeServer {
        node_id: node_id.to_string(),
        store: store.clone(),
        bandwidth: bandwidth.clone(),
        verify_on_read: true,
    });
    tokio::spawn(server.serve(listener));

    meshstore_node::registration::register(
        coordinator_addr,
        node_id,
        &local_addr.ip().to_string(),
        local_addr.port(),
        capacity_bytes,
        1_000_000_000,
    )
    .await
    .expect("registration must succeed");

    let heartbeat = Arc::new(HeartbeatSender {
        node_id: node_id.to_string(),
        coordinator_addr: coordinator_addr.to_string(),
        store,
        bandwidth: bandwidth.clone(),
        interval: Duration::from_millis(30),
    });
    let heartbeat_handle = heartbeat.start();

    TestNode {
        node_id: NodeId::new(node_id),
        bandwidth,
        heartbeat_handle,
    }
}

/// Wraps a `MemoryChunkStore` but returns tampered bytes from `get`,
/// simulating bit-rot this node's own verify-on-read pass failed to
/// catch (so the fix under test is the coordinator's independent
/// checksum re-verification against the manifest, not this node's).
struct CorruptingStore {
    inner: MemoryChunkStore,
}

impl CorruptingStore {
    fn new(capacity: u64) -> Self {
        Self {
            inner: MemoryChunkStore::new(capacity),
        }
    }
}

impl ChunkStore for CorruptingStore {
    fn put(&self, key: ChunkKey, data: Bytes, expected_checksum: &str) -> PutOutcome {
        self.inner.put(key, data, expected_checksum)
    }

    fn get(&self, key: &ChunkKey, _verify_on_read: bool) -> GetOutcome {
        match self.inner.get(key, false) {
            GetOutcome::Found(data) => {
                let mut bytes = data.to_vec();
                match bytes.first_mut() {
                    Some(b) => *b ^= 0xFF,
                    None => bytes.push(0xFF),
                }
                GetOutcome::Found(Bytes::from(bytes))
            }
            other => other,
        }
    }

    fn delete(&self, key: &ChunkKey) -> DeleteOutcome {
        self.inner.delete(key)
    }

    fn list_chunks(&self) -> Vec<(ChunkKey, u64)> {
        self.inner.list_chunks()
    }

    fn stats(&self) -> StorageStats {
        self.inner.stats()
    }
}

// ===== wire-level client helpers =====

async fn upload_bytes(coordinator_addr: &str, data: &[u8], replication: u32) -> Result<FileId, String> {
    let mut stream = TcpStream::connect(coordinator_addr).await.map_err(|e| e.to_string())?;

    write_frame(
        &mut stream,
        MessageKind::UPLOAD_BEGIN,
        &UploadBeginRequest {
            display_name: "test.bin".to_string(),
            total_size: data.len() as u64,
            replication,
        },
    )
    .await
    .map_err(|e| e.to_string())?;
    let reply = read_frame(&mut stream).await.map_err(|e| e.to_string())?;
    expect_ok(&reply)?;
    let begin: UploadBeginReply = parse_payload(&reply).map_err(|e| e.to_string())?;

    let chunk_count = meshstore_core::chunk_count(data.len() as u64, begin.chunk_size);
    let mut offset = 0usize;
    for index in 0..chunk_count {
        let this_size = if index + 1 == chunk_count {
            data.len() - offset
        } else {
            begin.chunk_size as usize
        };
        let slice = &data[offset..offset + this_size];
        offset += this_size;

        write_frame(
            &mut stream,
            MessageKind::UPLOAD_CHUNK,
            &UploadChunkHeader {
                file_id: begin.file_id.clone(),
                index,
            },
        )
        .await
        .map_err(|e| e.to_string())?;
        write_body(&mut stream, slice).await.map_err(|e| e.to_string())?;

        let reply = read_frame(&mut stream).await.map_err(|e| e.to_string())?;
        expect_ok(&reply)?;
    }

    write_frame(
        &mut stream,
        MessageKind::UPLOAD_COMMIT,
        &UploadCommitRequest {
            file_id: begin.file_id.clone(),
        },
    )
    .await
    .map_err(|e| e.to_string())?;
    let reply = read_frame(&mut stream).await.map_err(|e| e.to_string())?;
    expect_ok(&reply)?;

    Ok(begin.file_id)
}

async fn download_bytes(coordinator_addr: &str, file_id: &FileId) -> Result<Vec<u8>, String> {
    let mut stream = TcpStream::connect(coordinator_addr).await.map_err(|e| e.to_string())?;
    write_frame(
        &mut stream,
        MessageKind::DOWNLOAD,
        &DownloadRequest {
            file_id: file_id.clone(),
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let mut out = Vec::new();
    loop {
        let reply = read_frame(&mut stream).await.map_err(|e| e.to_string())?;
        if reply.kind == MessageKind::OK {
            break;
        }
        if reply.kind == MessageKind::ERR {
            let err: ErrReply = parse_payload(&reply).map_err(|e| e.to_string())?;
            return Err(err.message);
        }
        let header: DownloadChunkHeader = parse_payload(&reply).map_err(|e| e.to_string())?;
        let body = read_body(&mut stream, header.size).await.map_err(|e| e.to_string())?;
        let checksum = meshstore_core::checksum::sha256_hex(&body);
        if checksum != header.checksum {
            return Err(format!("chunk {} failed checksum verification", header.index));
        }
        out.extend_from_slice(&body);
    }
    Ok(out)
}

async fn get_status(coordinator_addr: &str) -> StatusReply {
    let mut stream = TcpStream::connect(coordinator_addr).await.unwrap();
    write_frame(&mut stream, MessageKind::STATUS, &StatusRequest {}).await.unwrap();
    let reply = read_frame(&mut stream).await.unwrap();
    parse_payload(&reply).unwrap()
}

async fn send_heartbeat(coordinator_addr: &str, node_id: &NodeId, used_bytes: u64) -> Result<(), String> {
    send_heartbeat_with_chunks(coordinator_addr, node_id, used_bytes, vec![]).await
}

async fn send_heartbeat_with_chunks(
    coordinator_addr: &str,
    node_id: &NodeId,
    used_bytes: u64,
    chunks: Vec<HeldChunkRef>,
) -> Result<(), String> {
    let mut stream = TcpStream::connect(coordinator_addr).await.map_err(|e| e.to_string())?;
    write_frame(
        &mut stream,
        MessageKind::HEARTBEAT,
        &HeartbeatRequest {
            node_id: node_id.clone(),
            used_bytes,
            utilisation: 0,
            chunks,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        },
    )
    .await
    .map_err(|e| e.to_string())?;
    let reply = read_frame(&mut stream).await.map_err(|e| e.to_string())?;
    expect_ok(&reply)
}

fn expect_ok(reply: &meshstore_protocol::RawFrame) -> Result<(), String> {
    if reply.kind == MessageKind::ERR {
        let err: ErrReply = parse_payload(reply).map_err(|e| e.to_string())?;
        return Err(err.message);
    }
    Ok(())
}

async fn wait_until<F, Fut>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not satisfied within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ===== scenarios (mirrors the literal end-to-end walkthroughs) =====

#[tokio::test]
async fn three_node_happy_path_uploads_and_downloads() {
    let coordinator = spawn_coordinator(3, Duration::from_secs(30), Duration::from_secs(30), Duration::from_secs(60)).await;
    for i in 0..3 {
        spawn_node(&format!("n{i}"), &coordinator.addr, 0, Arc::new(MemoryChunkStore::new(0))).await;
    }

    // 3 MiB -> under the 10 MiB threshold -> 512 KiB chunks -> 6 chunks.
    let data: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let file_id = upload_bytes(&coordinator.addr, &data, 3).await.expect("upload should succeed");

    let downloaded = download_bytes(&coordinator.addr, &file_id).await.expect("download should succeed");
    assert_eq!(downloaded, data);

    let status = get_status(&coordinator.addr).await;
    assert_eq!(status.total_nodes, 3);
    assert_eq!(status.healthy_nodes, 3);
    assert_eq!(status.file_count, 1);
    assert_eq!(status.under_replicated_count, 0);
}

#[tokio::test]
async fn node_failure_triggers_rereplication_to_a_spare_node() {
    let tick = Duration::from_millis(30);
    let timeout = Duration::from_millis(150);
    let sweep = Duration::from_millis(50);
    let coordinator = spawn_coordinator(3, tick, timeout, sweep).await;

    let mut nodes = Vec::new();
    for i in 0..4 {
        // a fourth, spare node beyond the 3 replicas so re-replication has somewhere to go
        nodes.push(spawn_node(&format!("n{i}"), &coordinator.addr, 0, Arc::new(MemoryChunkStore::new(0))).await);
    }

    let data: Vec<u8> = (0..600 * 1024u32).map(|i| (i % 199) as u8).collect();
    let file_id = upload_bytes(&coordinator.addr, &data, 3).await.expect("upload should succeed");

    nodes[0].heartbeat_handle.abort();

    wait_until(Duration::from_secs(5), || async {
        get_status(&coordinator.addr).await.healthy_nodes == 3
    })
    .await;

    wait_until(Duration::from_secs(5), || async {
        get_status(&coordinator.addr).await.under_replicated_count == 0
    })
    .await;

    let downloaded = download_bytes(&coordinator.addr, &file_id).await.expect("file must still be readable");
    assert_eq!(downloaded, data);
}

#[tokio::test]
async fn corrupted_replica_is_bypassed_on_download() {
    let coordinator = spawn_coordinator(3, Duration::from_secs(30), Duration::from_secs(30), Duration::from_secs(60)).await;

    spawn_node("good-0", &coordinator.addr, 0, Arc::new(MemoryChunkStore::new(0))).await;
    spawn_node("good-1", &coordinator.addr, 0, Arc::new(MemoryChunkStore::new(0))).await;
    spawn_node("corrupt", &coordinator.addr, 0, Arc::new(CorruptingStore::new(0))).await;

    // single chunk so every replica holds exactly the one corrupted-or-not copy
    let data: Vec<u8> = (0..400 * 1024u32).map(|i| (i % 97) as u8).collect();
    let file_id = upload_bytes(&coordinator.addr, &data, 3).await.expect("upload should succeed");

    let downloaded = download_bytes(&coordinator.addr, &file_id)
        .await
        .expect("download must succeed by trying the remaining good replicas");
    assert_eq!(downloaded, data);
}

#[tokio::test]
async fn upload_is_rejected_when_no_node_has_capacity() {
    let coordinator = spawn_coordinator(3, Duration::from_secs(30), Duration::from_secs(30), Duration::from_secs(60)).await;
    for i in 0..3 {
        spawn_node(&format!("n{i}"), &coordinator.addr, 1024, Arc::new(MemoryChunkStore::new(1024))).await;
    }

    // every node only has 1 KiB of capacity; this chunk can't fit anywhere.
    let data = vec![1u8; 600 * 1024];
    let result = upload_bytes(&coordinator.addr, &data, 3).await;
    assert!(result.is_err(), "upload should be rejected: no node has enough free capacity");
}

#[tokio::test]
async fn bandwidth_utilisation_returns_to_zero_after_transfers_complete() {
    let coordinator = spawn_coordinator(1, Duration::from_secs(30), Duration::from_secs(30), Duration::from_secs(60)).await;
    let node = spawn_node("n0", &coordinator.addr, 0, Arc::new(MemoryChunkStore::new(0))).await;

    let data: Vec<u8> = (0..800 * 1024u32).map(|i| (i % 211) as u8).collect();
    let file_id = upload_bytes(&coordinator.addr, &data, 1).await.expect("upload should succeed");
    download_bytes(&coordinator.addr, &file_id).await.expect("download should succeed");

    assert_eq!(node.bandwidth.network_utilisation(), 0);
    assert_eq!(node.bandwidth.active_transfer_count(), 0);
}

#[tokio::test]
async fn node_recovers_after_heartbeats_resume() {
    let tick = Duration::from_millis(30);
    let timeout = Duration::from_millis(150);
    let coordinator = spawn_coordinator(1, tick, timeout, Duration::from_secs(60)).await;
    let node = spawn_node("n0", &coordinator.addr, 0, Arc::new(MemoryChunkStore::new(0))).await;

    node.heartbeat_handle.abort();
    wait_until(Duration::from_secs(5), || async {
        get_status(&coordinator.addr).await.healthy_nodes == 0
    })
    .await;

    send_heartbeat(&coordinator.addr, &node.node_id, 0)
        .await
        .expect("a resumed heartbeat must be accepted");

    wait_until(Duration::from_secs(5), || async {
        get_status(&coordinator.addr).await.healthy_nodes == 1
    })
    .await;
}

#[tokio::test]
async fn recovered_node_chunks_are_reconciled_not_silently_retrusted() {
    let tick = Duration::from_millis(30);
    let timeout = Duration::from_millis(150);
    let sweep = Duration::from_millis(50);
    let coordinator = spawn_coordinator(3, tick, timeout, sweep).await;

    let mut nodes = Vec::new();
    for i in 0..4 {
        // a fourth, spare node beyond the 3 replicas so re-replication has somewhere to go
        nodes.push(spawn_node(&format!("n{i}"), &coordinator.addr, 0, Arc::new(MemoryChunkStore::new(0))).await);
    }

    let data: Vec<u8> = (0..300 * 1024u32).map(|i| (i % 131) as u8).collect();
    let file_id = upload_bytes(&coordinator.addr, &data, 3).await.expect("upload should succeed");
    let key = ChunkKey::new(file_id.clone(), 0);

    let victim = nodes
        .iter()
        .find(|n| coordinator.replica_index.locations(&key).contains(&n.node_id))
        .expect("one of the four nodes must hold the chunk")
        .node_id
        .clone();

    nodes
        .iter()
        .find(|n| n.node_id == victim)
        .unwrap()
        .heartbeat_handle
        .abort();

    wait_until(Duration::from_secs(5), || async {
        get_status(&coordinator.addr).await.healthy_nodes == 3
    })
    .await;
    wait_until(Duration::from_secs(5), || async {
        get_status(&coordinator.addr).await.under_replicated_count == 0
    })
    .await;

    // the index has moved on: the victim is no longer a holder of record.
    assert!(!coordinator.replica_index.locations(&key).contains(&victim));

    // the node recovers and its first heartbeat reports the chunk it
    // never actually deleted from local disk while it was down.
    send_heartbeat_with_chunks(
        &coordinator.addr,
        &victim,
        data.len() as u64,
        vec![HeldChunkRef {
            file_id: file_id.clone(),
            index: 0,
        }],
    )
    .await
    .expect("the recovered node's heartbeat must be accepted");

    // reconciliation must not re-register the victim as a holder...
    assert!(!coordinator.replica_index.locations(&key).contains(&victim));
    // ...but the chunk is now tracked for grace-period garbage collection.
    assert!(coordinator.gc.tracked_count() >= 1);

    // the file is still readable from the replicas the index actually trusts.
    let downloaded = download_bytes(&coordinator.addr, &file_id)
        .await
        .expect("file must still be downloadable from the replicas the index trusts");
    assert_eq!(downloaded, data);
}
