//! An in-process, lossy transport for exercising the engine without a real
//! socket. Shared by every integration test in this directory.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::RwLock;

use paxos_log::config::PeerId;
use paxos_log::error::TransportError;
use paxos_log::wire::{Reply, Request};
use paxos_log::{PeerHandle, RpcTransport};

/// Fault-injection knobs for a [`Network`], adjustable at runtime so a test
/// can heal a partition or change loss rates mid-scenario.
#[derive(Debug, Clone, Copy)]
struct FaultConfig {
    drop_rate: f64,
    duplicate_rate: f64,
    max_jitter: Duration,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            drop_rate: 0.0,
            duplicate_rate: 0.0,
            max_jitter: Duration::ZERO,
        }
    }
}

/// The shared switchboard every peer's [`InMemoryTransport`] delivers
/// through. Registers each peer's [`PeerHandle`] and can drop, duplicate,
/// delay, or partition messages in either direction.
pub struct Network {
    handles: DashMap<PeerId, PeerHandle>,
    partitioned: DashMap<PeerId, ()>,
    faults: RwLock<FaultConfig>,
    timeout: Duration,
}

impl Network {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            handles: DashMap::new(),
            partitioned: DashMap::new(),
            faults: RwLock::new(FaultConfig::default()),
            timeout,
        })
    }

    pub fn register(&self, id: PeerId, handle: PeerHandle) {
        self.handles.insert(id, handle);
    }

    /// Cut `peer` off from all inbound traffic until [`Network::heal`].
    pub fn partition(&self, peer: PeerId) {
        self.partitioned.insert(peer, ());
    }

    pub fn heal(&self, peer: PeerId) {
        self.partitioned.remove(&peer);
    }

    pub async fn set_drop_rate(&self, rate: f64) {
        self.faults.write().await.drop_rate = rate;
    }

    pub async fn set_duplicate_rate(&self, rate: f64) {
        self.faults.write().await.duplicate_rate = rate;
    }

    pub async fn set_max_jitter(&self, jitter: Duration) {
        self.faults.write().await.max_jitter = jitter;
    }

    async fn deliver(&self, peer: PeerId, request: Request) -> Result<Reply, TransportError> {
        if self.partitioned.contains_key(&peer) {
            return Err(TransportError::Unreachable);
        }

        let faults = *self.faults.read().await;

        if faults.drop_rate > 0.0 && rand::thread_rng().gen::<f64>() < faults.drop_rate {
            return Err(TransportError::Timeout);
        }

        let handle = self
            .handles
            .get(&peer)
            .map(|entry| entry.clone())
            .ok_or(TransportError::Unreachable)?;

        if faults.duplicate_rate > 0.0 && rand::thread_rng().gen::<f64>() < faults.duplicate_rate {
            let dup_handle = handle.clone();
            let dup_request = request.clone();
            tokio::spawn(async move {
                let _ = dup_handle.dispatch(dup_request).await;
            });
        }

        if faults.max_jitter > Duration::ZERO {
            let millis = rand::thread_rng().gen_range(0..=faults.max_jitter.as_millis() as u64);
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        match tokio::time::timeout(self.timeout, handle.dispatch(request)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(TransportError::Unreachable),
            Err(_) => Err(TransportError::Timeout),
        }
    }
}

/// One peer's handle onto a shared [`Network`]; this is what gets passed to
/// [`paxos_log::spawn`] as the `RpcTransport`.
pub struct InMemoryTransport {
    network: Arc<Network>,
}

impl InMemoryTransport {
    pub fn new(network: Arc<Network>) -> Self {
        Self { network }
    }
}

#[async_trait]
impl RpcTransport for InMemoryTransport {
    async fn call(&self, peer: PeerId, request: Request) -> Result<Reply, TransportError> {
        self.network.deliver(peer, request).await
    }
}

/// A clock whose current second is set by the test rather than read from
/// the OS, so proposal-number minting is deterministic where a test needs
/// that.
pub struct SimClock {
    now: std::sync::atomic::AtomicI64,
}

impl SimClock {
    pub fn new(start: i64) -> Arc<Self> {
        Arc::new(Self {
            now: std::sync::atomic::AtomicI64::new(start),
        })
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

impl paxos_log::Clock for SimClock {
    fn now_unix_secs(&self) -> i64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}
