//! ArbiterHost: explicit lifecycle for the process-wide arbiter.
//!
//! Replaces ambient get/init/shutdown globals with an owned object that the
//! daemon (or a test) constructs and passes around.
//!
//! - `get()` returns the live instance, spawning one if none exists
//! - `shutdown()` destroys the live instance and forgets it (idempotent)
//! - the next `get()` spawns a brand-new instance with empty pools
//!
//! Every new instance is provisioned from the configured pool list before it
//! is handed out, so a re-initialised arbiter never comes back empty.
//! [`generation`](ArbiterHost::generation) changes with each instance so
//! callers can tell they are talking to a fresh one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::arbiter::ResourceArbiter;
use crate::config::PoolConfig;
use crate::health::Health;
use crate::notify::ClientRegistry;
use crate::service::{ArbiterHandle, ArbiterService, ServiceError};

struct Instance {
    handle: ArbiterHandle,
    generation: u64,
    started_at: String,
}

/// Identity of the live instance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InstanceInfo {
    pub generation: u64,
    /// RFC 3339.
    pub started_at: String,
}

pub struct ArbiterHost {
    pools: Vec<PoolConfig>,
    registry: Arc<ClientRegistry>,
    current: Mutex<Option<Instance>>,
    generation: AtomicU64,
    shutting_down: AtomicBool,
}

impl ArbiterHost {
    pub fn new(pools: Vec<PoolConfig>) -> Arc<Self> {
        Arc::new(Self {
            pools,
            registry: ClientRegistry::new(),
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Registry shared by every instance; transports register clients here.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn pools(&self) -> &[PoolConfig] {
        &self.pools
    }

    /// Live instance, constructing and provisioning one if needed.
    pub async fn get(&self) -> Result<ArbiterHandle, ServiceError> {
        let mut current = self.current.lock().await;
        if let Some(instance) = current.as_ref()
            && !instance.handle.is_closed()
        {
            return Ok(instance.handle.clone());
        }

        let handle = ArbiterService::spawn(ResourceArbiter::new(Arc::clone(&self.registry)));
        for pool in &self.pools {
            handle.provision(pool.resource_type, pool.capacity).await?;
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(generation, pools = self.pools.len(), "Arbiter instance started");

        *current = Some(Instance {
            handle: handle.clone(),
            generation,
            started_at: chrono::Utc::now().to_rfc3339(),
        });
        self.shutting_down.store(false, Ordering::Release);
        Ok(handle)
    }

    /// Ensure an instance exists.
    pub async fn init(&self) -> Result<(), ServiceError> {
        self.get().await.map(|_| ())
    }

    /// Live instance without constructing one.
    pub async fn current(&self) -> Option<ArbiterHandle> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|instance| instance.handle.clone())
    }

    pub async fn instance_info(&self) -> Option<InstanceInfo> {
        self.current.lock().await.as_ref().map(|instance| InstanceInfo {
            generation: instance.generation,
            started_at: instance.started_at.clone(),
        })
    }

    /// Destroy and forget the live instance. Returns whether one existed.
    ///
    /// Outstanding grants are not revoked and nobody is notified; connections
    /// still holding the old handle simply stop getting answers.
    pub async fn shutdown(&self) -> bool {
        let Some(instance) = self.current.lock().await.take() else {
            return false;
        };

        self.shutting_down.store(true, Ordering::Release);
        if let Err(e) = instance.handle.destroy().await {
            tracing::warn!(generation = instance.generation, error = %e, "Arbiter already stopped at shutdown");
            return true;
        }
        match instance.handle.snapshot().await {
            Ok(snapshot) => tracing::info!(
                generation = instance.generation,
                granted = snapshot.total_granted(),
                waiting = snapshot.total_waiting(),
                "Arbiter instance shut down, outstanding requests left in place"
            ),
            Err(_) => tracing::info!(generation = instance.generation, "Arbiter instance shut down"),
        }
        true
    }

    /// Number of instances constructed so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn health(&self) -> Health {
        match self.current.lock().await.as_ref() {
            Some(instance) if instance.handle.is_closed() => Health::Defunct,
            Some(_) => Health::Ready,
            None if self.shutting_down.load(Ordering::Acquire) => Health::ShuttingDown,
            None => Health::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::{ClientId, RequestId, ResourceTypeId};

    const T: ResourceTypeId = ResourceTypeId::new(3);

    #[tokio::test]
    async fn get_constructs_lazily_and_provisions() {
        let host = ArbiterHost::new(vec![PoolConfig::new(T, 2)]);
        assert_eq!(host.generation(), 0);
        assert!(host.current().await.is_none());
        assert_eq!(host.health().await, Health::Unknown);

        let handle = host.get().await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();

        assert_eq!(host.generation(), 1);
        assert_eq!(snapshot.pool(T).unwrap().capacity, 2);
    }

    #[tokio::test]
    async fn get_reuses_live_instance() {
        let host = ArbiterHost::new(vec![PoolConfig::new(T, 1)]);
        let first = host.get().await.unwrap();
        let client = ClientId::new();
        first.acquire(client, RequestId::new(1), T, false).unwrap();

        let second = host.get().await.unwrap();
        let snapshot = second.snapshot().await.unwrap();

        assert_eq!(host.generation(), 1);
        assert_eq!(snapshot.pool(T).unwrap().granted, 1);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let host = ArbiterHost::new(Vec::new());
        assert!(!host.shutdown().await);

        host.init().await.unwrap();
        assert!(host.shutdown().await);
        assert!(!host.shutdown().await);
        assert_eq!(host.health().await, Health::ShuttingDown);
    }

    #[tokio::test]
    async fn old_handle_is_destroyed_after_shutdown() {
        let host = ArbiterHost::new(vec![PoolConfig::new(T, 1)]);
        let old = host.get().await.unwrap();
        old.acquire(ClientId::new(), RequestId::new(1), T, false)
            .unwrap();
        old.acquire(ClientId::new(), RequestId::new(2), T, true)
            .unwrap();
        assert!(host.shutdown().await);

        let snapshot = old.snapshot().await.unwrap();
        assert!(snapshot.destroyed);
        assert_eq!((snapshot.total_granted(), snapshot.total_waiting()), (1, 1));
    }

    #[tokio::test]
    async fn reinit_yields_fresh_provisioned_instance() {
        let host = ArbiterHost::new(vec![PoolConfig::new(T, 1)]);
        let old = host.get().await.unwrap();
        old.acquire(ClientId::new(), RequestId::new(1), T, false)
            .unwrap();
        old.snapshot().await.unwrap();
        host.shutdown().await;

        let fresh = host.get().await.unwrap();
        let snapshot = fresh.snapshot().await.unwrap();

        assert_eq!(host.generation(), 2);
        assert!(!snapshot.destroyed);
        let pool = snapshot.pool(T).unwrap();
        assert_eq!((pool.capacity, pool.granted), (1, 0));
        assert_eq!(host.health().await, Health::Ready);
        assert_eq!(host.instance_info().await.unwrap().generation, 2);
    }
}
