//! ResourceArbiter: capacity-gated, FIFO-fair slot admission.
//!
//! The arbiter owns every [`ResourcePool`] and every request inside them.
//! Clients are referenced only by [`ClientId`]; their responses go out through
//! a [`Notifier`].
//!
//! Per-request state machine:
//!
//! ```text
//! absent ──acquire──► granted ──release/disconnect──► absent
//!    │                   ▲
//!    ├──acquire(wait)──► waiting ──release/disconnect──► absent
//!    │
//!    └──acquire──► rejected (no pool, zero capacity, or full without wait)
//! ```
//!
//! The arbiter is single-owner: all methods take `&mut self`. Concurrent
//! callers go through [`ArbiterService`](crate::service::ArbiterService),
//! which serializes every call on one queue and so keeps promotions in order.

use std::collections::HashMap;

use crate::bridge::protocol::{ClientId, RejectReason, RequestId, ResourceTypeId, Response};
use crate::health::{ArbiterSnapshot, PoolSnapshot};
use crate::notify::Notifier;
use crate::pool::{Placement, Request, ResourcePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    #[error("arbiter destroyed")]
    Destroyed,
    #[error("capacity {requested} for resource type {resource_type} is below {granted} granted slots")]
    BelowGranted {
        resource_type: ResourceTypeId,
        requested: usize,
        granted: usize,
    },
}

pub struct ResourceArbiter<N> {
    pools: HashMap<ResourceTypeId, ResourcePool>,
    destroyed: bool,
    notifier: N,
}

impl<N: Notifier> ResourceArbiter<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            pools: HashMap::new(),
            destroyed: false,
            notifier,
        }
    }

    /// Set the capacity of a pool, creating it if needed.
    ///
    /// Host-side only; clients have no way to reach this. Raising capacity
    /// promotes waiters immediately.
    pub fn provision(
        &mut self,
        resource_type: ResourceTypeId,
        capacity: usize,
    ) -> Result<(), ProvisionError> {
        if self.destroyed {
            return Err(ProvisionError::Destroyed);
        }

        let pool = self.pools.entry(resource_type).or_default();
        pool.set_capacity(capacity)
            .map_err(|granted| ProvisionError::BelowGranted {
                resource_type,
                requested: capacity,
                granted,
            })?;

        tracing::info!(%resource_type, capacity, "Pool provisioned");
        self.update_requests(resource_type);
        Ok(())
    }

    /// Request a slot. The result is always delivered through the notifier,
    /// except when the request is queued (delivered on promotion) or the
    /// arbiter is destroyed (never delivered).
    pub fn acquire(
        &mut self,
        client: ClientId,
        request_id: RequestId,
        resource_type: ResourceTypeId,
        will_wait: bool,
    ) {
        if self.destroyed {
            tracing::debug!(%client, %request_id, %resource_type, "Acquire after destroy dropped");
            return;
        }

        let Some(pool) = self
            .pools
            .get_mut(&resource_type)
            .filter(|pool| pool.is_provisioned())
        else {
            tracing::debug!(%client, %request_id, %resource_type, "Acquire on unprovisioned resource type");
            self.notifier.send_response(
                client,
                Response::rejected(request_id, RejectReason::Unprovisioned),
            );
            return;
        };

        let request = Request::new(client, request_id);
        if pool.try_admit(request) {
            tracing::debug!(%client, %request_id, %resource_type, "Slot granted");
            self.notifier
                .send_response(client, Response::granted(request_id));
        } else if !will_wait {
            tracing::debug!(%client, %request_id, %resource_type, "Pool full, not waiting");
            self.notifier.send_response(
                client,
                Response::rejected(request_id, RejectReason::AtCapacity),
            );
        } else {
            pool.enqueue(request);
            tracing::debug!(
                %client,
                %request_id,
                %resource_type,
                queue_depth = pool.waiting_len(),
                "Request queued"
            );
        }
    }

    /// Release a granted slot or cancel a queued request, then promote.
    ///
    /// Unknown requests are a silent no-op.
    pub fn release(&mut self, client: ClientId, request_id: RequestId, resource_type: ResourceTypeId) {
        if self.destroyed {
            return;
        }

        let Some(pool) = self
            .pools
            .get_mut(&resource_type)
            .filter(|pool| pool.is_provisioned())
        else {
            return;
        };

        if pool.remove_if_present(client, request_id) {
            tracing::debug!(%client, %request_id, %resource_type, "Request released");
        }
        self.update_requests(resource_type);
    }

    /// Drop everything `client` holds or waits for, across every pool.
    ///
    /// Called by the transport once per disconnect.
    pub fn release_all_for_client(&mut self, client: ClientId) {
        if self.destroyed {
            return;
        }

        let types: Vec<ResourceTypeId> = self
            .pools
            .iter()
            .filter(|(_, pool)| pool.is_provisioned())
            .map(|(resource_type, _)| *resource_type)
            .collect();

        for resource_type in types {
            if let Some(pool) = self.pools.get_mut(&resource_type) {
                let removed = pool.remove_all_for_client(client);
                if removed > 0 {
                    tracing::debug!(%client, %resource_type, removed, "Released client requests");
                }
            }
            self.update_requests(resource_type);
        }
    }

    /// Refuse all further business. Outstanding grants stay where they are
    /// and nobody is notified.
    pub fn destroy(&mut self) {
        if !self.destroyed {
            tracing::info!(pools = self.pools.len(), "Arbiter destroyed");
        }
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn pool(&self, resource_type: ResourceTypeId) -> Option<&ResourcePool> {
        self.pools.get(&resource_type)
    }

    pub fn placement(
        &self,
        client: ClientId,
        request_id: RequestId,
        resource_type: ResourceTypeId,
    ) -> Option<Placement> {
        self.pools
            .get(&resource_type)
            .and_then(|pool| pool.placement(client, request_id))
    }

    pub fn snapshot(&self) -> ArbiterSnapshot {
        let mut pools: Vec<PoolSnapshot> = self
            .pools
            .iter()
            .map(|(resource_type, pool)| PoolSnapshot::of(*resource_type, pool))
            .collect();
        pools.sort_by_key(|p| p.resource_type);
        ArbiterSnapshot {
            destroyed: self.destroyed,
            pools,
        }
    }

    /// Promote waiters of one pool and tell each promoted client, in order.
    fn update_requests(&mut self, resource_type: ResourceTypeId) {
        let Some(pool) = self
            .pools
            .get_mut(&resource_type)
            .filter(|pool| pool.is_provisioned())
        else {
            return;
        };

        for request in pool.promote_waiters() {
            tracing::debug!(
                client = %request.client,
                request_id = %request.id,
                %resource_type,
                "Waiting request promoted"
            );
            self.notifier
                .send_response(request.client, Response::granted(request.id));
        }
    }
}
