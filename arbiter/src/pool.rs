//! Per-resource-type bookkeeping.
//!
//! A [`ResourcePool`] holds a fixed capacity, a FIFO queue of waiting
//! requests, and the set of granted requests. It never notifies anyone and
//! never promotes on its own: the arbiter decides when to run
//! [`ResourcePool::promote_waiters`], so a batch of removals costs exactly
//! one promotion pass.

use std::collections::VecDeque;

use crate::bridge::protocol::{ClientId, RequestId};

/// A single slot request, keyed by `(client, request_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Request {
    pub client: ClientId,
    pub id: RequestId,
}

impl Request {
    pub fn new(client: ClientId, id: RequestId) -> Self {
        Self { client, id }
    }

    fn matches(&self, client: ClientId, id: RequestId) -> bool {
        self.client == client && self.id == id
    }
}

/// Where a request currently sits inside a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Granted,
    Waiting,
}

#[derive(Debug, Default)]
pub struct ResourcePool {
    capacity: usize,
    waiting: VecDeque<Request>,
    granted: Vec<Request>,
}

impl ResourcePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            waiting: VecDeque::new(),
            granted: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// A zero-capacity pool behaves exactly like a missing one.
    pub fn is_provisioned(&self) -> bool {
        self.capacity > 0
    }

    pub fn granted_len(&self) -> usize {
        self.granted.len()
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.granted.len())
    }

    /// Change the capacity. Refuses to drop below the granted count.
    ///
    /// Does not promote; callers follow up with [`promote_waiters`](Self::promote_waiters).
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), usize> {
        if capacity < self.granted.len() {
            return Err(self.granted.len());
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Grant `req` if a slot is free. No side effect when full.
    pub fn try_admit(&mut self, req: Request) -> bool {
        if self.available() > 0 {
            self.granted.push(req);
            true
        } else {
            false
        }
    }

    /// Append to the tail of the waiting queue. No capacity check.
    pub fn enqueue(&mut self, req: Request) {
        self.waiting.push_back(req);
    }

    /// Remove the first match, searching granted before waiting.
    pub fn remove_if_present(&mut self, client: ClientId, id: RequestId) -> bool {
        if let Some(pos) = self.granted.iter().position(|r| r.matches(client, id)) {
            self.granted.swap_remove(pos);
            return true;
        }
        if let Some(pos) = self.waiting.iter().position(|r| r.matches(client, id)) {
            // VecDeque::remove shifts, keeping the queue order intact.
            self.waiting.remove(pos);
            return true;
        }
        false
    }

    /// Drop every request owned by `client`. Returns how many were removed.
    pub fn remove_all_for_client(&mut self, client: ClientId) -> usize {
        let before = self.granted.len() + self.waiting.len();
        self.granted.retain(|r| r.client != client);
        self.waiting.retain(|r| r.client != client);
        before - (self.granted.len() + self.waiting.len())
    }

    /// Move waiters into the granted set while capacity allows.
    ///
    /// Returns the promoted requests in promotion (= arrival) order.
    pub fn promote_waiters(&mut self) -> Vec<Request> {
        let mut promoted = Vec::new();
        while self.available() > 0 {
            let Some(req) = self.waiting.pop_front() else {
                break;
            };
            self.granted.push(req);
            promoted.push(req);
        }
        promoted
    }

    pub fn placement(&self, client: ClientId, id: RequestId) -> Option<Placement> {
        if self.granted.iter().any(|r| r.matches(client, id)) {
            Some(Placement::Granted)
        } else if self.waiting.iter().any(|r| r.matches(client, id)) {
            Some(Placement::Waiting)
        } else {
            None
        }
    }

    pub fn waiting(&self) -> impl Iterator<Item = &Request> {
        self.waiting.iter()
    }

    pub fn granted(&self) -> impl Iterator<Item = &Request> {
        self.granted.iter()
    }
}
