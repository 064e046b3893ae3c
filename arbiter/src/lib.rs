//! arbiter: capacity-bounded, FIFO-fair arbitration of named resource pools.
//!
//! Clients acquire slots of a resource type; full pools queue waiters in
//! arrival order and hand freed slots to them as holders release or
//! disconnect.

mod health;
mod version;

pub mod arbiter;
pub mod bridge;
pub mod client;
pub mod config;
pub mod host;
pub mod notify;
pub mod pool;
pub mod service;
pub mod transport;

pub use arbiter::{ProvisionError, ResourceArbiter};
pub use bridge::protocol::{
    ClientId, ClientMessage, Outcome, RejectReason, RequestId, ResourceTypeId, Response,
    ServerMessage,
};
pub use client::{ArbiterClient, ClientError};
pub use config::{ArbiterConfig, ConfigError, PoolConfig};
pub use health::{ArbiterSnapshot, Health, PoolSnapshot};
pub use host::{ArbiterHost, InstanceInfo};
pub use notify::{ClientRegistry, Notifier};
pub use pool::{Placement, Request, ResourcePool};
pub use service::{ArbiterHandle, ArbiterService, ServiceError};
pub use version::{ARBITER_VERSION, VersionInfo};
