//! Wire protocol types for client-arbiter communication.
//!
//! One framed stream per client connection:
//! - **Inbound** ([`ClientMessage`]): Acquire, Release
//! - **Outbound** ([`ServerMessage`]): one Response per resolved request

use serde::{Deserialize, Serialize};

/// Revision of the client wire protocol. Bump on incompatible changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Identifier of a resource pool (e.g. a hardware decoder class).
///
/// Opaque to the arbiter: used only as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTypeId(u32);

impl ResourceTypeId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ResourceTypeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for ResourceTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a connected client.
///
/// Minted by the transport when a connection is accepted. The arbiter only
/// compares and forwards it, so a client can vanish without the arbiter
/// holding on to any of its memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(uuid::Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-chosen request number, unique per client and relayed verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u32);

impl RequestId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for RequestId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why an acquire was refused.
///
/// Older clients only look at `success`; this is purely additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No pool exists for the type, or its capacity is zero.
    Unprovisioned,
    /// Pool is full and the client asked not to wait.
    AtCapacity,
}

/// Resolution of a single acquire request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Granted,
    Rejected(RejectReason),
}

impl Outcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Outcome::Granted)
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Outcome::Granted => None,
            Outcome::Rejected(reason) => Some(*reason),
        }
    }
}

/// Notification handed to a [`Notifier`](crate::notify::Notifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub request_id: RequestId,
    pub outcome: Outcome,
}

impl Response {
    pub fn granted(request_id: RequestId) -> Self {
        Self {
            request_id,
            outcome: Outcome::Granted,
        }
    }

    pub fn rejected(request_id: RequestId, reason: RejectReason) -> Self {
        Self {
            request_id,
            outcome: Outcome::Rejected(reason),
        }
    }

    pub fn into_server_message(self) -> ServerMessage {
        ServerMessage::Response {
            id: self.request_id,
            success: self.outcome.is_granted(),
            reason: self.outcome.reason(),
        }
    }
}

/// Messages from client to arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for one slot of `resource_type`.
    ///
    /// With `will_wait` the request queues when the pool is full and the
    /// response arrives once a slot frees up.
    Acquire {
        id: RequestId,
        resource_type: ResourceTypeId,
        #[serde(default)]
        will_wait: bool,
    },

    /// Give back a granted slot, or cancel a queued request.
    Release {
        id: RequestId,
        resource_type: ResourceTypeId,
    },
}

/// Messages from arbiter to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Response {
        id: RequestId,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<RejectReason>,
    },
}

impl ServerMessage {
    pub fn request_id(&self) -> RequestId {
        match self {
            ServerMessage::Response { id, .. } => *id,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            ServerMessage::Response { success, .. } => *success,
        }
    }
}
