//! Version information for the arbiter.

use crate::bridge::protocol::PROTOCOL_VERSION;

/// Crate version from Cargo.toml
pub const ARBITER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version information reported by the admin endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionInfo {
    pub arbiter: &'static str,
    /// Wire protocol revision spoken on the client port.
    pub protocol: u32,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            arbiter: ARBITER_VERSION,
            protocol: PROTOCOL_VERSION,
        }
    }
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }
}
