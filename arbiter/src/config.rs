//! Arbiter configuration.
//!
//! Pools are declared as `<resource_type>=<capacity>` pairs, either through
//! the builder, `ARBITER_POOLS` (comma-separated), or the daemon's CLI.

use std::net::SocketAddr;
use std::str::FromStr;

use crate::bridge::codec::DEFAULT_MAX_FRAME_LEN;
use crate::bridge::protocol::ResourceTypeId;

pub const POOLS_ENV: &str = "ARBITER_POOLS";
pub const CLIENT_ADDR_ENV: &str = "ARBITER_CLIENT_ADDR";
pub const ADMIN_ADDR_ENV: &str = "ARBITER_ADMIN_ADDR";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid pool entry '{0}': expected <resource_type>=<capacity>")]
    InvalidPool(String),
    #[error("invalid address '{value}' in {var}: {reason}")]
    InvalidAddr {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Capacity of a single resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub resource_type: ResourceTypeId,
    pub capacity: usize,
}

impl PoolConfig {
    pub fn new(resource_type: impl Into<ResourceTypeId>, capacity: usize) -> Self {
        Self {
            resource_type: resource_type.into(),
            capacity,
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidPool(s.to_string());
        let (resource_type, capacity) = s.trim().split_once('=').ok_or_else(invalid)?;
        let resource_type: u32 = resource_type.trim().parse().map_err(|_| invalid())?;
        let capacity: usize = capacity.trim().parse().map_err(|_| invalid())?;
        Ok(Self::new(resource_type, capacity))
    }

    /// Parse a comma-separated list, ignoring empty entries.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, ConfigError> {
        s.split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl FromStr for PoolConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    pub pools: Vec<PoolConfig>,
    pub client_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub max_frame_len: usize,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            pools: Vec::new(),
            client_addr: SocketAddr::from(([127, 0, 0, 1], 7400)),
            admin_addr: SocketAddr::from(([127, 0, 0, 1], 7401)),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ArbiterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by whatever `ARBITER_*` variables are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(pools) = lookup(POOLS_ENV) {
            config = config.with_pools(PoolConfig::parse_list(&pools)?);
        }
        if let Some(addr) = lookup(CLIENT_ADDR_ENV) {
            config.client_addr = parse_addr(CLIENT_ADDR_ENV, &addr)?;
        }
        if let Some(addr) = lookup(ADMIN_ADDR_ENV) {
            config.admin_addr = parse_addr(ADMIN_ADDR_ENV, &addr)?;
        }

        Ok(config)
    }

    /// Add a pool. A later entry for the same type replaces the earlier one.
    pub fn with_pool(mut self, resource_type: impl Into<ResourceTypeId>, capacity: usize) -> Self {
        self.set_pool(PoolConfig::new(resource_type, capacity));
        self
    }

    pub fn with_pools(mut self, pools: impl IntoIterator<Item = PoolConfig>) -> Self {
        for pool in pools {
            self.set_pool(pool);
        }
        self
    }

    pub fn with_client_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = addr;
        self
    }

    pub fn with_admin_addr(mut self, addr: SocketAddr) -> Self {
        self.admin_addr = addr;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    fn set_pool(&mut self, pool: PoolConfig) {
        match self
            .pools
            .iter_mut()
            .find(|p| p.resource_type == pool.resource_type)
        {
            Some(existing) => existing.capacity = pool.capacity,
            None => self.pools.push(pool),
        }
    }
}

fn parse_addr(var: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidAddr {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn parse_pool_pair() {
        assert_eq!(PoolConfig::parse("7=2").unwrap(), PoolConfig::new(7, 2));
        assert_eq!(PoolConfig::parse(" 3 = 0 ").unwrap(), PoolConfig::new(3, 0));
    }

    #[test]
    fn parse_pool_rejects_garbage() {
        for bad in ["7", "=2", "a=1", "1=-1", "1=2=3"] {
            assert_eq!(
                PoolConfig::parse(bad),
                Err(ConfigError::InvalidPool(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn parse_list_skips_empty_entries() {
        let pools = PoolConfig::parse_list("1=1, ,2=4,").unwrap();
        assert_eq!(pools, vec![PoolConfig::new(1, 1), PoolConfig::new(2, 4)]);
    }

    #[test]
    fn builder_replaces_duplicate_pool() {
        let config = ArbiterConfig::new().with_pool(1, 1).with_pool(2, 2).with_pool(1, 5);
        assert_eq!(config.pools, vec![PoolConfig::new(1, 5), PoolConfig::new(2, 2)]);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            (POOLS_ENV, "1=2,9=1"),
            (CLIENT_ADDR_ENV, "0.0.0.0:9000"),
        ]
        .into_iter()
        .collect();

        let config =
            ArbiterConfig::from_lookup(|var| vars.get(var).map(|v| v.to_string())).unwrap();

        assert_eq!(config.pools, vec![PoolConfig::new(1, 2), PoolConfig::new(9, 1)]);
        assert_eq!(config.client_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.admin_addr, ArbiterConfig::default().admin_addr);
    }

    #[test]
    fn lookup_collapses_duplicate_pools() {
        let config = ArbiterConfig::from_lookup(|var| {
            (var == POOLS_ENV).then(|| "4=1,5=2,4=3".to_string())
        })
        .unwrap();

        assert_eq!(config.pools, vec![PoolConfig::new(4, 3), PoolConfig::new(5, 2)]);
    }

    #[test]
    fn lookup_reports_bad_addr() {
        let err = ArbiterConfig::from_lookup(|var| {
            (var == ADMIN_ADDR_ENV).then(|| "nope".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddr { var: ADMIN_ADDR_ENV, .. }));
    }
}
