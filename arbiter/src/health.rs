//! Health and introspection types.

use serde::{Deserialize, Serialize};

use crate::bridge::protocol::ResourceTypeId;
use crate::pool::ResourcePool;

/// Health of the arbiter host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    /// No instance constructed yet
    #[default]
    Unknown,
    /// Live instance accepting requests
    Ready,
    /// Shutdown requested; new business is refused
    ShuttingDown,
    /// Service task is gone
    Defunct,
}

/// Point-in-time view of one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub resource_type: ResourceTypeId,
    pub capacity: usize,
    pub granted: usize,
    pub waiting: usize,
}

impl PoolSnapshot {
    pub fn of(resource_type: ResourceTypeId, pool: &ResourcePool) -> Self {
        Self {
            resource_type,
            capacity: pool.capacity(),
            granted: pool.granted_len(),
            waiting: pool.waiting_len(),
        }
    }
}

/// Point-in-time view of the whole arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbiterSnapshot {
    pub destroyed: bool,
    /// Sorted by resource type.
    pub pools: Vec<PoolSnapshot>,
}

impl ArbiterSnapshot {
    pub fn pool(&self, resource_type: ResourceTypeId) -> Option<&PoolSnapshot> {
        self.pools.iter().find(|p| p.resource_type == resource_type)
    }

    pub fn total_granted(&self) -> usize {
        self.pools.iter().map(|p| p.granted).sum()
    }

    pub fn total_waiting(&self) -> usize {
        self.pools.iter().map(|p| p.waiting).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_serializes_screaming_snake_case() {
        insta::assert_json_snapshot!(
            [Health::Unknown, Health::Ready, Health::ShuttingDown, Health::Defunct],
            @r#"
        [
          "UNKNOWN",
          "READY",
          "SHUTTING_DOWN",
          "DEFUNCT"
        ]
        "#
        );
    }

    #[test]
    fn snapshot_serializes() {
        let snapshot = ArbiterSnapshot {
            destroyed: false,
            pools: vec![PoolSnapshot {
                resource_type: ResourceTypeId::new(1),
                capacity: 2,
                granted: 2,
                waiting: 3,
            }],
        };
        insta::assert_json_snapshot!(snapshot, @r#"
        {
          "destroyed": false,
          "pools": [
            {
              "resource_type": 1,
              "capacity": 2,
              "granted": 2,
              "waiting": 3
            }
          ]
        }
        "#);
    }

    #[test]
    fn totals_sum_over_pools() {
        let snapshot = ArbiterSnapshot {
            destroyed: false,
            pools: vec![
                PoolSnapshot {
                    resource_type: ResourceTypeId::new(1),
                    capacity: 1,
                    granted: 1,
                    waiting: 2,
                },
                PoolSnapshot {
                    resource_type: ResourceTypeId::new(2),
                    capacity: 4,
                    granted: 3,
                    waiting: 0,
                },
            ],
        };
        assert_eq!(snapshot.total_granted(), 4);
        assert_eq!(snapshot.total_waiting(), 2);
        assert!(snapshot.pool(ResourceTypeId::new(9)).is_none());
    }
}
