//! Resource limits applied to a container.

use serde::{Deserialize, Serialize};

/// All limits that can be set on a container at creation time.
///
/// A zero value in any field means "not limited".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Network bandwidth limits.
    pub bandwidth: BandwidthLimits,
    /// CPU limits.
    pub cpu: CpuLimits,
    /// Disk limits.
    pub disk: DiskLimits,
    /// Memory limits.
    pub memory: MemoryLimits,
    /// Process-count limits.
    pub pid: PidLimits,
}

impl Limits {
    /// Set the bandwidth limits.
    #[must_use]
    pub const fn with_bandwidth(mut self, bandwidth: BandwidthLimits) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Set the CPU limits.
    #[must_use]
    pub const fn with_cpu(mut self, cpu: CpuLimits) -> Self {
        self.cpu = cpu;
        self
    }

    /// Set the disk limits.
    #[must_use]
    pub const fn with_disk(mut self, disk: DiskLimits) -> Self {
        self.disk = disk;
        self
    }

    /// Set the memory limits.
    #[must_use]
    pub const fn with_memory(mut self, memory: MemoryLimits) -> Self {
        self.memory = memory;
        self
    }

    /// Set the process-count limits.
    #[must_use]
    pub const fn with_pid(mut self, pid: PidLimits) -> Self {
        self.pid = pid;
        self
    }
}

/// Network bandwidth limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandwidthLimits {
    /// Sustained rate.
    pub rate_in_bytes_per_second: u64,
    /// Burst rate.
    pub burst_rate_in_bytes_per_second: u64,
}

/// CPU limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuLimits {
    /// Relative CPU shares.
    pub limit_in_shares: u64,
    /// Relative CPU weight (newer servers prefer this over shares).
    pub weight: u64,
}

impl CpuLimits {
    /// Limit by CPU shares.
    #[must_use]
    pub const fn shares(limit_in_shares: u64) -> Self {
        Self {
            limit_in_shares,
            weight: 0,
        }
    }

    /// Limit by CPU weight.
    #[must_use]
    pub const fn weight(weight: u64) -> Self {
        Self {
            limit_in_shares: 0,
            weight,
        }
    }
}

/// Which disk usage a disk limit applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskLimitScope {
    /// Rootfs layers plus the container's own writes.
    #[default]
    Total,
    /// Only the container's own writes.
    Exclusive,
}

/// Disk limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskLimits {
    /// Soft inode limit.
    pub inode_soft: u64,
    /// Hard inode limit.
    pub inode_hard: u64,
    /// Soft byte limit.
    pub byte_soft: u64,
    /// Hard byte limit.
    pub byte_hard: u64,
    /// What the limit is measured against.
    pub scope: DiskLimitScope,
}

impl DiskLimits {
    /// Hard byte limit with the given scope.
    #[must_use]
    pub const fn bytes_hard(byte_hard: u64, scope: DiskLimitScope) -> Self {
        Self {
            inode_soft: 0,
            inode_hard: 0,
            byte_soft: 0,
            byte_hard,
            scope,
        }
    }
}

/// Memory limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryLimits {
    /// Memory limit in bytes.
    pub limit_in_bytes: u64,
}

/// Process-count limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidLimits {
    /// Maximum number of processes; zero means unlimited.
    pub max: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_unset() {
        let limits = Limits::default();
        assert_eq!(limits.memory.limit_in_bytes, 0);
        assert_eq!(limits.disk.scope, DiskLimitScope::Total);
        assert_eq!(limits.bandwidth, BandwidthLimits::default());
    }

    #[test]
    fn test_limits_builder() {
        let limits = Limits::default()
            .with_memory(MemoryLimits {
                limit_in_bytes: 128 * 1024 * 1024,
            })
            .with_cpu(CpuLimits::shares(50))
            .with_pid(PidLimits { max: 50 });

        assert_eq!(limits.memory.limit_in_bytes, 134_217_728);
        assert_eq!(limits.cpu.limit_in_shares, 50);
        assert_eq!(limits.pid.max, 50);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let limits: Limits =
            serde_json::from_str(r#"{"disk":{"byte_hard":1024,"scope":"exclusive"}}"#)
                .expect("parse");
        assert_eq!(
            limits.disk,
            DiskLimits::bytes_hard(1024, DiskLimitScope::Exclusive)
        );
        assert_eq!(limits.cpu, CpuLimits::default());
    }
}
