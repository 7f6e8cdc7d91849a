//! Usage telemetry and server capacity.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GardenError, GardenResult};

/// Total resources the server can hand out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacity {
    /// Memory in bytes.
    pub memory_in_bytes: u64,
    /// Disk in bytes.
    pub disk_in_bytes: u64,
    /// Disk in bytes available for scheduling new containers.
    pub schedulable_disk_in_bytes: u64,
    /// Maximum number of containers.
    pub max_containers: u64,
}

/// Memory usage of a container's cgroup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerMemoryStat {
    /// Active anonymous memory.
    pub active_anon: u64,
    /// Active file-backed memory.
    pub active_file: u64,
    /// Inactive anonymous memory.
    pub inactive_anon: u64,
    /// Inactive file-backed memory.
    pub inactive_file: u64,
    /// Resident set size.
    pub rss: u64,
    /// Page cache.
    pub cache: u64,
    /// Swap usage.
    pub swap: u64,
    /// Memory usage excluding inactive file cache.
    pub total_usage_towards_limit: u64,
}

/// CPU usage in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerCpuStat {
    /// Total CPU time.
    pub usage: u64,
    /// User CPU time.
    pub user: u64,
    /// System CPU time.
    pub system: u64,
}

/// Disk usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerDiskStat {
    /// Bytes including rootfs layers.
    pub total_bytes_used: u64,
    /// Inodes including rootfs layers.
    pub total_inodes_used: u64,
    /// Bytes written by the container itself.
    pub exclusive_bytes_used: u64,
    /// Inodes created by the container itself.
    pub exclusive_inodes_used: u64,
}

/// Network traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerNetworkStat {
    /// Received bytes.
    pub rx_bytes: u64,
    /// Transmitted bytes.
    pub tx_bytes: u64,
}

/// Process-count usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerPidStat {
    /// Current number of processes.
    pub current: u64,
    /// Configured maximum.
    pub max: u64,
}

/// A snapshot of container usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// Memory usage.
    pub memory_stat: ContainerMemoryStat,
    /// CPU usage.
    pub cpu_stat: ContainerCpuStat,
    /// Disk usage.
    pub disk_stat: ContainerDiskStat,
    /// Network counters; absent when the server does not collect them.
    pub network_stat: Option<ContainerNetworkStat>,
    /// Process counts.
    pub pid_stat: ContainerPidStat,
    /// Time since the container was created.
    pub age: Duration,
    /// CPU time the container is entitled to, in nanoseconds.
    pub cpu_entitlement: u64,
}

/// Per-handle result of a bulk metrics call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerMetricsEntry {
    /// Metrics, meaningful only when `err` is `None`.
    pub metrics: Metrics,
    /// Error for this handle, if any.
    pub err: Option<GardenError>,
}

impl ContainerMetricsEntry {
    /// Convert to a result, preferring the error when present.
    pub fn into_result(self) -> GardenResult<Metrics> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(self.metrics),
        }
    }
}
