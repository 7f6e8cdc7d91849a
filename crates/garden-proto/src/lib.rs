//! # garden-proto
//!
//! Value types exchanged with a Garden container-management server.
//!
//! Nothing in this crate talks to the network. The types are plain data that a
//! `Connection` implementation serializes however its transport requires; the
//! client layer forwards them without looking inside.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod container;
pub mod error;
pub mod limits;
pub mod metrics;
pub mod net;
pub mod process;

pub use container::{
    BindMount, BindMountMode, BindMountOrigin, ContainerInfo, ContainerInfoEntry, ContainerSpec,
    ImageRef, PortMapping, Properties,
};
pub use error::{GardenError, GardenResult};
pub use limits::{
    BandwidthLimits, CpuLimits, DiskLimitScope, DiskLimits, Limits, MemoryLimits, PidLimits,
};
pub use metrics::{
    Capacity, ContainerCpuStat, ContainerDiskStat, ContainerMemoryStat, ContainerMetricsEntry,
    ContainerNetworkStat, ContainerPidStat, Metrics,
};
pub use net::{IcmpControl, IpRange, NetIn, NetOutRule, PortRange, Protocol};
pub use process::{ProcessSpec, ResourceLimits, Signal, TtySpec, WindowSize};
