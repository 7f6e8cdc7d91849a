//! Handle-oriented facade over a [`Connection`].
//!
//! [`Client`] covers server-wide operations and hands out [`Container`]
//! handles for everything scoped to one container.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use garden_proto::{
    BandwidthLimits, Capacity, ContainerInfo, ContainerInfoEntry, ContainerMetricsEntry,
    ContainerSpec, CpuLimits, DiskLimits, GardenError, GardenResult, MemoryLimits, Metrics,
    NetOutRule, ProcessSpec, Properties,
};
use tracing::debug;

use crate::connection::{ByteReader, Connection, Process, ProcessIo, StreamInSpec, StreamOutSpec};

/// Client for a Garden server.
#[derive(Clone)]
pub struct Client {
    conn: Arc<dyn Connection>,
}

impl Client {
    /// Build a client over `conn`.
    pub fn new(conn: impl Connection + 'static) -> Self {
        Self::from_shared(Arc::new(conn))
    }

    /// Build a client over an already shared connection.
    pub fn from_shared(conn: Arc<dyn Connection>) -> Self {
        Self { conn }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Liveness check.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn ping(&self) -> GardenResult<()> {
        self.conn.ping().await
    }

    /// Total capacity of the server.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn capacity(&self) -> GardenResult<Capacity> {
        self.conn.capacity().await
    }

    /// Create a container.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn create(&self, spec: ContainerSpec) -> GardenResult<Container> {
        let handle = self.conn.create(spec).await?;
        debug!(handle = %handle, "container created");
        Ok(self.container(handle))
    }

    /// Destroy a container.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged, including
    /// [`GardenError::ContainerNotFound`].
    pub async fn destroy(&self, handle: &str) -> GardenResult<()> {
        self.conn.destroy(handle).await?;
        debug!(handle, "container destroyed");
        Ok(())
    }

    /// Containers whose properties include every pair in `properties`.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn containers(&self, properties: Properties) -> GardenResult<Vec<Container>> {
        let handles = self.conn.list(properties).await?;
        Ok(handles.into_iter().map(|h| self.container(h)).collect())
    }

    /// Handles of every container on the server.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn handles(&self) -> GardenResult<Vec<String>> {
        self.conn.list(Properties::new()).await
    }

    /// Find an existing container by handle.
    ///
    /// # Errors
    ///
    /// Returns [`GardenError::ContainerNotFound`] if no container has that
    /// handle, or the connection's error unchanged.
    pub async fn lookup(&self, handle: &str) -> GardenResult<Container> {
        let handles = self.handles().await?;
        if handles.iter().any(|h| h == handle) {
            Ok(self.container(handle))
        } else {
            Err(GardenError::container_not_found(handle))
        }
    }

    /// Introspect several containers at once.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged. Per-container failures are
    /// reported inside the entries.
    pub async fn bulk_info(
        &self,
        handles: &[String],
    ) -> GardenResult<HashMap<String, ContainerInfoEntry>> {
        self.conn.bulk_info(handles).await
    }

    /// Usage metrics for several containers at once.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged. Per-container failures are
    /// reported inside the entries.
    pub async fn bulk_metrics(
        &self,
        handles: &[String],
    ) -> GardenResult<HashMap<String, ContainerMetricsEntry>> {
        self.conn.bulk_metrics(handles).await
    }

    fn container(&self, handle: impl Into<String>) -> Container {
        Container {
            handle: handle.into(),
            conn: Arc::clone(&self.conn),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

/// A container on the server.
///
/// Holding a `Container` does not keep the remote container alive; every
/// call names it by handle.
#[derive(Clone)]
pub struct Container {
    handle: String,
    conn: Arc<dyn Connection>,
}

impl Container {
    /// The container's handle.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Stop all processes; `kill` skips the graceful phase.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn stop(&self, kill: bool) -> GardenResult<()> {
        self.conn.stop(&self.handle, kill).await
    }

    /// Introspect the container.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn info(&self) -> GardenResult<ContainerInfo> {
        self.conn.info(&self.handle).await
    }

    /// Unpack a tar stream into the container.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn stream_in(&self, spec: StreamInSpec) -> GardenResult<()> {
        self.conn.stream_in(&self.handle, spec).await
    }

    /// Tar up a path inside the container.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn stream_out(&self, spec: StreamOutSpec) -> GardenResult<ByteReader> {
        self.conn.stream_out(&self.handle, spec).await
    }

    /// Currently applied bandwidth limits.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn current_bandwidth_limits(&self) -> GardenResult<BandwidthLimits> {
        self.conn.current_bandwidth_limits(&self.handle).await
    }

    /// Currently applied CPU limits.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn current_cpu_limits(&self) -> GardenResult<CpuLimits> {
        self.conn.current_cpu_limits(&self.handle).await
    }

    /// Currently applied disk limits.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn current_disk_limits(&self) -> GardenResult<DiskLimits> {
        self.conn.current_disk_limits(&self.handle).await
    }

    /// Currently applied memory limits.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn current_memory_limits(&self) -> GardenResult<MemoryLimits> {
        self.conn.current_memory_limits(&self.handle).await
    }

    /// Start a process.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn run(&self, spec: ProcessSpec, io: ProcessIo) -> GardenResult<Box<dyn Process>> {
        let path = spec.path.clone();
        let process = self.conn.run(&self.handle, spec, io).await?;
        debug!(handle = %self.handle, process_id = process.id(), path = %path, "process started");
        Ok(process)
    }

    /// Re-attach to a running process.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn attach(&self, process_id: &str, io: ProcessIo) -> GardenResult<Box<dyn Process>> {
        self.conn.attach(&self.handle, process_id, io).await
    }

    /// Forward a host port into the container.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn net_in(&self, host_port: u32, container_port: u32) -> GardenResult<(u32, u32)> {
        self.conn
            .net_in(&self.handle, host_port, container_port)
            .await
    }

    /// Add an egress rule.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn net_out(&self, rule: NetOutRule) -> GardenResult<()> {
        self.conn.net_out(&self.handle, rule).await
    }

    /// Add several egress rules.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn bulk_net_out(&self, rules: Vec<NetOutRule>) -> GardenResult<()> {
        self.conn.bulk_net_out(&self.handle, rules).await
    }

    /// Set the idle grace time.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn set_grace_time(&self, grace_time: Duration) -> GardenResult<()> {
        self.conn.set_grace_time(&self.handle, grace_time).await
    }

    /// All properties.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn properties(&self) -> GardenResult<Properties> {
        self.conn.properties(&self.handle).await
    }

    /// A single property.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn property(&self, name: &str) -> GardenResult<String> {
        self.conn.property(&self.handle, name).await
    }

    /// Set a property.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn set_property(&self, name: &str, value: &str) -> GardenResult<()> {
        self.conn.set_property(&self.handle, name, value).await
    }

    /// Remove a property.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn remove_property(&self, name: &str) -> GardenResult<()> {
        self.conn.remove_property(&self.handle, name).await
    }

    /// Usage metrics.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn metrics(&self) -> GardenResult<Metrics> {
        self.conn.metrics(&self.handle).await
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
