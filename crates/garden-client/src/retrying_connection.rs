//! Connection wrapper whose processes retry `wait`.

use std::collections::HashMap;
use std::time::Duration;

use garden_proto::{
    BandwidthLimits, Capacity, ContainerInfo, ContainerInfoEntry, ContainerMetricsEntry,
    ContainerSpec, CpuLimits, DiskLimits, GardenResult, MemoryLimits, Metrics, NetOutRule,
    ProcessSpec, Properties,
};
use tracing::debug;

use crate::connection::{
    BoxFuture, ByteReader, Connection, Process, ProcessIo, StreamInSpec, StreamOutSpec,
};
use crate::retry::RetryPolicy;
use crate::retrying_process::RetryingProcess;

/// Wraps a [`Connection`] so that every process started through
/// [`Connection::run`] retries `wait`.
///
/// All other operations are forwarded untouched: same arguments in, same
/// value or error out, no retries. Processes obtained through `attach` are
/// not wrapped.
#[derive(Debug)]
pub struct RetryingConnection<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: Connection> RetryingConnection<C> {
    /// Wrap `inner` with the default policy.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            policy: RetryPolicy::default(),
        }
    }

    /// Wrap `inner` with a custom policy for processes it starts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the policy fails [`RetryPolicy::validate`].
    pub fn with_policy(inner: C, policy: RetryPolicy) -> GardenResult<Self> {
        policy.validate()?;
        Ok(Self { inner, policy })
    }

    /// The policy handed to every wrapped process.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The wrapped connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwrap the connection.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Connection> Connection for RetryingConnection<C> {
    fn ping(&self) -> BoxFuture<'_, GardenResult<()>> {
        self.inner.ping()
    }

    fn capacity(&self) -> BoxFuture<'_, GardenResult<Capacity>> {
        self.inner.capacity()
    }

    fn create(&self, spec: ContainerSpec) -> BoxFuture<'_, GardenResult<String>> {
        self.inner.create(spec)
    }

    fn list(&self, properties: Properties) -> BoxFuture<'_, GardenResult<Vec<String>>> {
        self.inner.list(properties)
    }

    fn destroy<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<()>> {
        self.inner.destroy(handle)
    }

    fn stop<'a>(&'a self, handle: &'a str, kill: bool) -> BoxFuture<'a, GardenResult<()>> {
        self.inner.stop(handle, kill)
    }

    fn info<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<ContainerInfo>> {
        self.inner.info(handle)
    }

    fn bulk_info<'a>(
        &'a self,
        handles: &'a [String],
    ) -> BoxFuture<'a, GardenResult<HashMap<String, ContainerInfoEntry>>> {
        self.inner.bulk_info(handles)
    }

    fn bulk_metrics<'a>(
        &'a self,
        handles: &'a [String],
    ) -> BoxFuture<'a, GardenResult<HashMap<String, ContainerMetricsEntry>>> {
        self.inner.bulk_metrics(handles)
    }

    fn stream_in<'a>(
        &'a self,
        handle: &'a str,
        spec: StreamInSpec,
    ) -> BoxFuture<'a, GardenResult<()>> {
        self.inner.stream_in(handle, spec)
    }

    fn stream_out<'a>(
        &'a self,
        handle: &'a str,
        spec: StreamOutSpec,
    ) -> BoxFuture<'a, GardenResult<ByteReader>> {
        self.inner.stream_out(handle, spec)
    }

    fn current_bandwidth_limits<'a>(
        &'a self,
        handle: &'a str,
    ) -> BoxFuture<'a, GardenResult<BandwidthLimits>> {
        self.inner.current_bandwidth_limits(handle)
    }

    fn current_cpu_limits<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<CpuLimits>> {
        self.inner.current_cpu_limits(handle)
    }

    fn current_disk_limits<'a>(
        &'a self,
        handle: &'a str,
    ) -> BoxFuture<'a, GardenResult<DiskLimits>> {
        self.inner.current_disk_limits(handle)
    }

    fn current_memory_limits<'a>(
        &'a self,
        handle: &'a str,
    ) -> BoxFuture<'a, GardenResult<MemoryLimits>> {
        self.inner.current_memory_limits(handle)
    }

    fn run<'a>(
        &'a self,
        handle: &'a str,
        spec: ProcessSpec,
        io: ProcessIo,
    ) -> BoxFuture<'a, GardenResult<Box<dyn Process>>> {
        Box::pin(async move {
            let process = self.inner.run(handle, spec, io).await?;
            debug!(
                handle,
                process_id = process.id(),
                max_attempts = self.policy.max_attempts,
                "wrapping process for wait retries"
            );
            let wrapped: Box<dyn Process> =
                Box::new(RetryingProcess::with_valid_policy(process, self.policy.clone()));
            Ok(wrapped)
        })
    }

    fn attach<'a>(
        &'a self,
        handle: &'a str,
        process_id: &'a str,
        io: ProcessIo,
    ) -> BoxFuture<'a, GardenResult<Box<dyn Process>>> {
        self.inner.attach(handle, process_id, io)
    }

    fn net_in<'a>(
        &'a self,
        handle: &'a str,
        host_port: u32,
        container_port: u32,
    ) -> BoxFuture<'a, GardenResult<(u32, u32)>> {
        self.inner.net_in(handle, host_port, container_port)
    }

    fn net_out<'a>(
        &'a self,
        handle: &'a str,
        rule: NetOutRule,
    ) -> BoxFuture<'a, GardenResult<()>> {
        self.inner.net_out(handle, rule)
    }

    fn bulk_net_out<'a>(
        &'a self,
        handle: &'a str,
        rules: Vec<NetOutRule>,
    ) -> BoxFuture<'a, GardenResult<()>> {
        self.inner.bulk_net_out(handle, rules)
    }

    fn set_grace_time<'a>(
        &'a self,
        handle: &'a str,
        grace_time: Duration,
    ) -> BoxFuture<'a, GardenResult<()>> {
        self.inner.set_grace_time(handle, grace_time)
    }

    fn properties<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<Properties>> {
        self.inner.properties(handle)
    }

    fn property<'a>(
        &'a self,
        handle: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, GardenResult<String>> {
        self.inner.property(handle, name)
    }

    fn set_property<'a>(
        &'a self,
        handle: &'a str,
        name: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, GardenResult<()>> {
        self.inner.set_property(handle, name, value)
    }

    fn remove_property<'a>(
        &'a self,
        handle: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, GardenResult<()>> {
        self.inner.remove_property(handle, name)
    }

    fn metrics<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<Metrics>> {
        self.inner.metrics(handle)
    }
}
