//! Scriptable in-memory fakes for [`Connection`] and [`Process`].
//!
//! [`FakeConnection`] behaves like a tiny Garden server: containers are kept
//! in memory, every call is recorded as a [`FakeCall`], and errors can be
//! injected per operation with [`FakeConnection::fail_next`]. Clones share
//! state, so a test can hand one clone to the code under test and inspect
//! another.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use garden_proto::{
    BandwidthLimits, Capacity, ContainerInfo, ContainerInfoEntry, ContainerMetricsEntry,
    ContainerSpec, CpuLimits, DiskLimits, GardenError, GardenResult, MemoryLimits, Metrics,
    NetOutRule, PortMapping, ProcessSpec, Properties, Signal, TtySpec,
};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::connection::{
    BoxFuture, ByteReader, Connection, Process, ProcessIo, StreamInSpec, StreamOutSpec,
};

/// First host port handed out by `net_in` when the caller passes zero.
const FIRST_HOST_PORT: u32 = 61001;

fn ready<'a, T: Send + 'a>(value: T) -> BoxFuture<'a, T> {
    Box::pin(futures::future::ready(value))
}

// ============================================================================
// FakeProcess
// ============================================================================

#[derive(Debug)]
struct FakeProcessState {
    wait_results: VecDeque<GardenResult<i32>>,
    wait_fallback: GardenResult<i32>,
    wait_calls: usize,
    signal_result: GardenResult<()>,
    signals: Vec<Signal>,
    tty_result: GardenResult<()>,
    tty_specs: Vec<TtySpec>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// A process whose `wait`, `signal` and `set_tty` results are scripted.
///
/// `wait` pops scripted results in order and then keeps returning the
/// fallback (`Ok(0)` unless changed).
#[derive(Debug, Clone)]
pub struct FakeProcess {
    id: String,
    state: Arc<Mutex<FakeProcessState>>,
}

impl FakeProcess {
    /// A process that exits 0 and accepts signals and resizes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(FakeProcessState {
                wait_results: VecDeque::new(),
                wait_fallback: Ok(0),
                wait_calls: 0,
                signal_result: Ok(()),
                signals: Vec::new(),
                tty_result: Ok(()),
                tty_specs: Vec::new(),
                stdout: Vec::new(),
                stderr: Vec::new(),
            })),
        }
    }

    /// Queue results for successive `wait` calls.
    #[must_use]
    pub fn with_wait_results(self, results: impl IntoIterator<Item = GardenResult<i32>>) -> Self {
        self.state.lock().wait_results.extend(results);
        self
    }

    /// Result returned once the queued results run out.
    #[must_use]
    pub fn with_wait_fallback(self, result: GardenResult<i32>) -> Self {
        self.state.lock().wait_fallback = result;
        self
    }

    /// Make every `signal` call fail with `err`.
    #[must_use]
    pub fn failing_signal(self, err: GardenError) -> Self {
        self.state.lock().signal_result = Err(err);
        self
    }

    /// Make every `set_tty` call fail with `err`.
    #[must_use]
    pub fn failing_set_tty(self, err: GardenError) -> Self {
        self.state.lock().tty_result = Err(err);
        self
    }

    /// Bytes written to the attached stdout and stderr when the process is
    /// started through [`FakeConnection::run`].
    #[must_use]
    pub fn with_output(self, stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>) -> Self {
        {
            let mut state = self.state.lock();
            state.stdout = stdout.into();
            state.stderr = stderr.into();
        }
        self
    }

    fn output(&self) -> (Vec<u8>, Vec<u8>) {
        let state = self.state.lock();
        (state.stdout.clone(), state.stderr.clone())
    }

    /// Number of `wait` calls so far.
    pub fn wait_call_count(&self) -> usize {
        self.state.lock().wait_calls
    }

    /// Signals delivered so far, in order.
    pub fn signals(&self) -> Vec<Signal> {
        self.state.lock().signals.clone()
    }

    /// TTY specs received so far, in order.
    pub fn tty_specs(&self) -> Vec<TtySpec> {
        self.state.lock().tty_specs.clone()
    }
}

impl Process for FakeProcess {
    fn id(&self) -> &str {
        &self.id
    }

    fn wait(&self) -> BoxFuture<'_, GardenResult<i32>> {
        let mut state = self.state.lock();
        state.wait_calls += 1;
        let result = state
            .wait_results
            .pop_front()
            .unwrap_or_else(|| state.wait_fallback.clone());
        ready(result)
    }

    fn set_tty(&self, spec: TtySpec) -> BoxFuture<'_, GardenResult<()>> {
        let mut state = self.state.lock();
        state.tty_specs.push(spec);
        ready(state.tty_result.clone())
    }

    fn signal(&self, signal: Signal) -> BoxFuture<'_, GardenResult<()>> {
        let mut state = self.state.lock();
        state.signals.push(signal);
        ready(state.signal_result.clone())
    }
}

// ============================================================================
// FakeConnection
// ============================================================================

/// A call received by [`FakeConnection`], with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCall {
    /// `ping`
    Ping,
    /// `capacity`
    Capacity,
    /// `create`
    Create(ContainerSpec),
    /// `list`
    List(Properties),
    /// `destroy`
    Destroy(String),
    /// `stop`
    Stop {
        /// Handle.
        handle: String,
        /// Kill flag.
        kill: bool,
    },
    /// `info`
    Info(String),
    /// `bulk_info`
    BulkInfo(Vec<String>),
    /// `bulk_metrics`
    BulkMetrics(Vec<String>),
    /// `stream_in`
    StreamIn {
        /// Handle.
        handle: String,
        /// Destination path.
        path: String,
        /// Owning user.
        user: String,
    },
    /// `stream_out`
    StreamOut {
        /// Handle.
        handle: String,
        /// Requested spec.
        spec: StreamOutSpec,
    },
    /// `current_bandwidth_limits`
    CurrentBandwidthLimits(String),
    /// `current_cpu_limits`
    CurrentCpuLimits(String),
    /// `current_disk_limits`
    CurrentDiskLimits(String),
    /// `current_memory_limits`
    CurrentMemoryLimits(String),
    /// `run`
    Run {
        /// Handle.
        handle: String,
        /// Process spec.
        spec: ProcessSpec,
    },
    /// `attach`
    Attach {
        /// Handle.
        handle: String,
        /// Process ID.
        process_id: String,
    },
    /// `net_in`
    NetIn {
        /// Handle.
        handle: String,
        /// Requested host port.
        host_port: u32,
        /// Requested container port.
        container_port: u32,
    },
    /// `net_out`
    NetOut {
        /// Handle.
        handle: String,
        /// Rule.
        rule: NetOutRule,
    },
    /// `bulk_net_out`
    BulkNetOut {
        /// Handle.
        handle: String,
        /// Rules.
        rules: Vec<NetOutRule>,
    },
    /// `set_grace_time`
    SetGraceTime {
        /// Handle.
        handle: String,
        /// Grace time.
        grace_time: Duration,
    },
    /// `properties`
    Properties(String),
    /// `property`
    Property {
        /// Handle.
        handle: String,
        /// Property name.
        name: String,
    },
    /// `set_property`
    SetProperty {
        /// Handle.
        handle: String,
        /// Property name.
        name: String,
        /// Property value.
        value: String,
    },
    /// `remove_property`
    RemoveProperty {
        /// Handle.
        handle: String,
        /// Property name.
        name: String,
    },
    /// `metrics`
    Metrics(String),
}

impl FakeCall {
    /// The operation name, as accepted by [`FakeConnection::fail_next`].
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Capacity => "capacity",
            Self::Create(_) => "create",
            Self::List(_) => "list",
            Self::Destroy(_) => "destroy",
            Self::Stop { .. } => "stop",
            Self::Info(_) => "info",
            Self::BulkInfo(_) => "bulk_info",
            Self::BulkMetrics(_) => "bulk_metrics",
            Self::StreamIn { .. } => "stream_in",
            Self::StreamOut { .. } => "stream_out",
            Self::CurrentBandwidthLimits(_) => "current_bandwidth_limits",
            Self::CurrentCpuLimits(_) => "current_cpu_limits",
            Self::CurrentDiskLimits(_) => "current_disk_limits",
            Self::CurrentMemoryLimits(_) => "current_memory_limits",
            Self::Run { .. } => "run",
            Self::Attach { .. } => "attach",
            Self::NetIn { .. } => "net_in",
            Self::NetOut { .. } => "net_out",
            Self::BulkNetOut { .. } => "bulk_net_out",
            Self::SetGraceTime { .. } => "set_grace_time",
            Self::Properties(_) => "properties",
            Self::Property { .. } => "property",
            Self::SetProperty { .. } => "set_property",
            Self::RemoveProperty { .. } => "remove_property",
            Self::Metrics(_) => "metrics",
        }
    }
}

#[derive(Debug, Default)]
struct FakeContainer {
    spec: ContainerSpec,
    properties: Properties,
    grace_time: Option<Duration>,
    net_out: Vec<NetOutRule>,
    mapped_ports: Vec<PortMapping>,
    files: HashMap<String, Vec<u8>>,
    processes: HashMap<String, FakeProcess>,
    stopped: bool,
}

#[derive(Debug)]
struct FakeConnectionState {
    calls: Vec<FakeCall>,
    failures: HashMap<&'static str, VecDeque<GardenError>>,
    containers: HashMap<String, FakeContainer>,
    pending_processes: VecDeque<FakeProcess>,
    capacity: Capacity,
    next_handle: u64,
    next_process: u64,
    next_host_port: u32,
}

impl FakeConnectionState {
    /// Record `call` and pop an injected failure for it, if any.
    fn begin(&mut self, call: FakeCall) -> GardenResult<()> {
        let op = call.op();
        self.calls.push(call);
        match self.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn container(&self, handle: &str) -> GardenResult<&FakeContainer> {
        self.containers
            .get(handle)
            .ok_or_else(|| GardenError::container_not_found(handle))
    }

    fn container_mut(&mut self, handle: &str) -> GardenResult<&mut FakeContainer> {
        self.containers
            .get_mut(handle)
            .ok_or_else(|| GardenError::container_not_found(handle))
    }

    fn info(&self, handle: &str) -> GardenResult<ContainerInfo> {
        let container = self.container(handle)?;
        let mut process_ids: Vec<String> = container.processes.keys().cloned().collect();
        process_ids.sort();
        Ok(ContainerInfo {
            state: if container.stopped { "stopped" } else { "active" }.to_string(),
            process_ids,
            properties: container.properties.clone(),
            mapped_ports: container.mapped_ports.clone(),
            ..Default::default()
        })
    }

    fn metrics(&self, handle: &str) -> GardenResult<Metrics> {
        let container = self.container(handle)?;
        let mut metrics = Metrics::default();
        metrics.pid_stat.current = container.processes.len() as u64;
        metrics.pid_stat.max = container.spec.limits.pid.max;
        metrics.disk_stat.exclusive_bytes_used =
            container.files.values().map(|f| f.len() as u64).sum();
        Ok(metrics)
    }
}

/// An in-memory [`Connection`].
#[derive(Debug, Clone)]
pub struct FakeConnection {
    state: Arc<Mutex<FakeConnectionState>>,
}

impl Default for FakeConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeConnection {
    /// An empty server.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeConnectionState {
                calls: Vec::new(),
                failures: HashMap::new(),
                containers: HashMap::new(),
                pending_processes: VecDeque::new(),
                capacity: Capacity::default(),
                next_handle: 1,
                next_process: 1,
                next_host_port: FIRST_HOST_PORT,
            })),
        }
    }

    /// Set what `capacity` reports.
    #[must_use]
    pub fn with_capacity(self, capacity: Capacity) -> Self {
        self.state.lock().capacity = capacity;
        self
    }

    /// Make the next call to `op` fail with `err`. Repeated calls queue up.
    pub fn fail_next(&self, op: &'static str, err: GardenError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Hand out `process` from the next successful `run`.
    ///
    /// Without a queued process, `run` creates a [`FakeProcess`] that exits 0.
    pub fn push_process(&self, process: FakeProcess) {
        self.state.lock().pending_processes.push_back(process);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls to `op` so far.
    pub fn call_count(&self, op: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    /// Handles of containers that currently exist.
    pub fn handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = self.state.lock().containers.keys().cloned().collect();
        handles.sort();
        handles
    }

    /// Bytes last streamed into `path` of `handle`.
    pub fn file(&self, handle: &str, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .containers
            .get(handle)
            .and_then(|c| c.files.get(path).cloned())
    }

    /// Grace time last set on `handle`.
    pub fn grace_time(&self, handle: &str) -> Option<Duration> {
        self.state
            .lock()
            .containers
            .get(handle)
            .and_then(|c| c.grace_time)
    }

    /// Egress rules applied to `handle`.
    pub fn net_out_rules(&self, handle: &str) -> Vec<NetOutRule> {
        self.state
            .lock()
            .containers
            .get(handle)
            .map(|c| c.net_out.clone())
            .unwrap_or_default()
    }
}

impl Connection for FakeConnection {
    fn ping(&self) -> BoxFuture<'_, GardenResult<()>> {
        ready(self.state.lock().begin(FakeCall::Ping))
    }

    fn capacity(&self) -> BoxFuture<'_, GardenResult<Capacity>> {
        let mut state = self.state.lock();
        ready(state.begin(FakeCall::Capacity).map(|()| state.capacity))
    }

    fn create(&self, spec: ContainerSpec) -> BoxFuture<'_, GardenResult<String>> {
        let mut state = self.state.lock();
        let result = state.begin(FakeCall::Create(spec.clone())).and_then(|()| {
            let handle = if spec.handle.is_empty() {
                let generated = format!("fake-handle-{}", state.next_handle);
                state.next_handle += 1;
                generated
            } else {
                spec.handle.clone()
            };
            if state.containers.contains_key(&handle) {
                return Err(GardenError::remote(format!(
                    "handle already exists: {handle}"
                )));
            }
            state.containers.insert(
                handle.clone(),
                FakeContainer {
                    properties: spec.properties.clone(),
                    grace_time: spec.grace_time,
                    net_out: spec.net_out.clone(),
                    spec,
                    ..Default::default()
                },
            );
            Ok(handle)
        });
        ready(result)
    }

    fn list(&self, properties: Properties) -> BoxFuture<'_, GardenResult<Vec<String>>> {
        let mut state = self.state.lock();
        let result = state.begin(FakeCall::List(properties.clone())).map(|()| {
            let mut handles: Vec<String> = state
                .containers
                .iter()
                .filter(|(_, c)| {
                    properties
                        .iter()
                        .all(|(k, v)| c.properties.get(k) == Some(v))
                })
                .map(|(h, _)| h.clone())
                .collect();
            handles.sort();
            handles
        });
        ready(result)
    }

    fn destroy<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<()>> {
        let mut state = self.state.lock();
        let result = state.begin(FakeCall::Destroy(handle.to_string())).and_then(|()| {
            state
                .containers
                .remove(handle)
                .map(|_| ())
                .ok_or_else(|| GardenError::container_not_found(handle))
        });
        ready(result)
    }

    fn stop<'a>(&'a self, handle: &'a str, kill: bool) -> BoxFuture<'a, GardenResult<()>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::Stop {
                handle: handle.to_string(),
                kill,
            })
            .and_then(|()| {
                let container = state.container_mut(handle)?;
                container.stopped = true;
                Ok(())
            });
        ready(result)
    }

    fn info<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<ContainerInfo>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::Info(handle.to_string()))
            .and_then(|()| state.info(handle));
        ready(result)
    }

    fn bulk_info<'a>(
        &'a self,
        handles: &'a [String],
    ) -> BoxFuture<'a, GardenResult<HashMap<String, ContainerInfoEntry>>> {
        let mut state = self.state.lock();
        let result = state.begin(FakeCall::BulkInfo(handles.to_vec())).map(|()| {
            handles
                .iter()
                .map(|h| {
                    let entry = match state.info(h) {
                        Ok(info) => ContainerInfoEntry { info, err: None },
                        Err(err) => ContainerInfoEntry {
                            info: ContainerInfo::default(),
                            err: Some(err),
                        },
                    };
                    (h.clone(), entry)
                })
                .collect()
        });
        ready(result)
    }

    fn bulk_metrics<'a>(
        &'a self,
        handles: &'a [String],
    ) -> BoxFuture<'a, GardenResult<HashMap<String, ContainerMetricsEntry>>> {
        let mut state = self.state.lock();
        let result = state.begin(FakeCall::BulkMetrics(handles.to_vec())).map(|()| {
            handles
                .iter()
                .map(|h| {
                    let entry = match state.metrics(h) {
                        Ok(metrics) => ContainerMetricsEntry { metrics, err: None },
                        Err(err) => ContainerMetricsEntry {
                            metrics: Metrics::default(),
                            err: Some(err),
                        },
                    };
                    (h.clone(), entry)
                })
                .collect()
        });
        ready(result)
    }

    fn stream_in<'a>(
        &'a self,
        handle: &'a str,
        spec: StreamInSpec,
    ) -> BoxFuture<'a, GardenResult<()>> {
        async move {
            let StreamInSpec {
                path,
                user,
                mut tar_stream,
            } = spec;
            {
                let mut state = self.state.lock();
                state.begin(FakeCall::StreamIn {
                    handle: handle.to_string(),
                    path: path.clone(),
                    user,
                })?;
                state.container(handle)?;
            }

            let mut bytes = Vec::new();
            tar_stream.read_to_end(&mut bytes).await?;

            let mut state = self.state.lock();
            state.container_mut(handle)?.files.insert(path, bytes);
            Ok(())
        }
        .boxed()
    }

    fn stream_out<'a>(
        &'a self,
        handle: &'a str,
        spec: StreamOutSpec,
    ) -> BoxFuture<'a, GardenResult<ByteReader>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::StreamOut {
                handle: handle.to_string(),
                spec: spec.clone(),
            })
            .and_then(|()| {
                let container = state.container(handle)?;
                let bytes = container.files.get(&spec.path).cloned().ok_or_else(|| {
                    GardenError::remote(format!("no such file or directory: {}", spec.path))
                })?;
                let reader: ByteReader = Box::new(Cursor::new(bytes));
                Ok(reader)
            });
        ready(result)
    }

    fn current_bandwidth_limits<'a>(
        &'a self,
        handle: &'a str,
    ) -> BoxFuture<'a, GardenResult<BandwidthLimits>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::CurrentBandwidthLimits(handle.to_string()))
            .and_then(|()| Ok(state.container(handle)?.spec.limits.bandwidth));
        ready(result)
    }

    fn current_cpu_limits<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<CpuLimits>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::CurrentCpuLimits(handle.to_string()))
            .and_then(|()| Ok(state.container(handle)?.spec.limits.cpu));
        ready(result)
    }

    fn current_disk_limits<'a>(
        &'a self,
        handle: &'a str,
    ) -> BoxFuture<'a, GardenResult<DiskLimits>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::CurrentDiskLimits(handle.to_string()))
            .and_then(|()| Ok(state.container(handle)?.spec.limits.disk));
        ready(result)
    }

    fn current_memory_limits<'a>(
        &'a self,
        handle: &'a str,
    ) -> BoxFuture<'a, GardenResult<MemoryLimits>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::CurrentMemoryLimits(handle.to_string()))
            .and_then(|()| Ok(state.container(handle)?.spec.limits.memory));
        ready(result)
    }

    fn run<'a>(
        &'a self,
        handle: &'a str,
        spec: ProcessSpec,
        io: ProcessIo,
    ) -> BoxFuture<'a, GardenResult<Box<dyn Process>>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::Run {
                handle: handle.to_string(),
                spec: spec.clone(),
            })
            .and_then(|()| {
                state.container(handle)?;
                let process = match state.pending_processes.pop_front() {
                    Some(process) => process,
                    None => {
                        let id = if spec.id.is_empty() {
                            let generated = format!("fake-process-{}", state.next_process);
                            state.next_process += 1;
                            generated
                        } else {
                            spec.id.clone()
                        };
                        FakeProcess::new(id)
                    }
                };
                state
                    .container_mut(handle)?
                    .processes
                    .insert(process.id().to_string(), process.clone());
                Ok(process)
            });
        drop(state);

        async move {
            let process = result?;
            let (stdout, stderr) = process.output();
            if let Some(mut sink) = io.stdout {
                sink.write_all(&stdout).await?;
            }
            if let Some(mut sink) = io.stderr {
                sink.write_all(&stderr).await?;
            }
            let boxed: Box<dyn Process> = Box::new(process);
            Ok(boxed)
        }
        .boxed()
    }

    fn attach<'a>(
        &'a self,
        handle: &'a str,
        process_id: &'a str,
        _io: ProcessIo,
    ) -> BoxFuture<'a, GardenResult<Box<dyn Process>>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::Attach {
                handle: handle.to_string(),
                process_id: process_id.to_string(),
            })
            .and_then(|()| {
                let process = state
                    .container(handle)?
                    .processes
                    .get(process_id)
                    .cloned()
                    .ok_or_else(|| GardenError::process_not_found(process_id))?;
                let boxed: Box<dyn Process> = Box::new(process);
                Ok(boxed)
            });
        ready(result)
    }

    fn net_in<'a>(
        &'a self,
        handle: &'a str,
        host_port: u32,
        container_port: u32,
    ) -> BoxFuture<'a, GardenResult<(u32, u32)>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::NetIn {
                handle: handle.to_string(),
                host_port,
                container_port,
            })
            .and_then(|()| {
                state.container(handle)?;
                let host_port = if host_port == 0 {
                    let port = state.next_host_port;
                    state.next_host_port += 1;
                    port
                } else {
                    host_port
                };
                let container_port = if container_port == 0 {
                    host_port
                } else {
                    container_port
                };
                state.container_mut(handle)?.mapped_ports.push(PortMapping {
                    host_port,
                    container_port,
                });
                Ok((host_port, container_port))
            });
        ready(result)
    }

    fn net_out<'a>(
        &'a self,
        handle: &'a str,
        rule: NetOutRule,
    ) -> BoxFuture<'a, GardenResult<()>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::NetOut {
                handle: handle.to_string(),
                rule: rule.clone(),
            })
            .and_then(|()| {
                state.container_mut(handle)?.net_out.push(rule);
                Ok(())
            });
        ready(result)
    }

    fn bulk_net_out<'a>(
        &'a self,
        handle: &'a str,
        rules: Vec<NetOutRule>,
    ) -> BoxFuture<'a, GardenResult<()>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::BulkNetOut {
                handle: handle.to_string(),
                rules: rules.clone(),
            })
            .and_then(|()| {
                state.container_mut(handle)?.net_out.extend(rules);
                Ok(())
            });
        ready(result)
    }

    fn set_grace_time<'a>(
        &'a self,
        handle: &'a str,
        grace_time: Duration,
    ) -> BoxFuture<'a, GardenResult<()>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::SetGraceTime {
                handle: handle.to_string(),
                grace_time,
            })
            .and_then(|()| {
                state.container_mut(handle)?.grace_time = Some(grace_time);
                Ok(())
            });
        ready(result)
    }

    fn properties<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<Properties>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::Properties(handle.to_string()))
            .and_then(|()| Ok(state.container(handle)?.properties.clone()));
        ready(result)
    }

    fn property<'a>(
        &'a self,
        handle: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, GardenResult<String>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::Property {
                handle: handle.to_string(),
                name: name.to_string(),
            })
            .and_then(|()| {
                state
                    .container(handle)?
                    .properties
                    .get(name)
                    .cloned()
                    .ok_or_else(|| GardenError::remote(format!("property does not exist: {name}")))
            });
        ready(result)
    }

    fn set_property<'a>(
        &'a self,
        handle: &'a str,
        name: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, GardenResult<()>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::SetProperty {
                handle: handle.to_string(),
                name: name.to_string(),
                value: value.to_string(),
            })
            .and_then(|()| {
                state
                    .container_mut(handle)?
                    .properties
                    .insert(name.to_string(), value.to_string());
                Ok(())
            });
        ready(result)
    }

    fn remove_property<'a>(
        &'a self,
        handle: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, GardenResult<()>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::RemoveProperty {
                handle: handle.to_string(),
                name: name.to_string(),
            })
            .and_then(|()| {
                state
                    .container_mut(handle)?
                    .properties
                    .remove(name)
                    .map(|_| ())
                    .ok_or_else(|| GardenError::remote(format!("property does not exist: {name}")))
            });
        ready(result)
    }

    fn metrics<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<Metrics>> {
        let mut state = self.state.lock();
        let result = state
            .begin(FakeCall::Metrics(handle.to_string()))
            .and_then(|()| state.metrics(handle));
        ready(result)
    }
}
