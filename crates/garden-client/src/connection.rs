//! The transport-level capability surface of a Garden server.
//!
//! [`Connection`] is what a wire client (HTTP, unix socket, in-memory fake)
//! implements. Everything above it in this crate only forwards the value
//! types from `garden_proto`, so any transport can sit underneath.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use garden_proto::{
    BandwidthLimits, Capacity, ContainerInfo, ContainerInfoEntry, ContainerMetricsEntry,
    ContainerSpec, CpuLimits, DiskLimits, GardenResult, MemoryLimits, Metrics, NetOutRule,
    ProcessSpec, Properties, Signal, TtySpec,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed future type for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A byte source: process stdin, a tar stream going in, a tar stream coming out.
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// A byte sink: process stdout or stderr.
pub type ByteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Standard streams to connect to a remote process.
///
/// Any stream left as `None` is not attached.
#[derive(Default)]
pub struct ProcessIo {
    /// Bytes to feed the process.
    pub stdin: Option<ByteReader>,
    /// Where the process's stdout goes.
    pub stdout: Option<ByteWriter>,
    /// Where the process's stderr goes.
    pub stderr: Option<ByteWriter>,
}

impl ProcessIo {
    /// No streams attached.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Attach stdin.
    #[must_use]
    pub fn with_stdin(mut self, stdin: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.stdin = Some(Box::new(stdin));
        self
    }

    /// Attach stdout.
    #[must_use]
    pub fn with_stdout(mut self, stdout: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stdout = Some(Box::new(stdout));
        self
    }

    /// Attach stderr.
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stderr = Some(Box::new(stderr));
        self
    }
}

impl fmt::Debug for ProcessIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessIo")
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

/// A tar stream to unpack into a container.
pub struct StreamInSpec {
    /// Destination directory inside the container.
    pub path: String,
    /// User that owns the extracted files.
    pub user: String,
    /// The tar archive.
    pub tar_stream: ByteReader,
}

impl StreamInSpec {
    /// Stream `tar_stream` into `path`.
    pub fn new(
        path: impl Into<String>,
        tar_stream: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            user: String::new(),
            tar_stream: Box::new(tar_stream),
        }
    }

    /// Set the owning user.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }
}

impl fmt::Debug for StreamInSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamInSpec")
            .field("path", &self.path)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// A path to tar up and stream out of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOutSpec {
    /// File or directory inside the container.
    pub path: String,
    /// User to read the files as.
    pub user: String,
}

impl StreamOutSpec {
    /// Stream out `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            user: String::new(),
        }
    }
}

/// A handle to a process running inside a container.
pub trait Process: Send + Sync {
    /// The process ID.
    fn id(&self) -> &str;

    /// Wait for the process to exit and return its exit code.
    ///
    /// # Errors
    ///
    /// Returns error if the exit status cannot be obtained.
    fn wait(&self) -> BoxFuture<'_, GardenResult<i32>>;

    /// Resize the process's TTY.
    ///
    /// # Errors
    ///
    /// Returns error if the resize request fails.
    fn set_tty(&self, spec: TtySpec) -> BoxFuture<'_, GardenResult<()>>;

    /// Deliver a signal to the process.
    ///
    /// # Errors
    ///
    /// Returns error if the signal cannot be delivered.
    fn signal(&self, signal: Signal) -> BoxFuture<'_, GardenResult<()>>;
}

impl fmt::Debug for dyn Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process").field("id", &self.id()).finish()
    }
}

/// RPC operations offered by a Garden server.
///
/// Container-scoped operations take the container handle as their first
/// argument.
pub trait Connection: Send + Sync {
    /// Liveness check.
    fn ping(&self) -> BoxFuture<'_, GardenResult<()>>;

    /// Total capacity of the server.
    fn capacity(&self) -> BoxFuture<'_, GardenResult<Capacity>>;

    /// Create a container and return its handle.
    fn create(&self, spec: ContainerSpec) -> BoxFuture<'_, GardenResult<String>>;

    /// Handles of containers whose properties include every given pair.
    fn list(&self, properties: Properties) -> BoxFuture<'_, GardenResult<Vec<String>>>;

    /// Destroy a container.
    fn destroy<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<()>>;

    /// Stop every process in a container; `kill` skips the graceful phase.
    fn stop<'a>(&'a self, handle: &'a str, kill: bool) -> BoxFuture<'a, GardenResult<()>>;

    /// Introspect a container.
    fn info<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<ContainerInfo>>;

    /// Introspect several containers at once.
    fn bulk_info<'a>(
        &'a self,
        handles: &'a [String],
    ) -> BoxFuture<'a, GardenResult<HashMap<String, ContainerInfoEntry>>>;

    /// Usage metrics for several containers at once.
    fn bulk_metrics<'a>(
        &'a self,
        handles: &'a [String],
    ) -> BoxFuture<'a, GardenResult<HashMap<String, ContainerMetricsEntry>>>;

    /// Unpack a tar stream into a container.
    fn stream_in<'a>(
        &'a self,
        handle: &'a str,
        spec: StreamInSpec,
    ) -> BoxFuture<'a, GardenResult<()>>;

    /// Tar up a path inside a container. Dropping the reader closes it.
    fn stream_out<'a>(
        &'a self,
        handle: &'a str,
        spec: StreamOutSpec,
    ) -> BoxFuture<'a, GardenResult<ByteReader>>;

    /// Currently applied bandwidth limits.
    fn current_bandwidth_limits<'a>(
        &'a self,
        handle: &'a str,
    ) -> BoxFuture<'a, GardenResult<BandwidthLimits>>;

    /// Currently applied CPU limits.
    fn current_cpu_limits<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<CpuLimits>>;

    /// Currently applied disk limits.
    fn current_disk_limits<'a>(
        &'a self,
        handle: &'a str,
    ) -> BoxFuture<'a, GardenResult<DiskLimits>>;

    /// Currently applied memory limits.
    fn current_memory_limits<'a>(
        &'a self,
        handle: &'a str,
    ) -> BoxFuture<'a, GardenResult<MemoryLimits>>;

    /// Start a process in a container.
    fn run<'a>(
        &'a self,
        handle: &'a str,
        spec: ProcessSpec,
        io: ProcessIo,
    ) -> BoxFuture<'a, GardenResult<Box<dyn Process>>>;

    /// Re-attach to a process that is already running.
    fn attach<'a>(
        &'a self,
        handle: &'a str,
        process_id: &'a str,
        io: ProcessIo,
    ) -> BoxFuture<'a, GardenResult<Box<dyn Process>>>;

    /// Forward a host port to a container port; zero lets the server pick.
    /// Returns the `(host_port, container_port)` actually mapped.
    fn net_in<'a>(
        &'a self,
        handle: &'a str,
        host_port: u32,
        container_port: u32,
    ) -> BoxFuture<'a, GardenResult<(u32, u32)>>;

    /// Add an egress rule.
    fn net_out<'a>(&'a self, handle: &'a str, rule: NetOutRule)
    -> BoxFuture<'a, GardenResult<()>>;

    /// Add several egress rules at once.
    fn bulk_net_out<'a>(
        &'a self,
        handle: &'a str,
        rules: Vec<NetOutRule>,
    ) -> BoxFuture<'a, GardenResult<()>>;

    /// Set the idle time after which the server destroys the container.
    fn set_grace_time<'a>(
        &'a self,
        handle: &'a str,
        grace_time: Duration,
    ) -> BoxFuture<'a, GardenResult<()>>;

    /// All properties of a container.
    fn properties<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<Properties>>;

    /// A single property value.
    fn property<'a>(&'a self, handle: &'a str, name: &'a str)
    -> BoxFuture<'a, GardenResult<String>>;

    /// Set a property.
    fn set_property<'a>(
        &'a self,
        handle: &'a str,
        name: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, GardenResult<()>>;

    /// Remove a property.
    fn remove_property<'a>(
        &'a self,
        handle: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, GardenResult<()>>;

    /// Usage metrics of a container.
    fn metrics<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, GardenResult<Metrics>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_io_debug_shows_attachment() {
        let io = ProcessIo::detached().with_stdout(tokio::io::sink());
        let debug = format!("{io:?}");
        assert!(debug.contains("stdin: false"));
        assert!(debug.contains("stdout: true"));
    }

    #[test]
    fn test_stream_in_spec_builder() {
        let spec = StreamInSpec::new("/tmp/dst", std::io::Cursor::new(vec![0u8; 4])).user("alice");
        assert_eq!(spec.path, "/tmp/dst");
        assert_eq!(spec.user, "alice");
    }

    #[test]
    fn test_stream_out_spec_default_user() {
        let spec = StreamOutSpec::new("/etc/passwd");
        assert!(spec.user.is_empty());
    }
}
