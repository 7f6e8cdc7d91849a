//! Per-test container setup and teardown.
//!
//! Each test builds its own [`ContainerFixture`], adjusts it, and creates the
//! container from it. Nothing is shared between tests.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use garden_proto::{
    ContainerSpec, GardenError, GardenResult, ImageRef, Limits, ProcessSpec, Properties,
};
use parking_lot::Mutex;
use tokio::io::AsyncWrite;
use tracing::{debug, info};

use crate::client::{Client, Container};
use crate::connection::ProcessIo;

/// Settings for the container a test runs against.
///
/// Defaults to an unprivileged container with a server-chosen handle, the
/// server's default image and no limits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFixture {
    /// Handle to request; empty lets the server choose.
    pub handle: String,
    /// Root filesystem image.
    pub image: ImageRef,
    /// Network spec, e.g. `10.0.0.0/30`.
    pub network: String,
    /// Run the container privileged.
    pub privileged: bool,
    /// Initial properties.
    pub properties: Properties,
    /// Resource limits.
    pub limits: Limits,
    /// Environment, as `KEY=value` entries.
    pub env: Vec<String>,
}

impl ContainerFixture {
    /// The default fixture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a specific handle.
    #[must_use]
    pub fn handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = handle.into();
        self
    }

    /// Use `image` as the rootfs.
    #[must_use]
    pub fn image(mut self, image: ImageRef) -> Self {
        self.image = image;
        self
    }

    /// Set the network spec.
    #[must_use]
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Run the container privileged.
    #[must_use]
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// Add a property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Apply resource limits.
    #[must_use]
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Add an environment entry.
    #[must_use]
    pub fn env(mut self, entry: impl Into<String>) -> Self {
        self.env.push(entry.into());
        self
    }

    /// The container spec this fixture creates.
    #[must_use]
    pub fn spec(&self) -> ContainerSpec {
        ContainerSpec {
            handle: self.handle.clone(),
            image: self.image.clone(),
            network: self.network.clone(),
            privileged: self.privileged,
            properties: self.properties.clone(),
            limits: self.limits,
            env: self.env.clone(),
            ..ContainerSpec::default()
        }
    }

    /// Create the container.
    ///
    /// # Errors
    ///
    /// Returns the server's error unchanged.
    pub async fn create(&self, client: &Client) -> GardenResult<Container> {
        let container = client.create(self.spec()).await?;
        info!(handle = container.handle(), "test container created");
        Ok(container)
    }

    /// Destroy `container` if it still exists.
    ///
    /// A container the server no longer knows about counts as destroyed.
    ///
    /// # Errors
    ///
    /// Returns any other error from the lookup or the destroy call.
    pub async fn destroy(client: &Client, container: &Container) -> GardenResult<()> {
        let found = match client.lookup(container.handle()).await {
            Ok(found) => found,
            Err(GardenError::ContainerNotFound { handle }) => {
                debug!(handle = %handle, "container already gone");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        client.destroy(found.handle()).await
    }
}

/// An in-memory sink that can be read while a process writes to it.
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// An empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    /// Everything written so far, decoded as UTF-8 with replacement.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.bytes.lock().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// What a finished process produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code.
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

/// Run `spec` in `container`, wait for it, and capture its output.
///
/// # Errors
///
/// Returns the error from `run` or `wait` unchanged.
pub async fn run_process(container: &Container, spec: ProcessSpec) -> GardenResult<ProcessOutput> {
    let stdout = SharedBuffer::new();
    let stderr = SharedBuffer::new();
    let io = ProcessIo::detached()
        .with_stdout(stdout.clone())
        .with_stderr(stderr.clone());

    let process = container.run(spec, io).await?;
    let exit_code = process.wait().await?;

    Ok(ProcessOutput {
        exit_code,
        stdout: stdout.text(),
        stderr: stderr.text(),
    })
}

/// Run `spec` in `container` and return its stdout, requiring exit code 0.
///
/// # Errors
///
/// Returns the error from `run` or `wait` unchanged, or a `Remote` error
/// naming the exit code when the process exits non-zero.
pub async fn run_for_stdout(container: &Container, spec: ProcessSpec) -> GardenResult<String> {
    let path = spec.path.clone();
    let output = run_process(container, spec).await?;
    if output.exit_code != 0 {
        return Err(GardenError::remote(format!(
            "{path} exited with code {}: {}",
            output.exit_code,
            output.stderr.trim_end()
        )));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use garden_proto::{CpuLimits, Limits};
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_spec_carries_fixture_settings() {
        let fixture = ContainerFixture::new()
            .handle("fixture")
            .image(ImageRef::uri("docker:///busybox"))
            .network("10.0.0.0/30")
            .privileged()
            .property("owner", "tests")
            .limits(Limits::default().with_cpu(CpuLimits::weight(100)))
            .env("FOO=bar");

        let spec = fixture.spec();
        assert_eq!(spec.handle, "fixture");
        assert_eq!(spec.image.uri, "docker:///busybox");
        assert_eq!(spec.network, "10.0.0.0/30");
        assert!(spec.privileged);
        assert_eq!(spec.properties.get("owner").map(String::as_str), Some("tests"));
        assert_eq!(spec.limits.cpu.weight, 100);
        assert_eq!(spec.env, vec!["FOO=bar".to_string()]);
        assert!(spec.bind_mounts.is_empty());
    }

    #[test]
    fn test_default_fixture_is_unprivileged() {
        let spec = ContainerFixture::new().spec();
        assert!(spec.handle.is_empty());
        assert!(!spec.privileged);
    }

    #[tokio::test]
    async fn test_shared_buffer_collects_writes() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone();
        writer.write_all(b"hello ").await.expect("write");
        writer.write_all(b"world").await.expect("write");
        assert_eq!(buffer.text(), "hello world");
    }
}
