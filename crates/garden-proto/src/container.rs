//! Container specification and introspection types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{GardenError, GardenResult};
use crate::limits::Limits;
use crate::net::{NetIn, NetOutRule};

/// Arbitrary key-value metadata attached to a container.
pub type Properties = HashMap<String, String>;

/// Reference to a root filesystem image.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRef {
    /// Image URI, e.g. `docker:///busybox` or `raw:///var/rootfs`.
    pub uri: String,
    /// Registry username.
    pub username: String,
    /// Registry password.
    pub password: String,
}

impl ImageRef {
    /// Reference an image by URI with no credentials.
    pub fn uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Attach registry credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }
}

impl std::fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRef")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

/// Access mode of a bind mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindMountMode {
    /// Read-only.
    #[default]
    Ro,
    /// Read-write.
    Rw,
}

/// Where the source path of a bind mount lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindMountOrigin {
    /// Path on the host.
    #[default]
    Host,
    /// Path inside the container.
    Container,
}

/// A bind mount into a container or process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    /// Source path.
    pub src_path: String,
    /// Destination path inside the container.
    pub dst_path: String,
    /// Access mode.
    #[serde(default)]
    pub mode: BindMountMode,
    /// Where `src_path` is resolved.
    #[serde(default)]
    pub origin: BindMountOrigin,
}

impl BindMount {
    /// Read-only mount of a host path.
    pub fn read_only(src_path: impl Into<String>, dst_path: impl Into<String>) -> Self {
        Self {
            src_path: src_path.into(),
            dst_path: dst_path.into(),
            mode: BindMountMode::Ro,
            origin: BindMountOrigin::Host,
        }
    }
}

/// Everything the server needs to create a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSpec {
    /// Requested handle; empty lets the server generate one.
    pub handle: String,
    /// Idle time after which the server destroys the container.
    pub grace_time: Option<Duration>,
    /// Root filesystem image.
    pub image: ImageRef,
    /// Bind mounts.
    pub bind_mounts: Vec<BindMount>,
    /// Network spec, e.g. `10.254.0.0/24`; empty picks a default.
    pub network: String,
    /// Initial properties.
    pub properties: Properties,
    /// Environment, as `KEY=value` entries.
    pub env: Vec<String>,
    /// Run without a user namespace.
    pub privileged: bool,
    /// Resource limits.
    pub limits: Limits,
    /// Port mappings to set up at creation.
    pub net_in: Vec<NetIn>,
    /// Egress rules to set up at creation.
    pub net_out: Vec<NetOutRule>,
}

impl ContainerSpec {
    /// Spec with an explicit handle.
    pub fn with_handle(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            ..Default::default()
        }
    }

    /// Set the image.
    #[must_use]
    pub fn image(mut self, image: ImageRef) -> Self {
        self.image = image;
        self
    }

    /// Set the limits.
    #[must_use]
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Add a property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Add an environment entry.
    #[must_use]
    pub fn env(mut self, entry: impl Into<String>) -> Self {
        self.env.push(entry.into());
        self
    }
}

/// A host/container port pair reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Host side.
    pub host_port: u32,
    /// Container side.
    pub container_port: u32,
}

/// Introspection data for a single container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerInfo {
    /// Lifecycle state, e.g. `active` or `stopped`.
    pub state: String,
    /// Notable events, e.g. `out of memory`.
    pub events: Vec<String>,
    /// Host-side IP.
    pub host_ip: String,
    /// Container-side IP.
    pub container_ip: String,
    /// Externally reachable IP.
    pub external_ip: String,
    /// Container directory on the host.
    pub container_path: String,
    /// IDs of processes running in the container.
    pub process_ids: Vec<String>,
    /// Container properties.
    pub properties: Properties,
    /// Port mappings.
    pub mapped_ports: Vec<PortMapping>,
}

/// Per-handle result of a bulk info call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerInfoEntry {
    /// Info, meaningful only when `err` is `None`.
    pub info: ContainerInfo,
    /// Error for this handle, if any.
    pub err: Option<GardenError>,
}

impl ContainerInfoEntry {
    /// Convert to a result, preferring the error when present.
    pub fn into_result(self) -> GardenResult<ContainerInfo> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(self.info),
        }
    }
}
