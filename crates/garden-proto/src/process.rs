//! Process specification, signals and TTY settings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::container::{BindMount, ImageRef};

/// Per-process rlimits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// `RLIMIT_AS`.
    pub r#as: Option<u64>,
    /// `RLIMIT_CORE`.
    pub core: Option<u64>,
    /// `RLIMIT_CPU`.
    pub cpu: Option<u64>,
    /// `RLIMIT_DATA`.
    pub data: Option<u64>,
    /// `RLIMIT_FSIZE`.
    pub fsize: Option<u64>,
    /// `RLIMIT_LOCKS`.
    pub locks: Option<u64>,
    /// `RLIMIT_MEMLOCK`.
    pub memlock: Option<u64>,
    /// `RLIMIT_MSGQUEUE`.
    pub msgqueue: Option<u64>,
    /// `RLIMIT_NICE`.
    pub nice: Option<u64>,
    /// `RLIMIT_NOFILE`.
    pub nofile: Option<u64>,
    /// `RLIMIT_NPROC`.
    pub nproc: Option<u64>,
    /// `RLIMIT_RSS`.
    pub rss: Option<u64>,
    /// `RLIMIT_RTPRIO`.
    pub rtprio: Option<u64>,
    /// `RLIMIT_SIGPENDING`.
    pub sigpending: Option<u64>,
    /// `RLIMIT_STACK`.
    pub stack: Option<u64>,
}

/// Terminal dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    /// Columns.
    pub columns: u16,
    /// Rows.
    pub rows: u16,
}

/// TTY settings for a process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtySpec {
    /// Window size; `None` keeps the server default.
    pub window_size: Option<WindowSize>,
}

impl TtySpec {
    /// TTY with the given window size.
    #[must_use]
    pub const fn sized(columns: u16, rows: u16) -> Self {
        Self {
            window_size: Some(WindowSize { columns, rows }),
        }
    }
}

/// Signals that can be delivered to a remote process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// `SIGTERM`.
    Terminate,
    /// `SIGKILL`.
    Kill,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => write!(f, "SIGTERM"),
            Self::Kill => write!(f, "SIGKILL"),
        }
    }
}

/// What to run inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSpec {
    /// Process ID; empty lets the server generate one.
    pub id: String,
    /// Executable path.
    pub path: String,
    /// Arguments, not including the executable.
    pub args: Vec<String>,
    /// Environment, as `KEY=value` entries.
    pub env: Vec<String>,
    /// Working directory.
    pub dir: String,
    /// User to run as.
    pub user: String,
    /// Per-process rlimits.
    pub limits: ResourceLimits,
    /// TTY settings; `None` runs without a TTY.
    pub tty: Option<TtySpec>,
    /// Image for a process with its own filesystem (a "pea").
    pub image: ImageRef,
    /// Bind mounts for a pea.
    pub bind_mounts: Vec<BindMount>,
}

impl ProcessSpec {
    /// Spec running `path` with `args`.
    pub fn new<I, S>(path: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the process ID.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the user.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Add an environment entry.
    #[must_use]
    pub fn env(mut self, entry: impl Into<String>) -> Self {
        self.env.push(entry.into());
        self
    }

    /// Attach a TTY.
    #[must_use]
    pub const fn tty(mut self, tty: TtySpec) -> Self {
        self.tty = Some(tty);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_spec_new() {
        let spec = ProcessSpec::new("sh", ["-c", "exit 42"]).user("alice").dir("/tmp");
        assert_eq!(spec.path, "sh");
        assert_eq!(spec.args, vec!["-c", "exit 42"]);
        assert_eq!(spec.user, "alice");
        assert_eq!(spec.dir, "/tmp");
        assert!(spec.tty.is_none());
    }

    #[test]
    fn test_tty_sized() {
        let spec = ProcessSpec::new("sh", Vec::<String>::new()).tty(TtySpec::sized(123, 456));
        assert_eq!(
            spec.tty.and_then(|t| t.window_size),
            Some(WindowSize {
                columns: 123,
                rows: 456
            })
        );
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(Signal::Terminate.to_string(), "SIGTERM");
        assert_eq!(Signal::Kill.to_string(), "SIGKILL");
    }

    #[test]
    fn test_rlimit_as_field_name() {
        let limits = ResourceLimits {
            r#as: Some(1024),
            ..Default::default()
        };
        let json = serde_json::to_value(limits).expect("serialize");
        assert_eq!(json["as"], 1024);
    }
}
