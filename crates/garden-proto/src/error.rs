//! Error taxonomy for Garden operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a Garden server or by the transport in front of it.
///
/// The type is `Clone + PartialEq` so a wrapper can hand back exactly the
/// error it received, and callers can compare errors for identity.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GardenError {
    /// No container with the given handle exists.
    #[error("unknown handle: {handle}")]
    ContainerNotFound {
        /// Container handle.
        handle: String,
    },

    /// No process with the given ID exists in the container.
    #[error("unknown process: {process_id}")]
    ProcessNotFound {
        /// Process ID.
        process_id: String,
    },

    /// The executable of a process spec could not be found.
    #[error("executable not found: {message}")]
    ExecutableNotFound {
        /// Server-provided detail.
        message: String,
    },

    /// The server is up but cannot serve requests right now.
    #[error("service unavailable: {message}")]
    ServiceUnavailable {
        /// Server-provided detail.
        message: String,
    },

    /// The server reached a state it cannot recover from.
    #[error("unrecoverable error: {message}")]
    Unrecoverable {
        /// Server-provided detail.
        message: String,
    },

    /// The connection was reset while a call was in flight.
    #[error("{message}")]
    ConnectionReset {
        /// Transport detail, e.g. `net: connection reset`.
        message: String,
    },

    /// A call did not complete in time.
    #[error("{message}")]
    Timeout {
        /// Transport detail.
        message: String,
    },

    /// Any other transport-level failure (dial, read, write, decode).
    #[error("transport error: {message}")]
    Transport {
        /// Transport detail.
        message: String,
    },

    /// An error returned by the server that has no dedicated variant.
    #[error("{message}")]
    Remote {
        /// Server-provided message.
        message: String,
    },

    /// Local configuration was rejected before any call was made.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: String,
    },
}

impl GardenError {
    /// Build a `ContainerNotFound` error.
    pub fn container_not_found(handle: impl Into<String>) -> Self {
        Self::ContainerNotFound {
            handle: handle.into(),
        }
    }

    /// Build a `ProcessNotFound` error.
    pub fn process_not_found(process_id: impl Into<String>) -> Self {
        Self::ProcessNotFound {
            process_id: process_id.into(),
        }
    }

    /// Build a `ConnectionReset` error.
    pub fn connection_reset(message: impl Into<String>) -> Self {
        Self::ConnectionReset {
            message: message.into(),
        }
    }

    /// Build a `Timeout` error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Build a `Transport` error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Build an `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Build a `Remote` error.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Whether the error is likely to go away if the same call is repeated.
    ///
    /// Missing containers or processes, bad executables and unrecoverable
    /// server states are permanent; dropped connections, timeouts and a
    /// temporarily unavailable server are not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionReset { .. }
                | Self::Timeout { .. }
                | Self::Transport { .. }
                | Self::ServiceUnavailable { .. }
        )
    }
}

impl From<std::io::Error> for GardenError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let message = err.to_string();
        match err.kind() {
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                Self::ConnectionReset { message }
            }
            ErrorKind::TimedOut => Self::Timeout { message },
            _ => Self::Transport { message },
        }
    }
}

/// Result type for Garden operations.
pub type GardenResult<T> = std::result::Result<T, GardenError>;

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_container_not_found_display() {
        let err = GardenError::container_not_found("potato-sandwich-policy");
        assert_eq!(err.to_string(), "unknown handle: potato-sandwich-policy");
    }

    #[test]
    fn test_process_not_found_display() {
        let err = GardenError::process_not_found("idontexist");
        assert_eq!(err.to_string(), "unknown process: idontexist");
    }

    #[test]
    fn test_transport_messages_are_verbatim() {
        assert_eq!(
            GardenError::connection_reset("net: connection reset").to_string(),
            "net: connection reset"
        );
        assert_eq!(GardenError::timeout("timeout").to_string(), "timeout");
    }

    #[test_case(GardenError::connection_reset("reset"), true ; "connection reset")]
    #[test_case(GardenError::timeout("timeout"), true ; "timeout")]
    #[test_case(GardenError::transport("dial tcp: refused"), true ; "transport")]
    #[test_case(GardenError::ServiceUnavailable { message: "starting".into() }, true ; "service unavailable")]
    #[test_case(GardenError::container_not_found("h"), false ; "unknown handle")]
    #[test_case(GardenError::process_not_found("p"), false ; "unknown process")]
    #[test_case(GardenError::Unrecoverable { message: "disk gone".into() }, false ; "unrecoverable")]
    #[test_case(GardenError::remote("boom"), false ; "remote")]
    fn test_is_transient(err: GardenError, expected: bool) {
        assert_eq!(err.is_transient(), expected);
    }

    #[test]
    fn test_from_io_error() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(matches!(
            GardenError::from(reset),
            GardenError::ConnectionReset { .. }
        ));

        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert!(matches!(
            GardenError::from(timed_out),
            GardenError::Timeout { .. }
        ));

        let would_block = std::io::Error::new(std::io::ErrorKind::WouldBlock, "try again");
        assert_eq!(
            GardenError::from(would_block),
            GardenError::transport("try again")
        );

        let other = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad frame");
        assert_eq!(
            GardenError::from(other),
            GardenError::transport("bad frame")
        );
    }

    #[test]
    fn test_error_serde_tagging() {
        let err = GardenError::container_not_found("abc");
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["kind"], "container_not_found");
        assert_eq!(json["handle"], "abc");

        let back: GardenError = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, err);
    }
}
