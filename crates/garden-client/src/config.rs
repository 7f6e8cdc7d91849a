//! Integration-suite settings read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use garden_proto::{GardenError, GardenResult};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Address the Garden server listens on.
pub const BIND_IP_VAR: &str = "GDN_BIND_IP";
/// Port the Garden server listens on.
pub const BIND_PORT_VAR: &str = "GDN_BIND_PORT";
/// Port of the server's debug endpoint.
pub const DEBUG_PORT_VAR: &str = "GDN_DEBUG_PORT";
/// Rootfs used for test containers.
pub const ROOTFS_VAR: &str = "GARDEN_TEST_ROOTFS";
/// Image used by the limits tests.
pub const LIMITS_TEST_URI_VAR: &str = "LIMITS_TEST_URI";
/// Overrides the number of `wait` attempts per call.
pub const WAIT_ATTEMPTS_VAR: &str = "GDN_WAIT_ATTEMPTS";
/// Set (to anything) when the server runs on the WOOT image plugin.
pub const WOOT_VAR: &str = "WOOT";
/// Set (to anything) when the server runs on the SHED image plugin.
pub const SHED_VAR: &str = "SHED";
/// Processes run under containerd unless this is exactly `false`.
pub const CONTAINERD_FOR_PROCESSES_VAR: &str = "CONTAINERD_FOR_PROCESSES_ENABLED";

const DEFAULT_BIND_IP: Ipv4Addr = Ipv4Addr::new(10, 244, 0, 2);
const DEFAULT_BIND_PORT: u16 = 7777;
const DEFAULT_DEBUG_PORT: u16 = 17013;

/// Where the server under test lives and which images to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Server address.
    pub bind_ip: IpAddr,
    /// Server port.
    pub bind_port: u16,
    /// Debug endpoint port.
    pub debug_port: u16,
    /// Default rootfs for containers.
    pub rootfs: String,
    /// Image for the limits tests.
    pub limits_test_uri: String,
    /// Policy for retrying `wait`.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Server uses the WOOT image plugin.
    #[serde(default)]
    pub woot: bool,
    /// Server uses the SHED image plugin.
    #[serde(default)]
    pub shed: bool,
    /// Server runs processes through containerd.
    #[serde(default = "enabled")]
    pub containerd_for_processes: bool,
}

const fn enabled() -> bool {
    true
}

impl SuiteConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> GardenResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which returns the value of a
    /// variable or `None` when it is unset.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a required variable is missing or a value
    /// does not parse.
    pub fn from_lookup<F>(lookup: F) -> GardenResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_ip = match get(BIND_IP_VAR) {
            Some(raw) => parse(BIND_IP_VAR, &raw)?,
            None => IpAddr::V4(DEFAULT_BIND_IP),
        };
        let bind_port = match get(BIND_PORT_VAR) {
            Some(raw) => parse(BIND_PORT_VAR, &raw)?,
            None => DEFAULT_BIND_PORT,
        };
        let debug_port = match get(DEBUG_PORT_VAR) {
            Some(raw) => parse(DEBUG_PORT_VAR, &raw)?,
            None => DEFAULT_DEBUG_PORT,
        };
        let rootfs = get(ROOTFS_VAR).ok_or_else(|| missing(ROOTFS_VAR))?;
        let limits_test_uri = get(LIMITS_TEST_URI_VAR).ok_or_else(|| missing(LIMITS_TEST_URI_VAR))?;

        let mut retry = RetryPolicy::default();
        if let Some(raw) = get(WAIT_ATTEMPTS_VAR) {
            retry.max_attempts = parse(WAIT_ATTEMPTS_VAR, &raw)?;
        }
        retry.validate()?;

        Ok(Self {
            bind_ip,
            bind_port,
            debug_port,
            rootfs,
            limits_test_uri,
            retry,
            woot: get(WOOT_VAR).is_some(),
            shed: get(SHED_VAR).is_some(),
            containerd_for_processes: lookup(CONTAINERD_FOR_PROCESSES_VAR).as_deref()
                != Some("false"),
        })
    }

    /// The server's API address.
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.bind_port)
    }

    /// The server's debug endpoint address.
    #[must_use]
    pub fn debug_address(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.debug_port)
    }
}

fn missing(name: &str) -> GardenError {
    GardenError::invalid_config(format!("environment variable '{name}' not set"))
}

fn parse<T>(name: &str, raw: &str) -> GardenResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| GardenError::invalid_config(format!("{name}={raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use test_case::test_case;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        (ROOTFS_VAR, "docker:///cfgarden/garden-busybox"),
        (LIMITS_TEST_URI_VAR, "docker:///cfgarden/limits"),
    ];

    #[test]
    fn test_defaults() {
        let config = SuiteConfig::from_lookup(lookup_from(&REQUIRED)).expect("config");
        assert_eq!(config.address().to_string(), "10.244.0.2:7777");
        assert_eq!(config.debug_address().to_string(), "10.244.0.2:17013");
        assert_eq!(config.rootfs, "docker:///cfgarden/garden-busybox");
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            (BIND_IP_VAR, "127.0.0.1"),
            (BIND_PORT_VAR, "9999"),
            (DEBUG_PORT_VAR, "9998"),
            (WAIT_ATTEMPTS_VAR, "3"),
        ]);
        let config = SuiteConfig::from_lookup(lookup_from(&pairs)).expect("config");
        assert_eq!(config.address().to_string(), "127.0.0.1:9999");
        assert_eq!(config.debug_port, 9998);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_empty_value_uses_default() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((BIND_PORT_VAR, ""));
        let config = SuiteConfig::from_lookup(lookup_from(&pairs)).expect("config");
        assert_eq!(config.bind_port, 7777);
    }

    #[test_case(ROOTFS_VAR ; "rootfs")]
    #[test_case(LIMITS_TEST_URI_VAR ; "limits uri")]
    fn test_missing_required(var: &str) {
        let pairs: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| *k != var).collect();
        let err = SuiteConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, GardenError::InvalidConfig { .. }));
        assert!(err.to_string().contains(var));
    }

    #[test]
    fn test_feature_toggles_default() {
        let config = SuiteConfig::from_lookup(lookup_from(&REQUIRED)).expect("config");
        assert!(!config.woot);
        assert!(!config.shed);
        assert!(config.containerd_for_processes);
    }

    #[test_case(CONTAINERD_FOR_PROCESSES_VAR, "false", false ; "containerd disabled")]
    #[test_case(CONTAINERD_FOR_PROCESSES_VAR, "true", true ; "containerd enabled")]
    #[test_case(CONTAINERD_FOR_PROCESSES_VAR, "no", true ; "containerd only disabled by false")]
    #[test_case(WOOT_VAR, "1", true ; "woot")]
    #[test_case(SHED_VAR, "yes", true ; "shed")]
    fn test_feature_toggles(var: &str, value: &str, expected: bool) {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((var, value));
        let config = SuiteConfig::from_lookup(lookup_from(&pairs)).expect("config");
        let actual = match var {
            WOOT_VAR => config.woot,
            SHED_VAR => config.shed,
            _ => config.containerd_for_processes,
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_json_with_zero_wait_attempts_rejected() {
        let json = r#"{
            "bind_ip": "10.244.0.2",
            "bind_port": 7777,
            "debug_port": 17013,
            "rootfs": "docker:///cfgarden/garden-busybox",
            "limits_test_uri": "docker:///cfgarden/limits",
            "retry": {"max_attempts": 0}
        }"#;
        let err = serde_json::from_str::<SuiteConfig>(json).unwrap_err();
        assert!(err.to_string().contains("max_attempts"), "{err}");
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{
            "bind_ip": "127.0.0.1",
            "bind_port": 7777,
            "debug_port": 17013,
            "rootfs": "docker:///cfgarden/garden-busybox",
            "limits_test_uri": "docker:///cfgarden/limits"
        }"#;
        let config: SuiteConfig = serde_json::from_str(json).expect("config");
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.containerd_for_processes);
        assert!(!config.woot);
    }

    #[test_case(BIND_IP_VAR, "not-an-ip" ; "bad ip")]
    #[test_case(BIND_PORT_VAR, "70000" ; "port out of range")]
    #[test_case(WAIT_ATTEMPTS_VAR, "0" ; "zero attempts")]
    fn test_invalid_values(var: &str, value: &str) {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((var, value));
        let err = SuiteConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, GardenError::InvalidConfig { .. }));
    }
}
