//! Port forwarding and egress rules.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// A host-to-container port mapping requested at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetIn {
    /// Host port; zero lets the server pick one.
    pub host_port: u32,
    /// Container port; zero lets the server pick one.
    pub container_port: u32,
}

/// Transport protocol an egress rule applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Every protocol.
    #[default]
    All,
    /// TCP only.
    Tcp,
    /// UDP only.
    Udp,
    /// ICMP only.
    Icmp,
}

/// Inclusive range of IPv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    /// First address.
    pub start: Ipv4Addr,
    /// Last address.
    pub end: Ipv4Addr,
}

impl IpRange {
    /// A range holding a single address.
    #[must_use]
    pub const fn single(ip: Ipv4Addr) -> Self {
        Self { start: ip, end: ip }
    }
}

/// Inclusive range of ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    /// First port.
    pub start: u16,
    /// Last port.
    pub end: u16,
}

impl PortRange {
    /// A range holding a single port.
    #[must_use]
    pub const fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }
}

/// ICMP type/code filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmpControl {
    /// ICMP type.
    #[serde(rename = "type")]
    pub icmp_type: u8,
    /// ICMP code; `None` matches every code.
    pub code: Option<u8>,
}

/// An egress firewall rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetOutRule {
    /// Protocol the rule applies to.
    pub protocol: Protocol,
    /// Destination networks; empty means any.
    pub networks: Vec<IpRange>,
    /// Destination ports; empty means any.
    pub ports: Vec<PortRange>,
    /// ICMP filter, only meaningful with [`Protocol::Icmp`].
    pub icmps: Option<IcmpControl>,
    /// Log packets matching the rule.
    pub log: bool,
}

impl NetOutRule {
    /// Allow TCP to the given address and port.
    #[must_use]
    pub fn tcp(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            networks: vec![IpRange::single(ip)],
            ports: vec![PortRange::single(port)],
            ..Default::default()
        }
    }

    /// Enable packet logging for the rule.
    #[must_use]
    pub fn with_log(mut self) -> Self {
        self.log = true;
        self
    }
}
