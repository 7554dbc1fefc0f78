//! Network interface types.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OUI reserved for Xen guests.
pub const XEN_MAC_PREFIX: [u8; 3] = [0x00, 0x16, 0x3e];

/// A 6-byte Ethernet address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// A random address in the Xen OUI.
    pub fn random_xen() -> Self {
        let mut rng = rand::thread_rng();
        let [a, b, c] = XEN_MAC_PREFIX;
        Self([a, b, c, rng.gen_range(1..=255), rng.gen_range(1..=255), rng.gen_range(1..=255)])
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", m[0], m[1], m[2], m[3], m[4], m[5])
    }
}

impl FromStr for MacAddr {
    type Err = String;

    /// Six colon-separated octets of one or two hex digits each.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| format!("MAC address too short: {}", s))?;
            if part.is_empty() || part.len() > 2 {
                return Err(format!("bad MAC octet '{}' in {}", part, s));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| format!("bad MAC octet '{}' in {}", part, s))?;
        }
        if parts.next().is_some() {
            return Err(format!("MAC address too long: {}", s));
        }
        Ok(Self(octets))
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

impl TryFrom<String> for MacAddr {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// How an interface reaches the host network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NetConnection {
    /// Attached to a host bridge.
    Bridge { bridge: Option<String> },

    /// Routed through a host device by a script.
    Ethernet { dev: Option<String> },

    /// Attached to a named virtual network, resolved to its bridge on write.
    Network { network: String },
}

impl NetConnection {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bridge { .. } => "bridge",
            Self::Ethernet { .. } => "ethernet",
            Self::Network { .. } => "network",
        }
    }
}

/// A guest network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub mac: MacAddr,
    pub connection: NetConnection,

    /// Hotplug script run by the backend
    pub script: Option<String>,

    /// Guest IP address, used by routed setups
    pub ip: Option<String>,

    /// Emulated NIC model (e.g., "e1000")
    pub model: Option<String>,
}

impl NetworkInterface {
    /// A bridged interface with no script, IP or model.
    pub fn bridged(mac: MacAddr, bridge: Option<String>) -> Self {
        Self {
            mac,
            connection: NetConnection::Bridge { bridge },
            script: None,
            ip: None,
            model: None,
        }
    }
}
