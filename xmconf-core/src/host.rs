//! Host-side collaborators the translator and store consult.
//!
//! Each is a trait so callers can plug in live host data; the defaults here
//! describe a stock x86_64 Xen host with no virtual networks and nothing
//! running.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, XmError};
use crate::types::domain::VirtMode;

/// Virtualization type used when looking up emulators.
pub const XEN_VIRT_TYPE: &str = "xen";

/// Device model shipped with the Xen tools.
pub const DEFAULT_EMULATOR: &str = "/usr/lib/xen/bin/qemu-dm";

/// What guests the host can run.
pub trait GuestCapabilities: Send + Sync {
    /// Preferred architecture for a guest mode.
    fn default_arch(&self, mode: VirtMode) -> Option<&str>;

    /// Preferred machine type for a guest mode and architecture.
    fn default_machine(&self, mode: VirtMode, arch: &str) -> Option<&str>;

    /// Emulator binary for a guest mode, architecture and virtualization type.
    fn default_emulator(&self, mode: VirtMode, arch: &str, virt_type: &str) -> Option<&str>;
}

/// One supported guest flavor.
#[derive(Debug, Clone)]
pub struct GuestCapability {
    pub mode: VirtMode,
    pub arch: String,
    pub machine: Option<String>,
    pub virt_type: String,
    pub emulator: Option<String>,
}

/// A fixed capability table. The first matching row wins.
#[derive(Debug, Clone, Default)]
pub struct HostCapabilities {
    guests: Vec<GuestCapability>,
}

impl HostCapabilities {
    pub fn new(guests: Vec<GuestCapability>) -> Self {
        Self { guests }
    }

    /// A 64-bit Xen host offering both guest modes.
    pub fn xen_default() -> Self {
        let guest = |mode, machine: &str| GuestCapability {
            mode,
            arch: "x86_64".to_string(),
            machine: Some(machine.to_string()),
            virt_type: XEN_VIRT_TYPE.to_string(),
            emulator: Some(DEFAULT_EMULATOR.to_string()),
        };
        Self::new(vec![guest(VirtMode::Xen, "xenpv"), guest(VirtMode::Hvm, "xenfv")])
    }

    fn find(&self, mode: VirtMode, arch: &str) -> Option<&GuestCapability> {
        self.guests.iter().find(|g| g.mode == mode && g.arch == arch)
    }
}

impl GuestCapabilities for HostCapabilities {
    fn default_arch(&self, mode: VirtMode) -> Option<&str> {
        self.guests.iter().find(|g| g.mode == mode).map(|g| g.arch.as_str())
    }

    fn default_machine(&self, mode: VirtMode, arch: &str) -> Option<&str> {
        self.find(mode, arch)?.machine.as_deref()
    }

    fn default_emulator(&self, mode: VirtMode, arch: &str, virt_type: &str) -> Option<&str> {
        self.guests
            .iter()
            .find(|g| g.mode == mode && g.arch == arch && g.virt_type == virt_type)?
            .emulator
            .as_deref()
    }
}

/// Resolves a virtual network to the host bridge backing it.
pub trait NetworkResolver: Send + Sync {
    fn bridge_for(&self, network: &str) -> Result<String>;
}

/// A fixed network → bridge table.
#[derive(Debug, Clone, Default)]
pub struct StaticNetworks {
    bridges: HashMap<String, String>,
}

impl StaticNetworks {
    pub fn insert(&mut self, network: impl Into<String>, bridge: impl Into<String>) {
        self.bridges.insert(network.into(), bridge.into());
    }
}

impl NetworkResolver for StaticNetworks {
    fn bridge_for(&self, network: &str) -> Result<String> {
        self.bridges
            .get(network)
            .cloned()
            .ok_or_else(|| XmError::NotFound { what: "Network", key: network.to_string() })
    }
}

/// Reports which domain names are currently running elsewhere.
pub trait RunningDomains: Send + Sync {
    fn is_running(&self, name: &str) -> bool;
}

/// Nothing is running.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneRunning;

impl RunningDomains for NoneRunning {
    fn is_running(&self, _name: &str) -> bool {
        false
    }
}

impl RunningDomains for HashSet<String> {
    fn is_running(&self, name: &str) -> bool {
        self.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xen_default_caps() {
        let caps = HostCapabilities::xen_default();
        assert_eq!(caps.default_arch(VirtMode::Hvm), Some("x86_64"));
        assert_eq!(caps.default_machine(VirtMode::Hvm, "x86_64"), Some("xenfv"));
        assert_eq!(caps.default_machine(VirtMode::Xen, "x86_64"), Some("xenpv"));
        assert_eq!(caps.default_emulator(VirtMode::Xen, "x86_64", "xen"), Some(DEFAULT_EMULATOR));
        assert_eq!(caps.default_emulator(VirtMode::Xen, "x86_64", "kvm"), None);
        assert_eq!(caps.default_machine(VirtMode::Xen, "i686"), None);
    }

    #[test]
    fn test_empty_caps() {
        assert_eq!(HostCapabilities::default().default_arch(VirtMode::Xen), None);
    }

    #[test]
    fn test_static_networks() {
        let mut nets = StaticNetworks::default();
        nets.insert("default", "virbr0");
        assert_eq!(nets.bridge_for("default").unwrap(), "virbr0");
        assert!(matches!(nets.bridge_for("other"), Err(XmError::NotFound { .. })));
    }

    #[test]
    fn test_running_set() {
        let running: HashSet<String> = ["vm1".to_string()].into_iter().collect();
        assert!(running.is_running("vm1"));
        assert!(!running.is_running("vm2"));
        assert!(!NoneRunning.is_running("vm1"));
    }
}
