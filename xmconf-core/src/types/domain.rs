//! Domain definition types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::cpuset::CpuSet;
use crate::types::devices::{CharDevice, Graphics, InputDevice, SoundModel};
use crate::types::disk::Disk;
use crate::types::net::{MacAddr, NetworkInterface};

/// Smallest guest the toolstack will build, in MiB.
pub const MIN_GUEST_MEMORY_MIB: u64 = 64;

/// Maximum number of entries in the boot-device sequence.
pub const MAX_BOOT_DEVICES: usize = 4;

/// Guest execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VirtMode {
    /// Fully virtualized (HVM) guest.
    Hvm,
    /// Para-virtualized guest.
    Xen,
}

impl VirtMode {
    /// The OS type string used in the structured document.
    pub fn os_type(&self) -> &'static str {
        match self {
            Self::Hvm => "hvm",
            Self::Xen => "xen",
        }
    }

    pub fn from_os_type(s: &str) -> Option<Self> {
        match s {
            "hvm" => Some(Self::Hvm),
            "xen" | "linux" => Some(Self::Xen),
            _ => None,
        }
    }

    pub fn is_hvm(&self) -> bool {
        matches!(self, Self::Hvm)
    }
}

impl std::fmt::Display for VirtMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.os_type())
    }
}

/// A boot device in the full-virtualization boot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootDevice {
    Floppy,
    Cdrom,
    Disk,
    Network,
}

impl BootDevice {
    /// Map a `boot` string character. Unknown characters mean disk.
    pub fn from_letter(c: char) -> Self {
        match c {
            'a' => Self::Floppy,
            'd' => Self::Cdrom,
            'n' => Self::Network,
            _ => Self::Disk,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            Self::Floppy => 'a',
            Self::Cdrom => 'd',
            Self::Disk => 'c',
            Self::Network => 'n',
        }
    }

    /// Name used in `<boot dev='..'/>`.
    pub fn xml_name(&self) -> &'static str {
        match self {
            Self::Floppy => "fd",
            Self::Cdrom => "cdrom",
            Self::Disk => "hd",
            Self::Network => "network",
        }
    }

    pub fn from_xml_name(s: &str) -> Option<Self> {
        match s {
            "fd" => Some(Self::Floppy),
            "cdrom" => Some(Self::Cdrom),
            "hd" => Some(Self::Disk),
            "network" => Some(Self::Network),
            _ => None,
        }
    }
}

/// What to do when the guest powers off, reboots or crashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleAction {
    Destroy,
    Restart,
    Preserve,
    RenameRestart,
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Destroy => write!(f, "destroy"),
            Self::Restart => write!(f, "restart"),
            Self::Preserve => write!(f, "preserve"),
            Self::RenameRestart => write!(f, "rename-restart"),
        }
    }
}

impl std::str::FromStr for LifecycleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "destroy" => Ok(Self::Destroy),
            "restart" => Ok(Self::Restart),
            "preserve" => Ok(Self::Preserve),
            "rename-restart" => Ok(Self::RenameRestart),
            _ => Err(format!("unexpected lifecycle action: {}", s)),
        }
    }
}

/// Hardware features, meaningful only for full virtualization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFeatures {
    pub pae: bool,
    pub acpi: bool,
    pub apic: bool,
}

/// Guest clock basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockOffset {
    #[default]
    Utc,
    Localtime,
}

impl ClockOffset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utc => "utc",
            Self::Localtime => "localtime",
        }
    }
}

/// Boot and OS configuration.
///
/// A fully virtualized guest uses `loader` and `boot_devices`; a
/// para-virtualized guest uses the kernel/initrd/cmdline triple, a
/// bootloader, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsConfig {
    pub mode: VirtMode,
    pub arch: String,
    pub machine: Option<String>,
    pub loader: Option<String>,
    pub boot_devices: Vec<BootDevice>,
    pub kernel: Option<String>,
    pub initrd: Option<String>,
    pub cmdline: Option<String>,
    pub bootloader: Option<String>,
    pub bootloader_args: Option<String>,
}

impl OsConfig {
    /// An OS block with nothing but mode and architecture filled in.
    pub fn new(mode: VirtMode, arch: impl Into<String>) -> Self {
        Self {
            mode,
            arch: arch.into(),
            machine: None,
            loader: None,
            boot_devices: Vec::new(),
            kernel: None,
            initrd: None,
            cmdline: None,
            bootloader: None,
            bootloader_args: None,
        }
    }
}

/// Static configuration of one virtual machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDef {
    /// Domain name, unique within the cache
    pub name: String,

    /// Stable identity, survives renames
    pub uuid: Uuid,

    /// Current memory allocation in KiB
    pub memory_kib: u64,

    /// Memory ceiling in KiB
    pub max_memory_kib: u64,

    /// Number of virtual CPUs
    pub vcpus: u32,

    /// Physical CPUs the vCPUs may run on
    pub cpumask: Option<CpuSet>,

    pub os: OsConfig,

    pub on_poweroff: LifecycleAction,
    pub on_reboot: LifecycleAction,
    pub on_crash: LifecycleAction,

    pub features: DomainFeatures,
    pub clock: ClockOffset,

    /// Device model binary
    pub emulator: Option<String>,

    /// Disks, kept ascending by (bus, target index)
    pub disks: Vec<Disk>,

    /// Network interfaces, in the order they were added
    pub nets: Vec<NetworkInterface>,

    pub graphics: Option<Graphics>,
    pub input: Option<InputDevice>,
    pub parallel: Option<CharDevice>,
    pub serial: Option<CharDevice>,
    pub console: Option<CharDevice>,
    pub sound: Vec<SoundModel>,
}

impl DomainDef {
    /// A minimal definition with legacy defaults and no devices.
    pub fn new(name: impl Into<String>, uuid: Uuid, os: OsConfig) -> Self {
        let memory_kib = MIN_GUEST_MEMORY_MIB * 2 * 1024;
        Self {
            name: name.into(),
            uuid,
            memory_kib,
            max_memory_kib: memory_kib,
            vcpus: 1,
            cpumask: None,
            os,
            on_poweroff: LifecycleAction::Destroy,
            on_reboot: LifecycleAction::Restart,
            on_crash: LifecycleAction::Restart,
            features: DomainFeatures::default(),
            clock: ClockOffset::Utc,
            emulator: None,
            disks: Vec::new(),
            nets: Vec::new(),
            graphics: None,
            input: None,
            parallel: None,
            serial: None,
            console: None,
            sound: Vec::new(),
        }
    }

    pub fn is_hvm(&self) -> bool {
        self.os.mode.is_hvm()
    }

    /// Insert a disk at its place in (bus, target index) order.
    ///
    /// The new disk goes after any disks that compare equal to it.
    pub fn insert_disk(&mut self, disk: Disk) {
        let key = disk.sort_key();
        let pos = self.disks.iter().position(|d| key < d.sort_key()).unwrap_or(self.disks.len());
        self.disks.insert(pos, disk);
    }

    /// Remove the first disk with the given target name.
    pub fn remove_disk(&mut self, target: &str) -> Option<Disk> {
        let pos = self.disks.iter().position(|d| d.target == target)?;
        Some(self.disks.remove(pos))
    }

    pub fn push_net(&mut self, net: NetworkInterface) {
        self.nets.push(net);
    }

    /// Remove the first interface with the given MAC address.
    pub fn remove_net(&mut self, mac: &MacAddr) -> Option<NetworkInterface> {
        let pos = self.nets.iter().position(|n| &n.mac == mac)?;
        Some(self.nets.remove(pos))
    }

    /// Set current memory, clamped to the ceiling.
    pub fn set_memory(&mut self, kib: u64) {
        self.memory_kib = kib.min(self.max_memory_kib);
    }

    /// Set the memory ceiling, pulling current memory down if needed.
    pub fn set_max_memory(&mut self, kib: u64) {
        self.max_memory_kib = kib;
        if self.memory_kib > self.max_memory_kib {
            self.memory_kib = self.max_memory_kib;
        }
    }
}
