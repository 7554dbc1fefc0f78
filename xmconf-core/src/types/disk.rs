//! Disk device types.

use serde::{Deserialize, Serialize};

/// Disk bus.
///
/// Variant order is the sort order of the disk list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskBus {
    Ide,
    Fdc,
    Scsi,
    Virtio,
    Xen,
    Usb,
}

impl DiskBus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ide => "ide",
            Self::Fdc => "fdc",
            Self::Scsi => "scsi",
            Self::Virtio => "virtio",
            Self::Xen => "xen",
            Self::Usb => "usb",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "ide" => Some(Self::Ide),
            "fdc" => Some(Self::Fdc),
            "scsi" => Some(Self::Scsi),
            "virtio" => Some(Self::Virtio),
            "xen" => Some(Self::Xen),
            "usb" => Some(Self::Usb),
            _ => None,
        }
    }

    /// Bus implied by a target device name.
    ///
    /// Para-virtualized guests only ever see the xen bus.
    pub fn for_target(target: &str, hvm: bool) -> Self {
        if target.starts_with("xvd") || !hvm {
            Self::Xen
        } else if target.starts_with("sd") {
            Self::Scsi
        } else {
            Self::Ide
        }
    }
}

/// Device class presented to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskDevice {
    Disk,
    Cdrom,
    Floppy,
}

impl DiskDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::Cdrom => "cdrom",
            Self::Floppy => "floppy",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "disk" => Some(Self::Disk),
            "cdrom" => Some(Self::Cdrom),
            "floppy" => Some(Self::Floppy),
            _ => None,
        }
    }
}

/// Backing store kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskType {
    Block,
    File,
}

impl DiskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::File => "file",
        }
    }
}

/// A disk attached to a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub disk_type: DiskType,
    pub device: DiskDevice,
    pub bus: DiskBus,

    /// Host path; absent for an empty CD-ROM drive
    pub source: Option<String>,

    /// Guest device name (e.g., "xvda", "hdc")
    pub target: String,

    /// Backend driver (e.g., "phy", "file", "tap")
    pub driver_name: Option<String>,

    /// Driver sub-type, only meaningful for "tap" (e.g., "aio", "qcow")
    pub driver_type: Option<String>,

    pub readonly: bool,
    pub shared: bool,
}

impl Disk {
    /// Ordering key of the disk list.
    pub fn sort_key(&self) -> (DiskBus, Option<usize>) {
        (self.bus, disk_name_to_index(&self.target))
    }
}

const DISK_NAME_PREFIXES: &[&str] = &["fd", "hd", "vd", "sd", "xvd", "ubd"];

/// Index of a disk from its device name: "xvda" is 0, "sdb" is 1,
/// "hdaa" is 26.
///
/// Returns `None` for names without a known prefix or with anything but
/// lowercase letters after it.
pub fn disk_name_to_index(name: &str) -> Option<usize> {
    let suffix = DISK_NAME_PREFIXES.iter().find_map(|p| name.strip_prefix(p))?;
    if suffix.is_empty() {
        return None;
    }

    let mut idx: usize = 0;
    for (i, c) in suffix.chars().enumerate() {
        if !c.is_ascii_lowercase() {
            return None;
        }
        if i > 0 {
            idx = idx.checked_add(1)?.checked_mul(26)?;
        }
        idx = idx.checked_add((c as u8 - b'a') as usize)?;
    }
    Some(idx)
}
