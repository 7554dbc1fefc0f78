//! Core domain types for xmconf.

pub mod cpuset;
pub mod devices;
pub mod disk;
pub mod domain;
pub mod net;

// Re-exports
pub use cpuset::{CpuSet, MAX_PHYSICAL_CPUS};
pub use devices::{CharDevice, Graphics, InputDevice, SdlGraphics, SoundModel, VncGraphics};
pub use disk::{disk_name_to_index, Disk, DiskBus, DiskDevice, DiskType};
pub use domain::{
    BootDevice, ClockOffset, DomainDef, DomainFeatures, LifecycleAction, OsConfig, VirtMode,
};
pub use net::{MacAddr, NetConnection, NetworkInterface};
