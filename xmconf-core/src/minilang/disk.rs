//! Disk-spec strings: `[<driver>[:<subtype>]:]<source>,[ioemu:]<dest>[:cdrom],<mode>`.
//!
//! ```text
//! phy:/dev/vg/vm1,xvda,w
//! tap:aio:/srv/vm1.img,xvdb,r
//! file:/srv/install.iso,hdc:cdrom,r
//! ,hdc:cdrom,r                      (empty CD-ROM drive)
//! ```

use crate::error::{Result, XmError};
use crate::types::disk::{Disk, DiskBus, DiskDevice, DiskType};

const KEY: &str = "disk";

/// Driver assumed when the source carries no `driver:` prefix.
pub const DEFAULT_DRIVER: &str = "phy";

/// Sub-type written for a `tap` disk that does not name one.
pub const DEFAULT_TAP_TYPE: &str = "aio";

/// Decode one `disk` list entry.
pub fn decode_disk(spec: &str, hvm: bool) -> Result<Disk> {
    let (source, rest) = spec
        .split_once(',')
        .ok_or_else(|| XmError::malformed(KEY, format!("'{}' has no target", spec)))?;
    let rest = rest.strip_prefix("ioemu:").unwrap_or(rest);
    let (dest, mode) = rest
        .split_once(',')
        .ok_or_else(|| XmError::malformed(KEY, format!("'{}' has no mode", spec)))?;

    let (driver, path) = match source.split_once(':') {
        Some((driver, path)) => (driver, path),
        None => (DEFAULT_DRIVER, source),
    };

    let (driver_type, path) = if driver.starts_with("tap") {
        let (sub, path) = path
            .split_once(':')
            .ok_or_else(|| XmError::malformed(KEY, format!("'{}' lacks a tap sub-type", spec)))?;
        (Some(sub.to_string()), path)
    } else {
        (None, path)
    };

    let (target, device) = match dest.split_once(':') {
        Some((target, "cdrom")) => (target, DiskDevice::Cdrom),
        Some((target, _)) => (target, DiskDevice::Disk),
        None => (dest, DiskDevice::Disk),
    };
    if target.is_empty() {
        return Err(XmError::malformed(KEY, format!("'{}' has an empty target", spec)));
    }

    let (readonly, shared) = match mode {
        "r" | "ro" => (true, false),
        "w!" | "!" => (false, true),
        _ => (false, false),
    };

    Ok(Disk {
        disk_type: if driver == "phy" { DiskType::Block } else { DiskType::File },
        device,
        bus: DiskBus::for_target(target, hvm),
        source: (!path.is_empty()).then(|| path.to_string()),
        target: target.to_string(),
        driver_name: Some(driver.to_string()),
        driver_type,
        readonly,
        shared,
    })
}

/// Encode a disk as a `disk` list entry.
///
/// Returns `None` for disks this dialect carries elsewhere: floppies of a
/// fully virtualized guest, and its CD-ROMs under format version 1.
pub fn encode_disk(disk: &Disk, hvm: bool, format_version: u32) -> Result<Option<String>> {
    if hvm && disk.device == DiskDevice::Floppy {
        return Ok(None);
    }
    let cdrom = disk.device == DiskDevice::Cdrom;
    if hvm && cdrom && format_version == 1 {
        return Ok(None);
    }

    let mut out = String::new();
    match &disk.source {
        Some(source) => {
            let driver = disk.driver_name.as_deref().unwrap_or(match disk.disk_type {
                DiskType::File => "file",
                DiskType::Block => DEFAULT_DRIVER,
            });
            out.push_str(driver);
            if driver.starts_with("tap") {
                out.push(':');
                out.push_str(disk.driver_type.as_deref().unwrap_or(DEFAULT_TAP_TYPE));
            }
            out.push(':');
            out.push_str(source);
        }
        None if cdrom => {}
        None => {
            return Err(XmError::malformed(KEY, format!("disk {} has no source", disk.target)));
        }
    }

    out.push(',');
    if hvm && format_version == 1 {
        out.push_str("ioemu:");
    }
    out.push_str(&disk.target);
    if cdrom {
        out.push_str(":cdrom");
    }
    out.push_str(if disk.readonly {
        ",r"
    } else if disk.shared {
        ",!"
    } else {
        ",w"
    });

    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_phy() {
        let disk = decode_disk("phy:/dev/vg/vm1,xvda,w", false).unwrap();
        assert_eq!(disk.disk_type, DiskType::Block);
        assert_eq!(disk.bus, DiskBus::Xen);
        assert_eq!(disk.source.as_deref(), Some("/dev/vg/vm1"));
        assert_eq!(disk.target, "xvda");
        assert_eq!(disk.driver_name.as_deref(), Some("phy"));
        assert!(!disk.readonly && !disk.shared);
    }

    #[test]
    fn test_decode_tap_and_modes() {
        let disk = decode_disk("tap:qcow:/srv/vm.qcow,xvdb,r", false).unwrap();
        assert_eq!(disk.disk_type, DiskType::File);
        assert_eq!(disk.driver_type.as_deref(), Some("qcow"));
        assert_eq!(disk.source.as_deref(), Some("/srv/vm.qcow"));
        assert!(disk.readonly);

        assert!(decode_disk("file:/srv/shared.img,xvdc,w!", false).unwrap().shared);
        assert!(decode_disk("file:/srv/shared.img,xvdc,!", false).unwrap().shared);
        assert!(decode_disk("file:/srv/ro.img,xvdc,ro", false).unwrap().readonly);
    }

    #[test]
    fn test_decode_hvm_buses() {
        let cd = decode_disk("file:/srv/install.iso,ioemu:hdc:cdrom,r", true).unwrap();
        assert_eq!(cd.target, "hdc");
        assert_eq!(cd.device, DiskDevice::Cdrom);
        assert_eq!(cd.bus, DiskBus::Ide);

        assert_eq!(decode_disk("phy:/dev/sdb,sda,w", true).unwrap().bus, DiskBus::Scsi);
        assert_eq!(decode_disk("phy:/dev/sdb,xvda,w", true).unwrap().bus, DiskBus::Xen);
        assert_eq!(decode_disk("phy:/dev/sdb,sda,w", false).unwrap().bus, DiskBus::Xen);
    }

    #[test]
    fn test_decode_defaults_driver() {
        let disk = decode_disk("/dev/vg/vm1,xvda,w", false).unwrap();
        assert_eq!(disk.driver_name.as_deref(), Some("phy"));
        assert_eq!(disk.source.as_deref(), Some("/dev/vg/vm1"));
        assert_eq!(encode_disk(&disk, false, 3).unwrap().unwrap(), "phy:/dev/vg/vm1,xvda,w");
    }

    #[test]
    fn test_decode_malformed() {
        assert!(decode_disk("phy:/dev/vg/vm1", false).is_err());
        assert!(decode_disk("phy:/dev/vg/vm1,xvda", false).is_err());
        assert!(decode_disk("tap:/srv/vm.img,xvda,w", false).is_err());
        assert!(decode_disk("phy:/dev/x,,w", false).is_err());
    }

    #[test]
    fn test_encode_reproduces_input() {
        for (spec, hvm, version) in [
            ("phy:/dev/vg/vm1,xvda,w", false, 3),
            ("tap:aio:/srv/vm.img,xvdb,!", false, 3),
            ("file:/srv/data.img,xvdc,r", false, 3),
            ("file:/srv/install.iso,hdc:cdrom,r", true, 2),
            (",hdc:cdrom,r", true, 3),
            ("phy:/dev/vg/win,ioemu:hda,w", true, 1),
        ] {
            let disk = decode_disk(spec, hvm).unwrap();
            assert_eq!(encode_disk(&disk, hvm, version).unwrap().as_deref(), Some(spec));
        }
    }

    #[test]
    fn test_encode_skips_legacy_devices() {
        let mut cd = decode_disk("file:/srv/install.iso,hdc:cdrom,r", true).unwrap();
        assert_eq!(encode_disk(&cd, true, 1).unwrap(), None);

        cd.device = DiskDevice::Floppy;
        assert_eq!(encode_disk(&cd, true, 3).unwrap(), None);
    }

    #[test]
    fn test_encode_tap_default_subtype() {
        let mut disk = decode_disk("tap:aio:/srv/vm.img,xvda,w", false).unwrap();
        disk.driver_type = None;
        assert_eq!(encode_disk(&disk, false, 3).unwrap().unwrap(), "tap:aio:/srv/vm.img,xvda,w");
    }

    #[test]
    fn test_encode_requires_source() {
        let mut disk = decode_disk("phy:/dev/vg/vm1,xvda,w", false).unwrap();
        disk.source = None;
        assert!(encode_disk(&disk, false, 3).is_err());
    }
}
