use tracing::debug;
use uuid::Uuid;

use crate::conf::{ConfDocument, ConfValue};
use crate::error::{Result, XmError};
use crate::host::{GuestCapabilities, XEN_VIRT_TYPE};
use crate::minilang::{decode_disk, decode_vfb, decode_vif, parse_chardev};
use crate::types::cpuset::CpuSet;
use crate::types::devices::{
    parse_sound_list, CharDevice, Graphics, InputDevice, SdlGraphics, VncGraphics,
};
use crate::types::disk::{Disk, DiskBus, DiskDevice, DiskType};
use crate::types::domain::{
    BootDevice, ClockOffset, DomainDef, LifecycleAction, OsConfig, VirtMode, MAX_BOOT_DEVICES,
    MIN_GUEST_MEMORY_MIB,
};

pub(super) fn parse_config(
    conf: &ConfDocument,
    caps: &dyn GuestCapabilities,
    format_version: u32,
) -> Result<DomainDef> {
    let name = conf.require_str("name")?;
    let uuid_str = conf.require_str("uuid")?;
    let uuid = Uuid::parse_str(uuid_str)
        .map_err(|e| XmError::malformed("uuid", format!("'{}': {}", uuid_str, e)))?;

    let hvm = conf.get_str("builder")? == Some("hvm");
    let mode = if hvm { VirtMode::Hvm } else { VirtMode::Xen };
    let arch = caps
        .default_arch(mode)
        .ok_or_else(|| XmError::unsupported(format!("no architecture for {} guests", mode)))?;

    let mut os = OsConfig::new(mode, arch);
    os.machine = caps.default_machine(mode, arch).map(str::to_string);
    if hvm {
        os.loader = Some(conf.require_str("kernel")?.to_string());
        let boot = conf.get_str("boot")?.unwrap_or("c");
        os.boot_devices = boot.chars().take(MAX_BOOT_DEVICES).map(BootDevice::from_letter).collect();
    } else {
        os.bootloader = opt_string(conf, "bootloader")?;
        os.bootloader_args = opt_string(conf, "bootargs")?;
        os.kernel = opt_string(conf, "kernel")?;
        os.initrd = opt_string(conf, "ramdisk")?;
        os.cmdline = opt_string(conf, "extra")?;
    }

    let mut def = DomainDef::new(name, uuid, os);

    let memory = conf.get_ulong("memory", MIN_GUEST_MEMORY_MIB * 2)?;
    let max_memory = conf.get_ulong("maxmem", memory)?;
    def.memory_kib = kib("memory", memory)?;
    def.max_memory_kib = kib("maxmem", max_memory)?;

    let vcpus = conf.get_ulong("vcpus", 1)?;
    def.vcpus = u32::try_from(vcpus)
        .map_err(|_| XmError::malformed("vcpus", format!("{} is too large", vcpus)))?;
    if let Some(cpus) = conf.get_str("cpus")?.filter(|s| !s.is_empty()) {
        def.cpumask = Some(cpus.parse::<CpuSet>().map_err(|e| XmError::malformed("cpus", e))?);
    }

    def.on_poweroff = lifecycle(conf, "on_poweroff", LifecycleAction::Destroy)?;
    def.on_reboot = lifecycle(conf, "on_reboot", LifecycleAction::Restart)?;
    def.on_crash = lifecycle(conf, "on_crash", LifecycleAction::Restart)?;

    if hvm {
        def.features.pae = conf.get_bool("pae", false)?;
        def.features.acpi = conf.get_bool("acpi", false)?;
        def.features.apic = conf.get_bool("apic", false)?;
        if conf.get_bool("localtime", false)? {
            def.clock = ClockOffset::Localtime;
        }
    }

    def.emulator = match conf.get_str("device_model")? {
        Some(model) => Some(model.to_string()),
        None => Some(
            caps.default_emulator(mode, &def.os.arch, XEN_VIRT_TYPE)
                .ok_or_else(|| {
                    XmError::unsupported(format!("no emulator for {} {} guests", def.os.arch, mode))
                })?
                .to_string(),
        ),
    };

    for spec in list_strings(conf, "disk") {
        match decode_disk(spec, hvm) {
            Ok(disk) => def.insert_disk(disk),
            Err(e) => debug!(spec, error = %e, "skipping disk entry"),
        }
    }
    if hvm && format_version == 1 {
        if let Some(iso) = conf.get_str("cdrom")?.filter(|s| !s.is_empty()) {
            def.insert_disk(legacy_cdrom(iso));
        }
    }

    for spec in list_strings(conf, "vif") {
        match decode_vif(spec) {
            Ok(net) => def.push_net(net),
            Err(e) => debug!(spec, error = %e, "skipping vif entry"),
        }
    }

    if hvm {
        def.input = conf.get_str("usbdevice")?.and_then(InputDevice::from_name);
    }

    if hvm || format_version < 3 {
        def.graphics = legacy_graphics(conf)?;
    }
    if !hvm && def.graphics.is_none() {
        if let Some(spec) = list_strings(conf, "vfb").next() {
            def.graphics = Some(decode_vfb(spec)?);
        }
    }

    if hvm {
        def.parallel = chardev(conf, "parallel")?;
        def.serial = chardev(conf, "serial")?;
        if let Some(sound) = conf.get_str("soundhw")? {
            def.sound = parse_sound_list(sound)?;
        }
    } else {
        def.console = Some(CharDevice::Pty);
    }

    debug!(
        name = %def.name,
        hvm,
        disks = def.disks.len(),
        nets = def.nets.len(),
        "parsed domain config"
    );
    Ok(def)
}

/// Graphics given as top-level `vnc`/`sdl` keys.
fn legacy_graphics(conf: &ConfDocument) -> Result<Option<Graphics>> {
    if conf.get_bool("vnc", false)? {
        let port = if conf.get_bool("vncunused", true)? {
            None
        } else {
            let display = conf.get_ulong("vncdisplay", 0)?;
            let port = i64::try_from(display).ok().and_then(VncGraphics::port_for_display);
            Some(port.ok_or_else(|| {
                XmError::malformed("vncdisplay", format!("display {} is out of range", display))
            })?)
        };
        return Ok(Some(Graphics::Vnc(VncGraphics {
            port,
            listen: opt_string(conf, "vnclisten")?,
            passwd: opt_string(conf, "vncpasswd")?,
            keymap: opt_string(conf, "keymap")?,
        })));
    }
    if conf.get_bool("sdl", false)? {
        return Ok(Some(Graphics::Sdl(SdlGraphics {
            display: opt_string(conf, "display")?,
            xauthority: opt_string(conf, "xauthority")?,
        })));
    }
    Ok(None)
}

/// The version-1 `cdrom` key: an ISO on the secondary IDE master.
fn legacy_cdrom(iso: &str) -> Disk {
    Disk {
        disk_type: DiskType::File,
        device: DiskDevice::Cdrom,
        bus: DiskBus::Ide,
        source: Some(iso.to_string()),
        target: "hdc".to_string(),
        driver_name: Some("file".to_string()),
        driver_type: None,
        readonly: true,
        shared: false,
    }
}

fn chardev(conf: &ConfDocument, key: &str) -> Result<Option<CharDevice>> {
    match conf.get_str(key)? {
        None | Some("none") => Ok(None),
        Some(spec) => parse_chardev(key, spec).map(Some),
    }
}

fn lifecycle(conf: &ConfDocument, key: &str, default: LifecycleAction) -> Result<LifecycleAction> {
    match conf.get_str(key)? {
        Some(s) => s.parse().map_err(|e: String| XmError::malformed(key, e)),
        None => Ok(default),
    }
}

fn opt_string(conf: &ConfDocument, key: &str) -> Result<Option<String>> {
    Ok(conf.get_str(key)?.map(str::to_string))
}

/// String items of a list value. Other items are ignored.
fn list_strings<'a>(conf: &'a ConfDocument, key: &str) -> impl Iterator<Item = &'a str> {
    conf.get_list(key).unwrap_or_default().iter().filter_map(ConfValue::as_str)
}

fn kib(key: &str, mib: u64) -> Result<u64> {
    mib.checked_mul(1024)
        .ok_or_else(|| XmError::malformed(key, format!("{} MiB is too large", mib)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostCapabilities, DEFAULT_EMULATOR};

    fn parse(text: &str) -> Result<DomainDef> {
        parse_config(&ConfDocument::parse(text).unwrap(), &HostCapabilities::xen_default(), 3)
    }

    const MINIMAL: &str = "name = \"vm\"\nuuid = \"c7a5fdbd-edaf-9455-926a-d65c16db1809\"\n";

    #[test]
    fn test_minimal_defaults() {
        let def = parse(MINIMAL).unwrap();
        assert!(!def.is_hvm());
        assert_eq!((def.memory_kib, def.max_memory_kib), (131072, 131072));
        assert_eq!(def.vcpus, 1);
        assert_eq!(def.on_poweroff, LifecycleAction::Destroy);
        assert_eq!(def.on_reboot, LifecycleAction::Restart);
        assert_eq!(def.emulator.as_deref(), Some(DEFAULT_EMULATOR));
        assert_eq!(def.console, Some(CharDevice::Pty));
        assert_eq!(def.os.machine.as_deref(), Some("xenpv"));
        assert!(def.disks.is_empty() && def.nets.is_empty());
    }

    #[test]
    fn test_required_keys() {
        assert!(matches!(parse("uuid = \"c7a5fdbd-edaf-9455-926a-d65c16db1809\""), Err(XmError::MalformedConfig { .. })));
        assert!(matches!(parse("name = \"vm\""), Err(XmError::MalformedConfig { .. })));
        assert!(parse("name = \"vm\"\nuuid = \"not-a-uuid\"").is_err());
        let hvm_without_loader = format!("{}builder = \"hvm\"\n", MINIMAL);
        assert!(parse(&hvm_without_loader).is_err());
    }

    #[test]
    fn test_no_arch_is_unsupported() {
        let conf = ConfDocument::parse(MINIMAL).unwrap();
        assert!(matches!(
            parse_config(&conf, &HostCapabilities::default(), 3),
            Err(XmError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_bad_lifecycle_is_malformed() {
        let text = format!("{}on_reboot = \"explode\"\n", MINIMAL);
        assert!(matches!(parse(&text), Err(XmError::MalformedConfig { .. })));
    }

    #[test]
    fn test_bad_entries_are_skipped() {
        let text = format!(
            "{}disk = [ \"garbage\", \"phy:/dev/vg/a,xvda,w\", 7 ]\nvif = [ \"bridge=br0\", \"mac=00:16:3e:00:00:01\" ]\n",
            MINIMAL
        );
        let def = parse(&text).unwrap();
        assert_eq!(def.disks.len(), 1);
        assert_eq!(def.nets.len(), 1);
    }

    #[test]
    fn test_memory_and_vcpus() {
        let text = format!("{}memory = \"512\"\nvcpus = 4\ncpus = \"1-2\"\n", MINIMAL);
        let def = parse(&text).unwrap();
        assert_eq!((def.memory_kib, def.max_memory_kib), (524288, 524288));
        assert_eq!(def.vcpus, 4);
        assert_eq!(def.cpumask.as_ref().map(|c| c.count()), Some(2));

        let text = format!("{}cpus = \"7-2\"\n", MINIMAL);
        assert!(matches!(parse(&text), Err(XmError::MalformedConfig { .. })));
    }

    #[test]
    fn test_memory_above_maxmem_is_kept() {
        let text = format!("{}memory = 1024\nmaxmem = 512\n", MINIMAL);
        let def = parse(&text).unwrap();
        assert_eq!(def.memory_kib, 1048576);
        assert_eq!(def.max_memory_kib, 524288);
    }

    #[test]
    fn test_hvm_defaults_and_legacy_cdrom() {
        let text = format!(
            "{}builder = \"hvm\"\nkernel = \"/usr/lib/xen/boot/hvmloader\"\ncdrom = \"/srv/a.iso\"\nserial = \"none\"\n",
            MINIMAL
        );
        let conf = ConfDocument::parse(&text).unwrap();
        let caps = HostCapabilities::xen_default();

        let def = parse_config(&conf, &caps, 1).unwrap();
        assert_eq!(def.os.boot_devices, vec![BootDevice::Disk]);
        assert_eq!(def.disks.len(), 1);
        assert_eq!(def.disks[0].target, "hdc");
        assert_eq!(def.serial, None);
        assert_eq!(def.console, None);

        let def = parse_config(&conf, &caps, 3).unwrap();
        assert!(def.disks.is_empty());
    }

    #[test]
    fn test_vnc_keys() {
        let text = format!("{}vnc = 1\nvncunused = 0\nvncdisplay = 2\nkeymap = \"de\"\n", MINIMAL);
        let conf = ConfDocument::parse(&text).unwrap();
        let def = parse_config(&conf, &HostCapabilities::xen_default(), 2).unwrap();
        assert_eq!(
            def.graphics,
            Some(Graphics::Vnc(VncGraphics { port: Some(5902), keymap: Some("de".into()), ..Default::default() }))
        );

        // version 3 paravirtual guests only read vfb
        assert_eq!(parse(&text).unwrap().graphics, None);
    }

    #[test]
    fn test_vfb_without_legacy_keys() {
        let text = format!("{}vfb = [ \"type=vnc,vncdisplay=1\" ]\n", MINIMAL);
        let conf = ConfDocument::parse(&text).unwrap();
        for version in 1..=3 {
            let def = parse_config(&conf, &HostCapabilities::xen_default(), version).unwrap();
            assert_eq!(
                def.graphics,
                Some(Graphics::Vnc(VncGraphics { port: Some(5901), ..Default::default() })),
                "version {}",
                version
            );
        }

        let text = format!("{}vfb = [ \"type=vnc,vncdisplay=99999\" ]\n", MINIMAL);
        assert!(matches!(parse(&text), Err(XmError::MalformedConfig { .. })));
    }
}
