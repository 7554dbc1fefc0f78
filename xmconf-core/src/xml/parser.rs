//! Domain XML parsing.

use roxmltree::{Document, Node};
use uuid::Uuid;

use super::query::{attr, child, children, raw_text, text};
use crate::error::{Result, XmError};
use crate::host::GuestCapabilities;
use crate::types::cpuset::CpuSet;
use crate::types::devices::{
    CharDevice, Graphics, InputDevice, SdlGraphics, SoundModel, VncGraphics,
};
use crate::types::disk::{Disk, DiskBus, DiskDevice, DiskType};
use crate::types::domain::{
    BootDevice, ClockOffset, DomainDef, LifecycleAction, OsConfig, VirtMode, MAX_BOOT_DEVICES,
};
use crate::types::net::{MacAddr, NetConnection, NetworkInterface};

/// A single device parsed from a device document.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceDef {
    Disk(Disk),
    Net(NetworkInterface),
}

/// Device elements that exist in the schema but cannot be attached here.
const OTHER_DEVICES: &[&str] =
    &["input", "graphics", "sound", "serial", "parallel", "console", "hostdev", "video"];

/// Parse a complete `<domain>` document.
///
/// Architecture and machine type fall back to the host's defaults for the
/// guest mode; a missing UUID is generated.
pub fn parse_domain_xml(xml: &str, caps: &dyn GuestCapabilities) -> Result<DomainDef> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if !root.has_tag_name("domain") {
        return Err(XmError::xml("missing top level domain element"));
    }
    if let Some(kind) = root.attribute("type") {
        if kind != "xen" {
            return Err(XmError::xml(format!("domain type {} is not xen", kind)));
        }
    }

    let name = text(root, &["name"]).ok_or_else(|| XmError::xml("missing domain name"))?;
    let uuid = match text(root, &["uuid"]) {
        Some(s) => Uuid::parse_str(s).map_err(|e| XmError::xml(format!("bad uuid {}: {}", s, e)))?,
        None => Uuid::new_v4(),
    };

    let mode_str = text(root, &["os", "type"]).ok_or_else(|| XmError::xml("missing os type"))?;
    let mode = VirtMode::from_os_type(mode_str)
        .ok_or_else(|| XmError::unsupported(format!("os type {}", mode_str)))?;
    let arch = match attr(root, &["os", "type"], "arch") {
        Some(arch) => arch.to_string(),
        None => caps
            .default_arch(mode)
            .ok_or_else(|| XmError::unsupported(format!("no architecture for {} guests", mode)))?
            .to_string(),
    };

    let mut os = OsConfig::new(mode, arch);
    os.machine = attr(root, &["os", "type"], "machine")
        .or_else(|| caps.default_machine(mode, &os.arch))
        .map(str::to_string);
    os.bootloader = text(root, &["bootloader"]).map(str::to_string);
    os.bootloader_args = raw_text(root, &["bootloader_args"]).map(str::to_string);
    if mode.is_hvm() {
        os.loader = text(root, &["os", "loader"]).map(str::to_string);
        if let Some(os_node) = child(root, "os") {
            for boot in children(os_node, "boot").take(MAX_BOOT_DEVICES) {
                let dev = boot.attribute("dev").unwrap_or("hd");
                let dev = BootDevice::from_xml_name(dev)
                    .ok_or_else(|| XmError::xml(format!("unknown boot device {}", dev)))?;
                os.boot_devices.push(dev);
            }
        }
    } else {
        os.kernel = text(root, &["os", "kernel"]).map(str::to_string);
        os.initrd = text(root, &["os", "initrd"]).map(str::to_string);
        os.cmdline = raw_text(root, &["os", "cmdline"]).map(str::to_string);
    }

    let mut def = DomainDef::new(name, uuid, os);

    def.max_memory_kib = number(root, "memory")?.ok_or_else(|| XmError::xml("missing memory"))?;
    def.memory_kib = number(root, "currentMemory")?.unwrap_or(def.max_memory_kib);
    def.vcpus = match number(root, "vcpu")? {
        Some(n) => u32::try_from(n).map_err(|_| XmError::xml(format!("vcpu count {} too large", n)))?,
        None => 1,
    };
    if let Some(mask) = attr(root, &["vcpu"], "cpuset") {
        def.cpumask = Some(mask.parse::<CpuSet>().map_err(XmError::xml)?);
    }

    def.on_poweroff = lifecycle(root, "on_poweroff", LifecycleAction::Destroy)?;
    def.on_reboot = lifecycle(root, "on_reboot", LifecycleAction::Restart)?;
    def.on_crash = lifecycle(root, "on_crash", LifecycleAction::Restart)?;

    if let Some(features) = child(root, "features") {
        def.features.pae = child(features, "pae").is_some();
        def.features.acpi = child(features, "acpi").is_some();
        def.features.apic = child(features, "apic").is_some();
    }
    if attr(root, &["clock"], "offset") == Some("localtime") {
        def.clock = ClockOffset::Localtime;
    }

    if let Some(devices) = child(root, "devices") {
        parse_devices(&mut def, devices)?;
    }

    Ok(def)
}

fn parse_devices(def: &mut DomainDef, devices: Node<'_, '_>) -> Result<()> {
    let hvm = def.is_hvm();
    def.emulator = text(devices, &["emulator"]).map(str::to_string);

    for node in children(devices, "disk") {
        def.insert_disk(parse_disk_node(node, hvm)?);
    }
    for node in children(devices, "interface") {
        def.push_net(parse_interface_node(node)?);
    }

    def.input = children(devices, "input").find_map(|n| {
        let bus = n.attribute("bus");
        let kind = InputDevice::from_name(n.attribute("type")?)?;
        match bus {
            Some("usb") => Some(kind),
            None if kind == InputDevice::Tablet => Some(kind),
            _ => None,
        }
    });

    if let Some(node) = child(devices, "graphics") {
        def.graphics = Some(parse_graphics_node(node)?);
    }
    if let Some(node) = child(devices, "parallel") {
        def.parallel = Some(parse_chardev_node(node)?);
    }
    if let Some(node) = child(devices, "serial") {
        def.serial = Some(parse_chardev_node(node)?);
    }
    if let Some(node) = child(devices, "console") {
        def.console = Some(parse_chardev_node(node)?);
    }
    for node in children(devices, "sound") {
        let model = node.attribute("model").unwrap_or("");
        let model = SoundModel::from_name(model)
            .ok_or_else(|| XmError::unsupported(format!("sound model '{}'", model)))?;
        if !def.sound.contains(&model) {
            def.sound.push(model);
        }
    }
    Ok(())
}

/// Parse a document holding a single `<disk>` or `<interface>`.
pub fn parse_device_xml(xml: &str, hvm: bool) -> Result<DeviceDef> {
    let doc = Document::parse(xml)?;
    let node = doc.root_element();
    match node.tag_name().name() {
        "disk" => Ok(DeviceDef::Disk(parse_disk_node(node, hvm)?)),
        "interface" => Ok(DeviceDef::Net(parse_interface_node(node)?)),
        other if OTHER_DEVICES.contains(&other) => {
            Err(XmError::unsupported(format!("cannot attach or detach {} devices", other)))
        }
        other => Err(XmError::xml(format!("unknown device element {}", other))),
    }
}

pub(crate) fn parse_disk_node(node: Node<'_, '_>, hvm: bool) -> Result<Disk> {
    let disk_type = match node.attribute("type") {
        Some("block") => DiskType::Block,
        Some("file") | None => DiskType::File,
        Some(other) => return Err(XmError::unsupported(format!("disk type {}", other))),
    };
    let device = match node.attribute("device") {
        Some(dev) => DiskDevice::from_name(dev)
            .ok_or_else(|| XmError::unsupported(format!("disk device {}", dev)))?,
        None => DiskDevice::Disk,
    };

    let target = attr(node, &["target"], "dev")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| XmError::xml("disk has no target"))?;
    let bus = match attr(node, &["target"], "bus") {
        Some(bus) => {
            DiskBus::from_name(bus).ok_or_else(|| XmError::unsupported(format!("disk bus {}", bus)))?
        }
        None if device == DiskDevice::Floppy => DiskBus::Fdc,
        None => DiskBus::for_target(target, hvm),
    };

    let source_key = match disk_type {
        DiskType::File => "file",
        DiskType::Block => "dev",
    };
    let source = attr(node, &["source"], source_key).filter(|s| !s.is_empty());
    if source.is_none() && device == DiskDevice::Disk {
        return Err(XmError::xml(format!("disk {} has no source", target)));
    }

    let driver_name = attr(node, &["driver"], "name");
    let driver_type = attr(node, &["driver"], "type").filter(|_| driver_name.is_some());

    Ok(Disk {
        disk_type,
        device,
        bus,
        source: source.map(str::to_string),
        target: target.to_string(),
        driver_name: driver_name.map(str::to_string),
        driver_type: driver_type.map(str::to_string),
        readonly: child(node, "readonly").is_some(),
        shared: child(node, "shareable").is_some(),
    })
}

/// Parse an `<interface>` element. A missing MAC is auto-assigned.
pub(crate) fn parse_interface_node(node: Node<'_, '_>) -> Result<NetworkInterface> {
    let source = |key: &str| attr(node, &["source"], key).map(str::to_string);
    let connection = match node.attribute("type") {
        Some("bridge") => NetConnection::Bridge { bridge: source("bridge") },
        Some("ethernet") => NetConnection::Ethernet { dev: source("dev") },
        Some("network") => NetConnection::Network {
            network: source("network")
                .ok_or_else(|| XmError::xml("network interface has no source network"))?,
        },
        Some(other) => return Err(XmError::unsupported(format!("interface type {}", other))),
        None => return Err(XmError::xml("interface has no type")),
    };

    let mac = match attr(node, &["mac"], "address") {
        Some(mac) => mac.parse::<MacAddr>().map_err(XmError::xml)?,
        None => MacAddr::random_xen(),
    };

    Ok(NetworkInterface {
        mac,
        connection,
        script: attr(node, &["script"], "path").map(str::to_string),
        ip: attr(node, &["ip"], "address").map(str::to_string),
        model: attr(node, &["model"], "type").map(str::to_string),
    })
}

pub(crate) fn parse_graphics_node(node: Node<'_, '_>) -> Result<Graphics> {
    let opt = |key: &str| node.attribute(key).map(str::to_string);
    match node.attribute("type") {
        Some("vnc") => {
            let autoport = node.attribute("autoport") == Some("yes");
            let port = match node.attribute("port") {
                _ if autoport => None,
                None | Some("-1") => None,
                Some(p) => Some(
                    p.parse::<u16>().map_err(|_| XmError::xml(format!("bad vnc port {}", p)))?,
                ),
            };
            Ok(Graphics::Vnc(VncGraphics {
                port,
                listen: opt("listen"),
                passwd: opt("passwd"),
                keymap: opt("keymap"),
            }))
        }
        Some("sdl") => Ok(Graphics::Sdl(SdlGraphics { display: opt("display"), xauthority: opt("xauth") })),
        Some(other) => Err(XmError::unsupported(format!("graphics type {}", other))),
        None => Err(XmError::xml("graphics has no type")),
    }
}

pub(crate) fn parse_chardev_node(node: Node<'_, '_>) -> Result<CharDevice> {
    let kind = node.attribute("type").unwrap_or("pty");
    let source = |key: &str| attr(node, &["source"], key).map(str::to_string);
    let path = || source("path").ok_or_else(|| XmError::xml(format!("{} device has no path", kind)));
    let listen = attr(node, &["source"], "mode") == Some("bind");

    Ok(match kind {
        "null" => CharDevice::Null,
        "vc" => CharDevice::Vc,
        "pty" => CharDevice::Pty,
        "stdio" => CharDevice::Stdio,
        "dev" => CharDevice::Dev { path: path()? },
        "file" => CharDevice::File { path: path()? },
        "pipe" => CharDevice::Pipe { path: path()? },
        "unix" => CharDevice::Unix { path: path()?, listen },
        "tcp" => CharDevice::Tcp {
            host: source("host").unwrap_or_default(),
            service: source("service").ok_or_else(|| XmError::xml("tcp device has no service"))?,
            listen,
            telnet: attr(node, &["protocol"], "type") == Some("telnet"),
        },
        "udp" => {
            let (mut connect_host, mut connect_service) = (None, None);
            let (mut bind_host, mut bind_service) = (None, None);
            for src in children(node, "source") {
                let host = src.attribute("host").map(str::to_string);
                let service = src.attribute("service").map(str::to_string);
                if src.attribute("mode") == Some("bind") {
                    (bind_host, bind_service) = (host, service);
                } else {
                    (connect_host, connect_service) = (host, service);
                }
            }
            CharDevice::Udp {
                connect_host,
                connect_service: connect_service
                    .ok_or_else(|| XmError::xml("udp device has no service"))?,
                bind_host,
                bind_service,
            }
        }
        other => return Err(XmError::unsupported(format!("character device type {}", other))),
    })
}

fn number(root: Node<'_, '_>, name: &str) -> Result<Option<u64>> {
    text(root, &[name])
        .map(|s| s.parse::<u64>().map_err(|_| XmError::xml(format!("bad {} value {}", name, s))))
        .transpose()
}

fn lifecycle(root: Node<'_, '_>, name: &str, default: LifecycleAction) -> Result<LifecycleAction> {
    match text(root, &[name]) {
        Some(s) => s.parse().map_err(XmError::xml),
        None => Ok(default),
    }
}
