use roxmltree::{Document, Node};

use crate::conf::{ConfDocument, ConfValue};
use crate::error::{Result, XmError};
use crate::host::NetworkResolver;
use crate::minilang::{encode_disk, encode_vfb, encode_vif, format_chardev};
use crate::types::devices::{format_sound_list, Graphics, InputDevice, SoundModel};
use crate::types::domain::{BootDevice, DomainDef};
use crate::xml::query::{attr, child, children, count, raw_text, text};
use crate::xml::{
    parse_chardev_node, parse_disk_node, parse_graphics_node, parse_interface_node,
    DomainXmlBuilder,
};

pub(super) fn format_config(
    def: &DomainDef,
    networks: &dyn NetworkResolver,
    format_version: u32,
) -> Result<ConfDocument> {
    let xml = DomainXmlBuilder::new(def).secure(true).build();
    let doc = Document::parse(&xml)?;
    let root = doc.root_element();
    let mut conf = ConfDocument::new();

    conf.set_string("name", text(root, &["name"]).ok_or_else(|| XmError::xml("missing domain name"))?);
    conf.set_string("uuid", text(root, &["uuid"]).ok_or_else(|| XmError::xml("missing domain uuid"))?);

    let max_kib = number(root, "memory")?.ok_or_else(|| XmError::xml("missing memory"))?;
    let cur_kib = number(root, "currentMemory")?.unwrap_or(max_kib);
    conf.set_long("maxmem", mib("maxmem", max_kib)?);
    conf.set_long("memory", mib("memory", cur_kib)?);

    let vcpus = number(root, "vcpu")?.unwrap_or(1);
    conf.set_long("vcpus", i64::try_from(vcpus).map_err(|_| XmError::xml("vcpu count too large"))?);
    if let Some(mask) = attr(root, &["vcpu"], "cpuset") {
        conf.set_string("cpus", mask);
    }

    let hvm = text(root, &["os", "type"]) == Some("hvm");
    if hvm {
        conf.set_string("builder", "hvm");
        set_opt(&mut conf, "kernel", text(root, &["os", "loader"]));
        let boot: String = child(root, "os")
            .into_iter()
            .flat_map(|os| children(os, "boot"))
            .filter_map(|b| BootDevice::from_xml_name(b.attribute("dev")?))
            .map(|b| b.letter())
            .collect();
        conf.set_string("boot", if boot.is_empty() { "c".to_string() } else { boot });
        for feature in ["pae", "acpi", "apic"] {
            conf.set_long(feature, count(root, &["features", feature]) as i64);
        }
        let localtime = attr(root, &["clock"], "offset") == Some("localtime");
        conf.set_long("localtime", i64::from(localtime));

        if format_version == 1 {
            let iso = devices(root, "disk")
                .into_iter()
                .find(|d| d.attribute("device") == Some("cdrom"))
                .and_then(|d| attr(d, &["source"], "file"));
            set_opt(&mut conf, "cdrom", iso);
        }
    } else {
        set_opt(&mut conf, "bootloader", text(root, &["bootloader"]));
        set_opt(&mut conf, "bootargs", raw_text(root, &["bootloader_args"]));
        set_opt(&mut conf, "kernel", text(root, &["os", "kernel"]));
        set_opt(&mut conf, "ramdisk", text(root, &["os", "initrd"]));
        set_opt(&mut conf, "extra", raw_text(root, &["os", "cmdline"]));
    }

    for key in ["on_poweroff", "on_reboot", "on_crash"] {
        set_opt(&mut conf, key, text(root, &[key]));
    }

    if hvm {
        set_opt(&mut conf, "device_model", text(root, &["devices", "emulator"]));
        let usb = devices(root, "input").into_iter().find_map(|n| {
            let kind = InputDevice::from_name(n.attribute("type")?)?;
            match n.attribute("bus") {
                Some("usb") => Some(kind),
                None if kind == InputDevice::Tablet => Some(kind),
                _ => None,
            }
        });
        set_opt(&mut conf, "usbdevice", usb.map(|i| i.as_str()));
    }

    let graphics = devices(root, "graphics");
    if hvm || format_version < 3 {
        format_legacy_graphics(&mut conf, &graphics)?;
    } else if !graphics.is_empty() {
        let specs = graphics
            .iter()
            .map(|&n| parse_graphics_node(n).map(|g| encode_vfb(&g)))
            .collect::<Result<Vec<_>>>()?;
        conf.set("vfb", ConfValue::strings(specs));
    }

    let mut disks = Vec::new();
    for node in devices(root, "disk") {
        let disk = parse_disk_node(node, hvm)?;
        if let Some(spec) = encode_disk(&disk, hvm, format_version)? {
            disks.push(spec);
        }
    }
    conf.set("disk", ConfValue::strings(disks));

    let mut vifs = Vec::new();
    for node in devices(root, "interface") {
        if child(node, "mac").is_none() {
            return Err(XmError::malformed("vif", "interface has no mac address"));
        }
        vifs.push(encode_vif(&parse_interface_node(node)?, hvm, networks)?);
    }
    conf.set("vif", ConfValue::strings(vifs));

    if hvm {
        let parallel = match devices(root, "parallel").first() {
            Some(&node) => format_chardev(&parse_chardev_node(node)?),
            None => "none".to_string(),
        };
        conf.set_string("parallel", parallel);

        let serial = match devices(root, "serial").first() {
            Some(&node) => format_chardev(&parse_chardev_node(node)?),
            None if !devices(root, "console").is_empty() => "pty".to_string(),
            None => "none".to_string(),
        };
        conf.set_string("serial", serial);

        let sound: Vec<SoundModel> = devices(root, "sound")
            .into_iter()
            .filter_map(|n| SoundModel::from_name(n.attribute("model")?))
            .collect();
        if !sound.is_empty() {
            conf.set_string("soundhw", format_sound_list(&sound));
        }
    }

    conf.check_writable()?;
    Ok(conf)
}

/// Top-level `sdl`/`vnc` keys, used by fully virtualized guests and by
/// older format versions.
fn format_legacy_graphics(conf: &mut ConfDocument, nodes: &[Node<'_, '_>]) -> Result<()> {
    let of_type = |kind: &'static str| nodes.iter().filter(move |n| n.attribute("type") == Some(kind));

    conf.set_long("sdl", of_type("sdl").count() as i64);
    conf.set_long("vnc", of_type("vnc").count() as i64);
    let unused = of_type("vnc").filter(|n| n.attribute("port") == Some("-1")).count();
    conf.set_long("vncunused", unused as i64);

    if let Some(&node) = of_type("vnc").next() {
        if let Graphics::Vnc(vnc) = parse_graphics_node(node)? {
            set_opt(conf, "vnclisten", vnc.listen.as_deref());
            set_opt(conf, "vncpasswd", vnc.passwd.as_deref());
            set_opt(conf, "keymap", vnc.keymap.as_deref());
            if let Some(display) = vnc.display() {
                conf.set_string("vncdisplay", display.to_string());
            }
        }
    }
    if let Some(&node) = of_type("sdl").next() {
        if let Graphics::Sdl(sdl) = parse_graphics_node(node)? {
            set_opt(conf, "display", sdl.display.as_deref());
            set_opt(conf, "xauthority", sdl.xauthority.as_deref());
        }
    }
    Ok(())
}

/// Device elements of one kind, in document order.
fn devices<'a, 'input>(root: Node<'a, 'input>, name: &str) -> Vec<Node<'a, 'input>> {
    match child(root, "devices") {
        Some(devs) => devs.children().filter(|n| n.is_element() && n.has_tag_name(name)).collect(),
        None => Vec::new(),
    }
}

fn set_opt(conf: &mut ConfDocument, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        conf.set_string(key, value);
    }
}

fn number(root: Node<'_, '_>, name: &str) -> Result<Option<u64>> {
    text(root, &[name])
        .map(|s| s.parse::<u64>().map_err(|_| XmError::xml(format!("bad {} value {}", name, s))))
        .transpose()
}

fn mib(key: &str, kib: u64) -> Result<i64> {
    i64::try_from(kib / 1024).map_err(|_| XmError::malformed(key, format!("{} KiB is too large", kib)))
}
