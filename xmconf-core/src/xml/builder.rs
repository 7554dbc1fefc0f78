//! Domain XML generation.

use std::fmt::Write;

use super::escape;
use crate::types::devices::{CharDevice, Graphics};
use crate::types::disk::{Disk, DiskType};
use crate::types::domain::DomainDef;
use crate::types::net::{NetConnection, NetworkInterface};

/// Builder for libvirt-style domain XML.
pub struct DomainXmlBuilder<'a> {
    def: &'a DomainDef,
    secure: bool,
}

impl<'a> DomainXmlBuilder<'a> {
    /// Create a new XML builder for the given definition.
    pub fn new(def: &'a DomainDef) -> Self {
        Self { def, secure: false }
    }

    /// Include secrets such as the VNC password.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Build the domain XML string.
    pub fn build(&self) -> String {
        let def = self.def;
        let mut xml = String::new();

        xml.push_str("<domain type='xen'>\n");
        let _ = writeln!(xml, "  <name>{}</name>", escape(&def.name));
        let _ = writeln!(xml, "  <uuid>{}</uuid>", def.uuid);
        let _ = writeln!(xml, "  <memory>{}</memory>", def.max_memory_kib);
        let _ = writeln!(xml, "  <currentMemory>{}</currentMemory>", def.memory_kib);
        match &def.cpumask {
            Some(mask) => {
                let _ = writeln!(xml, "  <vcpu cpuset='{}'>{}</vcpu>", mask, def.vcpus);
            }
            None => {
                let _ = writeln!(xml, "  <vcpu>{}</vcpu>", def.vcpus);
            }
        }
        text_element(&mut xml, "  ", "bootloader", def.os.bootloader.as_deref());
        text_element(&mut xml, "  ", "bootloader_args", def.os.bootloader_args.as_deref());

        xml.push_str(&self.build_os_section());
        xml.push_str(&self.build_features());

        let _ = writeln!(xml, "  <clock offset='{}'/>", def.clock.as_str());
        let _ = writeln!(xml, "  <on_poweroff>{}</on_poweroff>", def.on_poweroff);
        let _ = writeln!(xml, "  <on_reboot>{}</on_reboot>", def.on_reboot);
        let _ = writeln!(xml, "  <on_crash>{}</on_crash>", def.on_crash);

        xml.push_str("  <devices>\n");
        text_element(&mut xml, "    ", "emulator", def.emulator.as_deref());
        for disk in &def.disks {
            xml.push_str(&build_disk(disk));
        }
        for net in &def.nets {
            xml.push_str(&build_interface(net));
        }
        if let Some(input) = def.input {
            let _ = writeln!(xml, "    <input type='{}' bus='usb'/>", input.as_str());
        }
        if let Some(graphics) = &def.graphics {
            xml.push_str(&self.build_graphics(graphics));
        }
        if let Some(dev) = &def.parallel {
            xml.push_str(&build_chardev("parallel", dev, Some(0)));
        }
        if let Some(dev) = &def.serial {
            xml.push_str(&build_chardev("serial", dev, Some(0)));
        }
        if let Some(dev) = &def.console {
            xml.push_str(&build_chardev("console", dev, None));
        }
        for model in &def.sound {
            let _ = writeln!(xml, "    <sound model='{}'/>", model.as_str());
        }
        xml.push_str("  </devices>\n");

        xml.push_str("</domain>\n");
        xml
    }

    fn build_os_section(&self) -> String {
        let os = &self.def.os;
        let mut xml = String::from("  <os>\n");
        let _ = write!(xml, "    <type arch='{}'", escape(&os.arch));
        if let Some(machine) = &os.machine {
            let _ = write!(xml, " machine='{}'", escape(machine));
        }
        let _ = writeln!(xml, ">{}</type>", os.mode.os_type());

        if os.mode.is_hvm() {
            text_element(&mut xml, "    ", "loader", os.loader.as_deref());
            for dev in &os.boot_devices {
                let _ = writeln!(xml, "    <boot dev='{}'/>", dev.xml_name());
            }
        } else {
            text_element(&mut xml, "    ", "kernel", os.kernel.as_deref());
            text_element(&mut xml, "    ", "initrd", os.initrd.as_deref());
            text_element(&mut xml, "    ", "cmdline", os.cmdline.as_deref());
        }
        xml.push_str("  </os>\n");
        xml
    }

    fn build_features(&self) -> String {
        let f = &self.def.features;
        if !(f.pae || f.acpi || f.apic) {
            return String::new();
        }
        let mut xml = String::from("  <features>\n");
        for (name, on) in [("pae", f.pae), ("acpi", f.acpi), ("apic", f.apic)] {
            if on {
                let _ = writeln!(xml, "    <{}/>", name);
            }
        }
        xml.push_str("  </features>\n");
        xml
    }

    fn build_graphics(&self, graphics: &Graphics) -> String {
        let mut xml = String::from("    <graphics");
        match graphics {
            Graphics::Vnc(vnc) => {
                match vnc.port {
                    Some(port) => {
                        let _ = write!(xml, " type='vnc' port='{}' autoport='no'", port);
                    }
                    None => xml.push_str(" type='vnc' port='-1' autoport='yes'"),
                }
                attr(&mut xml, "listen", vnc.listen.as_deref());
                if self.secure {
                    attr(&mut xml, "passwd", vnc.passwd.as_deref());
                }
                attr(&mut xml, "keymap", vnc.keymap.as_deref());
            }
            Graphics::Sdl(sdl) => {
                xml.push_str(" type='sdl'");
                attr(&mut xml, "display", sdl.display.as_deref());
                attr(&mut xml, "xauth", sdl.xauthority.as_deref());
            }
        }
        xml.push_str("/>\n");
        xml
    }
}

fn build_disk(disk: &Disk) -> String {
    let mut xml = format!(
        "    <disk type='{}' device='{}'>\n",
        disk.disk_type.as_str(),
        disk.device.as_str()
    );
    if let Some(name) = &disk.driver_name {
        let _ = write!(xml, "      <driver name='{}'", escape(name));
        attr(&mut xml, "type", disk.driver_type.as_deref());
        xml.push_str("/>\n");
    }
    if let Some(source) = &disk.source {
        let key = match disk.disk_type {
            DiskType::File => "file",
            DiskType::Block => "dev",
        };
        let _ = writeln!(xml, "      <source {}='{}'/>", key, escape(source));
    }
    let _ = writeln!(
        xml,
        "      <target dev='{}' bus='{}'/>",
        escape(&disk.target),
        disk.bus.as_str()
    );
    if disk.readonly {
        xml.push_str("      <readonly/>\n");
    }
    if disk.shared {
        xml.push_str("      <shareable/>\n");
    }
    xml.push_str("    </disk>\n");
    xml
}

fn build_interface(net: &NetworkInterface) -> String {
    let mut xml = format!("    <interface type='{}'>\n", net.connection.type_name());
    let _ = writeln!(xml, "      <mac address='{}'/>", net.mac);
    match &net.connection {
        NetConnection::Bridge { bridge: Some(bridge) } => {
            let _ = writeln!(xml, "      <source bridge='{}'/>", escape(bridge));
        }
        NetConnection::Ethernet { dev: Some(dev) } => {
            let _ = writeln!(xml, "      <source dev='{}'/>", escape(dev));
        }
        NetConnection::Network { network } => {
            let _ = writeln!(xml, "      <source network='{}'/>", escape(network));
        }
        _ => {}
    }
    if let Some(script) = &net.script {
        let _ = writeln!(xml, "      <script path='{}'/>", escape(script));
    }
    if let Some(ip) = &net.ip {
        let _ = writeln!(xml, "      <ip address='{}'/>", escape(ip));
    }
    if let Some(model) = &net.model {
        let _ = writeln!(xml, "      <model type='{}'/>", escape(model));
    }
    xml.push_str("    </interface>\n");
    xml
}

fn build_chardev(element: &str, dev: &CharDevice, port: Option<u32>) -> String {
    let mut xml = format!("    <{} type='{}'>\n", element, dev.type_name());
    match dev {
        CharDevice::Null | CharDevice::Vc | CharDevice::Pty | CharDevice::Stdio => {}
        CharDevice::Dev { path } | CharDevice::File { path } | CharDevice::Pipe { path } => {
            let _ = writeln!(xml, "      <source path='{}'/>", escape(path));
        }
        CharDevice::Tcp { host, service, listen, telnet } => {
            let _ = writeln!(
                xml,
                "      <source mode='{}' host='{}' service='{}'/>",
                if *listen { "bind" } else { "connect" },
                escape(host),
                escape(service)
            );
            let _ = writeln!(
                xml,
                "      <protocol type='{}'/>",
                if *telnet { "telnet" } else { "raw" }
            );
        }
        CharDevice::Udp { connect_host, connect_service, bind_host, bind_service } => {
            if bind_host.is_some() || bind_service.is_some() {
                let mut src = String::from("      <source mode='bind'");
                attr(&mut src, "host", bind_host.as_deref());
                attr(&mut src, "service", bind_service.as_deref());
                let _ = writeln!(xml, "{}/>", src);
            }
            let mut src = String::from("      <source mode='connect'");
            attr(&mut src, "host", connect_host.as_deref());
            attr(&mut src, "service", Some(connect_service.as_str()));
            let _ = writeln!(xml, "{}/>", src);
        }
        CharDevice::Unix { path, listen } => {
            let _ = writeln!(
                xml,
                "      <source mode='{}' path='{}'/>",
                if *listen { "bind" } else { "connect" },
                escape(path)
            );
        }
    }
    if let Some(port) = port {
        let _ = writeln!(xml, "      <target port='{}'/>", port);
    }
    let _ = writeln!(xml, "    </{}>", element);
    xml
}

fn text_element(xml: &mut String, indent: &str, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = writeln!(xml, "{}<{}>{}</{}>", indent, name, escape(value), name);
    }
}

fn attr(xml: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = write!(xml, " {}='{}'", name, escape(value));
    }
}
