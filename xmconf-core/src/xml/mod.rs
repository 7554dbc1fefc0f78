//! The structured domain document (libvirt-style XML).
//!
//! Definitions are exported with [`DomainXmlBuilder`] and read back with
//! [`parse_domain_xml`] / [`parse_device_xml`]. The translator's format
//! direction goes through this document so both representations stay in
//! step.

mod builder;
mod parser;
pub(crate) mod query;

pub use builder::DomainXmlBuilder;
pub use parser::{parse_device_xml, parse_domain_xml, DeviceDef};
pub(crate) use parser::{
    parse_chardev_node, parse_disk_node, parse_graphics_node, parse_interface_node,
};

/// Escape text for use in element content or a single-quoted attribute.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
