//! `xmconf list`, `info`, `dump`, `define` and `undefine`

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};
use xmconf_core::{types::NetConnection, DomainStore, Session};

use super::{lookup, read_document};

#[derive(Tabled)]
struct DomainRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "TYPE")]
    mode: String,
    #[tabled(rename = "VCPUS")]
    vcpus: u32,
    #[tabled(rename = "MEMORY")]
    memory: String,
}

/// List defined domains that are not running
pub fn list(store: &mut DomainStore, session: &Session, max: Option<usize>, running: Vec<String>) -> Result<()> {
    let running: HashSet<String> = running.into_iter().collect();
    let names = store.list_defined(max.unwrap_or(usize::MAX), &running)?;

    if names.is_empty() {
        println!("No inactive domains defined");
        return Ok(());
    }

    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let dom = lookup(store, session, &name)?;
        let def = store.definition(&dom)?;
        rows.push(DomainRow {
            name: def.name,
            uuid: def.uuid.to_string(),
            mode: def.os.mode.to_string(),
            vcpus: def.vcpus,
            memory: format!("{}M", def.memory_kib / 1024),
        });
    }

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);

    Ok(())
}

/// Show details of one domain
pub fn info(store: &mut DomainStore, session: &Session, name: &str) -> Result<()> {
    let dom = lookup(store, session, name)?;
    let info = store.get_info(&dom)?;
    let def = store.definition(&dom)?;

    println!("{}", "Domain Details".bold().underline());
    println!();
    println!("{}: {}", "Name".bold(), def.name);
    println!("{}: {}", "UUID".bold(), def.uuid);
    println!("{}: {}", "Type".bold(), def.os.mode);
    println!("{}: {}", "State".bold(), info.state.to_string().dimmed());
    println!("{}: {}", "Max memory".bold(), format!("{} KiB", info.max_memory_kib));
    println!("{}: {}", "Used memory".bold(), format!("{} KiB", info.memory_kib));
    println!("{}: {}", "CPU(s)".bold(), info.vcpus);
    if let Some(mask) = &def.cpumask {
        println!("{}: {}", "CPU affinity".bold(), mask);
    }
    println!();

    if !def.disks.is_empty() {
        #[derive(Tabled)]
        struct DiskRow {
            #[tabled(rename = "TARGET")]
            target: String,
            #[tabled(rename = "BUS")]
            bus: String,
            #[tabled(rename = "DEVICE")]
            device: String,
            #[tabled(rename = "SOURCE")]
            source: String,
            #[tabled(rename = "MODE")]
            mode: String,
        }

        let rows: Vec<DiskRow> = def
            .disks
            .iter()
            .map(|d| DiskRow {
                target: d.target.clone(),
                bus: d.bus.as_str().to_string(),
                device: d.device.as_str().to_string(),
                source: d.source.clone().unwrap_or_else(|| "-".to_string()),
                mode: if d.readonly { "ro" } else { "rw" }.to_string(),
            })
            .collect();

        println!("{}", "Disks:".bold());
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
    }

    if !def.nets.is_empty() {
        #[derive(Tabled)]
        struct NetRow {
            #[tabled(rename = "MAC")]
            mac: String,
            #[tabled(rename = "TYPE")]
            kind: String,
            #[tabled(rename = "SOURCE")]
            source: String,
        }

        let rows: Vec<NetRow> = def
            .nets
            .iter()
            .map(|n| NetRow {
                mac: n.mac.to_string(),
                kind: n.connection.type_name().to_string(),
                source: match &n.connection {
                    NetConnection::Bridge { bridge } => bridge.clone(),
                    NetConnection::Ethernet { dev } => dev.clone(),
                    NetConnection::Network { network } => Some(network.clone()),
                }
                .unwrap_or_else(|| "-".to_string()),
            })
            .collect();

        println!("{}", "Interfaces:".bold());
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
    }

    Ok(())
}

/// Print the domain XML
pub fn dump(store: &mut DomainStore, session: &Session, name: &str, secure: bool) -> Result<()> {
    let dom = lookup(store, session, name)?;
    print!("{}", store.dump_xml(&dom, secure)?);
    Ok(())
}

/// Define a domain from an XML file
pub fn define(store: &mut DomainStore, session: &Session, file: &Path) -> Result<()> {
    let xml = read_document(file)?;
    let dom = store.define_xml(session, &xml)?;
    println!("{} Domain defined: {} ({})", "✓".green().bold(), dom.name.bold(), dom.uuid.to_string().dimmed());
    Ok(())
}

/// Remove a domain definition
pub fn undefine(store: &mut DomainStore, session: &Session, name: &str) -> Result<()> {
    let dom = lookup(store, session, name)?;
    store.undefine(&dom)?;
    println!("{} Domain undefined: {}", "✓".green().bold(), name.bold());
    Ok(())
}
