//! Resource tuning commands: `set-memory`, `set-max-memory`, `set-vcpus`, `pin`

use anyhow::{anyhow, Result};
use colored::Colorize;
use xmconf_core::{CpuSet, DomainStore, Session};

use super::lookup;

pub fn set_memory(store: &mut DomainStore, session: &Session, name: &str, kib: u64) -> Result<()> {
    let dom = lookup(store, session, name)?;
    store.set_memory(&dom, kib)?;
    let info = store.get_info(&dom)?;
    if info.memory_kib < kib {
        println!(
            "{} Requested {} KiB exceeds the maximum, clamped to {} KiB",
            "⚠".yellow().bold(),
            kib,
            info.memory_kib
        );
    }
    println!("{} {}: memory = {} KiB", "✓".green().bold(), name.bold(), info.memory_kib);
    Ok(())
}

pub fn set_max_memory(store: &mut DomainStore, session: &Session, name: &str, kib: u64) -> Result<()> {
    let dom = lookup(store, session, name)?;
    store.set_max_memory(&dom, kib)?;
    let info = store.get_info(&dom)?;
    println!(
        "{} {}: maxmem = {} KiB, memory = {} KiB",
        "✓".green().bold(),
        name.bold(),
        info.max_memory_kib,
        info.memory_kib
    );
    Ok(())
}

pub fn set_vcpus(store: &mut DomainStore, session: &Session, name: &str, count: u32) -> Result<()> {
    let dom = lookup(store, session, name)?;
    store.set_vcpus(&dom, count)?;
    println!("{} {}: vcpus = {}", "✓".green().bold(), name.bold(), count);
    Ok(())
}

/// Pin using a CPU list such as "0-3,^2"
pub fn pin(store: &mut DomainStore, session: &Session, name: &str, vcpu: u32, cpus: &str) -> Result<()> {
    let set: CpuSet = cpus.parse().map_err(|e| anyhow!("Invalid CPU list '{}': {}", cpus, e))?;
    let dom = lookup(store, session, name)?;
    store.pin_vcpu(&dom, vcpu, &set.to_bytes())?;
    println!("{} {}: cpus = {}", "✓".green().bold(), name.bold(), set);
    Ok(())
}
