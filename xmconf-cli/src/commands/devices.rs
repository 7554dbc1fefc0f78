//! `xmconf attach` and `xmconf detach`

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use xmconf_core::{DomainStore, Session};

use super::{lookup, read_document};

pub fn attach(store: &mut DomainStore, session: &Session, name: &str, file: &Path) -> Result<()> {
    let xml = read_document(file)?;
    let dom = lookup(store, session, name)?;
    store.attach_device(&dom, &xml)?;
    println!("{} Device attached to {}", "✓".green().bold(), name.bold());
    Ok(())
}

pub fn detach(store: &mut DomainStore, session: &Session, name: &str, file: &Path) -> Result<()> {
    let xml = read_document(file)?;
    let dom = lookup(store, session, name)?;
    store.detach_device(&dom, &xml)?;
    println!("{} Device detached from {}", "✓".green().bold(), name.bold());
    Ok(())
}
