//! CLI command implementations

pub mod devices;
pub mod domains;
pub mod translate;
pub mod tune;

use std::path::Path;

use anyhow::{Context, Result};
use xmconf_core::{DomainHandle, DomainStore, Session};

/// Resolve a domain name to a handle.
fn lookup(store: &mut DomainStore, session: &Session, name: &str) -> Result<DomainHandle> {
    store.lookup_by_name(session, name).with_context(|| format!("Cannot find domain '{}'", name))
}

fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
