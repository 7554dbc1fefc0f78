//! The domain store: public operations over the configuration cache.
//!
//! Everything here describes inactive domains. Handles returned by lookups
//! carry no runtime id; a caller that knows a domain is running sets one,
//! and every operation then refuses the handle.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::cache::{is_ignored, unix_now, CacheEntry, ConfigCache};
use crate::config::StoreConfig;
use crate::error::{Result, XmError};
use crate::host::RunningDomains;
use crate::observability::metrics::record_write;
use crate::translator::Translator;
use crate::types::cpuset::CpuSet;
use crate::types::domain::DomainDef;
use crate::xml::{parse_device_xml, parse_domain_xml, DeviceDef, DomainXmlBuilder};

/// Access requested when opening a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

/// One logical connection to the store. Obtained from
/// [`DomainStore::open`] and given back to [`DomainStore::close`].
#[derive(Debug)]
pub struct Session {
    read_only: bool,
}

impl Session {
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// A reference to one defined domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainHandle {
    pub name: String,
    pub uuid: Uuid,
    /// Runtime id; `None` while the domain is not running
    pub id: Option<u32>,
    /// Obtained through a read-only session
    pub read_only: bool,
}

impl DomainHandle {
    fn inactive(def: &DomainDef, read_only: bool) -> Self {
        Self { name: def.name.clone(), uuid: def.uuid, id: None, read_only }
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainState {
    Running,
    Shutoff,
}

impl fmt::Display for DomainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Shutoff => write!(f, "shut off"),
        }
    }
}

/// Resource summary of a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    pub state: DomainState,
    pub max_memory_kib: u64,
    pub memory_kib: u64,
    pub vcpus: u32,
    pub cpu_time_ns: u64,
}

/// Reference-counted owner of the configuration cache.
///
/// The cache lives as long as at least one session is open; the first
/// `open` starts from an empty cache that scans on its next refresh, and
/// the last `close` drops everything.
pub struct DomainStore {
    config: StoreConfig,
    translator: Translator,
    cache: ConfigCache,
    sessions: usize,
}

impl DomainStore {
    pub fn new(config: StoreConfig, translator: Translator) -> Self {
        let cache = ConfigCache::new(&config.config_dir, translator.clone(), config.refresh_interval());
        Self { config, translator, cache, sessions: 0 }
    }

    /// A store for a stock Xen host, speaking the configured format version.
    pub fn with_config(config: StoreConfig) -> Self {
        let translator = Translator::xen_default(config.format_version);
        Self::new(config, translator)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn session_count(&self) -> usize {
        self.sessions
    }

    pub fn open(&mut self, mode: OpenMode) -> Session {
        if self.sessions == 0 {
            self.cache.reset();
        }
        self.sessions += 1;
        Session { read_only: mode == OpenMode::ReadOnly }
    }

    pub fn close(&mut self, session: Session) {
        drop(session);
        self.sessions = self.sessions.saturating_sub(1);
        if self.sessions == 0 {
            self.cache.reset();
        }
    }

    #[instrument(skip(self, session))]
    pub fn lookup_by_name(&mut self, session: &Session, name: &str) -> Result<DomainHandle> {
        self.cache.refresh()?;
        let entry = self
            .cache
            .lookup_by_name(name)
            .ok_or_else(|| XmError::DomainNotFound { name: name.to_string() })?;
        Ok(DomainHandle::inactive(&entry.def, session.read_only))
    }

    #[instrument(skip(self, session))]
    pub fn lookup_by_uuid(&mut self, session: &Session, uuid: &Uuid) -> Result<DomainHandle> {
        self.cache.refresh()?;
        let entry = self
            .cache
            .lookup_by_uuid(uuid)
            .ok_or_else(|| XmError::NotFound { what: "Domain", key: uuid.to_string() })?;
        Ok(DomainHandle::inactive(&entry.def, session.read_only))
    }

    pub fn get_info(&self, dom: &DomainHandle) -> Result<DomainInfo> {
        let def = &self.entry(dom)?.def;
        Ok(DomainInfo {
            state: DomainState::Shutoff,
            max_memory_kib: def.max_memory_kib,
            memory_kib: def.memory_kib,
            vcpus: def.vcpus,
            cpu_time_ns: 0,
        })
    }

    pub fn get_max_memory(&self, dom: &DomainHandle) -> Result<u64> {
        Ok(self.entry(dom)?.def.max_memory_kib)
    }

    /// A copy of the cached definition.
    pub fn definition(&self, dom: &DomainHandle) -> Result<DomainDef> {
        Ok(self.entry(dom)?.def.clone())
    }

    /// Domain XML for `dom`. Secrets are included only when `secure`.
    pub fn dump_xml(&self, dom: &DomainHandle, secure: bool) -> Result<String> {
        Ok(DomainXmlBuilder::new(&self.entry(dom)?.def).secure(secure).build())
    }

    /// Set current memory, clamped to the ceiling.
    #[instrument(skip(self, dom), fields(name = %dom.name))]
    pub fn set_memory(&mut self, dom: &DomainHandle, kib: u64) -> Result<()> {
        self.modify(dom, "set_memory", |def| {
            def.set_memory(kib);
            Ok(())
        })
    }

    /// Set the memory ceiling; current memory follows it down.
    #[instrument(skip(self, dom), fields(name = %dom.name))]
    pub fn set_max_memory(&mut self, dom: &DomainHandle, kib: u64) -> Result<()> {
        self.modify(dom, "set_max_memory", |def| {
            def.set_max_memory(kib);
            Ok(())
        })
    }

    #[instrument(skip(self, dom), fields(name = %dom.name))]
    pub fn set_vcpus(&mut self, dom: &DomainHandle, vcpus: u32) -> Result<()> {
        if vcpus == 0 {
            return Err(XmError::invalid_arg("a domain needs at least one vcpu"));
        }
        self.modify(dom, "set_vcpus", |def| {
            def.vcpus = vcpus;
            Ok(())
        })
    }

    /// Restrict the domain to the CPUs set in `cpumap` (bit `j` of byte `i`
    /// is CPU `8i + j`). The mask applies to every vcpu; `vcpu` is accepted
    /// for interface compatibility.
    #[instrument(skip(self, dom, cpumap), fields(name = %dom.name, maplen = cpumap.len()))]
    pub fn pin_vcpu(&mut self, dom: &DomainHandle, vcpu: u32, cpumap: &[u8]) -> Result<()> {
        let mask = CpuSet::from_bytes(cpumap).map_err(XmError::invalid_arg)?;
        if mask.is_empty() {
            return Err(XmError::invalid_arg("cpu map selects no cpus"));
        }
        self.modify(dom, "pin_vcpu", |def| {
            def.cpumask = Some(mask);
            Ok(())
        })
    }

    /// Create or replace the definition described by `xml` and write it
    /// to `<config_dir>/<name>`.
    #[instrument(skip(self, session, xml))]
    pub fn define_xml(&mut self, session: &Session, xml: &str) -> Result<DomainHandle> {
        if session.read_only {
            return Err(XmError::ReadOnly { operation: "define" });
        }
        self.cache.refresh()?;

        let def = parse_domain_xml(xml, self.translator.capabilities())?;
        let path = self.definition_path(&def.name)?;

        let written = self.translator.write_file(&path, &def);
        record_write("define", written.is_ok());
        written?;

        let handle = DomainHandle::inactive(&def, session.read_only);
        info!(name = %def.name, path = %path.display(), "defined domain");
        self.cache.insert_or_replace(path, def, unix_now());
        Ok(handle)
    }

    /// Delete the domain's file and forget it.
    #[instrument(skip(self, dom), fields(name = %dom.name))]
    pub fn undefine(&mut self, dom: &DomainHandle) -> Result<()> {
        check_writable(dom, "undefine")?;
        let path = self
            .cache
            .owner_of(&dom.name)
            .map(|p| p.to_path_buf())
            .ok_or_else(|| XmError::DomainNotFound { name: dom.name.clone() })?;

        std::fs::remove_file(&path).map_err(|e| XmError::io(&path, e))?;
        self.cache.remove(&path);
        info!(path = %path.display(), "undefined domain");
        Ok(())
    }

    /// Add the disk or interface described by `xml`.
    ///
    /// Disks are placed in bus/target order; interfaces are appended.
    #[instrument(skip(self, dom, xml), fields(name = %dom.name))]
    pub fn attach_device(&mut self, dom: &DomainHandle, xml: &str) -> Result<()> {
        self.modify(dom, "attach_device", |def| {
            match parse_device_xml(xml, def.is_hvm())? {
                DeviceDef::Disk(disk) => def.insert_disk(disk),
                DeviceDef::Net(net) => def.push_net(net),
            }
            Ok(())
        })
    }

    /// Remove the disk (matched by target) or interface (matched by MAC)
    /// described by `xml`.
    #[instrument(skip(self, dom, xml), fields(name = %dom.name))]
    pub fn detach_device(&mut self, dom: &DomainHandle, xml: &str) -> Result<()> {
        self.modify(dom, "detach_device", |def| {
            match parse_device_xml(xml, def.is_hvm())? {
                DeviceDef::Disk(disk) => {
                    def.remove_disk(&disk.target)
                        .ok_or(XmError::NotFound { what: "Disk", key: disk.target })?;
                }
                DeviceDef::Net(net) => {
                    def.remove_net(&net.mac)
                        .ok_or_else(|| XmError::NotFound { what: "Interface", key: net.mac.to_string() })?;
                }
            }
            Ok(())
        })
    }

    /// Up to `max` defined names that `running` does not report as running.
    #[instrument(skip(self, running))]
    pub fn list_defined(&mut self, max: usize, running: &dyn RunningDomains) -> Result<Vec<String>> {
        self.cache.refresh()?;
        let mut names = self.cache.list_names(|name| running.is_running(name));
        names.truncate(max.min(self.cache.size()));
        Ok(names)
    }

    /// Number of defined names, running or not.
    pub fn num_of_defined(&mut self) -> Result<usize> {
        self.cache.refresh()?;
        Ok(self.cache.name_count())
    }

    fn entry(&self, dom: &DomainHandle) -> Result<&CacheEntry> {
        check_inactive(dom)?;
        self.cache
            .lookup_by_name(&dom.name)
            .ok_or_else(|| XmError::DomainNotFound { name: dom.name.clone() })
    }

    /// Apply `change` to the cached definition and write it back.
    ///
    /// A failed write leaves the in-memory change in place.
    fn modify<F>(&mut self, dom: &DomainHandle, operation: &'static str, change: F) -> Result<()>
    where
        F: FnOnce(&mut DomainDef) -> Result<()>,
    {
        check_writable(dom, operation)?;
        let entry = self
            .cache
            .lookup_by_name_mut(&dom.name)
            .ok_or_else(|| XmError::DomainNotFound { name: dom.name.clone() })?;
        change(&mut entry.def)?;

        let written = self.translator.write_file(&entry.path, &entry.def);
        record_write(operation, written.is_ok());
        written?;
        entry.refreshed_at = unix_now();
        Ok(())
    }

    fn definition_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name == ".." || is_ignored(name) {
            return Err(XmError::invalid_arg(format!("'{}' cannot be used as a config file name", name)));
        }
        let path = self.config.config_dir.join(name);
        if path.as_os_str().len() >= self.config.max_path_len {
            return Err(XmError::invalid_arg("config file name is too long"));
        }
        Ok(path)
    }
}

impl fmt::Debug for DomainStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainStore")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("cache", &self.cache)
            .finish()
    }
}

fn check_inactive(dom: &DomainHandle) -> Result<()> {
    match dom.id {
        Some(id) => Err(XmError::InvalidState {
            name: dom.name.clone(),
            reason: format!("domain is running with id {}", id),
        }),
        None => Ok(()),
    }
}

fn check_writable(dom: &DomainHandle, operation: &'static str) -> Result<()> {
    if dom.read_only {
        return Err(XmError::ReadOnly { operation });
    }
    check_inactive(dom)
}
