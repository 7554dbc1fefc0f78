//! Directory-backed cache of parsed domain definitions.
//!
//! The configuration directory is the source of truth and may be edited
//! behind our back, so the cache rescans it (at most once per refresh
//! interval) and compares modification times to decide what to re-parse.
//!
//! Entries are owned by a path-keyed map. A secondary name index points each
//! domain name at exactly one owning path; it is only ever changed through
//! [`ConfigCache::claim_name`] and [`ConfigCache::release_name`].

use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metrics::counter;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, XmError};
use crate::translator::Translator;
use crate::types::domain::DomainDef;

/// Default minimum gap between two directory scans.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// File name prefixes that are never domain definitions.
const IGNORED_PREFIXES: &[&str] = &[".", "xend-config.sxp", "xend-pci-", "xmexample", "qemu-ifup"];

/// One parsed definition and where it came from.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub def: DomainDef,
    /// Unix time of the last scan that saw this file
    pub refreshed_at: i64,
}

/// Whether a directory entry name should be skipped by a scan.
pub fn is_ignored(file_name: &str) -> bool {
    IGNORED_PREFIXES.iter().any(|p| file_name.starts_with(p))
        || file_name.starts_with('#')
        || file_name.ends_with('~')
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> i64 {
    to_unix(SystemTime::now())
}

fn to_unix(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH).map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

fn mtime(meta: &Metadata) -> i64 {
    meta.modified().map_or(0, to_unix)
}

pub struct ConfigCache {
    dir: PathBuf,
    translator: Translator,
    refresh_interval: i64,
    last_refresh: Option<i64>,
    by_path: BTreeMap<PathBuf, CacheEntry>,
    by_name: BTreeMap<String, PathBuf>,
}

impl ConfigCache {
    pub fn new(dir: impl Into<PathBuf>, translator: Translator, refresh_interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            translator,
            refresh_interval: i64::try_from(refresh_interval.as_secs()).unwrap_or(i64::MAX),
            last_refresh: None,
            by_path: BTreeMap::new(),
            by_name: BTreeMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Drop every entry and forget the last scan time.
    pub fn reset(&mut self) {
        self.by_path.clear();
        self.by_name.clear();
        self.last_refresh = None;
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.refresh_at(unix_now())
    }

    /// Rescan the directory as of `now` (Unix seconds).
    ///
    /// Does nothing if the previous scan was less than the refresh interval
    /// ago. A file that fails to parse is dropped from the cache without
    /// failing the scan; failing to read the directory itself is an error.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn refresh_at(&mut self, now: i64) -> Result<()> {
        if let Some(last) = self.last_refresh {
            if now - last < self.refresh_interval {
                return Ok(());
            }
        }

        let listing = std::fs::read_dir(&self.dir).map_err(|e| XmError::io(&self.dir, e))?;
        self.last_refresh = Some(now);
        counter!("xmconf_cache_refresh_total").increment(1);

        for dirent in listing {
            let dirent = dirent.map_err(|e| XmError::io(&self.dir, e))?;
            let file_name = dirent.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if is_ignored(file_name) {
                continue;
            }

            let path = dirent.path();
            let meta = match std::fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "cannot stat config file");
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }
            self.refresh_file(path, mtime(&meta), now);
        }

        self.reap(now);
        debug!(entries = self.by_path.len(), names = self.by_name.len(), "config cache refreshed");
        Ok(())
    }

    fn refresh_file(&mut self, path: PathBuf, modified: i64, now: i64) {
        if let Some(entry) = self.by_path.get_mut(&path) {
            if entry.refreshed_at >= modified {
                entry.refreshed_at = now;
                return;
            }
            let old_name = entry.def.name.clone();
            self.release_name(&old_name, &path);
        }

        match self.translator.read_file(&path) {
            Ok(def) => {
                let name = def.name.clone();
                self.by_path.insert(path.clone(), CacheEntry { path: path.clone(), def, refreshed_at: now });
                self.claim_name(&name, &path, false);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse domain config");
                counter!("xmconf_cache_parse_failures_total").increment(1);
                self.by_path.remove(&path);
            }
        }
    }

    /// Remove every entry the scan at `now` did not see.
    fn reap(&mut self, now: i64) {
        let stale: Vec<PathBuf> = self
            .by_path
            .values()
            .filter(|e| e.refreshed_at != now)
            .map(|e| e.path.clone())
            .collect();
        for path in stale {
            if let Some(entry) = self.remove(&path) {
                debug!(path = %path.display(), name = %entry.def.name, "reaped config entry");
                counter!("xmconf_cache_reaped_total").increment(1);
            }
        }
    }

    /// Point `name` at `path`. Without `force`, an existing owner wins.
    fn claim_name(&mut self, name: &str, path: &Path, force: bool) {
        if force || !self.by_name.contains_key(name) {
            self.by_name.insert(name.to_string(), path.to_path_buf());
        }
    }

    /// Drop `path`'s ownership of `name`, handing the name to the first
    /// other entry that carries it.
    fn release_name(&mut self, name: &str, path: &Path) {
        if self.by_name.get(name).map(PathBuf::as_path) != Some(path) {
            return;
        }
        self.by_name.remove(name);
        let heir = self
            .by_path
            .values()
            .find(|e| e.def.name == name && e.path != path)
            .map(|e| e.path.clone());
        if let Some(heir) = heir {
            self.by_name.insert(name.to_string(), heir);
        }
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&CacheEntry> {
        let found = self.by_name.get(name).and_then(|p| self.by_path.get(p));
        record_lookup(found.is_some());
        found
    }

    pub fn lookup_by_name_mut(&mut self, name: &str) -> Option<&mut CacheEntry> {
        let path = self.by_name.get(name)?;
        self.by_path.get_mut(path)
    }

    /// Linear scan; the cache holds one entry per file.
    pub fn lookup_by_uuid(&self, uuid: &Uuid) -> Option<&CacheEntry> {
        let found = self.by_path.values().find(|e| e.def.uuid == *uuid);
        record_lookup(found.is_some());
        found
    }

    /// Owned names, sorted, minus those `exclude` rejects.
    pub fn list_names(&self, exclude: impl Fn(&str) -> bool) -> Vec<String> {
        self.by_name.keys().filter(|n| !exclude(n)).cloned().collect()
    }

    /// Path currently owning `name`.
    pub fn owner_of(&self, name: &str) -> Option<&Path> {
        self.by_name.get(name).map(PathBuf::as_path)
    }

    /// Store `def` at `path`, evicting whatever owned its name or sat at
    /// that path. The new entry always owns its name.
    pub fn insert_or_replace(&mut self, path: PathBuf, def: DomainDef, now: i64) {
        if let Some(owner) = self.by_name.get(&def.name).cloned() {
            self.remove(&owner);
        }
        self.remove(&path);
        let name = def.name.clone();
        self.by_path.insert(path.clone(), CacheEntry { path: path.clone(), def, refreshed_at: now });
        self.claim_name(&name, &path, true);
    }

    pub fn remove(&mut self, path: &Path) -> Option<CacheEntry> {
        let entry = self.by_path.remove(path)?;
        self.release_name(&entry.def.name, path);
        Some(entry)
    }

    /// Number of cached files.
    pub fn size(&self) -> usize {
        self.by_path.len()
    }

    /// Number of distinct owned names.
    pub fn name_count(&self) -> usize {
        self.by_name.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.by_path.values()
    }
}

fn record_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("xmconf_cache_lookup_total", "result" => result).increment(1);
}

impl std::fmt::Debug for ConfigCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigCache")
            .field("dir", &self.dir)
            .field("entries", &self.by_path.len())
            .field("names", &self.by_name)
            .field("last_refresh", &self.last_refresh)
            .finish()
    }
}
