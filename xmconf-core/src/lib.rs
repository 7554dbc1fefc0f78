//! xmconf Core Library
//!
//! Directory-backed cache of inactive Xen domain definitions kept in the
//! xm configuration format, with translation to and from domain XML.

pub mod cache;
pub mod conf;
pub mod config;
pub mod error;
pub mod host;
pub mod minilang;
pub mod observability;
pub mod paths;
pub mod store;
pub mod translator;
pub mod types;
pub mod xml;

// Re-export commonly used items
pub use cache::{CacheEntry, ConfigCache};
pub use conf::{ConfDocument, ConfValue};
pub use config::StoreConfig;
pub use error::{Result, XmError};
pub use host::{GuestCapabilities, HostCapabilities, NetworkResolver, NoneRunning, RunningDomains, StaticNetworks};
pub use observability::init as init_observability;
pub use store::{DomainHandle, DomainInfo, DomainState, DomainStore, OpenMode, Session};
pub use translator::{Translator, LATEST_FORMAT_VERSION};
pub use types::{CpuSet, Disk, DomainDef, MacAddr, NetworkInterface};
pub use xml::{parse_device_xml, parse_domain_xml, DeviceDef, DomainXmlBuilder};
