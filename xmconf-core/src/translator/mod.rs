//! Conversion between configuration documents and domain definitions.
//!
//! The parse direction reads a [`ConfDocument`] field by field. The format
//! direction renders the definition to domain XML first and reads the XML
//! back, so the configuration file and the exported document cannot drift
//! apart.

mod format;
mod parse;

use std::path::Path;
use std::sync::Arc;

use tracing::instrument;

use crate::conf::ConfDocument;
use crate::error::Result;
use crate::host::{GuestCapabilities, HostCapabilities, NetworkResolver, StaticNetworks};
use crate::types::domain::DomainDef;
use crate::xml::{parse_domain_xml, DomainXmlBuilder};

/// Newest configuration-format version understood.
pub const LATEST_FORMAT_VERSION: u32 = 3;

/// Translates between the xm configuration dialect and [`DomainDef`].
#[derive(Clone)]
pub struct Translator {
    caps: Arc<dyn GuestCapabilities>,
    networks: Arc<dyn NetworkResolver>,
    format_version: u32,
}

impl Translator {
    pub fn new(
        caps: Arc<dyn GuestCapabilities>,
        networks: Arc<dyn NetworkResolver>,
        format_version: u32,
    ) -> Self {
        Self { caps, networks, format_version }
    }

    /// A translator for a stock Xen host with no virtual networks.
    pub fn xen_default(format_version: u32) -> Self {
        Self::new(
            Arc::new(HostCapabilities::xen_default()),
            Arc::new(StaticNetworks::default()),
            format_version,
        )
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn capabilities(&self) -> &dyn GuestCapabilities {
        self.caps.as_ref()
    }

    /// Configuration document → definition.
    pub fn parse(&self, conf: &ConfDocument) -> Result<DomainDef> {
        parse::parse_config(conf, self.caps.as_ref(), self.format_version)
    }

    /// Definition → configuration document.
    pub fn format(&self, def: &DomainDef) -> Result<ConfDocument> {
        format::format_config(def, self.networks.as_ref(), self.format_version)
    }

    /// Read and parse a domain configuration file.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn read_file(&self, path: &Path) -> Result<DomainDef> {
        self.parse(&ConfDocument::read_file(path)?)
    }

    /// Format a definition and write it to `path`.
    #[instrument(skip(self, def), fields(path = %path.display(), name = %def.name))]
    pub fn write_file(&self, path: &Path, def: &DomainDef) -> Result<()> {
        self.format(def)?.write_file(path)
    }

    /// Configuration text → domain XML.
    pub fn config_to_xml(&self, text: &str) -> Result<String> {
        let def = self.parse(&ConfDocument::parse(text)?)?;
        Ok(DomainXmlBuilder::new(&def).secure(true).build())
    }

    /// Domain XML → configuration text.
    pub fn xml_to_config(&self, xml: &str) -> Result<String> {
        let def = parse_domain_xml(xml, self.caps.as_ref())?;
        Ok(self.format(&def)?.to_string())
    }
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator").field("format_version", &self.format_version).finish()
    }
}
