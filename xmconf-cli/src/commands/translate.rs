//! `xmconf translate`: offline conversion without touching the definitions directory

use std::path::Path;

use anyhow::Result;
use xmconf_core::Translator;

use super::read_document;

pub fn to_xml(translator: &Translator, file: &Path) -> Result<()> {
    let text = read_document(file)?;
    print!("{}", translator.config_to_xml(&text)?);
    Ok(())
}

pub fn to_conf(translator: &Translator, file: &Path) -> Result<()> {
    let xml = read_document(file)?;
    print!("{}", translator.xml_to_config(&xml)?);
    Ok(())
}
