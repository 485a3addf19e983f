use indexmap::IndexMap;

use crate::errors::{GeoError, Result};

/// Metadata domains of a dataset, band or layer.
///
/// Each domain is a list of `KEY=VALUE` items. The default domain is the empty
/// string. Domains whose name starts with `xml:` hold a single raw XML document
/// instead of key/value pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataStore {
    description: String,
    domains: IndexMap<String, Vec<String>>,
}

/// A single metadata item, as returned by [`Metadata::metadata`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataEntry {
    pub domain: String,
    pub key: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(domain: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Returns `true` for domains holding one XML document rather than key/value items.
pub fn is_xml_domain(domain: &str) -> bool {
    domain.starts_with("xml:")
}

fn split_item(item: &str) -> (&str, &str) {
    item.split_once('=').unwrap_or((item, ""))
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn domain_items(&self, domain: &str) -> Option<&Vec<String>> {
        self.domains.get(domain)
    }

    pub(crate) fn set_item(&mut self, key: &str, value: &str, domain: &str) -> Result<()> {
        if key.is_empty() || key.contains('=') {
            return Err(GeoError::BadArgument(format!(
                "invalid metadata key '{key}'"
            )));
        }
        if is_xml_domain(domain) {
            return Err(GeoError::BadArgument(format!(
                "domain '{domain}' holds an XML document, use set_metadata_domain"
            )));
        }
        let items = self.domains.entry(domain.to_string()).or_default();
        let new_item = format!("{key}={value}");
        match items
            .iter_mut()
            .find(|item| split_item(item).0.eq_ignore_ascii_case(key))
        {
            Some(existing) => *existing = new_item,
            None => items.push(new_item),
        }
        Ok(())
    }

    pub(crate) fn set_domain(&mut self, domain: &str, items: Vec<String>) {
        self.domains.insert(domain.to_string(), items);
    }
}

/// Access to metadata domains, shared by [`crate::Dataset`],
/// [`crate::raster::RasterBand`] and [`crate::vector::Layer`].
pub trait Metadata {
    fn metadata_store(&self) -> &MetadataStore;
    fn metadata_store_mut(&mut self) -> &mut MetadataStore;

    fn description(&self) -> String {
        self.metadata_store().description.clone()
    }

    fn set_description(&mut self, description: &str) {
        self.metadata_store_mut().description = description.to_string();
    }

    /// Names of all domains holding metadata, in insertion order.
    fn metadata_domains(&self) -> Vec<String> {
        self.metadata_store().domains.keys().cloned().collect()
    }

    /// Raw items of `domain`, or `None` if the domain is not declared.
    fn metadata_domain(&self, domain: &str) -> Option<Vec<String>> {
        self.metadata_store().domain_items(domain).cloned()
    }

    fn metadata_item(&self, key: &str, domain: &str) -> Option<String> {
        self.metadata_store()
            .domain_items(domain)?
            .iter()
            .map(|item| split_item(item))
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.to_string())
    }

    fn set_metadata_item(&mut self, key: &str, value: &str, domain: &str) -> Result<()> {
        self.metadata_store_mut().set_item(key, value, domain)
    }

    /// Replace the whole content of `domain`.
    fn set_metadata_domain(&mut self, domain: &str, items: Vec<String>) {
        self.metadata_store_mut().set_domain(domain, items);
    }

    /// All key/value items of all non-XML domains.
    fn metadata(&self) -> Vec<MetadataEntry> {
        self.metadata_store()
            .domains
            .iter()
            .filter(|(domain, _)| !is_xml_domain(domain))
            .flat_map(|(domain, items)| {
                items.iter().map(move |item| {
                    let (key, value) = split_item(item);
                    MetadataEntry::new(domain.as_str(), key, value)
                })
            })
            .collect()
    }
}

impl Metadata for MetadataStore {
    fn metadata_store(&self) -> &MetadataStore {
        self
    }

    fn metadata_store_mut(&mut self) -> &mut MetadataStore {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_item() {
        let mut md = MetadataStore::new();
        md.set_metadata_item("AREA_OR_POINT", "Area", "").unwrap();
        md.set_metadata_item("BLOCKA", "010000001000000000", "TRE")
            .unwrap();
        assert_eq!(md.metadata_item("area_or_point", ""), Some("Area".into()));
        assert_eq!(md.metadata_domains(), vec!["".to_string(), "TRE".into()]);
        assert_eq!(md.metadata_item("BLOCKA", ""), None);
    }

    #[test]
    fn test_set_item_replaces_existing_key() {
        let mut md = MetadataStore::new();
        md.set_metadata_item("K", "1", "").unwrap();
        md.set_metadata_item("k", "2", "").unwrap();
        assert_eq!(md.metadata_domain(""), Some(vec!["k=2".to_string()]));
    }

    #[test]
    fn test_xml_domain_is_raw() {
        let mut md = MetadataStore::new();
        md.set_metadata_domain("xml:XMP", vec!["<x:xmpmeta/>".into()]);
        assert!(md.set_metadata_item("a", "b", "xml:XMP").is_err());
        assert!(md.metadata().is_empty());
        assert_eq!(md.metadata_domain("xml:XMP").unwrap()[0], "<x:xmpmeta/>");
    }

    #[test]
    fn test_undeclared_domain() {
        let md = MetadataStore::new();
        assert!(md.metadata_domain("TRE").is_none());
    }
}
