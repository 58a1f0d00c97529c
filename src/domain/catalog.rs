//! In-memory index of every valid record ID, per domain.
//!
//! The [`Catalog`] knows nothing about the filesystem. It is built in one go
//! from decoded [`Record`]s and is read-only afterwards; rebuilding means
//! constructing a new catalog.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use crate::domain::{
    record::Record,
    resolver::{self, ReferenceInfo},
    schema::{DomainSchema, SchemaError},
};

/// Display metadata kept for every indexed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    name: String,
    title: String,
}

impl RecordMeta {
    /// The record's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The record's title (its name if no title was set).
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// The indexed records of one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainEntries {
    records: HashMap<String, RecordMeta>,
}

impl DomainEntries {
    /// Whether `id` is a member of this domain.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Metadata of the record with the given ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RecordMeta> {
        self.records.get(id)
    }

    /// Iterates over every ID in this domain, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// The number of records in this domain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether this domain has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<Record> for DomainEntries {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        let records = iter
            .into_iter()
            .map(|record| {
                let meta = RecordMeta {
                    name: record.name().to_string(),
                    title: record.title().to_string(),
                };
                (record.id().to_string(), meta)
            })
            .collect();
        Self { records }
    }
}

/// A complete, immutable index of all domains.
///
/// Every configured domain has an entry, possibly empty. Queries naming a
/// domain the schema does not configure return [`SchemaError::UnknownDomain`].
#[derive(Debug, Clone)]
pub struct Catalog {
    schema: Arc<DomainSchema>,
    domains: HashMap<String, DomainEntries>,
}

impl Catalog {
    /// Creates a catalog with an empty entry for every configured domain.
    #[must_use]
    pub fn new(schema: Arc<DomainSchema>) -> Self {
        let domains = schema
            .domains()
            .map(|domain| (domain.name().to_string(), DomainEntries::default()))
            .collect();
        Self { schema, domains }
    }

    /// Replaces the entries of one domain.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn insert_domain(
        &mut self,
        domain: &str,
        entries: DomainEntries,
    ) -> Result<(), SchemaError> {
        let slot = self
            .domains
            .get_mut(domain)
            .ok_or_else(|| SchemaError::UnknownDomain(domain.to_string()))?;
        *slot = entries;
        Ok(())
    }

    /// The schema this catalog was built against.
    #[must_use]
    pub fn schema(&self) -> &DomainSchema {
        &self.schema
    }

    /// The indexed records of a domain.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn entries(&self, domain: &str) -> Result<&DomainEntries, SchemaError> {
        self.domains
            .get(domain)
            .ok_or_else(|| SchemaError::UnknownDomain(domain.to_string()))
    }

    /// Whether `id` is a valid record ID in `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn is_valid(&self, domain: &str, id: &str) -> Result<bool, SchemaError> {
        Ok(self.entries(domain)?.contains(id))
    }

    /// A copy of every ID in `domain`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn all_ids(&self, domain: &str) -> Result<BTreeSet<String>, SchemaError> {
        Ok(self
            .entries(domain)?
            .ids()
            .map(str::to_string)
            .collect())
    }

    /// Metadata of a record, if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn record(&self, domain: &str, id: &str) -> Result<Option<&RecordMeta>, SchemaError> {
        Ok(self.entries(domain)?.get(id))
    }

    /// Classifies a reference and proposes repairs if it is broken.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    /// A reference that does not exist is not an error.
    pub fn resolve(&self, domain: &str, id: &str) -> Result<ReferenceInfo, SchemaError> {
        let config = self.schema.domain(domain)?;
        let entries = self.entries(domain)?;
        Ok(resolver::resolve(entries, config, id))
    }

    /// Iterates over `(domain, record count)` pairs in domain order.
    pub fn counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.schema.domains().map(|domain| {
            let count = self.domains.get(domain.name()).map_or(0, DomainEntries::len);
            (domain.name(), count)
        })
    }

    /// The total number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.values().map(DomainEntries::len).sum()
    }

    /// Whether no domain has any records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A small catalog over the standard schema used across the domain tests.
    pub(crate) fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new(Arc::new(DomainSchema::standard()));

        let record = |id: &str, name: &str| Record::new(id, name, None).unwrap();

        catalog
            .insert_domain(
                "contaminants",
                [
                    record("rust-contamination", "Rust"),
                    record("paint-residue-contamination", "Paint Residue"),
                    record("oil-film-contamination", "Oil Film"),
                ]
                .into_iter()
                .collect(),
            )
            .unwrap();
        catalog
            .insert_domain(
                "materials",
                [
                    Record::new("aluminum", "Aluminum", Some("Aluminum Laser Cleaning".into()))
                        .unwrap(),
                    record("steel", "Steel"),
                    record("copper", "Copper"),
                ]
                .into_iter()
                .collect(),
            )
            .unwrap();
        catalog
            .insert_domain(
                "compounds",
                [
                    record("iron-oxide-compound", "Iron Oxide"),
                    record("copper-carbonate-hydroxide-compound", "Malachite"),
                ]
                .into_iter()
                .collect(),
            )
            .unwrap();

        catalog
    }

    #[test]
    fn every_inserted_record_is_valid() {
        let catalog = sample_catalog();

        for domain in ["contaminants", "materials", "compounds"] {
            for id in catalog.all_ids(domain).unwrap() {
                assert!(catalog.is_valid(domain, &id).unwrap(), "{domain}/{id}");
            }
        }
        assert_eq!(catalog.len(), 8);
    }

    #[test]
    fn configured_but_unloaded_domain_is_empty() {
        let catalog = sample_catalog();

        assert!(catalog.all_ids("settings").unwrap().is_empty());
        assert!(!catalog.is_valid("settings", "aluminum-settings").unwrap());
    }

    #[test]
    fn unknown_domain_is_an_error() {
        let mut catalog = sample_catalog();

        assert!(matches!(
            catalog.is_valid("recipes", "cake"),
            Err(SchemaError::UnknownDomain(_))
        ));
        assert!(matches!(
            catalog.insert_domain("recipes", DomainEntries::default()),
            Err(SchemaError::UnknownDomain(_))
        ));
    }

    #[test]
    fn all_ids_is_a_copy() {
        let catalog = sample_catalog();

        let mut ids = catalog.all_ids("materials").unwrap();
        ids.insert("unobtainium".to_string());

        assert!(!catalog.is_valid("materials", "unobtainium").unwrap());
    }

    #[test]
    fn record_metadata_uses_title_fallback() {
        let catalog = sample_catalog();

        let aluminum = catalog.record("materials", "aluminum").unwrap().unwrap();
        assert_eq!(aluminum.title(), "Aluminum Laser Cleaning");

        let steel = catalog.record("materials", "steel").unwrap().unwrap();
        assert_eq!(steel.title(), "Steel");
    }
}
