//! Materialization of validated references into link objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::domain::{catalog::Catalog, schema::SchemaError, workflow::reference_ids};

/// A reference ready for publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// The ID of the referenced record.
    pub id: String,
    /// The display title of the referenced record.
    pub title: String,
    /// The URL of the referenced record.
    pub url: String,
}

/// The materialized value of one relationship field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Relationship {
    /// Links built from a managed field.
    Links(Vec<Link>),
    /// The raw value of a field that is not a managed reference.
    Passthrough(Value),
}

/// Builds [`Link`]s from references, repairing them on the way.
#[derive(Debug, Clone, Copy)]
pub struct LinkBuilder<'a> {
    catalog: &'a Catalog,
}

impl<'a> LinkBuilder<'a> {
    /// Creates a builder over a catalog snapshot.
    #[must_use]
    pub const fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Builds the link for a reference into `domain`.
    ///
    /// A broken reference with a repair suggestion is linked to the
    /// suggested record. Returns `None` only when no record can be found.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn link_for(&self, domain: &str, id: &str) -> Result<Option<Link>, SchemaError> {
        self.link_for_path(domain, id, &[])
    }

    /// Like [`link_for`](Self::link_for), with extra URL path segments (such
    /// as a category and subcategory) placed before the ID.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn link_for_path(
        &self,
        domain: &str,
        id: &str,
        segments: &[&str],
    ) -> Result<Option<Link>, SchemaError> {
        let info = self.catalog.resolve(domain, id)?;
        let id = if info.exists {
            id
        } else {
            match info.top_suggestion() {
                Some(fixed) => fixed,
                None => return Ok(None),
            }
        };

        let Some(record) = self.catalog.record(domain, id)? else {
            return Ok(None);
        };

        Ok(Some(Link {
            id: id.to_string(),
            title: record.title().to_string(),
            url: self.catalog.schema().domain(domain)?.url_for(id, segments),
        }))
    }

    /// Builds links for a list of references into `domain`.
    ///
    /// With `skip_invalid`, unresolvable references are left out. Otherwise
    /// each one yields `None`, so the output lines up with `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn links_for_batch<S: AsRef<str>>(
        &self,
        domain: &str,
        ids: &[S],
        skip_invalid: bool,
    ) -> Result<Vec<Option<Link>>, SchemaError> {
        let mut links = Vec::with_capacity(ids.len());
        for id in ids {
            let link = self.link_for(domain, id.as_ref())?;
            if link.is_some() || !skip_invalid {
                links.push(link);
            }
        }
        Ok(links)
    }

    /// Materializes a whole relationships mapping.
    ///
    /// Fields the schema maps to a target domain become lists of links, with
    /// unresolvable references left out. Any other field, and any managed
    /// field whose value is not a list, is passed through unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the schema maps a field to a domain it
    /// does not configure.
    pub fn build_relationships(
        &self,
        relationships: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Relationship>, SchemaError> {
        let schema = self.catalog.schema();
        let mut built = BTreeMap::new();

        for (field, value) in relationships {
            let target = schema.target_domain(field);
            let ids = target.and_then(|_| reference_ids(value));

            let relationship = match (target, ids) {
                (Some(domain), Some(ids)) => Relationship::Links(
                    self.links_for_batch(domain, ids.as_slice(), true)?
                        .into_iter()
                        .flatten()
                        .collect(),
                ),
                _ => Relationship::Passthrough(value.clone()),
            };
            built.insert(field.clone(), relationship);
        }

        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::tests::sample_catalog;

    #[test]
    fn link_for_valid_reference() {
        let catalog = sample_catalog();
        let link = LinkBuilder::new(&catalog)
            .link_for("materials", "aluminum")
            .unwrap();

        assert_eq!(
            link,
            Some(Link {
                id: "aluminum".to_string(),
                title: "Aluminum Laser Cleaning".to_string(),
                url: "/materials/aluminum".to_string(),
            })
        );
    }

    #[test]
    fn link_for_repairs_reference() {
        let catalog = sample_catalog();
        let link = LinkBuilder::new(&catalog)
            .link_for("contaminants", "rust")
            .unwrap()
            .unwrap();

        assert_eq!(link.id, "rust-contamination");
        assert_eq!(link.title, "Rust");
        assert_eq!(link.url, "/contaminants/rust-contamination");
    }

    #[test]
    fn link_for_unresolvable_reference_is_none() {
        let catalog = sample_catalog();
        let link = LinkBuilder::new(&catalog)
            .link_for("contaminants", "bogus-xyz")
            .unwrap();

        assert_eq!(link, None);
    }

    #[test]
    fn link_for_path_places_segments_before_id() {
        let catalog = sample_catalog();
        let link = LinkBuilder::new(&catalog)
            .link_for_path("materials", "steel", &["metal", "ferrous"])
            .unwrap()
            .unwrap();

        assert_eq!(link.url, "/materials/metal/ferrous/steel");
    }

    #[test]
    fn batch_keeps_positions_unless_skipping() {
        let catalog = sample_catalog();
        let builder = LinkBuilder::new(&catalog);
        let ids = ["steel", "zzz-unknown", "steal"];

        let aligned = builder.links_for_batch("materials", &ids, false).unwrap();
        assert_eq!(aligned.len(), ids.len());
        assert!(aligned[0].is_some());
        assert!(aligned[1].is_none());
        assert_eq!(aligned[2].as_ref().map(|link| link.id.as_str()), Some("steel"));

        let skipped = builder.links_for_batch("materials", &ids, true).unwrap();
        assert_eq!(skipped.len(), 2);
        assert!(skipped.iter().all(Option::is_some));
    }

    #[test]
    fn build_relationships_passes_unmanaged_fields_through() {
        let catalog = sample_catalog();
        let relationships: BTreeMap<String, Value> = serde_yaml::from_str(
            "related_contaminants: [rust, bogus-xyz]\nrelated_materials: [copper]\nsee_also: [rust]\n",
        )
        .unwrap();

        let built = LinkBuilder::new(&catalog)
            .build_relationships(&relationships)
            .unwrap();

        let Relationship::Links(contaminants) = &built["related_contaminants"] else {
            panic!("expected links");
        };
        assert_eq!(contaminants.len(), 1);
        assert_eq!(contaminants[0].id, "rust-contamination");

        let Relationship::Links(materials) = &built["related_materials"] else {
            panic!("expected links");
        };
        assert_eq!(materials[0].url, "/materials/copper");

        assert_eq!(
            built["see_also"],
            Relationship::Passthrough(serde_yaml::from_str("[rust]").unwrap())
        );
    }

    #[test]
    fn link_serializes_to_stable_shape() {
        let link = Link {
            id: "steel".to_string(),
            title: "Steel".to_string(),
            url: "/materials/steel".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&link).unwrap(),
            serde_json::json!({"id": "steel", "title": "Steel", "url": "/materials/steel"})
        );
    }
}
