//! Consistency of bidirectional relationships.
//!
//! When the schema pairs two fields (say `materials.related_contaminants`
//! and `contaminants.related_materials`), every reference along one should
//! be mirrored by a reference along the other. This module only reports the
//! gaps; it never edits documents.

use std::collections::{BTreeMap, HashMap};

use petgraph::{
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};
use serde::Serialize;
use serde_yaml::Mapping;

use crate::domain::{
    catalog::Catalog,
    schema::{DomainSchema, SchemaError},
    workflow::reference_ids,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Node {
    domain: String,
    id: String,
}

/// A reference whose schema-declared reciprocal is absent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MissingReciprocal {
    /// Domain of the record holding the reference.
    pub source_domain: String,
    /// ID of the record holding the reference.
    pub source_id: String,
    /// The field holding the reference.
    pub field: String,
    /// Domain of the referenced record.
    pub target_domain: String,
    /// ID of the referenced record.
    pub target_id: String,
    /// The field on the referenced record that should point back.
    pub reciprocal_field: String,
}

/// Directed graph of resolved references between records.
///
/// Nodes are `(domain, id)` pairs; each edge is one reference, weighted by
/// the field that holds it.
#[derive(Debug, Default)]
pub struct RelationshipGraph {
    graph: DiGraph<Node, String>,
    nodes: HashMap<Node, NodeIndex>,
}

impl RelationshipGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `source_domain/source_id` refers to
    /// `target_domain/target_id` through `field`.
    ///
    /// Adding the same reference twice has no effect.
    pub fn add_reference(
        &mut self,
        source_domain: &str,
        source_id: &str,
        field: &str,
        target_domain: &str,
        target_id: &str,
    ) {
        let source = self.node(source_domain, source_id);
        let target = self.node(target_domain, target_id);

        if !self
            .graph
            .edges_connecting(source, target)
            .any(|edge| edge.weight() == field)
        {
            self.graph.add_edge(source, target, field.to_string());
        }
    }

    /// Adds every resolvable reference found in a record's relationships.
    ///
    /// `field_domains` selects the managed fields, as returned by
    /// [`DomainSchema::field_domains`]. References that do not name an
    /// existing record are skipped; reporting them is the validator's job.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if `field_domains` names a
    /// domain the catalog does not configure.
    pub fn add_relationships(
        &mut self,
        catalog: &Catalog,
        domain: &str,
        id: &str,
        relationships: &Mapping,
        field_domains: &BTreeMap<String, String>,
    ) -> Result<(), SchemaError> {
        for (field, target_domain) in field_domains {
            let Some(ids) = relationships.get(field.as_str()).and_then(reference_ids) else {
                continue;
            };
            for target_id in ids {
                if catalog.is_valid(target_domain, &target_id)? {
                    self.add_reference(domain, id, field, target_domain, &target_id);
                }
            }
        }
        Ok(())
    }

    /// The number of distinct references in the graph.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Lists every reference whose reciprocal reference is missing, sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the graph holds a reference through a
    /// field the schema does not declare.
    pub fn missing_reciprocals(
        &self,
        schema: &DomainSchema,
    ) -> Result<Vec<MissingReciprocal>, SchemaError> {
        let mut missing = Vec::new();

        for edge in self.graph.edge_references() {
            let source = &self.graph[edge.source()];
            let target = &self.graph[edge.target()];
            let field = edge.weight();

            let Some((reciprocal_domain, reciprocal_field)) =
                schema.reciprocal(&source.domain, field)?
            else {
                continue;
            };
            if reciprocal_domain != target.domain {
                continue;
            }

            let mirrored = self
                .graph
                .edges_connecting(edge.target(), edge.source())
                .any(|back| back.weight() == reciprocal_field);

            if !mirrored {
                missing.push(MissingReciprocal {
                    source_domain: source.domain.clone(),
                    source_id: source.id.clone(),
                    field: field.clone(),
                    target_domain: target.domain.clone(),
                    target_id: target.id.clone(),
                    reciprocal_field: reciprocal_field.to_string(),
                });
            }
        }

        missing.sort();
        Ok(missing)
    }

    fn node(&mut self, domain: &str, id: &str) -> NodeIndex {
        let key = Node {
            domain: domain.to_string(),
            id: id.to_string(),
        };
        if let Some(index) = self.nodes.get(&key) {
            return *index;
        }
        let index = self.graph.add_node(key.clone());
        self.nodes.insert(key, index);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::tests::sample_catalog;

    #[test]
    fn mirrored_references_are_consistent() {
        let schema = DomainSchema::standard();
        let mut graph = RelationshipGraph::new();

        graph.add_reference(
            "materials",
            "steel",
            "related_contaminants",
            "contaminants",
            "rust-contamination",
        );
        graph.add_reference(
            "contaminants",
            "rust-contamination",
            "related_materials",
            "materials",
            "steel",
        );

        assert!(graph.missing_reciprocals(&schema).unwrap().is_empty());
    }

    #[test]
    fn one_sided_reference_is_reported() {
        let schema = DomainSchema::standard();
        let mut graph = RelationshipGraph::new();

        graph.add_reference(
            "materials",
            "steel",
            "related_contaminants",
            "contaminants",
            "rust-contamination",
        );

        let missing = graph.missing_reciprocals(&schema).unwrap();
        assert_eq!(
            missing,
            [MissingReciprocal {
                source_domain: "materials".to_string(),
                source_id: "steel".to_string(),
                field: "related_contaminants".to_string(),
                target_domain: "contaminants".to_string(),
                target_id: "rust-contamination".to_string(),
                reciprocal_field: "related_materials".to_string(),
            }]
        );
    }

    #[test]
    fn one_sided_fields_are_not_checked() {
        let schema = DomainSchema::standard();
        let mut graph = RelationshipGraph::new();

        graph.add_reference(
            "settings",
            "steel-settings",
            "related_contaminants",
            "contaminants",
            "rust-contamination",
        );

        assert!(graph.missing_reciprocals(&schema).unwrap().is_empty());
    }

    #[test]
    fn relationships_skip_broken_references_and_duplicates() {
        let catalog = sample_catalog();
        let schema = catalog.schema();
        let relationships: Mapping = serde_yaml::from_str(
            "related_contaminants: [rust-contamination, rust-contamination, bogus]\nnotes: hi\n",
        )
        .unwrap();

        let mut graph = RelationshipGraph::new();
        graph
            .add_relationships(
                &catalog,
                "materials",
                "steel",
                &relationships,
                &schema.field_domains("materials").unwrap(),
            )
            .unwrap();

        assert_eq!(graph.reference_count(), 1);
        assert_eq!(graph.missing_reciprocals(schema).unwrap().len(), 1);
    }
}
