//! Filesystem-agnostic types and algorithms for reference integrity.
//!
//! This module contains the domain schema, the in-memory catalog of valid
//! IDs, and the resolve / validate / link pipeline built on top of it.

/// Static configuration of domains and their relationship fields.
pub mod schema;
pub use schema::{DomainConfig, DomainSchema, RelationshipField, SchemaError};

mod record;
pub use record::{Record, RecordError};

/// In-memory index of valid IDs.
pub mod catalog;
pub use catalog::{Catalog, DomainEntries, RecordMeta};

pub mod similarity;

pub mod resolver;
pub use resolver::ReferenceInfo;

pub mod workflow;
pub use workflow::{FixOptions, Stats, Validator};

pub mod links;
pub use links::{Link, LinkBuilder, Relationship};

pub mod reciprocal;
pub use reciprocal::{MissingReciprocal, RelationshipGraph};
