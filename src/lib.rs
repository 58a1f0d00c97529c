//! Cross-domain reference integrity
//!
//! Records in several content domains refer to each other by ID. This crate
//! indexes the valid IDs of every domain, validates reference lists against
//! that index, repairs broken references where a likely target exists, and
//! turns references into link objects.

pub mod domain;
pub use domain::{
    Catalog, DomainConfig, DomainSchema, FixOptions, Link, LinkBuilder, ReferenceInfo,
    SchemaError, Stats, Validator,
};

/// Filesystem storage of domain files and the shared reference index.
pub mod storage;
pub use storage::{DomainDocument, IndexError, LoadError, ReferenceIndex};
