/// Raw domain files and their structural checks.
pub mod document;
pub mod index;

pub use document::{DomainDocument, LoadError};
pub use index::{IndexError, ReferenceIndex};
