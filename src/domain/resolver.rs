//! Classification and repair of a single reference.
//!
//! A reference is checked against its target domain in three tiers. Every
//! tier runs, and the suggestions of each are concatenated without
//! duplicates, so a deterministic suffix repair always ranks above a fuzzy
//! guess:
//!
//! 1. exact membership (no suggestions when it matches),
//! 2. suffix repair, adding or stripping the domain's ID suffix,
//! 3. fuzzy repair, ranking domain IDs by [similarity](super::similarity).

use serde::Serialize;

use crate::domain::{catalog::DomainEntries, schema::DomainConfig, similarity};

/// The maximum number of repair suggestions reported for a reference.
pub const MAX_SUGGESTIONS: usize = 3;

/// The minimum similarity a fuzzy suggestion must reach.
pub const FUZZY_CUTOFF: f64 = 0.6;

/// The outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceInfo {
    /// The domain the reference points into.
    pub domain: String,
    /// The reference as written.
    pub id: String,
    /// Whether the reference names an existing record.
    pub exists: bool,
    /// The display name of the referenced record, when it exists.
    pub name: Option<String>,
    /// Existing IDs that the reference probably meant, best first.
    ///
    /// Always empty when `exists` is true, and never longer than
    /// [`MAX_SUGGESTIONS`].
    pub suggestions: Vec<String>,
}

impl ReferenceInfo {
    /// The best repair candidate, if any.
    #[must_use]
    pub fn top_suggestion(&self) -> Option<&str> {
        self.suggestions.first().map(String::as_str)
    }
}

/// Resolves `id` against the entries of the domain described by `config`.
#[must_use]
pub fn resolve(entries: &DomainEntries, config: &DomainConfig, id: &str) -> ReferenceInfo {
    if let Some(record) = entries.get(id) {
        return ReferenceInfo {
            domain: config.name().to_string(),
            id: id.to_string(),
            exists: true,
            name: Some(record.name().to_string()),
            suggestions: Vec::new(),
        };
    }

    let mut suggestions: Vec<String> = Vec::with_capacity(MAX_SUGGESTIONS);

    if let Some(repaired) = suffix_repair(id, config.suffix()) {
        if entries.contains(&repaired) {
            suggestions.push(repaired);
        }
    }

    for candidate in similarity::close_matches(id, entries.ids(), MAX_SUGGESTIONS, FUZZY_CUTOFF) {
        if !suggestions.iter().any(|existing| existing == candidate) {
            suggestions.push(candidate.to_string());
        }
    }
    suggestions.truncate(MAX_SUGGESTIONS);

    if !suggestions.is_empty() {
        tracing::debug!(
            domain = config.name(),
            id,
            ?suggestions,
            "reference not found, repairs suggested"
        );
    }

    ReferenceInfo {
        domain: config.name().to_string(),
        id: id.to_string(),
        exists: false,
        name: None,
        suggestions,
    }
}

/// Applies suffix normalization to a broken ID.
///
/// An ID lacking the suffix gets it appended; an ID already carrying it has
/// it stripped. Returns `None` when the domain has no suffix rule or the
/// transformation would produce an empty ID.
#[must_use]
pub fn suffix_repair(id: &str, suffix: &str) -> Option<String> {
    if suffix.is_empty() {
        return None;
    }
    match id.strip_suffix(suffix) {
        Some("") => None,
        Some(stripped) => Some(stripped.to_string()),
        None => Some(format!("{id}{suffix}")),
    }
}
