//! Validation and repair of the reference lists held in relationship fields.

use std::{borrow::Cow, collections::BTreeMap, ops::AddAssign};

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::domain::{catalog::Catalog, resolver::ReferenceInfo, schema::SchemaError};

/// How broken references are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixOptions {
    /// Replace a broken reference by its top repair suggestion, if it has one.
    pub auto_fix: bool,

    /// Drop broken references that could not be fixed. When `false` they are
    /// kept unchanged (and still reported).
    pub remove_invalid: bool,
}

/// Running counters of a [`Validator`].
///
/// Every checked reference lands in exactly one of `valid`, `fixed`,
/// `removed`, or (when invalid references are kept) none of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// References processed.
    pub checked: usize,
    /// References that already named an existing record.
    pub valid: usize,
    /// Broken references replaced by a repair suggestion.
    pub fixed: usize,
    /// Broken references dropped from the output.
    pub removed: usize,
}

impl Stats {
    /// Broken references that were left in place.
    #[must_use]
    pub const fn kept_invalid(&self) -> usize {
        self.checked
            .saturating_sub(self.valid)
            .saturating_sub(self.fixed)
            .saturating_sub(self.removed)
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.checked += other.checked;
        self.valid += other.valid;
        self.fixed += other.fixed;
        self.removed += other.removed;
    }
}

/// A broken reference that was replaced by a repair suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedFix {
    /// The domain the reference points into.
    pub domain: String,
    /// The reference as written.
    pub from: String,
    /// The existing ID it was replaced with.
    pub to: String,
}

/// The result of validating one list of references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedIds {
    /// The cleaned list, in input order.
    pub ids: Vec<String>,
    /// References that could not be fixed, whether removed or kept.
    pub invalid: Vec<ReferenceInfo>,
    /// References that were replaced.
    pub fixed: Vec<AppliedFix>,
}

/// The result of validating every managed field of a relationship mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedRelationships {
    /// The cleaned mapping. Unmanaged fields are copied unchanged.
    pub relationships: Mapping,
    /// References that could not be fixed, keyed by field.
    pub invalid: BTreeMap<String, Vec<ReferenceInfo>>,
    /// References that were replaced, keyed by field.
    pub fixed: BTreeMap<String, Vec<AppliedFix>>,
}

enum Verdict {
    Valid,
    Fixed(String),
    Removed(ReferenceInfo),
    Kept(ReferenceInfo),
}

/// Applies the resolver across lists of references and keeps count.
///
/// A validator borrows one [`Catalog`] snapshot for its whole lifetime, so
/// every reference of a pass is checked against the same index. Counters
/// are per instance; concurrent passes should each use their own validator
/// and sum the [`Stats`] afterwards.
#[derive(Debug)]
pub struct Validator<'a> {
    catalog: &'a Catalog,
    stats: Stats,
}

impl<'a> Validator<'a> {
    /// Creates a validator with zeroed counters.
    #[must_use]
    pub const fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            stats: Stats {
                checked: 0,
                valid: 0,
                fixed: 0,
                removed: 0,
            },
        }
    }

    /// The counters accumulated since creation or the last reset.
    #[must_use]
    pub const fn stats(&self) -> Stats {
        self.stats
    }

    /// Zeroes the counters.
    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    /// Validates a list of references into `domain`.
    ///
    /// Valid references are kept. A broken reference is replaced by its top
    /// suggestion when `auto_fix` is set and one exists; otherwise it is
    /// dropped or kept according to `remove_invalid`, and reported either
    /// way.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    /// Broken references are never errors.
    pub fn validate_and_fix<S: AsRef<str>>(
        &mut self,
        domain: &str,
        ids: &[S],
        options: FixOptions,
    ) -> Result<ValidatedIds, SchemaError> {
        let mut result = ValidatedIds {
            ids: Vec::with_capacity(ids.len()),
            ..ValidatedIds::default()
        };

        for id in ids {
            let id = id.as_ref();
            match self.check(domain, id, options)? {
                Verdict::Valid => result.ids.push(id.to_string()),
                Verdict::Fixed(to) => {
                    result.ids.push(to.clone());
                    result.fixed.push(AppliedFix {
                        domain: domain.to_string(),
                        from: id.to_string(),
                        to,
                    });
                }
                Verdict::Removed(info) => result.invalid.push(info),
                Verdict::Kept(info) => {
                    result.ids.push(id.to_string());
                    result.invalid.push(info);
                }
            }
        }

        Ok(result)
    }

    /// Validates every managed field of a relationship mapping.
    ///
    /// `field_domains` maps field names to the domain they refer into. Fields
    /// missing from it, and list items that carry no ID, are copied through
    /// untouched. Items may be bare IDs or mappings with an `id` key; a fixed
    /// mapping keeps its other keys. Unquoted numbers and booleans are checked
    /// in their string form, so `316` resolves like `"316"`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if `field_domains` names a
    /// domain that is not configured.
    pub fn validate_relationship_map(
        &mut self,
        relationships: &Mapping,
        field_domains: &BTreeMap<String, String>,
        options: FixOptions,
    ) -> Result<ValidatedRelationships, SchemaError> {
        let mut result = ValidatedRelationships::default();

        for (key, value) in relationships {
            let managed = key
                .as_str()
                .and_then(|field| field_domains.get_key_value(field));

            let Some((field, domain)) = managed else {
                result.relationships.insert(key.clone(), value.clone());
                continue;
            };

            let Value::Sequence(items) = value else {
                if !value.is_null() {
                    tracing::warn!(%field, "relationship field is not a list, left unchanged");
                }
                result.relationships.insert(key.clone(), value.clone());
                continue;
            };

            let mut cleaned = Vec::with_capacity(items.len());
            for item in items {
                let Some(id) = reference_id(item) else {
                    cleaned.push(item.clone());
                    continue;
                };

                match self.check(domain, &id, options)? {
                    Verdict::Valid => cleaned.push(item.clone()),
                    Verdict::Fixed(to) => {
                        cleaned.push(with_id(item, &to));
                        result.fixed.entry(field.clone()).or_default().push(AppliedFix {
                            domain: domain.clone(),
                            from: id.into_owned(),
                            to,
                        });
                    }
                    Verdict::Removed(info) => {
                        result.invalid.entry(field.clone()).or_default().push(info);
                    }
                    Verdict::Kept(info) => {
                        cleaned.push(item.clone());
                        result.invalid.entry(field.clone()).or_default().push(info);
                    }
                }
            }

            result
                .relationships
                .insert(key.clone(), Value::Sequence(cleaned));
        }

        Ok(result)
    }

    fn check(&mut self, domain: &str, id: &str, options: FixOptions) -> Result<Verdict, SchemaError> {
        let info = self.catalog.resolve(domain, id)?;
        self.stats.checked += 1;

        if info.exists {
            self.stats.valid += 1;
            return Ok(Verdict::Valid);
        }

        if options.auto_fix {
            if let Some(top) = info.top_suggestion() {
                tracing::debug!(domain, from = id, to = top, "fixed reference");
                self.stats.fixed += 1;
                return Ok(Verdict::Fixed(top.to_string()));
            }
        }

        if options.remove_invalid {
            tracing::debug!(domain, id, "removed reference");
            self.stats.removed += 1;
            Ok(Verdict::Removed(info))
        } else {
            Ok(Verdict::Kept(info))
        }
    }
}

/// Extracts the referenced ID from a relationship list item.
///
/// Items are either bare IDs or mappings (such as materialized links) with
/// an `id` key. Numbers and booleans written without quotes are read in their
/// string form.
#[must_use]
pub fn reference_id(item: &Value) -> Option<Cow<'_, str>> {
    match item {
        Value::Mapping(mapping) => mapping.get("id").and_then(scalar_id),
        _ => scalar_id(item),
    }
}

fn scalar_id(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(id) => Some(Cow::Borrowed(id.as_str())),
        Value::Number(number) => Some(Cow::Owned(number.to_string())),
        Value::Bool(flag) => Some(Cow::Owned(flag.to_string())),
        _ => None,
    }
}

/// Extracts every referenced ID from a relationship field value.
///
/// Returns `None` if the value is not a list.
#[must_use]
pub fn reference_ids(value: &Value) -> Option<Vec<Cow<'_, str>>> {
    value
        .as_sequence()
        .map(|items| items.iter().filter_map(reference_id).collect())
}

fn with_id(item: &Value, id: &str) -> Value {
    match item {
        Value::Mapping(mapping) => {
            let mut mapping = mapping.clone();
            mapping.insert(Value::from("id"), Value::from(id));
            Value::Mapping(mapping)
        }
        _ => Value::from(id),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::domain::catalog::tests::sample_catalog;

    const FIX_AND_REMOVE: FixOptions = FixOptions {
        auto_fix: true,
        remove_invalid: true,
    };

    fn yaml(source: &str) -> Mapping {
        serde_yaml::from_str(source).unwrap()
    }

    #[test]
    fn fixes_suffix_and_removes_unknown() {
        let catalog = sample_catalog();
        let mut validator = Validator::new(&catalog);

        let result = validator
            .validate_and_fix(
                "contaminants",
                &["rust", "rust-contamination", "bogus-xyz"],
                FIX_AND_REMOVE,
            )
            .unwrap();

        assert_eq!(result.ids, ["rust-contamination", "rust-contamination"]);
        assert_eq!(result.invalid.len(), 1);
        assert_eq!(result.invalid[0].id, "bogus-xyz");
        assert!(!result.invalid[0].exists);
        assert!(result.invalid[0].suggestions.is_empty());
        assert_eq!(
            result.fixed,
            [AppliedFix {
                domain: "contaminants".to_string(),
                from: "rust".to_string(),
                to: "rust-contamination".to_string(),
            }]
        );
        assert_eq!(
            validator.stats(),
            Stats {
                checked: 3,
                valid: 1,
                fixed: 1,
                removed: 1,
            }
        );
    }

    #[test]
    fn keeps_invalid_references_when_not_removing() {
        let catalog = sample_catalog();
        let mut validator = Validator::new(&catalog);

        let result = validator
            .validate_and_fix(
                "contaminants",
                &["rust", "bogus-xyz"],
                FixOptions {
                    auto_fix: false,
                    remove_invalid: false,
                },
            )
            .unwrap();

        assert_eq!(result.ids, ["rust", "bogus-xyz"]);
        assert_eq!(result.invalid.len(), 2);
        assert_eq!(
            result.invalid[0].suggestions,
            ["rust-contamination".to_string()]
        );
        assert_eq!(validator.stats().kept_invalid(), 2);
    }

    #[test_case(false, false; "report only")]
    #[test_case(true, false; "fix and keep")]
    #[test_case(false, true; "remove only")]
    #[test_case(true, true; "fix and remove")]
    fn counters_are_conserved(auto_fix: bool, remove_invalid: bool) {
        let catalog = sample_catalog();
        let mut validator = Validator::new(&catalog);
        let ids = ["steel", "steal", "aluminium", "wood", "copper", "zzz"];

        validator
            .validate_and_fix("materials", &ids, FixOptions {
                auto_fix,
                remove_invalid,
            })
            .unwrap();

        let stats = validator.stats();
        assert_eq!(stats.checked, ids.len());
        assert_eq!(
            stats.valid + stats.fixed + stats.removed + stats.kept_invalid(),
            ids.len()
        );
        if remove_invalid {
            assert_eq!(stats.valid + stats.fixed + stats.removed, ids.len());
        }
    }

    #[test]
    fn fixed_and_removed_output_is_entirely_valid() {
        let catalog = sample_catalog();
        let mut validator = Validator::new(&catalog);

        let result = validator
            .validate_and_fix(
                "contaminants",
                &["oil-film", "paint-residue-contaminaton", "nothing-like-it", "rust"],
                FIX_AND_REMOVE,
            )
            .unwrap();

        for id in &result.ids {
            assert!(catalog.is_valid("contaminants", id).unwrap(), "{id}");
        }
    }

    #[test]
    fn unknown_domain_is_propagated() {
        let catalog = sample_catalog();
        let mut validator = Validator::new(&catalog);

        let error = validator
            .validate_and_fix("recipes", &["cake"], FIX_AND_REMOVE)
            .unwrap_err();

        assert!(matches!(error, SchemaError::UnknownDomain(_)));
        assert_eq!(validator.stats(), Stats::default());
    }

    #[test]
    fn reset_and_aggregate_stats() {
        let catalog = sample_catalog();
        let mut first = Validator::new(&catalog);
        let mut second = Validator::new(&catalog);

        first
            .validate_and_fix("materials", &["steel"], FIX_AND_REMOVE)
            .unwrap();
        second
            .validate_and_fix("materials", &["wood"], FIX_AND_REMOVE)
            .unwrap();

        let mut total = first.stats();
        total += second.stats();
        assert_eq!(
            total,
            Stats {
                checked: 2,
                valid: 1,
                fixed: 0,
                removed: 1,
            }
        );

        first.reset_stats();
        assert_eq!(first.stats(), Stats::default());
    }

    #[test]
    fn relationship_map_leaves_unmanaged_fields_untouched() {
        let catalog = sample_catalog();
        let mut validator = Validator::new(&catalog);
        let relationships = yaml(
            "related_contaminants: [rust, bogus-xyz]\nnotes: [rust, anything]\nrelated_materials: steal\n",
        );
        let field_domains = BTreeMap::from([
            ("related_contaminants".to_string(), "contaminants".to_string()),
            ("related_materials".to_string(), "materials".to_string()),
        ]);

        let result = validator
            .validate_relationship_map(&relationships, &field_domains, FIX_AND_REMOVE)
            .unwrap();

        assert_eq!(
            result.relationships,
            yaml(
                "related_contaminants: [rust-contamination]\nnotes: [rust, anything]\nrelated_materials: steal\n"
            )
        );
        assert_eq!(result.invalid["related_contaminants"][0].id, "bogus-xyz");
        assert_eq!(result.fixed["related_contaminants"][0].to, "rust-contamination");
        assert_eq!(validator.stats().checked, 2);
    }

    #[test]
    fn relationship_map_fixes_link_objects_in_place() {
        let catalog = sample_catalog();
        let mut validator = Validator::new(&catalog);
        let relationships = yaml(
            "related_materials:\n  - id: steal\n    title: Steel\n  - id: copper\n    title: Copper\n",
        );
        let field_domains =
            BTreeMap::from([("related_materials".to_string(), "materials".to_string())]);

        let result = validator
            .validate_relationship_map(&relationships, &field_domains, FIX_AND_REMOVE)
            .unwrap();

        assert_eq!(
            result.relationships,
            yaml(
                "related_materials:\n  - id: steel\n    title: Steel\n  - id: copper\n    title: Copper\n"
            )
        );
        assert_eq!(
            validator.stats(),
            Stats {
                checked: 2,
                valid: 1,
                fixed: 1,
                removed: 0,
            }
        );
    }

    #[test]
    fn reference_ids_reads_strings_and_mappings() {
        let value: Value =
            serde_yaml::from_str("[rust, {id: steel, title: Steel}, 3, true, {name: x}, ~]")
                .unwrap();
        assert_eq!(
            reference_ids(&value),
            Some(vec![
                Cow::from("rust"),
                Cow::from("steel"),
                Cow::from("3"),
                Cow::from("true"),
            ])
        );
        assert_eq!(reference_ids(&Value::from("rust")), None);
    }

    #[test]
    fn unquoted_scalar_references_are_checked() {
        let catalog = sample_catalog();
        let mut validator = Validator::new(&catalog);
        let relationships = yaml("related_materials: [316, steel, true]\n");
        let field_domains =
            BTreeMap::from([("related_materials".to_string(), "materials".to_string())]);

        let result = validator
            .validate_relationship_map(&relationships, &field_domains, FIX_AND_REMOVE)
            .unwrap();

        assert_eq!(result.relationships, yaml("related_materials: [steel]\n"));
        let invalid: Vec<_> = result.invalid["related_materials"]
            .iter()
            .map(|info| info.id.as_str())
            .collect();
        assert_eq!(invalid, ["316", "true"]);
        assert_eq!(
            validator.stats(),
            Stats {
                checked: 3,
                valid: 1,
                fixed: 0,
                removed: 2,
            }
        );
    }

    #[test]
    fn kept_invalid_saturates_on_inconsistent_counters() {
        let stats = Stats {
            checked: 1,
            valid: 2,
            fixed: 1,
            removed: 0,
        };
        assert_eq!(stats.kept_invalid(), 0);
    }
}
