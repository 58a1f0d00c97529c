use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Static description of every document collection and the relationship
/// fields that link them.
///
/// The schema is built once at process start and never mutated. Every lookup
/// that names a domain or field the schema does not know returns a
/// [`SchemaError`] instead of falling back to a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Versions", into = "Versions")]
pub struct DomainSchema {
    domains: BTreeMap<String, DomainConfig>,
}

/// Configuration of a single domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    name: String,

    /// Location of the domain's data file, relative to the data root.
    source: PathBuf,

    /// The top-level key under which the records of the file live.
    root_key: String,

    /// Suffix every ID in this domain must carry, if any.
    ///
    /// For example, contaminant IDs all end in `-contamination`.
    suffix: Option<String>,

    /// Path prefix used when building URLs for records of this domain.
    url_prefix: String,

    /// Relationship fields carried by records of this domain, keyed by field
    /// name.
    relationships: BTreeMap<String, RelationshipField>,
}

/// A managed relationship field on a source domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipField {
    name: String,
    target: String,
    reciprocal: Option<String>,
}

/// Errors raised when the schema is misconfigured or queried for something
/// it does not contain.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema file could not be read.
    #[error("failed to read schema file {}: {source}", path.display())]
    Read {
        /// Path of the schema file.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The schema file is not valid TOML or does not describe a valid schema.
    #[error("failed to parse schema file {}: {source}", path.display())]
    Parse {
        /// Path of the schema file.
        path: PathBuf,
        /// The underlying parse error.
        source: toml::de::Error,
    },

    /// The schema could not be serialized.
    #[error("failed to serialize schema: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The schema file could not be written.
    #[error("failed to write schema file {}: {source}", path.display())]
    Write {
        /// Path of the schema file.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// A domain was requested that the schema does not configure.
    #[error("unknown domain '{0}'")]
    UnknownDomain(String),

    /// A relationship field was requested that the domain does not declare.
    #[error("domain '{domain}' has no relationship field '{field}'")]
    UnknownField {
        /// The domain that was queried.
        domain: String,
        /// The field that is not declared on it.
        field: String,
    },

    /// A required schema value is empty.
    #[error("domain '{domain}' has an empty '{key}'")]
    EmptyValue {
        /// The domain being configured.
        domain: String,
        /// The key whose value is empty.
        key: &'static str,
    },

    /// A relationship field targets a domain that is not configured.
    #[error("field '{field}' of domain '{domain}' targets unknown domain '{target}'")]
    UnknownTarget {
        /// The domain declaring the field.
        domain: String,
        /// The relationship field.
        field: String,
        /// The missing target domain.
        target: String,
    },

    /// The same field name targets different domains in different places.
    #[error("field '{field}' targets both '{first}' and '{second}'")]
    ConflictingTarget {
        /// The relationship field.
        field: String,
        /// The target declared first.
        first: String,
        /// The conflicting target.
        second: String,
    },

    /// A declared reciprocal field does not mirror its counterpart.
    #[error("reciprocal of '{domain}.{field}' is broken: {reason}")]
    BrokenReciprocal {
        /// The domain declaring the field.
        domain: String,
        /// The relationship field.
        field: String,
        /// What is wrong with the reciprocal declaration.
        reason: String,
    },
}

impl DomainSchema {
    /// Builds a schema from a set of domain configurations, validating the
    /// table as a whole.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is empty, a relationship targets an
    /// unknown domain, a field name targets two different domains, or a
    /// reciprocal declaration does not point back at its counterpart.
    pub fn new(domains: impl IntoIterator<Item = DomainConfig>) -> Result<Self, SchemaError> {
        let schema = Self {
            domains: domains
                .into_iter()
                .map(|domain| (domain.name.clone(), domain))
                .collect(),
        };
        schema.check()?;
        Ok(schema)
    }

    /// The built-in schema for the five standard domains.
    ///
    /// Each domain lives in `data/<name>.yaml` under the root key `<name>`
    /// and is published under `/<name>`.
    #[must_use]
    pub fn standard() -> Self {
        let domain = |name: &str, suffix: Option<&str>, fields: &[(&str, &str, Option<&str>)]| {
            let mut config = DomainConfig::new(name, format!("data/{name}.yaml"), name);
            if let Some(suffix) = suffix {
                config = config.with_suffix(suffix);
            }
            for (field, target, reciprocal) in fields {
                config = config.with_relationship(*field, *target, *reciprocal);
            }
            (name.to_string(), config)
        };

        let domains = [
            domain(
                "materials",
                None,
                &[
                    ("related_contaminants", "contaminants", Some("related_materials")),
                    ("related_settings", "settings", Some("related_materials")),
                    ("related_applications", "applications", Some("related_materials")),
                ],
            ),
            domain(
                "contaminants",
                Some("-contamination"),
                &[
                    ("related_materials", "materials", Some("related_contaminants")),
                    ("produces_compounds", "compounds", Some("produced_by_contaminants")),
                ],
            ),
            domain(
                "compounds",
                Some("-compound"),
                &[(
                    "produced_by_contaminants",
                    "contaminants",
                    Some("produces_compounds"),
                )],
            ),
            domain(
                "settings",
                Some("-settings"),
                &[
                    ("related_materials", "materials", Some("related_settings")),
                    ("related_contaminants", "contaminants", None),
                ],
            ),
            domain(
                "applications",
                None,
                &[("related_materials", "materials", Some("related_applications"))],
            ),
        ];

        Self {
            domains: domains.into_iter().collect(),
        }
    }

    /// Loads the schema from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// describes an inconsistent schema.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SchemaError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the schema from `path` if the file exists, otherwise returns the
    /// [standard](Self::standard) schema.
    ///
    /// # Errors
    ///
    /// A file that exists but cannot be loaded is an error; it is never
    /// replaced by the standard schema.
    pub fn load_or_standard(path: &Path) -> Result<Self, SchemaError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(
                "No schema file at {}, using the standard schema",
                path.display()
            );
            Ok(Self::standard())
        }
    }

    /// Saves the schema to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be serialized or the file cannot
    /// be written.
    pub fn save(&self, path: &Path) -> Result<(), SchemaError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| SchemaError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the configuration of the named domain.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn domain(&self, name: &str) -> Result<&DomainConfig, SchemaError> {
        self.domains
            .get(name)
            .ok_or_else(|| SchemaError::UnknownDomain(name.to_string()))
    }

    /// Iterates over all configured domains in name order.
    pub fn domains(&self) -> impl Iterator<Item = &DomainConfig> {
        self.domains.values()
    }

    /// Returns the domain a relationship field points at, or `None` if the
    /// field is not a managed reference.
    ///
    /// Unmanaged fields must be passed through untouched by callers.
    #[must_use]
    pub fn target_domain(&self, field: &str) -> Option<&str> {
        self.domains
            .values()
            .find_map(|domain| domain.relationships.get(field))
            .map(|field| field.target.as_str())
    }

    /// Returns the relationship fields declared by a domain.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn relationship_fields(
        &self,
        domain: &str,
    ) -> Result<impl Iterator<Item = &RelationshipField>, SchemaError> {
        Ok(self.domain(domain)?.relationships.values())
    }

    /// Returns the mapping from field name to target domain for the
    /// relationship fields of `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn field_domains(&self, domain: &str) -> Result<BTreeMap<String, String>, SchemaError> {
        Ok(self
            .relationship_fields(domain)?
            .map(|field| (field.name.clone(), field.target.clone()))
            .collect())
    }

    /// Returns the ID suffix enforced by a domain, or the empty string if it
    /// has none.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDomain`] if the domain is not configured.
    pub fn suffix(&self, domain: &str) -> Result<&str, SchemaError> {
        Ok(self.domain(domain)?.suffix())
    }

    /// Returns the `(domain, field)` counterpart of a bidirectional
    /// relationship, or `None` if the field is one-sided.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is not configured or does not declare
    /// the field.
    pub fn reciprocal(
        &self,
        domain: &str,
        field: &str,
    ) -> Result<Option<(&str, &str)>, SchemaError> {
        let config = self.domain(domain)?;
        let relationship =
            config
                .relationships
                .get(field)
                .ok_or_else(|| SchemaError::UnknownField {
                    domain: domain.to_string(),
                    field: field.to_string(),
                })?;
        Ok(relationship
            .reciprocal
            .as_deref()
            .map(|reciprocal| (relationship.target.as_str(), reciprocal)))
    }

    fn check(&self) -> Result<(), SchemaError> {
        let mut targets: BTreeMap<&str, &str> = BTreeMap::new();

        for (name, domain) in &self.domains {
            let empty = |key| SchemaError::EmptyValue {
                domain: name.clone(),
                key,
            };
            if name.is_empty() {
                return Err(empty("name"));
            }
            if domain.root_key.is_empty() {
                return Err(empty("root_key"));
            }
            if domain.source.as_os_str().is_empty() {
                return Err(empty("source"));
            }
            if domain.suffix.as_deref() == Some("") {
                return Err(empty("suffix"));
            }

            for field in domain.relationships.values() {
                let Some(target) = self.domains.get(&field.target) else {
                    return Err(SchemaError::UnknownTarget {
                        domain: name.clone(),
                        field: field.name.clone(),
                        target: field.target.clone(),
                    });
                };

                if let Some(first) = targets.insert(&field.name, &field.target) {
                    if first != field.target {
                        return Err(SchemaError::ConflictingTarget {
                            field: field.name.clone(),
                            first: first.to_string(),
                            second: field.target.clone(),
                        });
                    }
                }

                let Some(reciprocal) = &field.reciprocal else {
                    continue;
                };
                let broken = |reason: String| SchemaError::BrokenReciprocal {
                    domain: name.clone(),
                    field: field.name.clone(),
                    reason,
                };
                let counterpart = target.relationships.get(reciprocal).ok_or_else(|| {
                    broken(format!("'{}' declares no field '{reciprocal}'", target.name))
                })?;
                if counterpart.target != *name {
                    return Err(broken(format!(
                        "'{}.{reciprocal}' targets '{}'",
                        target.name, counterpart.target
                    )));
                }
                if counterpart.reciprocal.as_deref() != Some(field.name.as_str()) {
                    return Err(broken(format!(
                        "'{}.{reciprocal}' does not name '{}' as its reciprocal",
                        target.name, field.name
                    )));
                }
            }
        }

        Ok(())
    }
}

impl DomainConfig {
    /// Creates a domain with no suffix rule, no relationships and the URL
    /// prefix `/<name>`.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        root_key: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            url_prefix: format!("/{name}"),
            name,
            source: source.into(),
            root_key: root_key.into(),
            suffix: None,
            relationships: BTreeMap::new(),
        }
    }

    /// Sets the suffix every ID of this domain must carry.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Sets the URL prefix for records of this domain.
    #[must_use]
    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    /// Declares a relationship field, optionally paired with a reciprocal
    /// field on the target domain.
    #[must_use]
    pub fn with_relationship(
        mut self,
        field: impl Into<String>,
        target: impl Into<String>,
        reciprocal: Option<impl Into<String>>,
    ) -> Self {
        let field = field.into();
        self.relationships.insert(
            field.clone(),
            RelationshipField {
                name: field,
                target: target.into(),
                reciprocal: reciprocal.map(Into::into),
            },
        );
        self
    }

    /// The domain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The data file, relative to the data root.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The key under which records live in the data file.
    #[must_use]
    pub fn root_key(&self) -> &str {
        &self.root_key
    }

    /// The enforced ID suffix, or the empty string.
    #[must_use]
    pub fn suffix(&self) -> &str {
        self.suffix.as_deref().unwrap_or_default()
    }

    /// The URL path prefix of this domain.
    #[must_use]
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Builds the URL of a record.
    ///
    /// `segments` are extra path components known to the caller, such as the
    /// category and subcategory of hierarchical domains. Empty segments are
    /// skipped. The ID is not validated.
    #[must_use]
    pub fn url_for(&self, id: &str, segments: &[&str]) -> String {
        let mut url = self.url_prefix.trim_end_matches('/').to_string();
        for segment in segments.iter().filter(|s| !s.is_empty()) {
            url.push('/');
            url.push_str(segment.trim_matches('/'));
        }
        url.push('/');
        url.push_str(id);
        url
    }
}

impl RelationshipField {
    /// The field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The domain this field refers into.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The mirrored field on the target domain, if the relationship is
    /// bidirectional.
    #[must_use]
    pub fn reciprocal(&self) -> Option<&str> {
        self.reciprocal.as_deref()
    }
}

/// The serialized versions of the schema.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        domains: BTreeMap<String, DomainTable>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DomainTable {
    source: PathBuf,
    root_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    relationships: BTreeMap<String, FieldTable>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldTable {
    target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reciprocal: Option<String>,
}

impl TryFrom<Versions> for DomainSchema {
    type Error = SchemaError;

    fn try_from(versions: Versions) -> Result<Self, Self::Error> {
        match versions {
            Versions::V1 { domains } => Self::new(domains.into_iter().map(|(name, table)| {
                let mut config = DomainConfig::new(name, table.source, table.root_key);
                config.suffix = table.suffix;
                if let Some(prefix) = table.url_prefix {
                    config.url_prefix = prefix;
                }
                for (field, spec) in table.relationships {
                    config = config.with_relationship(field, spec.target, spec.reciprocal);
                }
                config
            })),
        }
    }
}

impl From<DomainSchema> for Versions {
    fn from(schema: DomainSchema) -> Self {
        Self::V1 {
            domains: schema
                .domains
                .into_iter()
                .map(|(name, config)| {
                    let default_prefix = format!("/{name}");
                    let table = DomainTable {
                        source: config.source,
                        root_key: config.root_key,
                        suffix: config.suffix,
                        url_prefix: (config.url_prefix != default_prefix)
                            .then_some(config.url_prefix),
                        relationships: config
                            .relationships
                            .into_values()
                            .map(|field| {
                                (
                                    field.name,
                                    FieldTable {
                                        target: field.target,
                                        reciprocal: field.reciprocal,
                                    },
                                )
                            })
                            .collect(),
                    };
                    (name, table)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn standard_schema_passes_validation() {
        let standard = DomainSchema::standard();
        let rebuilt = DomainSchema::new(standard.domains().cloned()).unwrap();
        assert_eq!(rebuilt, standard);
    }

    #[test]
    fn lookups_on_standard_schema() {
        let schema = DomainSchema::standard();

        assert_eq!(schema.suffix("contaminants").unwrap(), "-contamination");
        assert_eq!(schema.suffix("materials").unwrap(), "");
        assert_eq!(
            schema.target_domain("related_contaminants"),
            Some("contaminants")
        );
        assert_eq!(schema.target_domain("description"), None);
        assert_eq!(
            schema
                .reciprocal("materials", "related_contaminants")
                .unwrap(),
            Some(("contaminants", "related_materials"))
        );
        assert_eq!(
            schema
                .reciprocal("settings", "related_contaminants")
                .unwrap(),
            None
        );
    }

    #[test]
    fn unknown_domain_is_an_error() {
        let schema = DomainSchema::standard();

        assert!(matches!(
            schema.relationship_fields("recipes"),
            Err(SchemaError::UnknownDomain(name)) if name == "recipes"
        ));
        assert!(matches!(
            schema.suffix("recipes"),
            Err(SchemaError::UnknownDomain(_))
        ));
    }

    #[test]
    fn unknown_field_is_an_error() {
        let schema = DomainSchema::standard();

        let error = schema.reciprocal("materials", "colour").unwrap_err();
        assert!(matches!(error, SchemaError::UnknownField { .. }));
    }

    #[test]
    fn relationship_to_unknown_domain_is_rejected() {
        let error = DomainSchema::new([DomainConfig::new("materials", "m.yaml", "materials")
            .with_relationship("related_things", "things", None::<String>)])
        .unwrap_err();

        assert!(matches!(
            error,
            SchemaError::UnknownTarget { target, .. } if target == "things"
        ));
    }

    #[test]
    fn conflicting_field_targets_are_rejected() {
        let error = DomainSchema::new([
            DomainConfig::new("a", "a.yaml", "a").with_relationship("related", "a", None::<String>),
            DomainConfig::new("b", "b.yaml", "b").with_relationship("related", "b", None::<String>),
        ])
        .unwrap_err();

        assert!(matches!(error, SchemaError::ConflictingTarget { .. }));
    }

    #[test]
    fn one_sided_reciprocal_is_rejected() {
        let error = DomainSchema::new([
            DomainConfig::new("a", "a.yaml", "a").with_relationship("to_b", "b", Some("to_a")),
            DomainConfig::new("b", "b.yaml", "b"),
        ])
        .unwrap_err();

        assert!(matches!(error, SchemaError::BrokenReciprocal { .. }));
    }

    #[test]
    fn url_includes_caller_segments() {
        let config = DomainConfig::new("materials", "m.yaml", "materials");

        assert_eq!(config.url_for("aluminum", &[]), "/materials/aluminum");
        assert_eq!(
            config.url_for("aluminum", &["metal", "", "non-ferrous"]),
            "/materials/metal/non-ferrous/aluminum"
        );
    }

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"_version = "1"

[domains.materials]
source = "materials.yaml"
root_key = "materials"
url_prefix = "/catalog/materials"

[domains.materials.relationships.related_contaminants]
target = "contaminants"
reciprocal = "related_materials"

[domains.contaminants]
source = "contaminants.yaml"
root_key = "contaminants"
suffix = "-contamination"

[domains.contaminants.relationships.related_materials]
target = "materials"
reciprocal = "related_contaminants"
"#,
        )
        .unwrap();

        let schema = DomainSchema::load(file.path()).unwrap();

        assert_eq!(schema.suffix("contaminants").unwrap(), "-contamination");
        assert_eq!(
            schema.domain("materials").unwrap().url_prefix(),
            "/catalog/materials"
        );
        assert_eq!(schema.domain("contaminants").unwrap().url_prefix(), "/contaminants");
    }

    #[test]
    fn load_invalid_schema_returns_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"_version = "1"

[domains.materials]
source = "materials.yaml"
root_key = "materials"

[domains.materials.relationships.related_contaminants]
target = "contaminants"
"#,
        )
        .unwrap();

        let error = DomainSchema::load(file.path()).unwrap_err();
        assert!(matches!(error, SchemaError::Parse { .. }));
    }

    #[test]
    fn missing_file_falls_back_to_standard() {
        let tmp = tempfile::tempdir().unwrap();
        let schema = DomainSchema::load_or_standard(&tmp.path().join("schema.toml")).unwrap();
        assert_eq!(schema, DomainSchema::standard());
    }

    #[test]
    fn save_then_load_preserves_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("schema.toml");

        DomainSchema::standard().save(&path).unwrap();

        assert_eq!(DomainSchema::load(&path).unwrap(), DomainSchema::standard());
    }
}
