//! Raw domain documents as stored on disk.
//!
//! A domain file is a YAML mapping whose configured root key holds a mapping
//! from record ID to record. [`DomainDocument`] checks that structure when
//! the file is read, decodes [`Record`]s on request, and gives access to the
//! relationship fields of individual records so corrections can be written
//! back.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use serde_yaml::{Mapping, Value};

use crate::domain::{DomainConfig, Record, RecordError};

/// The key under which a record may group its relationship fields.
const RELATIONSHIPS_KEY: &str = "relationships";

/// A parsed domain file.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainDocument {
    domain: String,
    root_key: String,
    path: PathBuf,

    /// The whole file, with the root key's value moved out into `records`.
    document: Mapping,
    records: Mapping,
}

/// Errors that can occur when loading a domain file.
///
/// Every variant names the file and the domain it was loaded for.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file does not exist.
    #[error("{domain}: data file {} not found", path.display())]
    NotFound {
        /// The domain being loaded.
        domain: String,
        /// The missing file.
        path: PathBuf,
    },

    /// The file could not be read.
    #[error("{domain}: failed to read {}: {source}", path.display())]
    Io {
        /// The domain being loaded.
        domain: String,
        /// The file being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The file is not valid YAML.
    #[error("{domain}: failed to parse {}: {source}", path.display())]
    Yaml {
        /// The domain being loaded.
        domain: String,
        /// The file being parsed.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_yaml::Error,
    },

    /// The top level of the file is not a mapping.
    #[error("{domain}: {} is not a mapping", path.display())]
    NotAMapping {
        /// The domain being loaded.
        domain: String,
        /// The offending file.
        path: PathBuf,
    },

    /// The configured root key is absent.
    #[error("{domain}: {} has no root key '{key}'", path.display())]
    MissingRootKey {
        /// The domain being loaded.
        domain: String,
        /// The offending file.
        path: PathBuf,
        /// The expected root key.
        key: String,
    },

    /// The root key does not hold a mapping of records.
    #[error("{domain}: '{key}' in {} is not a mapping of records", path.display())]
    RootNotAMapping {
        /// The domain being loaded.
        domain: String,
        /// The offending file.
        path: PathBuf,
        /// The root key.
        key: String,
    },

    /// A record key is not a string.
    #[error("{domain}: {} has a non-string record ID {key}", path.display())]
    NonStringId {
        /// The domain being loaded.
        domain: String,
        /// The offending file.
        path: PathBuf,
        /// The offending key, rendered as YAML.
        key: String,
    },

    /// A record could not be decoded.
    #[error("{domain}: record '{id}' in {}: {source}", path.display())]
    Record {
        /// The domain being loaded.
        domain: String,
        /// The offending file.
        path: PathBuf,
        /// The ID of the offending record.
        id: String,
        /// What is wrong with the record.
        source: RecordError,
    },
}

impl DomainDocument {
    /// Loads the data file of a domain from under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unreadable, is not YAML,
    /// or does not hold a mapping of records under the configured root key.
    pub fn load(root: &Path, config: &DomainConfig) -> Result<Self, LoadError> {
        let path = root.join(config.source());

        let file = File::open(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound {
                domain: config.name().to_string(),
                path: path.clone(),
            },
            _ => LoadError::Io {
                domain: config.name().to_string(),
                path: path.clone(),
                source,
            },
        })?;

        Self::read(BufReader::new(file), path, config)
    }

    pub(crate) fn read<R: Read>(
        reader: R,
        path: PathBuf,
        config: &DomainConfig,
    ) -> Result<Self, LoadError> {
        let domain = config.name().to_string();
        let root_key = config.root_key().to_string();

        let value: Value = serde_yaml::from_reader(reader).map_err(|source| LoadError::Yaml {
            domain: domain.clone(),
            path: path.clone(),
            source,
        })?;

        let Value::Mapping(mut document) = value else {
            return Err(LoadError::NotAMapping { domain, path });
        };

        let Some(root) = document.get_mut(root_key.as_str()) else {
            return Err(LoadError::MissingRootKey {
                domain,
                path,
                key: root_key,
            });
        };

        let Value::Mapping(records) = std::mem::take(root) else {
            return Err(LoadError::RootNotAMapping {
                domain,
                path,
                key: root_key,
            });
        };

        if let Some(key) = records.keys().find(|key| !key.is_string()) {
            let key = serde_yaml::to_string(key)
                .map_or_else(|_| format!("{key:?}"), |key| key.trim().to_string());
            return Err(LoadError::NonStringId { domain, path, key });
        }

        Ok(Self {
            domain,
            root_key,
            path,
            document,
            records,
        })
    }

    /// The domain this document belongs to.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The file this document was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterates over the record IDs in file order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().filter_map(Value::as_str)
    }

    /// The number of records in the document.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the document holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decodes every record in the document.
    ///
    /// # Errors
    ///
    /// Fails on the first record that is not a mapping or has no non-empty
    /// `name`. Partial results are never returned.
    pub fn records(&self) -> Result<Vec<Record>, LoadError> {
        self.records
            .iter()
            .filter_map(|(key, value)| key.as_str().map(|id| (id, value)))
            .map(|(id, value)| {
                Record::decode(id, value).map_err(|source| LoadError::Record {
                    domain: self.domain.clone(),
                    path: self.path.clone(),
                    id: id.to_string(),
                    source,
                })
            })
            .collect()
    }

    /// The relationship fields of a record.
    ///
    /// Records either group their relationships under a `relationships`
    /// mapping or keep them at the top level; in the latter case the whole
    /// record is returned and non-relationship keys are simply unmanaged.
    #[must_use]
    pub fn relationships(&self, id: &str) -> Option<&Mapping> {
        let record = self.records.get(id)?.as_mapping()?;
        Some(
            record
                .get(RELATIONSHIPS_KEY)
                .and_then(Value::as_mapping)
                .unwrap_or(record),
        )
    }

    /// Writes relationship fields back into a record, in the same place
    /// [`relationships`](Self::relationships) found them.
    ///
    /// Returns `false` if there is no such record.
    pub fn set_relationships(&mut self, id: &str, relationships: Mapping) -> bool {
        let Some(record) = self.records.get_mut(id).and_then(Value::as_mapping_mut) else {
            return false;
        };

        match record.get_mut(RELATIONSHIPS_KEY) {
            Some(grouped @ Value::Mapping(_)) => *grouped = Value::Mapping(relationships),
            _ => {
                for (key, value) in relationships {
                    record.insert(key, value);
                }
            }
        }
        true
    }

    /// Writes the document back to the file it was loaded from.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or the file
    /// cannot be written.
    pub fn save(&self) -> io::Result<()> {
        let mut document = self.document.clone();
        document.insert(
            Value::from(self.root_key.as_str()),
            Value::Mapping(self.records.clone()),
        );

        let content = serde_yaml::to_string(&document).map_err(io::Error::other)?;

        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()
    }
}
