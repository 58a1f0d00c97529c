//! A filesystem backed index of valid record IDs.
//!
//! The [`ReferenceIndex`] reads every configured domain file under a root
//! directory and publishes the result as an immutable [`Catalog`] snapshot.
//! It is a wrapper around the filesystem agnostic catalog, in the same way
//! the validator and link builder are.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::instrument;

use crate::{
    domain::{Catalog, DomainConfig, DomainEntries, DomainSchema, ReferenceInfo, SchemaError},
    storage::document::{DomainDocument, LoadError},
};

/// Errors raised by the [`ReferenceIndex`].
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// A domain or field is not configured.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A domain file could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// The process-wide index of every domain's valid IDs.
///
/// The index is loaded lazily on first use. Readers always see a complete
/// snapshot: a reload builds the new [`Catalog`] off to the side and swaps
/// it in only once every domain has loaded, so a failed reload leaves the
/// previous snapshot in place. Concurrent loads are serialized.
#[derive(Debug)]
pub struct ReferenceIndex {
    root: PathBuf,
    schema: Arc<DomainSchema>,
    current: RwLock<Option<Arc<Catalog>>>,
    build: Mutex<()>,
}

impl ReferenceIndex {
    /// Creates an unloaded index over the domain files under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, schema: DomainSchema) -> Self {
        Self {
            root: root.into(),
            schema: Arc::new(schema),
            current: RwLock::new(None),
            build: Mutex::new(()),
        }
    }

    /// The directory domain file paths are resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The schema the index was created with.
    #[must_use]
    pub fn schema(&self) -> &DomainSchema {
        &self.schema
    }

    /// Whether a snapshot has been built.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    /// Builds the index if it is not built yet, or unconditionally when
    /// `force` is set, and returns the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if any domain file fails to load. The previous
    /// snapshot, if any, stays current.
    #[instrument(skip(self))]
    pub fn load_all(&self, force: bool) -> Result<Arc<Catalog>, IndexError> {
        let _build = self.build.lock();

        if !force {
            if let Some(catalog) = self.snapshot() {
                return Ok(catalog);
            }
        }

        let catalog = Arc::new(self.build_catalog()?);
        *self.current.write() = Some(Arc::clone(&catalog));
        Ok(catalog)
    }

    /// Discards the current snapshot in favour of a fresh one.
    ///
    /// # Errors
    ///
    /// See [`load_all`](Self::load_all).
    pub fn reload(&self) -> Result<Arc<Catalog>, IndexError> {
        self.load_all(true)
    }

    /// The current snapshot, loading it first if needed.
    ///
    /// # Errors
    ///
    /// See [`load_all`](Self::load_all).
    pub fn catalog(&self) -> Result<Arc<Catalog>, IndexError> {
        match self.snapshot() {
            Some(catalog) => Ok(catalog),
            None => self.load_all(false),
        }
    }

    /// Whether `id` is a valid record ID in `domain`.
    ///
    /// # Errors
    ///
    /// Fails if the index cannot be loaded or the domain is not configured.
    pub fn is_valid(&self, domain: &str, id: &str) -> Result<bool, IndexError> {
        Ok(self.catalog()?.is_valid(domain, id)?)
    }

    /// A copy of every ID in `domain`.
    ///
    /// # Errors
    ///
    /// Fails if the index cannot be loaded or the domain is not configured.
    pub fn all_ids(&self, domain: &str) -> Result<BTreeSet<String>, IndexError> {
        Ok(self.catalog()?.all_ids(domain)?)
    }

    /// Resolves a reference against the current snapshot.
    ///
    /// # Errors
    ///
    /// Fails if the index cannot be loaded or the domain is not configured.
    pub fn resolve(&self, domain: &str, id: &str) -> Result<ReferenceInfo, IndexError> {
        Ok(self.catalog()?.resolve(domain, id)?)
    }

    /// Reads the raw document of a domain.
    ///
    /// # Errors
    ///
    /// Fails if the domain is not configured or its file cannot be loaded.
    pub fn document(&self, domain: &str) -> Result<DomainDocument, IndexError> {
        let config = self.schema.domain(domain)?;
        Ok(DomainDocument::load(&self.root, config)?)
    }

    fn snapshot(&self) -> Option<Arc<Catalog>> {
        self.current.read().as_ref().map(Arc::clone)
    }

    fn build_catalog(&self) -> Result<Catalog, IndexError> {
        let configs: Vec<&DomainConfig> = self.schema.domains().collect();

        let loaded = configs
            .par_iter()
            .map(|config| load_entries(&self.root, config))
            .collect::<Result<Vec<_>, LoadError>>()?;

        let mut catalog = Catalog::new(Arc::clone(&self.schema));
        for (domain, entries) in loaded {
            tracing::debug!(%domain, records = entries.len(), "indexed domain");
            catalog.insert_domain(&domain, entries)?;
        }

        tracing::info!(
            domains = configs.len(),
            records = catalog.len(),
            "built reference index"
        );
        Ok(catalog)
    }
}

fn load_entries(root: &Path, config: &DomainConfig) -> Result<(String, DomainEntries), LoadError> {
    let document = DomainDocument::load(root, config)?;
    let entries = document.records()?.into_iter().collect();
    Ok((config.name().to_string(), entries))
}
