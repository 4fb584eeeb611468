//! Repository snapshot interface and the in-memory implementation
//!
//! A scan runs against one immutable snapshot. The only operation with any
//! algorithmic weight is [`Repository::itermatch`], the atom matcher every
//! cache in the checker sits in front of.

use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use treelint_atom::Atom;

use crate::package::Package;

/// Failure of the repository backing store; aborts the scan, never retried
#[derive(Error, Debug, Clone)]
#[error("repository {repo}: {message}")]
pub struct RepositoryError {
    pub repo: String,
    pub message: String,
}

/// Read-only package source for one scan
pub trait Repository {
    /// A unique name for this repository
    fn name(&self) -> &str;

    /// All packages, grouped by key in declaration order, versions ascending
    fn packages(&self) -> Vec<Arc<Package>>;

    /// All versions of a `category/name` key, ascending
    fn find_packages(&self, key: &str) -> Vec<Arc<Package>>;

    /// The atom matcher: every package variant the atom's constraints accept.
    /// Pure with respect to the snapshot.
    fn itermatch(&self, atom: &Atom) -> Result<Vec<Arc<Package>>, RepositoryError> {
        Ok(self
            .find_packages(&atom.key())
            .into_iter()
            .filter(|p| p.matches(atom))
            .collect())
    }

    fn count(&self) -> usize {
        self.packages().len()
    }
}

/// Repository held entirely in memory, the backing store for snapshot
/// fixtures and tests
#[derive(Default)]
pub struct InMemoryRepository {
    name: String,
    by_key: IndexMap<String, Vec<Arc<Package>>>,
}

impl InMemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            by_key: IndexMap::new(),
        }
    }

    /// Insert a package, keeping each key's versions sorted ascending
    pub fn add_package(&mut self, package: Package) {
        let key = package.key();
        let versions = self.by_key.entry(key).or_default();
        versions.push(Arc::new(package));
        versions.sort_by(|a, b| a.version().cmp(b.version()));
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl Repository for InMemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn packages(&self) -> Vec<Arc<Package>> {
        self.by_key.values().flatten().cloned().collect()
    }

    fn find_packages(&self, key: &str) -> Vec<Arc<Package>> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }
}
