//! Scan-scoped memoization: the shared query cache and the global insoluble
//! set
//!
//! Both structures live exactly as long as one scan over one snapshot and are
//! passed into the engine explicitly, never held as globals, so tests can
//! construct fresh instances and assert on their contents.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use treelint_atom::Atom;

use crate::package::Package;
use crate::repository::{Repository, RepositoryError};

/// Atoms proven to have zero matches in the entire repository, independent of
/// any configuration. Monotone: entries are only ever added.
///
/// Invariant: a key in this set never maps to a non-empty [`QueryCache`]
/// entry.
#[derive(Debug, Default)]
pub struct GlobalInsoluble {
    keys: HashSet<u64>,
}

impl GlobalInsoluble {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: u64) {
        self.keys.insert(key);
    }

    pub fn contains(&self, key: u64) -> bool {
        self.keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Memoized atom matcher results, shared across every package and
/// configuration of one scan. Versions of the same package tend to repeat
/// atoms, so hits vastly outnumber repository queries.
///
/// An entry holding an empty slice means "queried, zero matches"; a missing
/// entry means "never queried" (blockers and raw-matchless virtuals stay
/// unqueried on purpose).
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: IndexMap<u64, Arc<Vec<Arc<Package>>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve an atom to its repository-wide match set.
    ///
    /// Cache hits return immediately. On a miss the atom goes through the
    /// global insoluble set first and only then to the matcher; an atom with
    /// zero matches that is neither a blocker nor a virtual target is
    /// recorded as globally insoluble, since repository-wide absence is
    /// configuration independent. Virtual targets with zero raw matches are
    /// left out of both tables: their resolution is profile specific.
    ///
    /// When a `nonexistent` collector is supplied (the pre-pass), atoms
    /// proven absent are added to it.
    pub fn resolve(
        &mut self,
        atom: &Atom,
        repo: &dyn Repository,
        global: &mut GlobalInsoluble,
        mut nonexistent: Option<&mut IndexSet<Atom>>,
    ) -> Result<Arc<Vec<Arc<Package>>>, RepositoryError> {
        let key = atom.cache_key();
        if let Some(hit) = self.entries.get(&key) {
            log::trace!("query cache hit: {}", atom);
            // a hit on a proven-absent atom still counts against the package
            // currently being pre-passed
            if hit.is_empty() && global.contains(key) {
                if let Some(collector) = nonexistent.as_deref_mut() {
                    collector.insert(atom.clone());
                }
            }
            return Ok(hit.clone());
        }

        if global.contains(key) {
            log::trace!("globally insoluble, skipping matcher: {}", atom);
            if let Some(collector) = nonexistent.as_deref_mut() {
                collector.insert(atom.clone());
            }
            let empty = Arc::new(Vec::new());
            self.entries.insert(key, empty.clone());
            return Ok(empty);
        }

        let matches = repo.itermatch(atom)?;
        if !matches.is_empty() {
            let matches = Arc::new(matches);
            self.entries.insert(key, matches.clone());
            return Ok(matches);
        }

        if !atom.blocks() && !atom.is_virtual() {
            log::debug!("no matches anywhere in {} for {}", repo.name(), atom);
            if let Some(collector) = nonexistent.as_deref_mut() {
                collector.insert(atom.clone());
            }
            let empty = Arc::new(Vec::new());
            self.entries.insert(key, empty.clone());
            global.insert(key);
            Ok(empty)
        } else {
            Ok(Arc::new(Vec::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Keyword, PackageId};
    use crate::repository::InMemoryRepository;
    use std::cell::Cell;

    fn repo() -> InMemoryRepository {
        let mut repo = InMemoryRepository::new("test");
        repo.add_package(Package {
            id: PackageId {
                category: "dev-libs".to_string(),
                name: "glib".to_string(),
                version: "2.76".parse().unwrap(),
            },
            slot: "2".to_string(),
            keywords: vec![Keyword::Stable("x86".to_string())],
            iuse: Default::default(),
            depend: Default::default(),
            rdepend: Default::default(),
            inherited: Vec::new(),
        });
        repo
    }

    /// Repository wrapper counting matcher invocations
    struct Counting<'r> {
        inner: &'r InMemoryRepository,
        queries: Cell<usize>,
    }

    impl Repository for Counting<'_> {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn packages(&self) -> Vec<Arc<Package>> {
            self.inner.packages()
        }

        fn find_packages(&self, key: &str) -> Vec<Arc<Package>> {
            self.queries.set(self.queries.get() + 1);
            self.inner.find_packages(key)
        }
    }

    #[test]
    fn test_hit_skips_matcher() {
        let repo = repo();
        let counting = Counting {
            inner: &repo,
            queries: Cell::new(0),
        };
        let mut cache = QueryCache::new();
        let mut global = GlobalInsoluble::new();
        let atom: Atom = "dev-libs/glib".parse().unwrap();

        let first = cache.resolve(&atom, &counting, &mut global, None).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(counting.queries.get(), 1);

        let second = cache.resolve(&atom, &counting, &mut global, None).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(counting.queries.get(), 1);
        assert!(global.is_empty());
    }

    #[test]
    fn test_absent_atom_becomes_globally_insoluble() {
        let repo = repo();
        let counting = Counting {
            inner: &repo,
            queries: Cell::new(0),
        };
        let mut cache = QueryCache::new();
        let mut global = GlobalInsoluble::new();
        let atom: Atom = "dev-libs/gone".parse().unwrap();
        let mut nonexistent = IndexSet::new();

        let hits = cache
            .resolve(&atom, &counting, &mut global, Some(&mut nonexistent))
            .unwrap();
        assert!(hits.is_empty());
        assert!(global.contains(atom.cache_key()));
        assert_eq!(nonexistent.len(), 1);

        // second resolution never reaches the matcher again
        cache.resolve(&atom, &counting, &mut global, None).unwrap();
        assert_eq!(counting.queries.get(), 1);
    }

    #[test]
    fn test_blockers_and_virtuals_stay_out_of_global_set() {
        let repo = repo();
        let mut cache = QueryCache::new();
        let mut global = GlobalInsoluble::new();
        let mut nonexistent = IndexSet::new();

        let blocker: Atom = "!dev-libs/gone".parse().unwrap();
        cache
            .resolve(&blocker, &repo, &mut global, Some(&mut nonexistent))
            .unwrap();
        let virtual_atom: Atom = "virtual/jdk".parse().unwrap();
        cache
            .resolve(&virtual_atom, &repo, &mut global, Some(&mut nonexistent))
            .unwrap();

        assert!(global.is_empty());
        assert!(nonexistent.is_empty());
        assert!(!cache.contains(blocker.cache_key()));
        assert!(!cache.contains(virtual_atom.cache_key()));
    }
}
