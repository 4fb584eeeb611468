//! Profiles, visibility filters and the configuration registry
//!
//! A target configuration is a (stability keyword, profile) pair. The
//! registry holds every configuration a scan checks, in declaration order,
//! each with its own visibility filter and per-configuration caches.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use treelint_atom::Atom;

use crate::error::Error;
use crate::package::{Keyword, Package};
use crate::repository::Repository;

/// Stability predicate for one keyword.
///
/// A stable keyword (`x86`) accepts only packages keyworded stable for the
/// arch; an unstable keyword (`~x86`) accepts stable and unstable alike.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keyword: Keyword,
}

impl KeywordFilter {
    pub fn new(keyword: Keyword) -> Self {
        Self { keyword }
    }

    pub fn matches(&self, pkg: &Package) -> bool {
        match &self.keyword {
            Keyword::Stable(arch) => pkg
                .keywords
                .iter()
                .any(|k| matches!(k, Keyword::Stable(a) if a == arch)),
            Keyword::Unstable(arch) => pkg.keywords.iter().any(|k| k.arch() == arch),
        }
    }
}

/// Per-configuration visibility predicate: stability keyword plus the
/// profile's package masks
#[derive(Debug, Clone)]
pub struct VisibilityFilter {
    keyword_filter: KeywordFilter,
    masks: Vec<Atom>,
}

impl VisibilityFilter {
    pub fn new(keyword: Keyword, masks: Vec<Atom>) -> Self {
        Self {
            keyword_filter: KeywordFilter::new(keyword),
            masks,
        }
    }

    /// Is this package variant usable under the configuration
    pub fn matches(&self, pkg: &Package) -> bool {
        self.keyword_filter.matches(pkg) && !self.masks.iter().any(|mask| pkg.matches(mask))
    }
}

/// Provider table for virtual targets, resolved against the repository when
/// the profile is registered
#[derive(Debug, Default)]
pub struct VirtualsIndex {
    providers: IndexMap<String, Vec<Arc<Package>>>,
}

impl VirtualsIndex {
    /// Does the index cover this atom's target under the given filter?
    ///
    /// Coverage is by target name: the atom's own version/slot constraints
    /// refer to the virtual, not to any provider, and are not applied here.
    pub fn covers(&self, atom: &Atom, filter: &VisibilityFilter) -> bool {
        self.providers
            .get(&atom.key())
            .is_some_and(|providers| providers.iter().any(|p| filter.matches(p)))
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// A profile declaration as read from the profile source
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub name: String,
    /// virtual key -> provider atom
    pub virtuals: IndexMap<String, Atom>,
    /// flags the profile enables
    pub use_flags: HashSet<String>,
    /// flags exempt from tristate evaluation (forced or arch flags)
    pub non_tristate: HashSet<String>,
    /// profile-level package masks
    pub masks: Vec<Atom>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Profile {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// One fully derived (keyword, profile) configuration: the visibility filter
/// plus the configuration-scoped satisfied/insoluble caches.
///
/// The caches use interior mutability because one configuration is consulted
/// for every package of a scan while the registry itself stays shared.
#[derive(Debug)]
pub struct ProfileConfig {
    pub name: String,
    pub virtuals: VirtualsIndex,
    pub use_flags: HashSet<String>,
    pub non_tristate: HashSet<String>,
    pub filter: VisibilityFilter,
    /// atom cache-keys known satisfiable under this configuration
    pub satisfied: RefCell<HashSet<u64>>,
    /// atom cache-keys known unsatisfiable under this configuration
    pub insoluble: RefCell<HashSet<u64>>,
}

impl ProfileConfig {
    fn reset_caches(&self) {
        self.satisfied.borrow_mut().clear();
        self.insoluble.borrow_mut().clear();
    }
}

/// Ordered registry of every configuration a scan examines: keyword ->
/// profile name -> [`ProfileConfig`]
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    keywords: IndexMap<String, KeywordFilter>,
    profiles: IndexMap<String, IndexMap<String, ProfileConfig>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile under a stability keyword, resolving its virtual
    /// provider atoms against the repository.
    pub fn register(
        &mut self,
        keyword: &str,
        profile: Profile,
        repo: &dyn Repository,
    ) -> Result<(), Error> {
        let parsed: Keyword = keyword.parse().map_err(|_| Error::InvalidKeyword {
            profile: profile.name.clone(),
            keyword: keyword.to_string(),
        })?;

        let mut providers = IndexMap::new();
        for (virtual_key, provider_atom) in &profile.virtuals {
            let resolved = repo.itermatch(provider_atom)?;
            if resolved.is_empty() {
                log::debug!(
                    "profile {}: provider {} for {} resolves to nothing",
                    profile.name,
                    provider_atom,
                    virtual_key
                );
            }
            providers.insert(virtual_key.clone(), resolved);
        }

        self.keywords
            .entry(keyword.to_string())
            .or_insert_with(|| KeywordFilter::new(parsed.clone()));
        self.profiles.entry(keyword.to_string()).or_default().insert(
            profile.name.clone(),
            ProfileConfig {
                name: profile.name,
                virtuals: VirtualsIndex { providers },
                use_flags: profile.use_flags,
                non_tristate: profile.non_tristate,
                filter: VisibilityFilter::new(parsed, profile.masks),
                satisfied: RefCell::new(HashSet::new()),
                insoluble: RefCell::new(HashSet::new()),
            },
        );
        Ok(())
    }

    /// Keywords in declaration order with their stability filters
    pub fn keywords(&self) -> impl Iterator<Item = (&str, &KeywordFilter)> {
        self.keywords.iter().map(|(k, f)| (k.as_str(), f))
    }

    /// Every configuration registered under a keyword
    pub fn configs_for(&self, keyword: &str) -> impl Iterator<Item = &ProfileConfig> {
        self.profiles
            .get(keyword)
            .into_iter()
            .flat_map(|profiles| profiles.values())
    }

    /// Configurations under unstable keywords, with the bare arch name
    pub fn unstable_configs(&self) -> impl Iterator<Item = (&str, &ProfileConfig)> {
        self.profiles
            .iter()
            .filter(|(keyword, _)| keyword.starts_with('~'))
            .flat_map(|(keyword, profiles)| {
                profiles
                    .values()
                    .map(move |config| (keyword.trim_start_matches('~'), config))
            })
    }

    /// Drop all per-configuration cache state; called at the start of a scan
    pub fn reset_caches(&self) {
        for profiles in self.profiles.values() {
            for config in profiles.values() {
                config.reset_caches();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageId;
    use crate::repository::InMemoryRepository;

    fn pkg(key: &str, version: &str, keywords: &[&str]) -> Package {
        let (category, name) = key.split_once('/').unwrap();
        Package {
            id: PackageId {
                category: category.to_string(),
                name: name.to_string(),
                version: version.parse().unwrap(),
            },
            slot: "0".to_string(),
            keywords: keywords.iter().map(|k| k.parse().unwrap()).collect(),
            iuse: Default::default(),
            depend: Default::default(),
            rdepend: Default::default(),
            inherited: Vec::new(),
        }
    }

    #[test]
    fn test_keyword_filter_stability() {
        let stable = KeywordFilter::new("x86".parse().unwrap());
        let unstable = KeywordFilter::new("~x86".parse().unwrap());

        let stable_pkg = pkg("a/b", "1.0", &["x86"]);
        let unstable_pkg = pkg("a/b", "1.1", &["~x86"]);
        let other_arch = pkg("a/b", "1.2", &["~amd64"]);

        assert!(stable.matches(&stable_pkg));
        assert!(!stable.matches(&unstable_pkg));
        assert!(unstable.matches(&stable_pkg));
        assert!(unstable.matches(&unstable_pkg));
        assert!(!unstable.matches(&other_arch));
    }

    #[test]
    fn test_visibility_filter_masks() {
        let filter = VisibilityFilter::new(
            "x86".parse().unwrap(),
            vec![">=a/b-2".parse().unwrap()],
        );
        assert!(filter.matches(&pkg("a/b", "1.0", &["x86"])));
        assert!(!filter.matches(&pkg("a/b", "2.0", &["x86"])));
    }

    #[test]
    fn test_virtuals_resolution_and_coverage() {
        let mut repo = InMemoryRepository::new("test");
        repo.add_package(pkg("dev-java/openjdk", "17", &["x86"]));

        let mut profile = Profile::new("default/x86");
        profile
            .virtuals
            .insert("virtual/jdk".to_string(), "dev-java/openjdk".parse().unwrap());

        let mut registry = ProfileRegistry::new();
        registry.register("x86", profile, &repo).unwrap();

        let config = registry.configs_for("x86").next().unwrap();
        assert!(config
            .virtuals
            .covers(&"virtual/jdk".parse().unwrap(), &config.filter));
        assert!(!config
            .virtuals
            .covers(&"virtual/jre".parse().unwrap(), &config.filter));
    }

    #[test]
    fn test_unstable_configs() {
        let repo = InMemoryRepository::new("test");
        let mut registry = ProfileRegistry::new();
        registry
            .register("x86", Profile::new("default/x86"), &repo)
            .unwrap();
        registry
            .register("~x86", Profile::new("default/x86"), &repo)
            .unwrap();

        let unstable: Vec<&str> = registry.unstable_configs().map(|(arch, _)| arch).collect();
        assert_eq!(unstable, ["x86"]);
    }

    #[test]
    fn test_invalid_keyword_rejected() {
        let repo = InMemoryRepository::new("test");
        let mut registry = ProfileRegistry::new();
        assert!(registry
            .register("-*", Profile::new("broken"), &repo)
            .is_err());
    }
}
