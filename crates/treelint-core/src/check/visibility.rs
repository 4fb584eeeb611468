//! Dependency visibility check: can every package's dependency expressions be
//! satisfied by visible packages under every target configuration?
//!
//! Per package the check runs three passes, cheapest first:
//!
//! 1. live version-control packages visible under any unstable configuration,
//! 2. atoms with zero matches anywhere in the repository (configuration
//!    independent, populates the global insoluble set),
//! 3. per-configuration CNF satisfiability of both dependency attributes.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexSet;

use treelint_atom::Atom;

use crate::check::{Check, ScanContext};
use crate::depset::{Clause, DepSet};
use crate::error::Error;
use crate::package::{DepKind, Package};
use crate::profile::{ProfileConfig, ProfileRegistry};
use crate::report::{Finding, Reporter};

/// Memoization key for one attribute's CNF evaluation: the split of the
/// attribute's conditionals into tristate flags and enabled flags. Two
/// configurations with the same split see the same formula.
type EvalKey = (BTreeSet<String>, BTreeSet<String>);
type EvalCache = HashMap<EvalKey, Rc<Vec<Clause>>>;

/// The dependency satisfiability check over every registered configuration
pub struct VisibilityCheck {
    registry: Arc<ProfileRegistry>,
}

impl VisibilityCheck {
    pub fn new(registry: Arc<ProfileRegistry>) -> Self {
        Self { registry }
    }

    fn check_vcs_exposure(&self, pkg: &Package, reporter: &mut dyn Reporter) {
        for (arch, config) in self.registry.unstable_configs() {
            if config.filter.matches(pkg) {
                reporter.report(Finding::visible_vcs(pkg, arch, &config.name));
            }
        }
    }

    fn check_package(
        &self,
        pkg: &Package,
        ctx: &mut ScanContext,
        reporter: &mut dyn Reporter,
    ) -> Result<(), Error> {
        // Configuration-independent pre-pass: resolve every atom of both
        // attributes once, ignoring conditional structure. Cheap typo/removal
        // detection, and it fills the query cache and global insoluble set
        // before any configuration relies on them.
        let mut nonexistent: IndexSet<Atom> = IndexSet::new();
        for kind in DepKind::all() {
            for atom in pkg.dep_set(kind).iter_atoms() {
                ctx.resolve_recording(atom, &mut nonexistent)?;
            }
            if !nonexistent.is_empty() {
                let atoms: Vec<Atom> = nonexistent.drain(..).collect();
                reporter.report(Finding::nonexistent(pkg, kind, &atoms));
            }
        }

        let conditionals = [
            pkg.depend.known_conditionals(),
            pkg.rdepend.known_conditionals(),
        ];
        let mut eval_caches: [EvalCache; 2] = [HashMap::new(), HashMap::new()];

        for (keyword, keyword_filter) in self.registry.keywords() {
            if !keyword_filter.matches(pkg) {
                continue;
            }
            for config in self.registry.configs_for(keyword) {
                let masked = !config.filter.matches(pkg);
                for (idx, kind) in DepKind::all().into_iter().enumerate() {
                    let clauses = evaluate_cached(
                        pkg.dep_set(kind),
                        &conditionals[idx],
                        config,
                        &mut eval_caches[idx],
                    );
                    let failures = self.solve_depset(&clauses, config, ctx)?;
                    if !failures.is_empty() {
                        reporter.report(Finding::unsolvable(
                            pkg,
                            kind,
                            keyword,
                            &config.name,
                            &failures,
                            masked,
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// The satisfiability engine: evaluate CNF clauses under one
    /// configuration.
    ///
    /// Returns the empty vec when every clause holds, otherwise the atoms of
    /// the first wholly failed clause; evaluation stops there, one failing
    /// clause being sufficient evidence of unsatisfiability.
    fn solve_depset(
        &self,
        clauses: &[Clause],
        config: &ProfileConfig,
        ctx: &mut ScanContext,
    ) -> Result<Vec<Atom>, Error> {
        'clauses: for clause in clauses {
            // blockers are not a satisfiability requirement at this layer
            if clause.iter().any(|atom| atom.blocks()) {
                continue;
            }
            // related package versions repeat atoms; one already-satisfied
            // atom settles the whole OR-group
            if clause
                .iter()
                .any(|atom| config.satisfied.borrow().contains(&atom.cache_key()))
            {
                continue;
            }

            for atom in clause {
                let key = atom.cache_key();
                if config.insoluble.borrow().contains(&key) {
                    continue;
                }
                if config.virtuals.covers(atom, &config.filter) {
                    config.satisfied.borrow_mut().insert(key);
                    continue 'clauses;
                }
                if atom.is_virtual() && !ctx.query_cache.contains(key) {
                    // virtual with zero raw matches and no provider under
                    // this profile
                    config.insoluble.borrow_mut().insert(key);
                    continue;
                }
                let matches = ctx.resolve(atom)?;
                if matches.iter().any(|p| config.filter.matches(p)) {
                    config.satisfied.borrow_mut().insert(key);
                    continue 'clauses;
                }
                config.insoluble.borrow_mut().insert(key);
            }

            // no atom satisfied the group: report it and stop
            let mut failures: IndexSet<Atom> = IndexSet::new();
            failures.extend(clause.iter().cloned());
            return Ok(failures.into_iter().collect());
        }
        Ok(Vec::new())
    }
}

impl Check for VisibilityCheck {
    fn name(&self) -> &'static str {
        "visibility"
    }

    fn start(&mut self, _ctx: &ScanContext) {
        // per-configuration caches are scoped to a single scan
        self.registry.reset_caches();
    }

    fn feed(
        &mut self,
        pkgset: &[Arc<Package>],
        ctx: &mut ScanContext,
        reporter: &mut dyn Reporter,
    ) -> Result<(), Error> {
        for pkg in pkgset {
            if pkg.is_live() {
                self.check_vcs_exposure(pkg, reporter);
            }
            self.check_package(pkg, ctx, reporter)?;
        }
        Ok(())
    }
}

fn evaluate_cached(
    depset: &DepSet,
    conditionals: &BTreeSet<String>,
    config: &ProfileConfig,
    cache: &mut EvalCache,
) -> Rc<Vec<Clause>> {
    let tri_flags: BTreeSet<String> = conditionals
        .iter()
        .filter(|flag| !config.non_tristate.contains(*flag))
        .cloned()
        .collect();
    let set_flags: BTreeSet<String> = conditionals
        .iter()
        .filter(|flag| config.use_flags.contains(*flag))
        .cloned()
        .collect();
    cache
        .entry((tri_flags, set_flags))
        .or_insert_with(|| Rc::new(depset.evaluate(&config.use_flags, &config.non_tristate)))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Keyword, PackageId};
    use crate::profile::{Profile, ProfileRegistry, VisibilityFilter};
    use crate::repository::InMemoryRepository;
    use std::cell::RefCell;
    use std::collections::HashSet;

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

    fn config(keyword: &str) -> ProfileConfig {
        ProfileConfig {
            name: "default/test".to_string(),
            virtuals: Default::default(),
            use_flags: HashSet::new(),
            non_tristate: HashSet::new(),
            filter: VisibilityFilter::new(keyword.parse().unwrap(), Vec::new()),
            satisfied: RefCell::new(HashSet::new()),
            insoluble: RefCell::new(HashSet::new()),
        }
    }

    fn check() -> VisibilityCheck {
        VisibilityCheck::new(Arc::new(ProfileRegistry::new()))
    }

    fn clause(atoms: &[&str]) -> Clause {
        atoms.iter().map(|a| a.parse().unwrap()).collect()
    }

    #[test]
    fn test_engine_satisfied_by_visible_match() {
        let mut repo = InMemoryRepository::new("test");
        repo.add_package(pkg("a/one", "1.0", &["x86"]));
        let mut ctx = ScanContext::new(&repo);
        let cfg = config("x86");

        let failures = check()
            .solve_depset(&[clause(&["a/one"])], &cfg, &mut ctx)
            .unwrap();
        assert!(failures.is_empty());
        assert!(cfg
            .satisfied
            .borrow()
            .contains(&"a/one".parse::<Atom>().unwrap().cache_key()));
    }

    #[test]
    fn test_engine_invisible_match_fails_clause() {
        let mut repo = InMemoryRepository::new("test");
        repo.add_package(pkg("a/one", "1.0", &["~x86"]));
        let mut ctx = ScanContext::new(&repo);
        let cfg = config("x86");

        let failures = check()
            .solve_depset(&[clause(&["a/one"])], &cfg, &mut ctx)
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert!(cfg
            .insoluble
            .borrow()
            .contains(&"a/one".parse::<Atom>().unwrap().cache_key()));
    }

    #[test]
    fn test_engine_blocker_clause_skipped() {
        let repo = InMemoryRepository::new("test");
        let mut ctx = ScanContext::new(&repo);
        let cfg = config("x86");

        let failures = check()
            .solve_depset(&[clause(&["!a/gone", "b/also-gone"])], &cfg, &mut ctx)
            .unwrap();
        assert!(failures.is_empty());
    }

    #[test]
    fn test_engine_stops_at_first_failed_clause() {
        let repo = InMemoryRepository::new("test");
        let mut ctx = ScanContext::new(&repo);
        let cfg = config("x86");

        let failures = check()
            .solve_depset(
                &[clause(&["a/gone", "b/gone"]), clause(&["c/also-gone"])],
                &cfg,
                &mut ctx,
            )
            .unwrap();
        // only the first failed OR-group is reported
        let names: Vec<String> = failures.iter().map(|a| a.to_string()).collect();
        assert_eq!(names, ["a/gone", "b/gone"]);
    }

    #[test]
    fn test_engine_virtual_without_providers_is_insoluble() {
        let repo = InMemoryRepository::new("test");
        let mut ctx = ScanContext::new(&repo);
        let cfg = config("x86");

        let failures = check()
            .solve_depset(&[clause(&["virtual/jdk"])], &cfg, &mut ctx)
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert!(cfg
            .insoluble
            .borrow()
            .contains(&"virtual/jdk".parse::<Atom>().unwrap().cache_key()));
        // absence of a virtual is never global: another profile may provide it
        assert!(ctx.global_insoluble.is_empty());
    }

    #[test]
    fn test_engine_virtual_covered_by_provider_index() {
        let mut repo = InMemoryRepository::new("test");
        repo.add_package(pkg("dev-java/openjdk", "17", &["x86"]));
        let mut registry = ProfileRegistry::new();
        let mut profile = Profile::new("default/test");
        profile
            .virtuals
            .insert("virtual/jdk".to_string(), "dev-java/openjdk".parse().unwrap());
        registry.register("x86", profile, &repo).unwrap();
        let registry = Arc::new(registry);

        let mut ctx = ScanContext::new(&repo);
        let check = VisibilityCheck::new(registry.clone());
        let cfg = registry.configs_for("x86").next().unwrap();

        let failures = check
            .solve_depset(&[clause(&["virtual/jdk"])], cfg, &mut ctx)
            .unwrap();
        assert!(failures.is_empty());
        assert!(cfg
            .satisfied
            .borrow()
            .contains(&"virtual/jdk".parse::<Atom>().unwrap().cache_key()));
    }

    #[test]
    fn test_eval_cache_shares_identical_flag_splits() {
        let depset: DepSet = "ssl? ( a/one )".parse().unwrap();
        let conditionals = depset.known_conditionals();
        let cfg = config("x86");
        let mut cache = EvalCache::new();

        let first = evaluate_cached(&depset, &conditionals, &cfg, &mut cache);
        let second = evaluate_cached(&depset, &conditionals, &cfg, &mut cache);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }
}
