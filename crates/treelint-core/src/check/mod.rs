//! The check pipeline: scan context, check stages and the scanner
//!
//! A scan walks the repository once, feeding each `category/name` package set
//! through a fixed list of check stages. All shared memoization (the query
//! cache and the global insoluble set) lives in the [`ScanContext`], created
//! fresh per scan and handed to the stages explicitly.

mod visibility;

pub use visibility::VisibilityCheck;

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use treelint_atom::Atom;

use crate::cache::{GlobalInsoluble, QueryCache};
use crate::error::Error;
use crate::package::Package;
use crate::report::Reporter;
use crate::repository::{Repository, RepositoryError};

/// Shared state of one scan over one repository snapshot
pub struct ScanContext<'r> {
    repo: &'r dyn Repository,
    pub query_cache: QueryCache,
    pub global_insoluble: GlobalInsoluble,
}

impl<'r> ScanContext<'r> {
    pub fn new(repo: &'r dyn Repository) -> Self {
        Self {
            repo,
            query_cache: QueryCache::new(),
            global_insoluble: GlobalInsoluble::new(),
        }
    }

    pub fn repo(&self) -> &dyn Repository {
        self.repo
    }

    /// Resolve an atom through the shared query cache
    pub fn resolve(&mut self, atom: &Atom) -> Result<Arc<Vec<Arc<Package>>>, RepositoryError> {
        self.query_cache
            .resolve(atom, self.repo, &mut self.global_insoluble, None)
    }

    /// Resolve an atom, collecting it into `nonexistent` if it turns out to
    /// have zero matches anywhere (the pre-pass entry point)
    pub fn resolve_recording(
        &mut self,
        atom: &Atom,
        nonexistent: &mut IndexSet<Atom>,
    ) -> Result<Arc<Vec<Arc<Package>>>, RepositoryError> {
        self.query_cache
            .resolve(atom, self.repo, &mut self.global_insoluble, Some(nonexistent))
    }
}

/// One stage of the scan pipeline.
///
/// Stages are driven start -> feed (once per package set) -> finish; they
/// hold no scan-shared state of their own.
pub trait Check {
    fn name(&self) -> &'static str;

    fn start(&mut self, _ctx: &ScanContext) {}

    /// Process all versions of one `category/name` key, versions ascending
    fn feed(
        &mut self,
        pkgset: &[Arc<Package>],
        ctx: &mut ScanContext,
        reporter: &mut dyn Reporter,
    ) -> Result<(), Error>;

    fn finish(&mut self, _reporter: &mut dyn Reporter) {}
}

/// Drives a list of checks over a repository snapshot
#[derive(Default)]
pub struct Scanner {
    checks: Vec<Box<dyn Check>>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, check: Box<dyn Check>) {
        self.checks.push(check);
    }

    /// Run every registered check over the snapshot behind `ctx`.
    ///
    /// Repository faults abort the scan; everything else a check discovers is
    /// a finding and goes to the reporter.
    pub fn run(&mut self, ctx: &mut ScanContext, reporter: &mut dyn Reporter) -> Result<(), Error> {
        for check in &mut self.checks {
            check.start(ctx);
        }

        let mut pkgsets: IndexMap<String, Vec<Arc<Package>>> = IndexMap::new();
        for pkg in ctx.repo().packages() {
            pkgsets.entry(pkg.key()).or_default().push(pkg);
        }
        log::debug!(
            "scanning {} package sets in {}",
            pkgsets.len(),
            ctx.repo().name()
        );

        for (key, pkgset) in &pkgsets {
            log::trace!("feeding {} ({} versions)", key, pkgset.len());
            for check in &mut self.checks {
                check.feed(pkgset, ctx, reporter)?;
            }
        }

        for check in &mut self.checks {
            check.finish(reporter);
        }
        Ok(())
    }
}
