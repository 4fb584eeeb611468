//! Repository-wide dependency consistency checking for ebuild-style package
//! trees.
//!
//! For every package and every target configuration (a profile under a
//! stability keyword) the scanner answers one question: can the package's
//! declared dependency expressions be satisfied by packages actually present
//! and visible in the repository? It is a static consistency checker, not a
//! resolver; it reports every unsatisfiable combination instead of picking an
//! install plan.
//!
//! # Architecture
//!
//! - [`repository::Repository`]: the immutable snapshot plus the atom
//!   matcher.
//! - [`profile::ProfileRegistry`]: every (keyword, profile) configuration
//!   with its visibility filter and per-configuration caches.
//! - [`cache::QueryCache`] / [`cache::GlobalInsoluble`]: scan-wide
//!   memoization of matcher results and of atoms absent from the whole
//!   repository.
//! - [`check::VisibilityCheck`]: the satisfiability engine driven by
//!   [`check::Scanner`].
//! - [`report::Reporter`]: sink for the typed findings.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use treelint_core::check::{Scanner, ScanContext, VisibilityCheck};
//! use treelint_core::profile::{Profile, ProfileRegistry};
//! use treelint_core::report::CollectingReporter;
//! use treelint_core::snapshot::load_snapshot;
//!
//! let (repo, faults) = load_snapshot(
//!     r#"{"packages": [
//!         {"category": "app-misc", "name": "demo", "version": "1.0",
//!          "keywords": ["x86"], "rdepend": "dev-libs/missing"}
//!     ]}"#,
//! ).unwrap();
//! assert!(faults.is_empty());
//!
//! let mut registry = ProfileRegistry::new();
//! registry.register("x86", Profile::new("default/x86"), &repo).unwrap();
//!
//! let mut scanner = Scanner::new();
//! scanner.register(Box::new(VisibilityCheck::new(Arc::new(registry))));
//!
//! let mut ctx = ScanContext::new(&repo);
//! let mut reporter = CollectingReporter::new();
//! scanner.run(&mut ctx, &mut reporter).unwrap();
//!
//! // dev-libs/missing exists nowhere: one nonexistent-deps finding plus one
//! // unsolvable-deps finding for the x86 configuration
//! assert_eq!(reporter.findings().len(), 2);
//! ```

pub mod cache;
pub mod check;
pub mod depset;
mod error;
pub mod package;
pub mod profile;
pub mod report;
pub mod repository;
pub mod snapshot;

pub use error::Error;

pub use treelint_atom::{Atom, Operator, Version};
