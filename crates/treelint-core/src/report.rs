//! Typed findings and the reporting sink
//!
//! Findings are the product of a scan, not errors: a nonexistent atom or an
//! unsolvable clause is data about the repository, delivered through a
//! [`Reporter`] in discovery order.

use std::fmt;

use serde::Serialize;

use treelint_atom::Atom;

use crate::package::{DepKind, Package};

/// A single finding, keyed by package identity and, where applicable, the
/// configuration it was discovered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// A dependency attribute names atoms with zero matches anywhere in the
    /// repository, independent of configuration
    NonexistentDeps {
        category: String,
        package: String,
        version: String,
        attr: DepKind,
        atoms: Vec<String>,
    },
    /// A dependency attribute has no possible solution under one
    /// configuration; `failures` is the first wholly failed OR-clause
    UnsolvableDeps {
        category: String,
        package: String,
        version: String,
        attr: DepKind,
        keyword: String,
        profile: String,
        failures: Vec<String>,
        masked: bool,
    },
    /// A live version-control package is visible under an unstable
    /// configuration
    VisibleVcsPkg {
        category: String,
        package: String,
        version: String,
        arch: String,
        profile: String,
    },
}

impl Finding {
    pub fn nonexistent(pkg: &Package, attr: DepKind, atoms: &[Atom]) -> Self {
        Finding::NonexistentDeps {
            category: pkg.id.category.clone(),
            package: pkg.id.name.clone(),
            version: pkg.id.version.to_string(),
            attr,
            atoms: atoms.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn unsolvable(
        pkg: &Package,
        attr: DepKind,
        keyword: &str,
        profile: &str,
        failures: &[Atom],
        masked: bool,
    ) -> Self {
        Finding::UnsolvableDeps {
            category: pkg.id.category.clone(),
            package: pkg.id.name.clone(),
            version: pkg.id.version.to_string(),
            attr,
            keyword: keyword.to_string(),
            profile: profile.to_string(),
            failures: failures.iter().map(|a| a.to_string()).collect(),
            masked,
        }
    }

    pub fn visible_vcs(pkg: &Package, arch: &str, profile: &str) -> Self {
        Finding::VisibleVcsPkg {
            category: pkg.id.category.clone(),
            package: pkg.id.name.clone(),
            version: pkg.id.version.to_string(),
            arch: arch.to_string(),
            profile: profile.to_string(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::NonexistentDeps {
                category,
                package,
                version,
                attr,
                atoms,
            } => write!(
                f,
                "{}/{}-{}: attr({}): nonexistent atoms [ {} ]",
                category,
                package,
                version,
                attr,
                atoms.join(", ")
            ),
            Finding::UnsolvableDeps {
                category,
                package,
                version,
                attr,
                keyword,
                profile,
                failures,
                masked,
            } => {
                let masked_marker = if *masked { "masked " } else { "" };
                write!(
                    f,
                    "{}/{}-{}: {} {}{}: unsolvable {}, potential solutions: [ {} ]",
                    category,
                    package,
                    version,
                    attr,
                    masked_marker,
                    keyword,
                    profile,
                    failures.join(", ")
                )
            }
            Finding::VisibleVcsPkg {
                category,
                package,
                version,
                arch,
                profile,
            } => write!(
                f,
                "{}/{}-{}: vcs ebuild visible for arch {}, profile {}",
                category, package, version, arch, profile
            ),
        }
    }
}

/// Consumer of findings; implementations own formatting and persistence
pub trait Reporter {
    fn report(&mut self, finding: Finding);
}

/// Reporter that keeps every finding in memory, in discovery order
#[derive(Debug, Default)]
pub struct CollectingReporter {
    findings: Vec<Finding>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }

    /// The collected findings as a JSON array
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.findings)
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, finding: Finding) {
        self.findings.push(finding);
    }
}

/// Reporter that forwards findings to the log facade
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, finding: Finding) {
        log::warn!("{}", finding);
    }
}
