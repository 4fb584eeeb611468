//! Snapshot loading from JSON package documents
//!
//! The scanning layer itself never touches the on-disk repository format;
//! this module turns a JSON description of a snapshot into an
//! [`InMemoryRepository`]. Malformed packages are input faults: they are
//! skipped and surfaced, the rest of the snapshot loads.

use indexmap::IndexSet;
use serde::Deserialize;

use crate::depset::DepSet;
use crate::error::Error;
use crate::package::{Keyword, Package, PackageId};
use crate::repository::InMemoryRepository;

/// Top-level snapshot document
#[derive(Debug, Deserialize)]
pub struct SnapshotDoc {
    #[serde(default)]
    pub name: Option<String>,
    pub packages: Vec<PackageDoc>,
}

/// One package record; dependency attributes are raw depend strings
#[derive(Debug, Deserialize)]
pub struct PackageDoc {
    pub category: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub iuse: Vec<String>,
    #[serde(default)]
    pub depend: String,
    #[serde(default)]
    pub rdepend: String,
    #[serde(default)]
    pub pdepend: String,
    #[serde(default)]
    pub inherited: Vec<String>,
}

/// A package that failed to load; the scan continues without it
#[derive(Debug)]
pub struct SnapshotFault {
    pub package: String,
    pub error: Error,
}

/// Parse a snapshot document and build the repository it describes.
///
/// Returns the repository together with the per-package faults; a fault in
/// one package never poisons the others.
pub fn load_snapshot(json: &str) -> Result<(InMemoryRepository, Vec<SnapshotFault>), Error> {
    let doc: SnapshotDoc = serde_json::from_str(json)?;
    let name = doc.name.unwrap_or_else(|| "snapshot".to_string());

    let mut repo = InMemoryRepository::new(name);
    let mut faults = Vec::new();
    for pkg_doc in doc.packages {
        let label = format!("{}/{}-{}", pkg_doc.category, pkg_doc.name, pkg_doc.version);
        match build_package(pkg_doc) {
            Ok(pkg) => repo.add_package(pkg),
            Err(error) => {
                log::warn!("skipping {}: {}", label, error);
                faults.push(SnapshotFault {
                    package: label,
                    error,
                });
            }
        }
    }
    Ok((repo, faults))
}

fn build_package(doc: PackageDoc) -> Result<Package, Error> {
    let label = format!("{}/{}-{}", doc.category, doc.name, doc.version);

    let version = doc
        .version
        .parse()
        .map_err(|e: treelint_atom::VersionError| Error::InvalidPackage {
            package: label.clone(),
            message: e.to_string(),
        })?;

    let mut keywords = Vec::with_capacity(doc.keywords.len());
    for raw in &doc.keywords {
        let keyword: Keyword = raw.parse().map_err(|_| Error::InvalidPackage {
            package: label.clone(),
            message: format!("invalid keyword \"{}\"", raw),
        })?;
        keywords.push(keyword);
    }

    let parse_deps = |raw: &str| -> Result<DepSet, Error> {
        raw.parse().map_err(|e| Error::InvalidDepSet {
            package: label.clone(),
            source: e,
        })
    };
    let depend = parse_deps(&doc.depend)?;
    // post-merge deps are checked together with run-time deps
    let mut rdepend = parse_deps(&doc.rdepend)?;
    rdepend.extend(parse_deps(&doc.pdepend)?);

    Ok(Package {
        id: PackageId {
            category: doc.category,
            name: doc.name,
            version,
        },
        slot: doc.slot.unwrap_or_else(|| "0".to_string()),
        keywords,
        iuse: doc.iuse.into_iter().collect::<IndexSet<String>>(),
        depend,
        rdepend,
        inherited: doc.inherited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Repository;

    #[test]
    fn test_load_minimal_snapshot() {
        let (repo, faults) = load_snapshot(
            r#"{
                "name": "gentoo",
                "packages": [
                    {
                        "category": "dev-libs",
                        "name": "openssl",
                        "version": "1.1.1",
                        "keywords": ["x86", "~amd64"],
                        "rdepend": "app-misc/ca-certificates"
                    }
                ]
            }"#,
        )
        .unwrap();
        assert!(faults.is_empty());
        assert_eq!(repo.name(), "gentoo");
        assert_eq!(repo.count(), 1);
        let pkg = &repo.find_packages("dev-libs/openssl")[0];
        assert_eq!(pkg.slot, "0");
        assert_eq!(pkg.rdepend.iter_atoms().count(), 1);
    }

    #[test]
    fn test_pdepend_folds_into_rdepend() {
        let (repo, faults) = load_snapshot(
            r#"{
                "packages": [
                    {
                        "category": "a", "name": "b", "version": "1",
                        "rdepend": "x/one",
                        "pdepend": "y/two"
                    }
                ]
            }"#,
        )
        .unwrap();
        assert!(faults.is_empty());
        let pkg = &repo.find_packages("a/b")[0];
        assert_eq!(pkg.rdepend.iter_atoms().count(), 2);
    }

    #[test]
    fn test_malformed_package_is_skipped_not_fatal() {
        let (repo, faults) = load_snapshot(
            r#"{
                "packages": [
                    {"category": "a", "name": "bad", "version": "1", "depend": "|| broken"},
                    {"category": "a", "name": "good", "version": "1"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].package, "a/bad-1");
        assert_eq!(repo.count(), 1);
        assert!(!repo.find_packages("a/good").is_empty());
    }

    #[test]
    fn test_invalid_document_is_fatal() {
        assert!(load_snapshot("not json").is_err());
        assert!(load_snapshot("{}").is_err());
    }
}
