use thiserror::Error;

use crate::depset::DepParseError;
use crate::repository::RepositoryError;

/// Errors surfaced by the scanning layer.
///
/// Data-integrity problems (nonexistent atoms, unsolvable clauses, exposed
/// vcs packages) are never errors; they are findings delivered through the
/// reporter. This type covers input faults and collaborator failures only.
#[derive(Error, Debug)]
pub enum Error {
    /// The atom matcher / repository backing store failed; aborts the scan
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A package carries a dependency expression that does not parse
    #[error("package {package}: invalid dependency expression: {source}")]
    InvalidDepSet {
        package: String,
        #[source]
        source: DepParseError,
    },

    /// A package record is malformed (bad version, keyword or atom field)
    #[error("package {package}: {message}")]
    InvalidPackage { package: String, message: String },

    /// A profile was registered under an unparsable keyword
    #[error("profile {profile}: invalid keyword \"{keyword}\"")]
    InvalidKeyword { profile: String, keyword: String },

    /// The snapshot document itself is not valid JSON
    #[error("invalid snapshot document: {0}")]
    Snapshot(#[from] serde_json::Error),
}
