//! Package model: identity, keywords and dependency attributes

use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::Serialize;
use thiserror::Error;

use treelint_atom::{Atom, Version};

use crate::depset::DepSet;

/// Eclasses that mark a package as built from live version-control sources
pub const VCS_ECLASSES: &[&str] = &["subversion", "git", "cvs", "darcs"];

/// A stability keyword: `x86` accepts stable consumers, `~x86` accepts
/// unstable ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Keyword {
    Stable(String),
    Unstable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid keyword \"{0}\"")]
pub struct KeywordError(pub String);

impl Keyword {
    /// The architecture name without any stability marker
    pub fn arch(&self) -> &str {
        match self {
            Keyword::Stable(arch) | Keyword::Unstable(arch) => arch,
        }
    }

}

impl FromStr for Keyword {
    type Err = KeywordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (unstable, arch) = match s.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if arch.is_empty()
            || arch.starts_with('-')
            || !arch.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(KeywordError(s.to_string()));
        }
        Ok(if unstable {
            Keyword::Unstable(arch.to_string())
        } else {
            Keyword::Stable(arch.to_string())
        })
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Keyword::Stable(arch) => f.write_str(arch),
            Keyword::Unstable(arch) => write!(f, "~{}", arch),
        }
    }
}

/// Which dependency attribute of a package is being examined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DepKind {
    /// Build-time dependencies
    Depend,
    /// Run-time dependencies, post-merge dependencies folded in
    Rdepend,
}

impl DepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepKind::Depend => "depend",
            DepKind::Rdepend => "rdepend",
        }
    }

    /// Both attribute kinds, in the order the checker examines them
    pub fn all() -> [DepKind; 2] {
        [DepKind::Depend, DepKind::Rdepend]
    }
}

impl fmt::Display for DepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full package identity: category, name and version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageId {
    pub category: String,
    pub name: String,
    pub version: Version,
}

impl PackageId {
    /// The `category/name` lookup key
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-{}", self.category, self.name, self.version)
    }
}

/// A versioned package as loaded from the repository snapshot.
///
/// Read-only for the lifetime of a scan; checks only ever look at it through
/// `Arc<Package>`.
#[derive(Debug, Clone)]
pub struct Package {
    pub id: PackageId,
    pub slot: String,
    pub keywords: Vec<Keyword>,
    pub iuse: IndexSet<String>,
    pub depend: DepSet,
    pub rdepend: DepSet,
    pub inherited: Vec<String>,
}

impl Package {
    pub fn key(&self) -> String {
        self.id.key()
    }

    pub fn version(&self) -> &Version {
        &self.id.version
    }

    /// True if the package inherits one of the version-control eclasses and
    /// is therefore built from unreleased sources
    pub fn is_live(&self) -> bool {
        self.inherited
            .iter()
            .any(|eclass| VCS_ECLASSES.contains(&eclass.as_str()))
    }

    /// The requested dependency attribute
    pub fn dep_set(&self, kind: DepKind) -> &DepSet {
        match kind {
            DepKind::Depend => &self.depend,
            DepKind::Rdepend => &self.rdepend,
        }
    }

    /// Non-blocker atom matching: category, name, version constraint and slot
    /// constraint all have to line up. The atom's blocker marker is ignored
    /// here; whether a match is good or bad news is the caller's business.
    pub fn matches(&self, atom: &Atom) -> bool {
        atom.category() == self.id.category
            && atom.package() == self.id.name
            && atom.matches_version(&self.id.version)
            && atom.matches_slot(&self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(category: &str, name: &str, version: &str) -> Package {
        Package {
            id: PackageId {
                category: category.to_string(),
                name: name.to_string(),
                version: version.parse().unwrap(),
            },
            slot: "0".to_string(),
            keywords: vec![Keyword::Stable("x86".to_string())],
            iuse: IndexSet::new(),
            depend: DepSet::default(),
            rdepend: DepSet::default(),
            inherited: Vec::new(),
        }
    }

    #[test]
    fn test_keyword_parsing() {
        assert_eq!("x86".parse::<Keyword>().unwrap(), Keyword::Stable("x86".into()));
        assert_eq!(
            "~amd64".parse::<Keyword>().unwrap(),
            Keyword::Unstable("amd64".into())
        );
        assert!("".parse::<Keyword>().is_err());
        assert!("~".parse::<Keyword>().is_err());
        assert!("-*".parse::<Keyword>().is_err());
    }

    #[test]
    fn test_keyword_display() {
        assert_eq!(Keyword::Stable("x86".into()).to_string(), "x86");
        assert_eq!(Keyword::Unstable("x86".into()).to_string(), "~x86");
    }

    #[test]
    fn test_atom_matching() {
        let p = pkg("dev-libs", "openssl", "1.1.1");
        assert!(p.matches(&"dev-libs/openssl".parse().unwrap()));
        assert!(p.matches(&">=dev-libs/openssl-1.1.0".parse().unwrap()));
        assert!(!p.matches(&">=dev-libs/openssl-3.0".parse().unwrap()));
        assert!(!p.matches(&"dev-libs/openssl:1".parse().unwrap()));
        assert!(!p.matches(&"dev-libs/glib".parse().unwrap()));
    }

    #[test]
    fn test_is_live() {
        let mut p = pkg("app-editors", "vim", "9999");
        assert!(!p.is_live());
        p.inherited.push("git".to_string());
        assert!(p.is_live());
    }
}
