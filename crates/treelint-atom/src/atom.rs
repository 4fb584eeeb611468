//! Dependency atom model and parser

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::{Operator, Version};

lazy_static! {
    static ref CATEGORY_RE: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9+_.-]*$").unwrap();
    static ref PACKAGE_RE: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9+_-]*$").unwrap();
    static ref SLOT_RE: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9+_.-]*$").unwrap();
    static ref USE_DEP_RE: Regex = Regex::new(r"^[!-]?[A-Za-z0-9][A-Za-z0-9+_@-]*[=?]?$").unwrap();
}

/// Error type for atom parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtomParseError {
    #[error("empty atom")]
    Empty,
    #[error("atom \"{0}\" has no category/package separator")]
    MissingCategory(String),
    #[error("atom \"{0}\" has an invalid category")]
    InvalidCategory(String),
    #[error("atom \"{0}\" has an invalid package name")]
    InvalidPackage(String),
    #[error("atom \"{0}\" has an invalid slot")]
    InvalidSlot(String),
    #[error("atom \"{0}\" has an invalid use dependency")]
    InvalidUseDep(String),
    #[error("atom \"{0}\" carries an operator but no parsable version")]
    MissingVersion(String),
    #[error("atom \"{0}\" carries a version but no operator")]
    VersionWithoutOperator(String),
    #[error("atom \"{0}\": ~ does not accept a revision")]
    RevisionOnApproximate(String),
}

/// An immutable dependency constraint: a target `category/package` plus
/// optional version, slot and use-dependency qualifiers, optionally negated
/// into a blocker.
///
/// Atoms are canonicalized at parse time; two atoms that constrain the same
/// thing compare equal and hash identically, which every cache in the checker
/// relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    blocks: bool,
    op: Option<Operator>,
    category: String,
    package: String,
    version: Option<Version>,
    slot: Option<String>,
    use_deps: Vec<String>,
}

impl Atom {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// The `category/package` lookup key
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.package)
    }

    /// True for negative (blocker) constraints
    pub fn blocks(&self) -> bool {
        self.blocks
    }

    /// True when the target lives in the virtual category and resolves via
    /// provider tables rather than direct matching
    pub fn is_virtual(&self) -> bool {
        self.category == "virtual"
    }

    pub fn slot(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Test a candidate version against the atom's version constraint.
    /// Unversioned atoms match every version.
    pub fn matches_version(&self, candidate: &Version) -> bool {
        match (&self.op, &self.version) {
            (Some(op), Some(constraint)) => op.matches(candidate, constraint),
            _ => true,
        }
    }

    /// Test a candidate slot against the atom's slot constraint
    pub fn matches_slot(&self, candidate: &str) -> bool {
        match &self.slot {
            Some(slot) => slot == candidate,
            None => true,
        }
    }

    /// Stable hash of the canonical form, used as the key in the query cache,
    /// the global insoluble set and the per-configuration caches.
    pub fn cache_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl FromStr for Atom {
    type Err = AtomParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AtomParseError::Empty);
        }
        let mut rest = s;

        let blocks = rest.starts_with('!');
        rest = rest.trim_start_matches('!');

        let mut op = None;
        for (prefix, operator) in [
            (">=", Operator::GreaterOrEqual),
            ("<=", Operator::LessOrEqual),
            (">", Operator::Greater),
            ("<", Operator::Less),
            ("=", Operator::Equal),
            ("~", Operator::Approximate),
        ] {
            if let Some(stripped) = rest.strip_prefix(prefix) {
                op = Some(operator);
                rest = stripped;
                break;
            }
        }

        let mut use_deps = Vec::new();
        if let Some(open) = rest.find('[') {
            if !rest.ends_with(']') {
                return Err(AtomParseError::InvalidUseDep(s.to_string()));
            }
            for dep in rest[open + 1..rest.len() - 1].split(',') {
                if !USE_DEP_RE.is_match(dep) {
                    return Err(AtomParseError::InvalidUseDep(s.to_string()));
                }
                use_deps.push(dep.to_string());
            }
            rest = &rest[..open];
        }

        let mut slot = None;
        if let Some(colon) = rest.find(':') {
            let slot_str = &rest[colon + 1..];
            if !SLOT_RE.is_match(slot_str) {
                return Err(AtomParseError::InvalidSlot(s.to_string()));
            }
            slot = Some(slot_str.to_string());
            rest = &rest[..colon];
        }

        let slash = rest
            .find('/')
            .ok_or_else(|| AtomParseError::MissingCategory(s.to_string()))?;
        let category = &rest[..slash];
        let mut pkgpart = &rest[slash + 1..];
        if !CATEGORY_RE.is_match(category) {
            return Err(AtomParseError::InvalidCategory(s.to_string()));
        }

        let mut version = None;
        if let Some(mut operator) = op {
            if operator == Operator::Equal && pkgpart.ends_with('*') {
                operator = Operator::EqualGlob;
                pkgpart = &pkgpart[..pkgpart.len() - 1];
            }
            let (name, ver) = split_version(pkgpart)
                .ok_or_else(|| AtomParseError::MissingVersion(s.to_string()))?;
            if operator == Operator::Approximate && ver.revision() != 0 {
                return Err(AtomParseError::RevisionOnApproximate(s.to_string()));
            }
            pkgpart = name;
            version = Some(ver);
            op = Some(operator);
        } else if split_version(pkgpart).is_some() {
            return Err(AtomParseError::VersionWithoutOperator(s.to_string()));
        }

        if !PACKAGE_RE.is_match(pkgpart) {
            return Err(AtomParseError::InvalidPackage(s.to_string()));
        }

        Ok(Atom {
            blocks,
            op,
            category: category.to_string(),
            package: pkgpart.to_string(),
            version,
            slot,
            use_deps,
        })
    }
}

/// Split a `name-version` tail off a package part, trying hyphen positions
/// from the right so that `foo-bar-1.2-r1` yields (`foo-bar`, `1.2-r1`).
fn split_version(pkgpart: &str) -> Option<(&str, Version)> {
    for (idx, _) in pkgpart.rmatch_indices('-') {
        let tail = &pkgpart[idx + 1..];
        if !tail.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        if let Ok(version) = tail.parse::<Version>() {
            return Some((&pkgpart[..idx], version));
        }
        // a tail like "1.2-r1" is consumed in one step via the rightmost
        // hyphen that opens a digit; keep scanning otherwise
    }
    None
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.blocks {
            write!(f, "!")?;
        }
        if let Some(op) = &self.op {
            write!(f, "{}", op.as_str())?;
        }
        write!(f, "{}/{}", self.category, self.package)?;
        if let Some(version) = &self.version {
            write!(f, "-{}", version)?;
            if self.op == Some(Operator::EqualGlob) {
                write!(f, "*")?;
            }
        }
        if let Some(slot) = &self.slot {
            write!(f, ":{}", slot)?;
        }
        if !self.use_deps.is_empty() {
            write!(f, "[{}]", self.use_deps.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(s: &str) -> Atom {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_plain() {
        let a = atom("dev-libs/glib");
        assert_eq!(a.category(), "dev-libs");
        assert_eq!(a.package(), "glib");
        assert_eq!(a.key(), "dev-libs/glib");
        assert!(!a.blocks());
        assert!(!a.is_virtual());
        assert!(a.version().is_none());
    }

    #[test]
    fn test_parse_versioned() {
        let a = atom(">=dev-libs/openssl-1.1.0");
        assert_eq!(a.package(), "openssl");
        assert_eq!(a.version().unwrap().as_str(), "1.1.0");
        assert!(a.matches_version(&"1.1.1".parse().unwrap()));
        assert!(!a.matches_version(&"1.0.2".parse().unwrap()));
    }

    #[test]
    fn test_parse_hyphenated_name_with_version() {
        let a = atom("=net-misc/openssh-askpass-9.0-r1");
        assert_eq!(a.package(), "openssh-askpass");
        assert_eq!(a.version().unwrap().as_str(), "9.0-r1");
    }

    #[test]
    fn test_parse_blocker_slot_use() {
        let a = atom("!>=dev-libs/openssl-1.1.0:0[bindist,-static]");
        assert!(a.blocks());
        assert_eq!(a.slot(), Some("0"));
        assert!(a.matches_slot("0"));
        assert!(!a.matches_slot("1"));
    }

    #[test]
    fn test_parse_glob() {
        let a = atom("=x11-libs/gtk+-2*");
        assert_eq!(a.package(), "gtk+");
        assert!(a.matches_version(&"2.24.33".parse().unwrap()));
        assert!(!a.matches_version(&"3.0".parse().unwrap()));
        assert_eq!(a.to_string(), "=x11-libs/gtk+-2*");
    }

    #[test]
    fn test_parse_virtual() {
        assert!(atom("virtual/jdk").is_virtual());
        assert!(!atom("dev-java/jdk").is_virtual());
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<Atom>().is_err());
        assert!("openssl".parse::<Atom>().is_err());
        assert!(">=dev-libs/openssl".parse::<Atom>().is_err());
        assert!("dev-libs/openssl-1.0".parse::<Atom>().is_err());
        assert!("~dev-libs/openssl-1.0-r1".parse::<Atom>().is_err());
        assert!("dev-libs/openssl[".parse::<Atom>().is_err());
    }

    #[test]
    fn test_equal_atoms_share_cache_key() {
        let a = atom(">=dev-libs/openssl-1.1.0");
        let b = atom(">=dev-libs/openssl-1.1.0");
        assert_eq!(a, b);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), atom(">=dev-libs/openssl-1.1.1").cache_key());
    }

    #[test]
    fn test_display_round_trip() {
        for s in [
            "dev-libs/glib",
            "!app-arch/rpm",
            ">=dev-libs/openssl-1.1.0:0[bindist]",
            "~x11-libs/pango-1.50.0",
        ] {
            assert_eq!(atom(s).to_string(), s);
        }
    }
}
