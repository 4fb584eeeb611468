//! Package version parsing and total ordering

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref VERSION_RE: Regex = Regex::new(
        r"^(?P<comps>\d+(?:\.\d+)*)(?P<letter>[a-z])?(?P<suffixes>(?:_(?:alpha|beta|pre|rc|p)\d*)*)(?:-r(?P<rev>\d+))?$"
    )
    .unwrap();
}

/// Error type for version parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version string \"{0}\"")]
    Invalid(String),
    #[error("version component out of range in \"{0}\"")]
    ComponentOverflow(String),
}

/// Pre-release / patch suffix kinds, in ascending order of precedence.
///
/// A version without any suffix sorts between `Rc` and `Patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum SuffixKind {
    Alpha,
    Beta,
    Pre,
    Rc,
    Patch,
}

impl SuffixKind {
    fn as_str(&self) -> &'static str {
        match self {
            SuffixKind::Alpha => "alpha",
            SuffixKind::Beta => "beta",
            SuffixKind::Pre => "pre",
            SuffixKind::Rc => "rc",
            SuffixKind::Patch => "p",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "alpha" => Some(SuffixKind::Alpha),
            "beta" => Some(SuffixKind::Beta),
            "pre" => Some(SuffixKind::Pre),
            "rc" => Some(SuffixKind::Rc),
            "p" => Some(SuffixKind::Patch),
            _ => None,
        }
    }

    /// Rank relative to the implicit "no suffix" marker, which sits between
    /// `rc` and `p`.
    fn rank(&self) -> i8 {
        match self {
            SuffixKind::Alpha => -4,
            SuffixKind::Beta => -3,
            SuffixKind::Pre => -2,
            SuffixKind::Rc => -1,
            SuffixKind::Patch => 1,
        }
    }
}

/// One dotted version component.
///
/// Components with a leading zero compare as strings with trailing zeros
/// stripped (`1.01` < `1.1`); all others compare numerically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Component {
    Num(u64),
    Zeroed(String),
}

impl Component {
    fn parse(raw: &str, original: &str) -> Result<Self, VersionError> {
        if raw.len() > 1 && raw.starts_with('0') {
            Ok(Component::Zeroed(raw.trim_end_matches('0').to_string()))
        } else {
            raw.parse::<u64>()
                .map(Component::Num)
                .map_err(|_| VersionError::ComponentOverflow(original.to_string()))
        }
    }

    /// Stripped string form used when either side carries a leading zero
    fn stripped(&self) -> String {
        match self {
            Component::Num(n) => n.to_string().trim_end_matches('0').to_string(),
            Component::Zeroed(s) => s.clone(),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Component::Num(a), Component::Num(b)) => a.cmp(b),
            _ => self.stripped().cmp(&other.stripped()),
        }
    }
}

/// A package version: dotted numeric components, an optional trailing letter,
/// optional `_alpha`/`_beta`/`_pre`/`_rc`/`_p` suffixes and an optional `-rN`
/// revision.
///
/// Equality and hashing follow the comparison rules, not the raw spelling:
/// `1.0-r0` and `1.0` are the same version and hash identically.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<Component>,
    letter: Option<char>,
    suffixes: Vec<(SuffixKind, u64)>,
    revision: u64,
    raw: String,
}

impl Version {
    /// The version string as originally written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The `-rN` revision, 0 when absent
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Compare ignoring the revision component (the `~` atom operator)
    pub fn cmp_ignoring_revision(&self, other: &Self) -> Ordering {
        self.cmp_parts(other, false)
    }

    fn cmp_parts(&self, other: &Self, with_revision: bool) -> Ordering {
        let pairs = self.components.iter().zip(other.components.iter());
        for (a, b) in pairs {
            match a.compare(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        match self.components.len().cmp(&other.components.len()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.letter.cmp(&other.letter) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match cmp_suffixes(&self.suffixes, &other.suffixes) {
            Ordering::Equal => {}
            ord => return ord,
        }
        if with_revision {
            self.revision.cmp(&other.revision)
        } else {
            Ordering::Equal
        }
    }
}

fn cmp_suffixes(a: &[(SuffixKind, u64)], b: &[(SuffixKind, u64)]) -> Ordering {
    let mut left = a.iter();
    let mut right = b.iter();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some((kind, _)), None) => return kind.rank().cmp(&0),
            (None, Some((kind, _))) => return 0.cmp(&kind.rank()),
            (Some((ka, na)), Some((kb, nb))) => {
                match ka.cmp(kb) {
                    Ordering::Equal => {}
                    ord => return ord,
                }
                match na.cmp(nb) {
                    Ordering::Equal => {}
                    ord => return ord,
                }
            }
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = VERSION_RE
            .captures(s)
            .ok_or_else(|| VersionError::Invalid(s.to_string()))?;

        let mut components = Vec::new();
        for raw in caps["comps"].split('.') {
            components.push(Component::parse(raw, s)?);
        }

        let letter = caps.name("letter").and_then(|m| m.as_str().chars().next());

        let mut suffixes = Vec::new();
        if let Some(m) = caps.name("suffixes") {
            for part in m.as_str().split('_').skip(1) {
                let kind_end = part.find(|c: char| c.is_ascii_digit()).unwrap_or(part.len());
                let kind = SuffixKind::parse(&part[..kind_end])
                    .ok_or_else(|| VersionError::Invalid(s.to_string()))?;
                let number = if kind_end < part.len() {
                    part[kind_end..]
                        .parse::<u64>()
                        .map_err(|_| VersionError::ComponentOverflow(s.to_string()))?
                } else {
                    0
                };
                suffixes.push((kind, number));
            }
        }

        let revision = match caps.name("rev") {
            Some(m) => m
                .as_str()
                .parse::<u64>()
                .map_err(|_| VersionError::ComponentOverflow(s.to_string()))?,
            None => 0,
        };

        Ok(Version {
            components,
            letter,
            suffixes,
            revision,
            raw: s.to_string(),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_parts(other, true)
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with Eq: hash the stripped component forms so that
        // spellings which compare equal hash equal.
        for comp in &self.components {
            comp.stripped().hash(state);
        }
        self.letter.hash(state);
        self.suffixes.hash(state);
        self.revision.hash(state);
    }
}
