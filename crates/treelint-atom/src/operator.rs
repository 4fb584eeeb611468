//! Version comparison operators for atoms

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

use crate::Version;

/// Comparison operators an atom can carry against its version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Strictly older (<)
    Less,
    /// Older or equal (<=)
    LessOrEqual,
    /// Exact version (=)
    Equal,
    /// String-prefix match (=...*)
    EqualGlob,
    /// Any revision of the version (~)
    Approximate,
    /// Newer or equal (>=)
    GreaterOrEqual,
    /// Strictly newer (>)
    Greater,
}

#[derive(Error, Debug)]
#[error("invalid atom operator: {0}")]
pub struct InvalidOperatorError(pub String);

impl Operator {
    /// Parse an operator from its atom-prefix spelling
    pub fn from_str(s: &str) -> Result<Self, InvalidOperatorError> {
        match s {
            "<" => Ok(Operator::Less),
            "<=" => Ok(Operator::LessOrEqual),
            "=" => Ok(Operator::Equal),
            "~" => Ok(Operator::Approximate),
            ">=" => Ok(Operator::GreaterOrEqual),
            ">" => Ok(Operator::Greater),
            _ => Err(InvalidOperatorError(s.to_string())),
        }
    }

    /// The string representation of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::Equal => "=",
            Operator::EqualGlob => "=",
            Operator::Approximate => "~",
            Operator::GreaterOrEqual => ">=",
            Operator::Greater => ">",
        }
    }

    /// Test a candidate version against the constraint version under this
    /// operator.
    pub fn matches(&self, candidate: &Version, constraint: &Version) -> bool {
        match self {
            Operator::Less => candidate < constraint,
            Operator::LessOrEqual => candidate <= constraint,
            Operator::Equal => candidate == constraint,
            // glob matching works on the written form: =1.2* covers 1.2,
            // 1.2.3 and 1.20 alike
            Operator::EqualGlob => candidate.as_str().starts_with(constraint.as_str()),
            Operator::Approximate => {
                candidate.cmp_ignoring_revision(constraint) == Ordering::Equal
            }
            Operator::GreaterOrEqual => candidate >= constraint,
            Operator::Greater => candidate > constraint,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
