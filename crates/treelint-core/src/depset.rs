//! Conditional dependency expressions and their CNF evaluation
//!
//! A dependency attribute is a tree of atoms, all-of groups, `|| ( ... )`
//! any-of groups and `flag? ( ... )` conditionals. The checker never walks the
//! tree directly; it first evaluates it against a profile's flag assignment
//! into conjunctive normal form, an ordered sequence of OR-clauses over plain
//! atoms, and feeds those clauses to the satisfiability engine.

use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use thiserror::Error;

use treelint_atom::{Atom, AtomParseError};

/// One OR-group of a CNF-evaluated expression; at least one atom has to be
/// satisfiable for the clause to hold.
pub type Clause = Vec<Atom>;

/// Error type for dependency expression parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DepParseError {
    #[error("unbalanced group in \"{0}\"")]
    Unbalanced(String),
    #[error("|| not followed by a group in \"{0}\"")]
    DanglingAnyOf(String),
    #[error("conditional \"{flag}?\" not followed by a group in \"{expr}\"")]
    DanglingConditional { flag: String, expr: String },
    #[error("invalid conditional flag in \"{0}\"")]
    InvalidConditional(String),
    #[error(transparent)]
    Atom(#[from] AtomParseError),
}

/// A node of a conditional dependency expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepExpr {
    /// A plain dependency constraint
    Atom(Atom),
    /// All children are required
    AllOf(Vec<DepExpr>),
    /// At least one child is required
    AnyOf(Vec<DepExpr>),
    /// Children apply only for the matching state of an optional flag
    Conditional {
        flag: String,
        negated: bool,
        children: Vec<DepExpr>,
    },
}

/// A parsed dependency attribute: an implicit all-of over its top-level nodes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DepSet {
    nodes: Vec<DepExpr>,
}

impl DepSet {
    pub fn nodes(&self) -> &[DepExpr] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fold another attribute into this one (post-merge deps join rdepend)
    pub fn extend(&mut self, other: DepSet) {
        self.nodes.extend(other.nodes);
    }

    /// Every flag named by a conditional anywhere in the tree
    pub fn known_conditionals(&self) -> BTreeSet<String> {
        fn walk(nodes: &[DepExpr], acc: &mut BTreeSet<String>) {
            for node in nodes {
                match node {
                    DepExpr::Atom(_) => {}
                    DepExpr::AllOf(children) | DepExpr::AnyOf(children) => walk(children, acc),
                    DepExpr::Conditional { flag, children, .. } => {
                        acc.insert(flag.clone());
                        walk(children, acc);
                    }
                }
            }
        }
        let mut acc = BTreeSet::new();
        walk(&self.nodes, &mut acc);
        acc
    }

    /// Flattened atom iteration, ignoring all conditional and group structure.
    /// This is what the configuration-independent nonexistence pre-pass scans.
    pub fn iter_atoms(&self) -> impl Iterator<Item = &Atom> {
        fn collect<'a>(nodes: &'a [DepExpr], acc: &mut Vec<&'a Atom>) {
            for node in nodes {
                match node {
                    DepExpr::Atom(atom) => acc.push(atom),
                    DepExpr::AllOf(children)
                    | DepExpr::AnyOf(children)
                    | DepExpr::Conditional { children, .. } => collect(children, acc),
                }
            }
        }
        let mut acc = Vec::new();
        collect(&self.nodes, &mut acc);
        acc.into_iter()
    }

    /// Evaluate the conditional tree into CNF clauses for one configuration.
    ///
    /// `enabled` is the profile's enabled flag set. Conditionals on flags in
    /// `non_tristate` resolve concretely against `enabled`; conditionals on
    /// any other flag contribute their children unconditionally, since a user
    /// may toggle such a flag and the deps behind it must stay satisfiable.
    ///
    /// Pure: the tree is never mutated, clause order follows declaration
    /// order.
    pub fn evaluate(
        &self,
        enabled: &HashSet<String>,
        non_tristate: &HashSet<String>,
    ) -> Vec<Clause> {
        eval_nodes(&self.nodes, enabled, non_tristate)
    }
}

fn eval_nodes(
    nodes: &[DepExpr],
    enabled: &HashSet<String>,
    non_tristate: &HashSet<String>,
) -> Vec<Clause> {
    let mut clauses = Vec::new();
    for node in nodes {
        clauses.extend(eval_node(node, enabled, non_tristate));
    }
    clauses
}

fn eval_node(
    node: &DepExpr,
    enabled: &HashSet<String>,
    non_tristate: &HashSet<String>,
) -> Vec<Clause> {
    match node {
        DepExpr::Atom(atom) => vec![vec![atom.clone()]],
        DepExpr::AllOf(children) => eval_nodes(children, enabled, non_tristate),
        DepExpr::Conditional {
            flag,
            negated,
            children,
        } => {
            if non_tristate.contains(flag) {
                if enabled.contains(flag) != *negated {
                    eval_nodes(children, enabled, non_tristate)
                } else {
                    Vec::new()
                }
            } else {
                eval_nodes(children, enabled, non_tristate)
            }
        }
        DepExpr::AnyOf(children) => {
            let mut child_cnfs = Vec::with_capacity(children.len());
            for child in children {
                let cnf = eval_node(child, enabled, non_tristate);
                // a disabled conditional alternative drops out of the group
                if !cnf.is_empty() {
                    child_cnfs.push(cnf);
                }
            }
            if child_cnfs.is_empty() {
                return Vec::new();
            }
            distribute_any_of(&child_cnfs)
        }
    }
}

/// OR-distribute the CNFs of an any-of group's children: every selection of
/// one clause per child becomes one merged clause.
fn distribute_any_of(child_cnfs: &[Vec<Clause>]) -> Vec<Clause> {
    let mut acc: Vec<Clause> = vec![Vec::new()];
    for cnf in child_cnfs {
        let mut next = Vec::with_capacity(acc.len() * cnf.len());
        for partial in &acc {
            for clause in cnf {
                let mut merged = partial.clone();
                for atom in clause {
                    if !merged.contains(atom) {
                        merged.push(atom.clone());
                    }
                }
                next.push(merged);
            }
        }
        acc = next;
    }
    acc
}

impl FromStr for DepSet {
    type Err = DepParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let mut pos = 0;
        let nodes = parse_group(&tokens, &mut pos, s, false)?;
        if pos != tokens.len() {
            return Err(DepParseError::Unbalanced(s.to_string()));
        }
        Ok(DepSet { nodes })
    }
}

fn parse_group(
    tokens: &[&str],
    pos: &mut usize,
    src: &str,
    nested: bool,
) -> Result<Vec<DepExpr>, DepParseError> {
    let mut nodes = Vec::new();
    while *pos < tokens.len() {
        let token = tokens[*pos];
        *pos += 1;
        match token {
            ")" => {
                if nested {
                    return Ok(nodes);
                }
                return Err(DepParseError::Unbalanced(src.to_string()));
            }
            "(" => {
                nodes.push(DepExpr::AllOf(parse_group(tokens, pos, src, true)?));
            }
            "||" => {
                expect_open(tokens, pos, || DepParseError::DanglingAnyOf(src.to_string()))?;
                nodes.push(DepExpr::AnyOf(parse_group(tokens, pos, src, true)?));
            }
            _ if token.ends_with('?') => {
                let raw = &token[..token.len() - 1];
                let (negated, flag) = match raw.strip_prefix('!') {
                    Some(rest) => (true, rest),
                    None => (false, raw),
                };
                if flag.is_empty() || !flag.chars().all(|c| c.is_ascii_alphanumeric() || "+_@-".contains(c)) {
                    return Err(DepParseError::InvalidConditional(src.to_string()));
                }
                expect_open(tokens, pos, || DepParseError::DanglingConditional {
                    flag: flag.to_string(),
                    expr: src.to_string(),
                })?;
                nodes.push(DepExpr::Conditional {
                    flag: flag.to_string(),
                    negated,
                    children: parse_group(tokens, pos, src, true)?,
                });
            }
            atom => {
                nodes.push(DepExpr::Atom(atom.parse::<Atom>()?));
            }
        }
    }
    if nested {
        return Err(DepParseError::Unbalanced(src.to_string()));
    }
    Ok(nodes)
}

fn expect_open(
    tokens: &[&str],
    pos: &mut usize,
    err: impl FnOnce() -> DepParseError,
) -> Result<(), DepParseError> {
    if tokens.get(*pos) == Some(&"(") {
        *pos += 1;
        Ok(())
    } else {
        Err(err())
    }
}
