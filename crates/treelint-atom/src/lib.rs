//! Dependency atoms and version ordering for ebuild-style package repositories
//!
//! This crate provides the two identity types every repository check is built
//! on: [`Version`], a fully ordered package version, and [`Atom`], an
//! immutable dependency constraint (`>=dev-libs/openssl-1.1.0:0`). Atoms are
//! canonicalized at parse time so that structural equality implies identical
//! hashes, which is what makes them usable as cache keys.

mod atom;
mod operator;
mod version;

pub use atom::{Atom, AtomParseError};
pub use operator::{InvalidOperatorError, Operator};
pub use version::{Version, VersionError};
