// SPDX-License-Identifier: MPL-2.0

//! Publicly exported type aliases.

use std::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

use crate::constraint::Constraint;
use crate::version::Version;

/// Map implementation used by the library.
pub type Map<K, V> = rustc_hash::FxHashMap<K, V>;

/// Set implementation used by the library.
pub type Set<V> = rustc_hash::FxHashSet<V>;

/// Holds information about all possible versions a given package can accept.
///
/// Backed by an [indexmap::IndexMap] rather than a plain hash map:
/// dependencies are registered with the solver in iteration order, and
/// resolution (and its error reports) must be deterministic.
pub type DependencyConstraints = indexmap::IndexMap<String, Constraint, BuildHasherDefault<FxHasher>>;

/// Concrete package versions picked by the solver during [solve](crate::solver::solve).
pub type SelectedDependencies = Map<String, Version>;
