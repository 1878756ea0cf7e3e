// SPDX-License-Identifier: MPL-2.0

//! Conflict-driven version solving for the Satisfactory mod ecosystem.
//!
//! Given a set of requested mod version constraints, an optional
//! previously-solved lock file, a concrete game build number, and a set
//! of deployment targets, [DependencyResolver] either produces a
//! complete, consistent [LockFile] mapping every transitively required
//! mod to a single concrete version plus per-target artifacts, or a
//! human-readable, causally complete explanation of why no such
//! assignment exists.
//!
//! # Architecture
//!
//! The crate has four cooperating layers, leaves first:
//!
//! - **Version algebra**: [Version] implements semantic versioning with
//!   pre-release and build tags; [Constraint] represents any set of
//!   versions as a normalized union of intervals, closed under
//!   complement, intersection, and union, and parses the catalog's
//!   comparator syntax (`^`, `~`, comparison operators, wildcards,
//!   hyphen ranges, `,`/`||`).
//! - **Package source**: a [Source] supplies candidate versions with
//!   their dependencies and chooses between admissible versions. The
//!   resolver adapts the remote catalog (a [Provider]) into this
//!   vocabulary, filtering candidates by target compatibility and
//!   injecting the game build number as a pseudo-package dependency,
//!   and memoizes everything per solve with [MemoizingSource].
//! - **Solver**: [solve] runs the PubGrub algorithm: unit propagation
//!   over an arena of incompatibilities, decision making (fewest
//!   admissible candidates first), conflict resolution by resolvent,
//!   and backtracking, until it terminates with an assignment or with
//!   the root failure incompatibility.
//! - **Report**: the failure's derivation tree renders into a numbered
//!   English proof through [FriendlyReportFormatter], which resolves
//!   human-friendly mod names lazily through the provider. The final
//!   sentence of every report is "version solving failed.".
//!
//! # Example
//!
//! ```text
//! let resolver = DependencyResolver::new(provider);
//! let lock = resolver.resolve_mod_dependencies(
//!     &constraints,      // {"RefinedPower": "^3.2.10"}
//!     previous_lock,     // pins admissible versions
//!     MAX_GAME_VERSION,  // CL of the installed game
//!     &[],               // no target requirement
//! )?;
//! ```
//!
//! A failed resolution renders like:
//!
//! ```text
//! Because installing Refined Power (RefinedPower) "3.2.11" and
//! Refined Power (RefinedPower) "3.2.11" depends on RefinedRDLib "^1.1.6",
//! installing RefinedRDLib "^1.1.6".
//! So, because installing RefinedRDLib "1.1.5", version solving failed.
//! ```
//!
//! Everything is scoped to a single resolve call: no global state, no
//! caching across invocations, and the input lock file is never mutated.

#![warn(missing_docs)]

mod catalog;
mod constraint;
mod error;
mod lockfile;
mod provider;
mod report;
mod resolver;
mod solver;
mod source;
mod term;
mod type_aliases;
mod version;

pub use constraint::{Constraint, ConstraintParseError};
pub use error::{BoxError, ResolveError, SolveError};
pub use lockfile::{LockFile, LockedMod, LockedModTarget};
pub use provider::{Dependency, ModName, ModVersion, Provider, TargetName, VersionTarget};
pub use report::{
    DefaultStringReporter, DerivationTree, Derived, External, FriendlyReportFormatter,
    ReportFormatter, Reporter,
};
pub use resolver::DependencyResolver;
pub use solver::solve;
pub use source::{MemoizingSource, OfflineSource, PackageVersion, Source};
pub use term::Term;
pub use type_aliases::{DependencyConstraints, Map, SelectedDependencies, Set};
pub use version::{Identifier, Version, VersionParseError};

mod internal;
