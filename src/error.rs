// SPDX-License-Identifier: MPL-2.0

//! Handling resolver errors.

use thiserror::Error;

use crate::constraint::ConstraintParseError;
use crate::report::DerivationTree;
use crate::version::VersionParseError;

/// The error type providers are allowed to fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Any failure mode of a resolution, as surfaced to the caller.
///
/// Every variant is recoverable and its rendered message is stable,
/// suitable for end-user display.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A requested or catalog constraint is syntactically invalid.
    #[error("failed to parse constraint {input}: {source}")]
    InvalidConstraint {
        /// The constraint string as written.
        input: String,
        /// What the parser choked on.
        source: ConstraintParseError,
    },

    /// The catalog returned a malformed version.
    #[error("failed to parse version {input}: {source}")]
    InvalidVersion {
        /// The version string as returned by the catalog.
        input: String,
        /// What the parser choked on.
        source: VersionParseError,
    },

    /// A requested target is outside the closed target set.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The provider failed while fetching a package.
    #[error("failed to fetch mod {package}: {source}")]
    Fetch {
        /// The package that was being fetched.
        package: String,
        /// The provider's own error.
        source: BoxError,
    },

    /// There is no solution for the requested set of mods.
    /// The message is the full explanation produced by the report
    /// formatter and ends with "version solving failed.".
    #[error("{0}")]
    SolvingFailed(String),

    /// The caller's cancellation signal was honored.
    #[error("resolution cancelled")]
    Cancelled,
}

/// Errors that may occur while running the core solver.
#[derive(Error, Debug)]
pub enum SolveError {
    /// There is no solution for this set of dependencies,
    /// with the full chain of reasons why.
    #[error("version solving failed")]
    NoSolution(Box<DerivationTree>),

    /// The package source failed or requested cancellation.
    #[error(transparent)]
    Source(#[from] ResolveError),
}
