// SPDX-License-Identifier: MPL-2.0

//! The resolver front door: parse the caller's request, run the solver
//! over the catalog adapter, and project the solution into a lock file
//! (or the failure into a human-readable explanation).

use std::sync::atomic::AtomicBool;

use indexmap::IndexMap;

use crate::catalog::{CatalogSource, FACTORY_GAME_PKG, ROOT_PKG};
use crate::constraint::Constraint;
use crate::error::{ResolveError, SolveError};
use crate::lockfile::{LockFile, LockedMod, LockedModTarget};
use crate::provider::{Provider, TargetName};
use crate::report::{DefaultStringReporter, FriendlyReportFormatter, Reporter};
use crate::solver::solve;
use crate::source::MemoizingSource;
use crate::type_aliases::{DependencyConstraints, SelectedDependencies};
use crate::version::Version;

/// Resolves mod dependency graphs against a mod [Provider].
pub struct DependencyResolver<P> {
    provider: P,
}

impl<P: Provider> DependencyResolver<P> {
    /// Build a resolver over the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Resolve the given constraints into a complete lock file.
    ///
    /// Inputs are the requested constraints (package to constraint
    /// string), an optional previous lock file used as a version
    /// selection hint, the game build number, and the deployment
    /// targets that must be covered (empty means "no requirement").
    ///
    /// On success every transitively required mod is locked to a single
    /// version with its per-target artifacts. On failure the error
    /// explains why no such assignment exists.
    pub fn resolve_mod_dependencies(
        &self,
        constraints: &IndexMap<String, String>,
        lock_file: Option<&LockFile>,
        game_version: u32,
        required_targets: &[String],
    ) -> Result<LockFile, ResolveError> {
        self.resolve_inner(constraints, lock_file, game_version, required_targets, None)
    }

    /// Same as [resolve_mod_dependencies](Self::resolve_mod_dependencies),
    /// aborting with [ResolveError::Cancelled] once `cancelled` is set.
    /// The flag is checked before adapter calls and when entering
    /// conflict resolution; no partial result is returned.
    pub fn resolve_mod_dependencies_cancellable(
        &self,
        constraints: &IndexMap<String, String>,
        lock_file: Option<&LockFile>,
        game_version: u32,
        required_targets: &[String],
        cancelled: &AtomicBool,
    ) -> Result<LockFile, ResolveError> {
        self.resolve_inner(
            constraints,
            lock_file,
            game_version,
            required_targets,
            Some(cancelled),
        )
    }

    fn resolve_inner(
        &self,
        constraints: &IndexMap<String, String>,
        lock_file: Option<&LockFile>,
        game_version: u32,
        required_targets: &[String],
        cancelled: Option<&AtomicBool>,
    ) -> Result<LockFile, ResolveError> {
        let game_semver = Version::new(game_version as u64, 0, 0);

        let mut to_install = DependencyConstraints::default();
        for (package, constraint) in constraints {
            let parsed =
                Constraint::parse(constraint).map_err(|source| ResolveError::InvalidConstraint {
                    input: constraint.clone(),
                    source,
                })?;
            to_install.insert(package.clone(), parsed);
        }

        // Unknown targets are rejected eagerly, before any network call.
        let mut targets = Vec::with_capacity(required_targets.len());
        for target in required_targets {
            targets.push(target.parse::<TargetName>()?);
        }

        let source = MemoizingSource::new(CatalogSource::new(
            &self.provider,
            game_semver,
            lock_file,
            to_install,
            targets,
            cancelled,
        ));

        match solve(&source, ROOT_PKG, Version::zero()) {
            Ok(solution) => Ok(self.lock_from_solution(source.source(), solution)),
            Err(SolveError::NoSolution(derivation_tree)) => {
                let formatter = FriendlyReportFormatter::new(&self.provider, game_version);
                Err(ResolveError::SolvingFailed(DefaultStringReporter::report(
                    &derivation_tree,
                    &formatter,
                )))
            }
            Err(SolveError::Source(error)) => Err(error),
        }
    }

    /// Project the solver's package/version assignment into a fresh lock
    /// file, using the catalog responses retained during the solve for
    /// the artifact metadata.
    fn lock_from_solution(
        &self,
        catalog: &CatalogSource<'_, P>,
        solution: SelectedDependencies,
    ) -> LockFile {
        let mut lock = LockFile::new();
        for (package, version) in solution {
            // The pseudo-packages are solver artifacts, not mods.
            if package == ROOT_PKG || package == FACTORY_GAME_PKG {
                continue;
            }
            let Some(info) = catalog.version_info(&package) else {
                continue;
            };
            let Some(record) = info.iter().find(|mod_version| {
                Version::parse(&mod_version.version).map_or(false, |v| v == version)
            }) else {
                continue;
            };
            let targets = record
                .targets
                .iter()
                .map(|target| {
                    (
                        target.target_name.to_string(),
                        LockedModTarget {
                            link: target.link.clone(),
                            hash: target.hash.clone(),
                        },
                    )
                })
                .collect();
            lock.mods.insert(
                package,
                LockedMod {
                    version: record.version.clone(),
                    targets,
                },
            );
        }
        lock
    }
}
