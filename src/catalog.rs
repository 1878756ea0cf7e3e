// SPDX-License-Identifier: MPL-2.0

//! Package source adapter turning a mod [Provider] into the solver's
//! vocabulary: parsed versions and constraints, target-compatibility
//! filtering, the injected game-version dependency, and lock-file-aware
//! version picking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::constraint::Constraint;
use crate::error::ResolveError;
use crate::lockfile::LockFile;
use crate::provider::{ModVersion, Provider, TargetName};
use crate::source::{PackageVersion, Source};
use crate::type_aliases::{DependencyConstraints, Map};
use crate::version::Version;

/// Reserved identifier of the synthetic package whose single version
/// carries the caller's requested constraints as dependencies.
pub(crate) const ROOT_PKG: &str = "$$root$$";

/// Reserved identifier of the synthetic package representing the game
/// itself, with exactly one version equal to the game build number.
pub(crate) const FACTORY_GAME_PKG: &str = "FactoryGame";

/// The adapter between one resolution and the remote catalog.
/// All of its state lives for a single `resolve` call.
pub(crate) struct CatalogSource<'a, P> {
    provider: &'a P,
    lockfile: Option<&'a LockFile>,
    to_install: DependencyConstraints,
    required_targets: Vec<TargetName>,
    game_version: Version,
    /// Raw catalog responses, retained so the post-solve projection can
    /// look up each selected version's artifact metadata.
    mod_versions: Mutex<Map<String, Arc<Vec<ModVersion>>>>,
    cancelled: Option<&'a AtomicBool>,
}

impl<'a, P: Provider> CatalogSource<'a, P> {
    pub(crate) fn new(
        provider: &'a P,
        game_version: Version,
        lockfile: Option<&'a LockFile>,
        to_install: DependencyConstraints,
        required_targets: Vec<TargetName>,
        cancelled: Option<&'a AtomicBool>,
    ) -> Self {
        Self {
            provider,
            lockfile,
            to_install,
            required_targets,
            game_version,
            mod_versions: Mutex::new(Map::default()),
            cancelled,
        }
    }

    /// The raw catalog response for a package, if it was fetched during
    /// the solve.
    pub(crate) fn version_info(&self, package: &str) -> Option<Arc<Vec<ModVersion>>> {
        self.mod_versions.lock().unwrap().get(package).cloned()
    }

    /// Target-compatibility filter.
    ///
    /// A mod that must ship to every deployed target has to cover all
    /// requested targets. A mod that only ships where applicable is fine
    /// as long as it fully covers the client side or the server side of
    /// the request.
    fn matches_target_requirements(&self, mod_version: &ModVersion) -> bool {
        if self.required_targets.is_empty() {
            return true;
        }

        let covered = |required: &[&TargetName]| {
            required.iter().all(|target| {
                mod_version
                    .targets
                    .iter()
                    .any(|shipped| shipped.target_name == **target)
            })
        };
        let required_client: Vec<&TargetName> = self
            .required_targets
            .iter()
            .filter(|target| target.is_client())
            .collect();
        let required_server: Vec<&TargetName> = self
            .required_targets
            .iter()
            .filter(|target| target.is_server())
            .collect();

        if mod_version.required_on_remote {
            // All requested targets must be present.
            return covered(&required_client) && covered(&required_server);
        }

        // Don't consider a side as covered when no target of that side was requested.
        let has_all_client = !required_client.is_empty() && covered(&required_client);
        let has_all_server = !required_server.is_empty() && covered(&required_server);
        has_all_client || has_all_server
    }

    fn solver_versions(&self, package: &str) -> Result<Vec<PackageVersion>, ResolveError> {
        let response = self
            .provider
            .mod_versions_with_dependencies(package)
            .map_err(|source| ResolveError::Fetch {
                package: package.to_string(),
                source,
            })?;
        let response = Arc::new(response);
        self.mod_versions
            .lock()
            .unwrap()
            .insert(package.to_string(), response.clone());

        let mut versions = Vec::with_capacity(response.len());
        for mod_version in response.iter() {
            let version =
                Version::parse(&mod_version.version).map_err(|source| {
                    ResolveError::InvalidVersion {
                        input: mod_version.version.clone(),
                        source,
                    }
                })?;

            if !self.matches_target_requirements(mod_version) {
                continue;
            }

            let mut dependencies = DependencyConstraints::default();
            let mut optional_dependencies = DependencyConstraints::default();
            for dependency in &mod_version.dependencies {
                let constraint = Constraint::parse(&dependency.condition).map_err(|source| {
                    ResolveError::InvalidConstraint {
                        input: dependency.condition.clone(),
                        source,
                    }
                })?;
                if dependency.optional {
                    optional_dependencies.insert(dependency.mod_id.clone(), constraint);
                } else {
                    dependencies.insert(dependency.mod_id.clone(), constraint);
                }
            }

            // An empty game_version string declares no game requirement;
            // parsing it would produce the empty constraint and wrongly
            // forbid the version.
            if !mod_version.game_version.is_empty() {
                let game_constraint =
                    Constraint::parse(&mod_version.game_version).map_err(|source| {
                        ResolveError::InvalidConstraint {
                            input: mod_version.game_version.clone(),
                            source,
                        }
                    })?;
                dependencies.insert(FACTORY_GAME_PKG.to_string(), game_constraint);
            }

            versions.push(PackageVersion {
                version,
                dependencies,
                optional_dependencies,
            });
        }

        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }
}

impl<P: Provider> Source for CatalogSource<'_, P> {
    fn get_versions(&self, package: &str) -> Result<Arc<Vec<PackageVersion>>, ResolveError> {
        self.should_cancel()?;

        // The root package has a single empty version carrying the
        // caller's constraints.
        if package == ROOT_PKG {
            let mut root = PackageVersion::new(Version::zero());
            root.dependencies = self.to_install.clone();
            return Ok(Arc::new(vec![root]));
        }

        // The game is a pseudo-package with exactly one version.
        if package == FACTORY_GAME_PKG {
            return Ok(Arc::new(vec![PackageVersion::new(
                self.game_version.clone(),
            )]));
        }

        Ok(Arc::new(self.solver_versions(package)?))
    }

    fn pick_version(&self, package: &str, candidates: &[Version]) -> Version {
        // A lock-file pin wins whenever it is still admissible.
        if let Some(lockfile) = self.lockfile {
            if let Some(locked) = lockfile.mods.get(package) {
                if let Ok(version) = Version::parse(&locked.version) {
                    if candidates.contains(&version) {
                        return version;
                    }
                }
            }
        }

        candidates
            .iter()
            .max()
            .expect("pick_version is only called with candidates")
            .clone()
    }

    fn should_cancel(&self) -> Result<(), ResolveError> {
        match self.cancelled {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(ResolveError::Cancelled),
            _ => Ok(()),
        }
    }
}
