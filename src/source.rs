// SPDX-License-Identifier: MPL-2.0

//! The interface between the solver and whatever supplies package versions.

use std::sync::{Arc, Mutex};

use crate::constraint::Constraint;
use crate::error::ResolveError;
use crate::type_aliases::{DependencyConstraints, Map};
use crate::version::Version;

/// A candidate version of a package together with its dependencies,
/// in the vocabulary the solver understands.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    /// The candidate version.
    pub version: Version,
    /// Required dependencies: selecting this version forces each of
    /// these packages into the given constraint.
    pub dependencies: DependencyConstraints,
    /// Optional dependencies: these constraints only apply if the target
    /// package is forced into the solution by some other, required path.
    pub optional_dependencies: DependencyConstraints,
}

impl PackageVersion {
    /// A candidate version without any dependency.
    pub fn new(version: Version) -> Self {
        Self {
            version,
            dependencies: DependencyConstraints::default(),
            optional_dependencies: DependencyConstraints::default(),
        }
    }
}

/// Trait that allows the solver to retrieve available packages,
/// and to delegate the choice between admissible versions.
///
/// Version selection is deliberately part of this interface rather than
/// of the solver, so policies like lock-file pinning (or picking lowest
/// versions in reproducibility tests) can be swapped without touching
/// the algorithm.
pub trait Source {
    /// All candidate versions of a package, ordered by descending
    /// version, so that a "pick highest" policy finds its answer first.
    ///
    /// The solver may call this several times for the same package and
    /// relies on getting a stable answer within one solve; wrap sources
    /// doing I/O in a [MemoizingSource].
    fn get_versions(&self, package: &str) -> Result<Arc<Vec<PackageVersion>>, ResolveError>;

    /// Choose one of the admissible candidate versions.
    /// `candidates` is non-empty and sorted in descending order.
    fn pick_version(&self, package: &str, candidates: &[Version]) -> Version;

    /// Checked by the solver before adapter calls and on entry to
    /// conflict resolution. Returning an error aborts the resolution.
    fn should_cancel(&self) -> Result<(), ResolveError> {
        Ok(())
    }
}

/// A source adapter memoizing `get_versions` per package for the
/// lifetime of one solve.
///
/// This both avoids repeat network traffic and guarantees the solver a
/// stable answer per package. The cache lives behind a mutex because
/// lookups are issued from several call sites of a single resolution;
/// nothing is shared across resolutions.
pub struct MemoizingSource<S> {
    source: S,
    cache: Mutex<Map<String, Arc<Vec<PackageVersion>>>>,
}

impl<S: Source> MemoizingSource<S> {
    /// Wrap a source in a memoizing layer.
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: Mutex::new(Map::default()),
        }
    }

    /// Access the wrapped source.
    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: Source> Source for MemoizingSource<S> {
    fn get_versions(&self, package: &str) -> Result<Arc<Vec<PackageVersion>>, ResolveError> {
        if let Some(hit) = self.cache.lock().unwrap().get(package) {
            return Ok(hit.clone());
        }
        // Not holding the lock across the underlying call keeps the
        // mutex cheap; racing lookups of the same package just do the
        // work twice and store the same answer.
        let versions = self.source.get_versions(package)?;
        self.cache
            .lock()
            .unwrap()
            .insert(package.to_string(), versions.clone());
        Ok(versions)
    }

    fn pick_version(&self, package: &str, candidates: &[Version]) -> Version {
        self.source.pick_version(package, candidates)
    }

    fn should_cancel(&self) -> Result<(), ResolveError> {
        self.source.should_cancel()
    }
}

/// A [Source] that contains all package information in memory.
/// Packages are picked with the highest admissible version first,
/// unless [prefer_lowest_versions](OfflineSource::prefer_lowest_versions)
/// was called.
#[derive(Debug, Clone, Default)]
pub struct OfflineSource {
    packages: Map<String, Vec<PackageVersion>>,
    prefer_lowest: bool,
}

impl OfflineSource {
    /// Creates an empty OfflineSource with no package.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip version selection to lowest-first, for reproducibility tests.
    pub fn prefer_lowest_versions(mut self) -> Self {
        self.prefer_lowest = true;
        self
    }

    /// Register the required dependencies of a package version,
    /// creating the version if it was not known yet.
    pub fn add_dependencies<I>(&mut self, package: &str, version: impl Into<Version>, deps: I)
    where
        I: IntoIterator<Item = (&'static str, Constraint)>,
    {
        let record = self.record(package, version.into());
        record
            .dependencies
            .extend(deps.into_iter().map(|(p, c)| (p.to_string(), c)));
    }

    /// Register the optional dependencies of a package version,
    /// creating the version if it was not known yet.
    pub fn add_optional_dependencies<I>(
        &mut self,
        package: &str,
        version: impl Into<Version>,
        deps: I,
    ) where
        I: IntoIterator<Item = (&'static str, Constraint)>,
    {
        let record = self.record(package, version.into());
        record
            .optional_dependencies
            .extend(deps.into_iter().map(|(p, c)| (p.to_string(), c)));
    }

    fn record(&mut self, package: &str, version: Version) -> &mut PackageVersion {
        let versions = self.packages.entry(package.to_string()).or_default();
        let index = match versions.iter().position(|pv| pv.version == version) {
            Some(index) => index,
            None => {
                // Keep the list sorted by descending version.
                let index = versions
                    .iter()
                    .position(|pv| pv.version < version)
                    .unwrap_or(versions.len());
                versions.insert(index, PackageVersion::new(version));
                index
            }
        };
        &mut versions[index]
    }
}

impl Source for OfflineSource {
    fn get_versions(&self, package: &str) -> Result<Arc<Vec<PackageVersion>>, ResolveError> {
        Ok(Arc::new(
            self.packages.get(package).cloned().unwrap_or_default(),
        ))
    }

    fn pick_version(&self, _package: &str, candidates: &[Version]) -> Version {
        let candidate = if self.prefer_lowest {
            candidates.iter().min()
        } else {
            candidates.iter().max()
        };
        candidate.expect("pick_version is only called with candidates").clone()
    }
}
