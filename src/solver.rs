// SPDX-License-Identifier: MPL-2.0

//! PubGrub version solving algorithm.
//!
//! It consists in efficiently finding a set of packages and versions
//! that satisfy all the constraints of a given project dependencies.
//! In addition, when that is not possible,
//! PubGrub tries to provide a very human-readable and clear
//! explanation as to why that failed.
//!
//! The algorithm is driven by [solve], which repeatedly alternates
//! unit propagation and decision making until every package that is
//! positively referenced by the partial solution has a decision, or
//! until a terminal incompatibility proves that no assignment exists.
//!
//! Candidate versions and their dependencies come from a [Source];
//! the choice between admissible versions is delegated back to that
//! source as well, see [Source::pick_version].

use std::cmp::Reverse;
use std::hash::BuildHasherDefault;

use log::{debug, info};
use rustc_hash::FxHasher;

use crate::constraint::Constraint;
use crate::error::SolveError;
use crate::internal::{Incompatibility, State};
use crate::source::Source;
use crate::type_aliases::{Map, SelectedDependencies, Set};
use crate::version::Version;

type FnvIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// An optional dependency declared by an already decided package
/// version, waiting for its target package to be forced into the
/// solution by some required path.
struct PendingOptional {
    package: String,
    version: Version,
    constraint: Constraint,
}

/// Main function of the library.
/// Finds a set of packages satisfying dependency bounds for a given package + version pair.
pub fn solve(
    source: &impl Source,
    root_package: impl Into<String>,
    root_version: Version,
) -> Result<SelectedDependencies, SolveError> {
    let root_package = root_package.into();
    let mut state = State::init(root_package.clone(), root_version);
    let mut added_dependencies: Map<String, Set<Version>> = Map::default();
    // Keyed by the optional dependency target, in insertion order so
    // that materialization happens in a deterministic order.
    let mut pending_optional: FnvIndexMap<String, Vec<PendingOptional>> = FnvIndexMap::default();
    // First-appearance index per package, the stable decision tie-break.
    let mut package_order: Map<String, u32> = Map::default();
    let mut next = root_package;
    loop {
        source.should_cancel().map_err(SolveError::Source)?;

        info!("unit_propagation: {}", &next);
        state.unit_propagation(next.clone(), source)?;

        debug!(
            "Partial solution after unit propagation: {}",
            state.partial_solution
        );

        materialize_ready_optionals(&mut state, &mut pending_optional, source)?;

        let Some(highest_priority_pkg) =
            state.partial_solution.pick_highest_priority_pkg(|p, constraint| {
                let order = match package_order.get(p) {
                    Some(order) => *order,
                    None => {
                        let order = package_order.len() as u32;
                        package_order.insert(p.to_string(), order);
                        order
                    }
                };
                // Packages with fewer admissible versions are decided
                // first, which keeps conflict chains short. A package
                // whose versions cannot even be fetched sorts at the
                // very front so the fetch error surfaces immediately.
                let admissible = source
                    .get_versions(p)
                    .map(|versions| {
                        versions
                            .iter()
                            .filter(|pv| constraint.contains(&pv.version))
                            .count()
                    })
                    .unwrap_or(0);
                (Reverse(admissible), Reverse(order))
            })
        else {
            return Ok(state.partial_solution.extract_solution());
        };
        next = highest_priority_pkg;

        let constraint = state
            .partial_solution
            .term_intersection_for_package(&next)
            .expect("a package was chosen but we don't have a term")
            .unwrap_positive()
            .clone();
        let versions = source.get_versions(&next).map_err(SolveError::Source)?;

        let admissible: Vec<Version> = versions
            .iter()
            .filter(|pv| constraint.contains(&pv.version))
            .map(|pv| pv.version.clone())
            .collect();
        if admissible.is_empty() {
            state.add_incompatibility(Incompatibility::no_versions(next.clone(), constraint));
            continue;
        }

        let version = source.pick_version(&next, &admissible);
        debug_assert!(
            admissible.contains(&version),
            "pick_version picked a version that was not a candidate"
        );
        let record = versions
            .iter()
            .find(|pv| pv.version == version)
            .expect("the picked version comes from the candidate list");
        info!("source chose: {} @ {}", next, version);

        let is_new_dependency = added_dependencies
            .entry(next.clone())
            .or_default()
            .insert(version.clone());

        if is_new_dependency {
            for (dep_package, dep_constraint) in &record.optional_dependencies {
                pending_optional
                    .entry(dep_package.clone())
                    .or_default()
                    .push(PendingOptional {
                        package: next.clone(),
                        version: version.clone(),
                        constraint: dep_constraint.clone(),
                    });
            }

            let dep_incompats = state.add_incompatibility_from_dependencies(
                next.clone(),
                version.clone(),
                record.dependencies.iter(),
            );

            state.partial_solution.add_version(
                next.clone(),
                version,
                dep_incompats,
                &state.incompatibility_store,
            );
        } else {
            // `dep_incompats` are already in `incompatibilities` so we know there are not satisfied
            // terms and can add the decision directly.
            info!("add_decision (not first time): {} @ {}", &next, version);
            state.partial_solution.add_decision(next.clone(), version);
        }
    }
}

/// Register the optional constraints whose target package is now part
/// of the solution.
///
/// Optional dependencies contribute constraints, never existence: they
/// stay pending until the target package is positively referenced
/// through some required path, and only then become ordinary dependency
/// incompatibilities.
fn materialize_ready_optionals(
    state: &mut State,
    pending_optional: &mut FnvIndexMap<String, Vec<PendingOptional>>,
    source: &impl Source,
) -> Result<(), SolveError> {
    loop {
        let ready: Vec<String> = pending_optional
            .keys()
            .filter(|package| {
                state
                    .partial_solution
                    .term_intersection_for_package(package)
                    .map_or(false, |term| term.is_positive())
            })
            .cloned()
            .collect();
        if ready.is_empty() {
            return Ok(());
        }
        for dep_package in ready {
            for pending in pending_optional.shift_remove(&dep_package).unwrap() {
                info!(
                    "optional dependency of {} @ {} on {} now applies",
                    pending.package, pending.version, dep_package
                );
                state.add_incompatibility(Incompatibility::from_dependency(
                    pending.package,
                    Constraint::exact(pending.version),
                    (&dep_package, &pending.constraint),
                ));
            }
            state.unit_propagation(dep_package, source)?;
        }
    }
}
