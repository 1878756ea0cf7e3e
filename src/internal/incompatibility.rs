// SPDX-License-Identifier: MPL-2.0

//! An incompatibility is a set of terms for different packages
//! that should never be satisfied all together.

use std::fmt;
use std::sync::Arc;

use crate::internal::arena::{Arena, Id};
use crate::internal::small_map::SmallMap;
use crate::constraint::Constraint;
use crate::report::{DerivationTree, Derived, External};
use crate::term::{self, Term};
use crate::type_aliases::{Map, Set};
use crate::version::Version;

/// An incompatibility is a set of terms for different packages
/// that should never be satisfied all together.
/// An incompatibility usually originates from a package dependency.
/// For example, if package A at version 1 depends on package B
/// at version 2, you can never have both terms `A = 1`
/// and `not B = 2` satisfied at the same time in a partial solution.
/// This would mean that we found a solution with package A at version 1
/// but not with package B at version 2.
/// Yet A at version 1 depends on B at version 2 so this is not possible.
/// Therefore, the set `{ A = 1, not B = 2 }` is an incompatibility,
/// defined from dependencies of A at version 1.
///
/// Incompatibilities can also be derived from two other incompatibilities
/// during conflict resolution. More about all this in
/// [PubGrub documentation](https://github.com/dart-lang/pub/blob/master/doc/solver.md#incompatibility).
#[derive(Debug, Clone)]
pub struct Incompatibility {
    package_terms: SmallMap<String, Term>,
    kind: Kind,
}

/// Type alias for incompatibility identifiers in the store.
pub type IncompId = Id<Incompatibility>;

#[derive(Debug, Clone)]
enum Kind {
    /// Initial incompatibility aiming at picking the root package for the first decision.
    NotRoot(String, Version),
    /// There are no versions in the given constraint for this package.
    NoVersions(String, Constraint),
    /// Incompatibility coming from the dependencies of a given package.
    FromDependencyOf(String, Constraint, String, Constraint),
    /// Derived from two causes. Stores cause ids.
    DerivedFrom(IncompId, IncompId),
}

/// A Relation describes how a set of terms can be compared to an incompatibility.
/// Typically, the set of terms comes from the partial solution.
#[derive(Debug, Eq, PartialEq)]
pub enum Relation {
    /// We say that a set of terms S satisfies an incompatibility I
    /// if S satisfies every term in I.
    Satisfied,
    /// We say that S contradicts I
    /// if S contradicts at least one term in I.
    Contradicted(String),
    /// If S satisfies all but one of I's terms and is inconclusive for the remaining term,
    /// we say S "almost satisfies" I and we call the remaining term the "unsatisfied term".
    AlmostSatisfied(String),
    /// Otherwise, we say that their relation is inconclusive.
    Inconclusive,
}

impl Incompatibility {
    /// Create the initial "not Root" incompatibility.
    pub fn not_root(package: String, version: Version) -> Self {
        Self {
            package_terms: SmallMap::One([(
                package.clone(),
                Term::Negative(Constraint::exact(version.clone())),
            )]),
            kind: Kind::NotRoot(package, version),
        }
    }

    /// Create an incompatibility to remember
    /// that a given constraint does not contain any version.
    pub fn no_versions(package: String, constraint: Constraint) -> Self {
        Self {
            package_terms: SmallMap::One([(package.clone(), Term::Positive(constraint.clone()))]),
            kind: Kind::NoVersions(package, constraint),
        }
    }

    /// Build an incompatibility from a given dependency.
    ///
    /// A dependency on the empty constraint has an always-true negative
    /// term, so it collapses to the single-term incompatibility
    /// "that version is unselectable". This is exactly what an empty
    /// game-version constraint in the catalog should do.
    pub fn from_dependency(package: String, versions: Constraint, dep: (&str, &Constraint)) -> Self {
        let (dep_package, dep_constraint) = dep;
        let package_terms = if dep_constraint.is_empty() {
            SmallMap::One([(package.clone(), Term::Positive(versions.clone()))])
        } else {
            SmallMap::Two([
                (package.clone(), Term::Positive(versions.clone())),
                (dep_package.to_string(), Term::Negative(dep_constraint.clone())),
            ])
        };
        Self {
            package_terms,
            kind: Kind::FromDependencyOf(
                package,
                versions,
                dep_package.to_string(),
                dep_constraint.clone(),
            ),
        }
    }

    /// The two packages of a dependency incompatibility, if this is one.
    pub fn as_dependency(&self) -> Option<(&String, &String)> {
        match &self.kind {
            Kind::FromDependencyOf(p1, _, p2, _) => Some((p1, p2)),
            _ => None,
        }
    }

    /// Merge dependant versions with the same dependency.
    ///
    /// When multiple versions of a package depend on the same constraint
    /// of the same dependency, the two individual incompatibilities are
    /// collapsed into one covering the union of the dependant versions.
    /// This substantially reduces the total number of incompatibilities
    /// and makes it much easier to reason about multiple versions of
    /// packages at once, which also shows in the quality of reports.
    pub fn merge_dependents(&self, other: &Self) -> Option<Self> {
        // It is almost certainly a bug to call this method without checking
        // that self is a dependency.
        let (p1, p2) = self.as_dependency().unwrap();
        // The other incompatibility should be a dependency between the same packages.
        let (o1, o2) = other.as_dependency()?;
        if p1 != o1 || p2 != o2 {
            return None;
        }
        // It checks that both have the same dependency constraint.
        let self_constraint = self.dependency_constraint();
        if self_constraint != other.dependency_constraint() {
            return None;
        }
        let (Kind::FromDependencyOf(_, self_versions, _, dep_constraint), Kind::FromDependencyOf(_, other_versions, _, _)) =
            (&self.kind, &other.kind)
        else {
            return None;
        };
        Some(Self::from_dependency(
            p1.clone(),
            self_versions.union(other_versions),
            (p2, dep_constraint),
        ))
    }

    fn dependency_constraint(&self) -> Option<&Constraint> {
        match &self.kind {
            Kind::FromDependencyOf(_, _, _, constraint) => Some(constraint),
            _ => None,
        }
    }

    /// Prior cause of two incompatibilities using the rule of resolution.
    ///
    /// The satisfier cause comes first in [Kind::DerivedFrom] so that
    /// reports read from what was requested towards what it implied.
    pub fn prior_cause(
        incompat: IncompId,
        satisfier_cause: IncompId,
        package: &String,
        incompatibility_store: &Arena<Self>,
    ) -> Self {
        let kind = Kind::DerivedFrom(satisfier_cause, incompat);
        // Optimization to avoid cloning and dropping t1
        let mut package_terms = incompatibility_store[incompat].package_terms.clone();
        let t1 = package_terms.remove(package).unwrap();
        let satisfier_cause_terms = &incompatibility_store[satisfier_cause].package_terms;
        package_terms.merge(
            satisfier_cause_terms.iter().filter(|(p, _)| p != &package),
            |t1, t2| Some(t1.intersection(t2)),
        );
        let term = t1.union(satisfier_cause_terms.get(package).unwrap());
        if term != Term::any() {
            package_terms.insert(package.clone(), term);
        }
        Self {
            package_terms,
            kind,
        }
    }

    /// CF definition of Relation enum.
    pub fn relation<'a>(&self, terms: impl Fn(&str) -> Option<&'a Term>) -> Relation {
        let mut relation = Relation::Satisfied;
        for (package, incompat_term) in self.package_terms.iter() {
            match terms(package).map(|term| incompat_term.relation_with(term)) {
                Some(term::Relation::Satisfied) => {}
                Some(term::Relation::Contradicted) => {
                    return Relation::Contradicted(package.clone());
                }
                None | Some(term::Relation::Inconclusive) => {
                    // If a package is not present, the intersection is the same as `Term::any`.
                    // According to the rules of satisfactions, the relation would be inconclusive.
                    // It could also be satisfied if the incompatibility term was also `Term::any`,
                    // but we systematically remove those from incompatibilities
                    // so we're safe on that front.
                    if relation == Relation::Satisfied {
                        relation = Relation::AlmostSatisfied(package.clone());
                    } else {
                        relation = Relation::Inconclusive;
                    }
                }
            }
        }
        relation
    }

    /// Check if an incompatibility should mark the end of the algorithm
    /// because it satisfies the root package.
    pub fn is_terminal(&self, root_package: &str, root_version: &Version) -> bool {
        if self.package_terms.len() == 0 {
            true
        } else if self.package_terms.len() > 1 {
            false
        } else {
            let (package, term) = self.package_terms.iter().next().unwrap();
            package == root_package && term.contains(root_version)
        }
    }

    /// Get the term related to a given package (if it exists).
    pub fn get(&self, package: &str) -> Option<&Term> {
        self.package_terms.iter().find(|(p, _)| p.as_str() == package).map(|(_, t)| t)
    }

    /// Iterate over packages.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Term)> {
        self.package_terms.iter()
    }

    // Reporting ###############################################################

    /// Retrieve parent causes if of type DerivedFrom.
    pub fn causes(&self) -> Option<(IncompId, IncompId)> {
        match self.kind {
            Kind::DerivedFrom(id1, id2) => Some((id1, id2)),
            _ => None,
        }
    }

    /// Build a derivation tree for error reporting.
    pub fn build_derivation_tree(
        self_id: IncompId,
        shared_ids: &Set<IncompId>,
        store: &Arena<Self>,
        precomputed: &Map<IncompId, Arc<DerivationTree>>,
    ) -> DerivationTree {
        match &store[self_id].kind {
            Kind::DerivedFrom(id1, id2) => {
                let derived = Derived {
                    terms: store[self_id].package_terms.as_vec(),
                    shared_id: shared_ids.get(&self_id).map(|id| id.into_raw()),
                    cause1: precomputed
                        .get(id1)
                        .expect("causes are processed before effects")
                        .clone(),
                    cause2: precomputed
                        .get(id2)
                        .expect("causes are processed before effects")
                        .clone(),
                };
                DerivationTree::Derived(derived)
            }
            Kind::NotRoot(package, version) => {
                DerivationTree::External(External::NotRoot(package.clone(), version.clone()))
            }
            Kind::NoVersions(package, constraint) => {
                DerivationTree::External(External::NoVersions(package.clone(), constraint.clone()))
            }
            Kind::FromDependencyOf(package, versions, dep_package, dep_constraint) => {
                DerivationTree::External(External::FromDependencyOf(
                    package.clone(),
                    versions.clone(),
                    dep_package.clone(),
                    dep_constraint.clone(),
                ))
            }
        }
    }
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for (idx, (package, term)) in self.package_terms.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", package, term)?;
        }
        write!(f, " }}")
    }
}

// TESTS #######################################################################

#[cfg(test)]
pub mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::term::tests::strategy as term_strat;

    proptest! {

        /// For any three different packages p1, p2 and p3,
        /// for any three terms t1, t2 and t3,
        /// if we have the two following incompatibilities:
        ///    { p1: t1, p2: not t2 }
        ///    { p2: t2, p3: t3 }
        /// the rule of resolution says that we can deduce the following incompatibility:
        ///    { p1: t1, p3: t3 }
        #[test]
        fn rule_of_resolution(t1 in term_strat(), t2 in term_strat(), t3 in term_strat()) {
            let mut store = Arena::new();
            let i1 = store.alloc(Incompatibility {
                package_terms: SmallMap::Two([
                    ("p1".to_string(), t1.clone()),
                    ("p2".to_string(), t2.negate()),
                ]),
                kind: Kind::NotRoot("p1".to_string(), Version::zero()),
            });

            let i2 = store.alloc(Incompatibility {
                package_terms: SmallMap::Two([
                    ("p2".to_string(), t2.clone()),
                    ("p3".to_string(), t3.clone()),
                ]),
                kind: Kind::NotRoot("p2".to_string(), Version::zero()),
            });

            let i_resolution =
                Incompatibility::prior_cause(i1, i2, &"p2".to_string(), &store);
            let expected = vec![("p1".to_string(), t1), ("p3".to_string(), t3)];
            assert_eq!(i_resolution.package_terms.as_vec(), expected);
        }

    }
}
