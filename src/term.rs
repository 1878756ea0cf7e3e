// SPDX-License-Identifier: MPL-2.0

//! A term is the fundamental unit of operation of the PubGrub algorithm.
//! It is a positive or negative expression regarding a set of versions.

use std::fmt;

use crate::constraint::Constraint;
use crate::version::Version;

/// A positive or negative expression regarding a set of versions.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Term {
    /// For example, `^1.1.6` is a positive expression that is evaluated
    /// true if a version is selected and lies within that constraint.
    Positive(Constraint),
    /// The term `not <3.0.0` is a negative expression that is evaluated
    /// true if a version >= 3.0.0 is selected, or if no version is
    /// selected at all.
    Negative(Constraint),
}

/// Base methods.
impl Term {
    /// A term that is always true.
    pub(crate) fn any() -> Self {
        Self::Negative(Constraint::empty())
    }

    /// A term that is never true.
    pub(crate) fn empty() -> Self {
        Self::Positive(Constraint::empty())
    }

    /// A positive term containing exactly that version.
    pub(crate) fn exact(version: Version) -> Self {
        Self::Positive(Constraint::exact(version))
    }

    /// Simply check if a term is positive.
    pub(crate) fn is_positive(&self) -> bool {
        match self {
            Self::Positive(_) => true,
            Self::Negative(_) => false,
        }
    }

    /// Negate a term.
    /// Evaluation of a negated term always returns
    /// the opposite of the evaluation of the original one.
    pub(crate) fn negate(&self) -> Self {
        match self {
            Self::Positive(constraint) => Self::Negative(constraint.clone()),
            Self::Negative(constraint) => Self::Positive(constraint.clone()),
        }
    }

    /// Evaluate a term regarding a given choice of version.
    pub(crate) fn contains(&self, v: &Version) -> bool {
        match self {
            Self::Positive(constraint) => constraint.contains(v),
            Self::Negative(constraint) => !constraint.contains(v),
        }
    }

    /// Unwrap the constraint contained in a positive term.
    /// Will panic if used on a negative term.
    pub(crate) fn unwrap_positive(&self) -> &Constraint {
        match self {
            Self::Positive(constraint) => constraint,
            _ => panic!("negative term cannot unwrap a positive constraint"),
        }
    }
}

/// Set operations with terms.
impl Term {
    /// Compute the intersection of two terms.
    /// If at least one term is positive, the intersection is also positive.
    pub(crate) fn intersection(&self, other: &Term) -> Term {
        match (self, other) {
            (Self::Positive(c1), Self::Positive(c2)) => Self::Positive(c1.intersection(c2)),
            (Self::Positive(c1), Self::Negative(c2)) => {
                Self::Positive(c1.intersection(&c2.complement()))
            }
            (Self::Negative(c1), Self::Positive(c2)) => {
                Self::Positive(c1.complement().intersection(c2))
            }
            (Self::Negative(c1), Self::Negative(c2)) => Self::Negative(c1.union(c2)),
        }
    }

    /// Whether the intersection of the two terms is never true.
    pub(crate) fn is_disjoint(&self, other: &Term) -> bool {
        self.intersection(other) == Self::empty()
    }

    /// Compute the union of two terms.
    /// If at least one term is negative, the union is also negative.
    pub(crate) fn union(&self, other: &Term) -> Term {
        self.negate().intersection(&other.negate()).negate()
    }

    /// Indicate if this term is a subset of another term.
    /// Just like for sets, we say that t1 is a subset of t2
    /// if and only if t1 ∩ t2 = t1.
    pub(crate) fn subset_of(&self, other: &Term) -> bool {
        self == &self.intersection(other)
    }
}

/// Describe a relation between a set of terms S and another term t.
///
/// As a shorthand, we say that a term v
/// satisfies or contradicts a term t if {v} satisfies or contradicts it.
pub(crate) enum Relation {
    /// We say that a set of terms S "satisfies" a term t
    /// if t must be true whenever every term in S is true.
    Satisfied,
    /// Conversely, S "contradicts" t if t must be false
    /// whenever every term in S is true.
    Contradicted,
    /// If neither of these is true we say that S is "inconclusive" for t.
    Inconclusive,
}

/// Relation between terms.
impl Term {
    /// Check if a set of terms satisfies this term.
    ///
    /// We say that a set of terms S "satisfies" a term t
    /// if t must be true whenever every term in S is true.
    ///
    /// It turns out that this can also be expressed with set operations:
    ///    S satisfies t if and only if  ⋂ S ⊆ t
    #[cfg(test)]
    fn satisfied_by(&self, terms_intersection: &Term) -> bool {
        terms_intersection.subset_of(self)
    }

    /// Check if a set of terms contradicts this term.
    ///
    /// We say that a set of terms S "contradicts" a term t
    /// if t must be false whenever every term in S is true.
    ///
    /// It turns out that this can also be expressed with set operations:
    ///    S contradicts t if and only if  (⋂ S) ⋂ t = ∅
    #[cfg(test)]
    fn contradicted_by(&self, terms_intersection: &Term) -> bool {
        terms_intersection.intersection(self) == Self::empty()
    }

    /// Check if a set of terms satisfies or contradicts a given term.
    /// Otherwise the relation is inconclusive.
    pub(crate) fn relation_with(&self, other_terms_intersection: &Term) -> Relation {
        let full_intersection = self.intersection(other_terms_intersection);
        if &full_intersection == other_terms_intersection {
            Relation::Satisfied
        } else if full_intersection == Self::empty() {
            Relation::Contradicted
        } else {
            Relation::Inconclusive
        }
    }
}

impl AsRef<Term> for Term {
    fn as_ref(&self) -> &Term {
        self
    }
}

// REPORT ######################################################################

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive(constraint) => write!(f, "{}", constraint),
            Self::Negative(constraint) => write!(f, "Not ( {} )", constraint),
        }
    }
}

// TESTS #######################################################################

#[cfg(test)]
pub mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::constraint::tests::strategy as constraint_strategy;

    pub fn strategy() -> impl Strategy<Value = Term> {
        prop_oneof![
            constraint_strategy().prop_map(Term::Positive),
            constraint_strategy().prop_map(Term::Negative),
        ]
    }

    proptest! {

        // Testing relation --------------------------------

        #[test]
        fn relation_with(term1 in strategy(), term2 in strategy()) {
            match term1.relation_with(&term2) {
                Relation::Satisfied => assert!(term1.satisfied_by(&term2)),
                Relation::Contradicted => assert!(term1.contradicted_by(&term2)),
                Relation::Inconclusive => {
                    assert!(!term1.satisfied_by(&term2));
                    assert!(!term1.contradicted_by(&term2));
                }
            }
        }

    }
}
