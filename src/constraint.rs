// SPDX-License-Identifier: MPL-2.0

//! Constraints are sets of versions.
//!
//! Concretely, a constraint is any set of versions representable as
//! the concatenation, union, and complement of half-open intervals,
//! kept in a normalized form: intervals are non-empty, disjoint,
//! sorted, and never touching. Equality on the normalized form is
//! therefore set equality, which keeps rendered errors stable.
//!
//! Constraints are parsed from the comparator syntax used by the mod
//! catalog: `^`, `~`, `>=`, `>`, `<=`, `<`, `=`, bare and partial
//! versions, `*` and `x` wildcards, hyphen ranges, comma (or space) as
//! AND and `||` as OR.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::ops::Bound::{self, Excluded, Included, Unbounded};
use std::str::FromStr;

use thiserror::Error;

use crate::internal::SmallVec;
use crate::version::{Identifier, Version};

/// A set of versions, normalized as disjoint sorted intervals.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Constraint {
    segments: SmallVec<Interval>,
}

type Interval = (Bound<Version>, Bound<Version>);

// Constructors
impl Constraint {
    /// Empty set of versions.
    pub fn empty() -> Self {
        Self {
            segments: SmallVec::empty(),
        }
    }

    /// Set of all possible versions.
    pub fn any() -> Self {
        Self {
            segments: SmallVec::one((Unbounded, Unbounded)),
        }
    }

    /// Set containing exactly one version.
    pub fn exact(v: impl Into<Version>) -> Self {
        let v = v.into();
        Self {
            segments: SmallVec::one((Included(v.clone()), Included(v))),
        }
    }

    /// Set of all versions higher or equal to some version.
    pub fn higher_than(v: impl Into<Version>) -> Self {
        Self {
            segments: SmallVec::one((Included(v.into()), Unbounded)),
        }
    }

    /// Set of all versions strictly higher than some version.
    pub fn strictly_higher_than(v: impl Into<Version>) -> Self {
        Self {
            segments: SmallVec::one((Excluded(v.into()), Unbounded)),
        }
    }

    /// Set of all versions lower or equal to some version.
    pub fn lower_than(v: impl Into<Version>) -> Self {
        Self {
            segments: SmallVec::one((Unbounded, Included(v.into()))),
        }
    }

    /// Set of all versions strictly lower than some version.
    pub fn strictly_lower_than(v: impl Into<Version>) -> Self {
        Self {
            segments: SmallVec::one((Unbounded, Excluded(v.into()))),
        }
    }

    /// Set of versions greater or equal to `v1` but strictly lower than `v2`.
    pub fn between(v1: impl Into<Version>, v2: impl Into<Version>) -> Self {
        let (v1, v2) = (v1.into(), v2.into());
        if v2 <= v1 {
            return Self::empty();
        }
        Self {
            segments: SmallVec::one((Included(v1), Excluded(v2))),
        }
    }

    /// Build a single interval from explicit bounds, empty if degenerate.
    fn interval(start: Bound<Version>, end: Bound<Version>) -> Self {
        match (&start, &end) {
            (Included(a), Included(b)) if b < a => return Self::empty(),
            (Included(a), Excluded(b)) | (Excluded(a), Included(b)) | (Excluded(a), Excluded(b))
                if b <= a =>
            {
                return Self::empty()
            }
            _ => {}
        }
        Self {
            segments: SmallVec::one((start, end)),
        }
    }
}

// Membership and tests.
impl Constraint {
    /// Whether no version at all is in this set.
    pub fn is_empty(&self) -> bool {
        self.segments.as_slice().is_empty()
    }

    /// Whether every version is in this set.
    pub fn is_any(&self) -> bool {
        matches!(self.segments.as_slice(), [(Unbounded, Unbounded)])
    }

    /// Whether the given version is in this set.
    pub fn contains(&self, v: &Version) -> bool {
        self.segments.iter().any(|segment| match segment {
            (Unbounded, Unbounded) => true,
            (Unbounded, Included(end)) => v <= end,
            (Unbounded, Excluded(end)) => v < end,
            (Included(start), Unbounded) => v >= start,
            (Included(start), Included(end)) => v >= start && v <= end,
            (Included(start), Excluded(end)) => v >= start && v < end,
            (Excluded(start), Unbounded) => v > start,
            (Excluded(start), Included(end)) => v > start && v <= end,
            (Excluded(start), Excluded(end)) => v > start && v < end,
        })
    }

    /// Whether the two sets share no version.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.intersection(other).is_empty()
    }
}

// Set operations.
impl Constraint {
    /// Compute the complement of this set of versions.
    pub fn complement(&self) -> Self {
        match self.segments.first() {
            // Complement of ∅ is *
            None => Self::any(),

            // Complement of * is ∅
            Some((Unbounded, Unbounded)) => Self::empty(),

            // First high bound is +∞
            Some((Included(v), Unbounded)) => Self::strictly_lower_than(v.clone()),
            Some((Excluded(v), Unbounded)) => Self::lower_than(v.clone()),

            Some((Unbounded, Included(v))) => {
                Self::negate_segments(Excluded(v.clone()), &self.segments.as_slice()[1..])
            }
            Some((Unbounded, Excluded(v))) => {
                Self::negate_segments(Included(v.clone()), &self.segments.as_slice()[1..])
            }
            Some((Included(_), Included(_)))
            | Some((Included(_), Excluded(_)))
            | Some((Excluded(_), Included(_)))
            | Some((Excluded(_), Excluded(_))) => {
                Self::negate_segments(Unbounded, self.segments.as_slice())
            }
        }
    }

    /// Helper function performing the negation of intervals in segments.
    fn negate_segments(start: Bound<Version>, segments: &[Interval]) -> Self {
        let mut complement_segments: SmallVec<Interval> = SmallVec::empty();
        let mut start = start;
        for (v1, v2) in segments {
            complement_segments.push((
                start,
                match v1 {
                    Included(v) => Excluded(v.clone()),
                    Excluded(v) => Included(v.clone()),
                    Unbounded => unreachable!(),
                },
            ));
            start = match v2 {
                Included(v) => Excluded(v.clone()),
                Excluded(v) => Included(v.clone()),
                Unbounded => Unbounded,
            }
        }
        if !matches!(start, Unbounded) {
            complement_segments.push((start, Unbounded));
        }

        Self {
            segments: complement_segments,
        }
    }

    /// Compute the intersection of two sets of versions.
    pub fn intersection(&self, other: &Self) -> Self {
        let mut segments: SmallVec<Interval> = SmallVec::empty();
        let mut left_iter = self.segments.iter();
        let mut right_iter = other.segments.iter();
        let mut left = left_iter.next();
        let mut right = right_iter.next();
        while let (Some((left_lower, left_upper)), Some((right_lower, right_upper))) = (left, right)
        {
            // Check if the left interval is entirely below the right one.
            if let (
                Included(left_upper_version) | Excluded(left_upper_version),
                Included(right_lower_version) | Excluded(right_lower_version),
            ) = (left_upper, right_lower)
            {
                match left_upper_version.cmp(right_lower_version) {
                    Ordering::Less => {
                        left = left_iter.next();
                        continue;
                    }
                    Ordering::Equal => {
                        if !matches!((left_upper, right_lower), (Included(_), Included(_))) {
                            // Touching exactly, but at least one bound is exclusive:
                            // the intervals are disjoint.
                            left = left_iter.next();
                            continue;
                        }
                    }
                    Ordering::Greater => {}
                }
            }
            // Check if the right interval is entirely below the left one.
            if let (
                Included(left_lower_version) | Excluded(left_lower_version),
                Included(right_upper_version) | Excluded(right_upper_version),
            ) = (left_lower, right_upper)
            {
                match right_upper_version.cmp(left_lower_version) {
                    Ordering::Less => {
                        right = right_iter.next();
                        continue;
                    }
                    Ordering::Equal => {
                        if !matches!((right_upper, left_lower), (Included(_), Included(_))) {
                            right = right_iter.next();
                            continue;
                        }
                    }
                    Ordering::Greater => {}
                }
            }

            // The intervals overlap; the intersection starts at the higher lower bound.
            let lower = match (left_lower, right_lower) {
                (Unbounded, Included(_) | Excluded(_)) => right_lower.clone(),
                (Included(_) | Excluded(_), Unbounded) => left_lower.clone(),
                (Unbounded, Unbounded) => Unbounded,
                (Included(l) | Excluded(l), Included(r) | Excluded(r)) => match l.cmp(r) {
                    Ordering::Less => right_lower.clone(),
                    Ordering::Equal => match (left_lower, right_lower) {
                        (Included(_), Excluded(v)) => Excluded(v.clone()),
                        (Excluded(_), Excluded(v)) => Excluded(v.clone()),
                        (Excluded(v), Included(_)) => Excluded(v.clone()),
                        (Included(_), Included(v)) => Included(v.clone()),
                        _ => unreachable!(),
                    },
                    Ordering::Greater => left_lower.clone(),
                },
            };

            // And ends at the lower upper bound, advancing whichever side ended.
            let upper = match (left_upper, right_upper) {
                (Unbounded, Included(_) | Excluded(_)) => {
                    right = right_iter.next();
                    right_upper.clone()
                }
                (Included(_) | Excluded(_), Unbounded) => {
                    left = left_iter.next();
                    left_upper.clone()
                }
                (Unbounded, Unbounded) => {
                    left = left_iter.next();
                    right = right_iter.next();
                    Unbounded
                }
                (Included(l) | Excluded(l), Included(r) | Excluded(r)) => match l.cmp(r) {
                    Ordering::Less => {
                        left = left_iter.next();
                        left_upper.clone()
                    }
                    Ordering::Equal => match (left_upper, right_upper) {
                        (Included(_), Excluded(v)) => {
                            right = right_iter.next();
                            Excluded(v.clone())
                        }
                        (Excluded(_), Excluded(v)) => {
                            left = left_iter.next();
                            right = right_iter.next();
                            Excluded(v.clone())
                        }
                        (Excluded(v), Included(_)) => {
                            left = left_iter.next();
                            Excluded(v.clone())
                        }
                        (Included(_), Included(v)) => {
                            left = left_iter.next();
                            right = right_iter.next();
                            Included(v.clone())
                        }
                        _ => unreachable!(),
                    },
                    Ordering::Greater => {
                        right = right_iter.next();
                        right_upper.clone()
                    }
                },
            };

            segments.push((lower, upper));
        }

        Self { segments }
    }

    /// Compute the union of two sets of versions.
    pub fn union(&self, other: &Self) -> Self {
        self.complement()
            .intersection(&other.complement())
            .complement()
    }
}

// PARSING #####################################################################

/// Error creating [Constraint] from an invalid string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintParseError {
    /// The constraint string contains no comparator at all.
    #[error("empty constraint string")]
    Empty,
    /// A comparator token could not be understood.
    #[error("invalid comparator string: {0}")]
    InvalidComparator(String),
    /// A hyphen range is missing one of its endpoints.
    #[error("incomplete hyphen range: {0}")]
    IncompleteHyphenRange(String),
}

/// A version with possibly missing (or wildcard) components,
/// as written in a comparator.
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Vec<Identifier>,
    build: Option<String>,
}

impl Partial {
    /// The lowest version matching the written components,
    /// missing components padded with zeros.
    fn floor(&self) -> Version {
        Version {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            pre: self.pre.clone(),
            build: self.build.clone(),
        }
    }

    fn is_full(&self) -> bool {
        self.patch.is_some()
    }

    /// Exclusive upper bound of the wildcard range written as e.g. `1.2.x`.
    /// Must not be called on a full version or a bare `*`.
    fn wildcard_upper(&self) -> Version {
        match (self.major, self.minor) {
            (Some(major), Some(minor)) => Version::lowest_pre(major, minor + 1, 0),
            (Some(major), None) => Version::lowest_pre(major + 1, 0, 0),
            (None, _) => unreachable!("`*` has no upper bound"),
        }
    }
}

fn parse_partial(input: &str) -> Option<Partial> {
    let input = input.strip_prefix(['v', 'V']).unwrap_or(input);
    // Pre-release and build parts are only legal on a full version, so the
    // version parser can validate them once the core has been handled.
    let has_tail = input.contains(['-', '+']);
    if has_tail {
        let version = Version::parse(input).ok()?;
        if version.pre.is_empty() && version.build.is_none() {
            return None;
        }
        let components = input.split(['-', '+']).next()?.split('.').count();
        if components != 3 {
            return None;
        }
        return Some(Partial {
            major: Some(version.major),
            minor: Some(version.minor),
            patch: Some(version.patch),
            pre: version.pre,
            build: version.build,
        });
    }

    let mut components: [Option<u64>; 3] = [None; 3];
    let mut count = 0;
    let mut wildcard_seen = false;
    for component in input.split('.') {
        if count == 3 {
            return None;
        }
        if matches!(component, "x" | "X" | "*") {
            wildcard_seen = true;
        } else if !wildcard_seen
            && !component.is_empty()
            && component.bytes().all(|b| b.is_ascii_digit())
        {
            components[count] = Some(component.parse().ok()?);
        } else {
            // This also rejects digits after a wildcard, as in `1.x.3`.
            return None;
        }
        count += 1;
    }
    if components[0].is_none() && !wildcard_seen {
        return None;
    }

    Some(Partial {
        major: components[0],
        minor: components[1],
        patch: components[2],
        pre: Vec::new(),
        build: None,
    })
}

const OPERATORS: [&str; 7] = [">=", "<=", ">", "<", "^", "~", "="];

fn parse_comparator(token: &str) -> Result<Constraint, ConstraintParseError> {
    let invalid = || ConstraintParseError::InvalidComparator(token.to_string());
    let (op, rest) = OPERATORS
        .iter()
        .find_map(|op| token.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("", token));
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let partial = parse_partial(rest).ok_or_else(invalid)?;
    Ok(match op {
        "" | "=" => {
            if partial.is_full() {
                Constraint::exact(partial.floor())
            } else if partial.major.is_none() {
                Constraint::any()
            } else {
                Constraint::between(partial.floor(), partial.wildcard_upper())
            }
        }
        ">=" => Constraint::higher_than(partial.floor()),
        ">" => Constraint::strictly_higher_than(partial.floor()),
        "<" => Constraint::strictly_lower_than(partial.floor()),
        "<=" => Constraint::lower_than(partial.floor()),
        "^" => {
            let v = partial.floor();
            let upper = if v.major > 0 || partial.minor.is_none() {
                Version::lowest_pre(v.major + 1, 0, 0)
            } else if v.minor > 0 || partial.patch.is_none() {
                Version::lowest_pre(0, v.minor + 1, 0)
            } else {
                Version::lowest_pre(0, 0, v.patch + 1)
            };
            Constraint::between(v, upper)
        }
        "~" => {
            let v = partial.floor();
            let upper = if partial.minor.is_none() {
                Version::lowest_pre(v.major + 1, 0, 0)
            } else {
                Version::lowest_pre(v.major, v.minor + 1, 0)
            };
            Constraint::between(v, upper)
        }
        _ => unreachable!(),
    })
}

fn parse_hyphen_range(lower: &str, upper: &str) -> Result<Constraint, ConstraintParseError> {
    let invalid =
        || ConstraintParseError::InvalidComparator(format!("{lower} - {upper}"));
    let lower = parse_partial(lower).ok_or_else(invalid)?;
    let upper = parse_partial(upper).ok_or_else(invalid)?;
    let end = if upper.is_full() {
        Included(upper.floor())
    } else if upper.major.is_none() {
        Unbounded
    } else {
        Excluded(upper.wildcard_upper())
    };
    Ok(Constraint::interval(Included(lower.floor()), end))
}

fn parse_group(group: &str) -> Result<Constraint, ConstraintParseError> {
    // Commas and plain whitespace both join comparators with AND.
    let tokens: Vec<&str> = group
        .split(',')
        .flat_map(str::split_whitespace)
        .collect();
    if tokens.is_empty() {
        return Err(ConstraintParseError::Empty);
    }

    // Re-attach operators that were separated from their version by
    // whitespace, as in `>= 1.2.3`.
    let mut joined: Vec<String> = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if OPERATORS.contains(&token) {
            match iter.next() {
                Some(version) => joined.push(format!("{token}{version}")),
                None => return Err(ConstraintParseError::InvalidComparator(token.to_string())),
            }
        } else {
            joined.push(token.to_string());
        }
    }

    let mut constraint = Constraint::any();
    let mut i = 0;
    while i < joined.len() {
        if joined.get(i + 1).map(String::as_str) == Some("-") {
            let upper = joined
                .get(i + 2)
                .ok_or_else(|| ConstraintParseError::IncompleteHyphenRange(group.to_string()))?;
            constraint = constraint.intersection(&parse_hyphen_range(&joined[i], upper)?);
            i += 3;
        } else {
            constraint = constraint.intersection(&parse_comparator(&joined[i])?);
            i += 1;
        }
    }
    Ok(constraint)
}

impl Constraint {
    /// Parse a constraint from the catalog comparator syntax.
    pub fn parse(input: &str) -> Result<Self, ConstraintParseError> {
        if input.trim().is_empty() {
            return Err(ConstraintParseError::Empty);
        }
        let mut union = Self::empty();
        for group in input.split("||") {
            union = union.union(&parse_group(group.trim())?);
        }
        Ok(union)
    }
}

impl FromStr for Constraint {
    type Err = ConstraintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// RENDERING ###################################################################

fn caret_upper(v: &Version) -> Version {
    if v.major > 0 {
        Version::lowest_pre(v.major + 1, 0, 0)
    } else if v.minor > 0 {
        Version::lowest_pre(0, v.minor + 1, 0)
    } else {
        Version::lowest_pre(0, 0, v.patch + 1)
    }
}

fn tilde_upper(v: &Version) -> Version {
    Version::lowest_pre(v.major, v.minor + 1, 0)
}

impl Display for Constraint {
    /// Canonical rendering: sugared comparators where an interval has a
    /// recognizable shape, two plain comparators joined by `, ` otherwise,
    /// and ` || ` between intervals. Parsing a rendered constraint yields
    /// the same constraint.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.segments.as_slice().is_empty() {
            return write!(f, "∅");
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                write!(f, " || ")?;
            }
            match segment {
                (Unbounded, Unbounded) => write!(f, "*")?,
                (Unbounded, Included(v)) => write!(f, "<={v}")?,
                (Unbounded, Excluded(v)) => write!(f, "<{v}")?,
                (Included(v), Unbounded) => write!(f, ">={v}")?,
                (Included(a), Included(b)) if a == b => write!(f, "{a}")?,
                (Included(a), Excluded(b)) if *b == caret_upper(a) => write!(f, "^{a}")?,
                (Included(a), Excluded(b)) if *b == tilde_upper(a) => write!(f, "~{a}")?,
                (Included(a), Included(b)) => write!(f, ">={a}, <={b}")?,
                (Included(a), Excluded(b)) => write!(f, ">={a}, <{b}")?,
                (Excluded(v), Unbounded) => write!(f, ">{v}")?,
                (Excluded(a), Included(b)) => write!(f, ">{a}, <={b}")?,
                (Excluded(a), Excluded(b)) => write!(f, ">{a}, <{b}")?,
            };
        }
        Ok(())
    }
}

// TESTS #######################################################################
