// SPDX-License-Identifier: MPL-2.0

//! Semantic versions as published in the mod catalog.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Type for semantic versions: major.minor.patch with optional
/// pre-release identifiers and build metadata.
///
/// Ordering follows semantic versioning precedence rules.
/// Build metadata is ignored for ordering (and therefore for equality
/// and hashing) but preserved by [Display].
#[derive(Debug, Clone)]
pub struct Version {
    /// Major version number.
    pub major: u64,
    /// Minor version number.
    pub minor: u64,
    /// Patch version number.
    pub patch: u64,
    /// Pre-release identifiers, empty for a release version.
    pub pre: Vec<Identifier>,
    /// Build metadata, carried verbatim.
    pub build: Option<String>,
}

/// A single dot-separated pre-release identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Identifier {
    /// An all-digit identifier, compared numerically.
    Numeric(u64),
    /// Any other identifier, compared lexically in ASCII order.
    AlphaNumeric(String),
}

impl Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{}", n),
            Identifier::AlphaNumeric(s) => write!(f, "{}", s),
        }
    }
}

// Constructors
impl Version {
    /// Create a release version with "major", "minor" and "patch" values.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: None,
        }
    }

    /// Version 0.0.0, the version of the synthetic root package.
    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// The smallest version with the given release triple,
    /// i.e. `major.minor.patch-0`.
    ///
    /// Used as an exclusive upper bound so that pre-releases of the
    /// next release never satisfy a caret or tilde constraint.
    pub(crate) fn lowest_pre(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: vec![Identifier::Numeric(0)],
            build: None,
        }
    }
}

// Bump versions.
impl Version {
    /// Next patch version, dropping pre-release and build parts.
    pub fn bump_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }

    /// Next minor version, dropping pre-release and build parts.
    pub fn bump_minor(&self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    /// Next major version, dropping pre-release and build parts.
    pub fn bump_major(&self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }

    /// Whether this is a pre-release version.
    pub fn is_pre(&self) -> bool {
        !self.pre.is_empty()
    }
}

// Convert a tuple (major, minor, patch) into a version.
impl From<(u64, u64, u64)> for Version {
    fn from(tuple: (u64, u64, u64)) -> Self {
        let (major, minor, patch) = tuple;
        Self::new(major, minor, patch)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.pre.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                // A release version has higher precedence than any of its pre-releases.
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        for (idx, identifier) in self.pre.iter().enumerate() {
            write!(f, "{}{}", if idx == 0 { '-' } else { '.' }, identifier)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

/// Error creating [Version] from an invalid string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    /// The string is empty.
    #[error("empty version string")]
    Empty,
    /// A version number is not a valid non-negative integer.
    #[error("invalid version number: {0}")]
    InvalidNumber(String),
    /// More than three dot-separated version numbers.
    #[error("too many version components: {0}")]
    TooManyComponents(String),
    /// A pre-release identifier is empty or contains an invalid character.
    #[error("invalid pre-release identifier: {0:?}")]
    InvalidIdentifier(String),
    /// The build metadata is empty or contains an invalid character.
    #[error("invalid build metadata: {0:?}")]
    InvalidBuild(String),
}

impl Version {
    /// Parse a version string.
    ///
    /// Missing minor and patch components default to zero so that bare
    /// game build numbers such as `"264901"` parse as `264901.0.0`.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let input = input.trim();
        let input = input.strip_prefix(['v', 'V']).unwrap_or(input);
        if input.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let (rest, build) = match input.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (input, None),
        };
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        let mut numbers = [0u64; 3];
        let mut count = 0;
        for component in core.split('.') {
            if count == 3 {
                return Err(VersionParseError::TooManyComponents(input.to_string()));
            }
            if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionParseError::InvalidNumber(component.to_string()));
            }
            numbers[count] = component
                .parse()
                .map_err(|_| VersionParseError::InvalidNumber(component.to_string()))?;
            count += 1;
        }

        let pre = match pre {
            None => Vec::new(),
            Some(pre) => pre
                .split('.')
                .map(parse_identifier)
                .collect::<Result<_, _>>()?,
        };

        let build = match build {
            None => None,
            Some(build) => {
                let valid = !build.is_empty()
                    && build
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.');
                if !valid {
                    return Err(VersionParseError::InvalidBuild(build.to_string()));
                }
                Some(build.to_string())
            }
        };

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            pre,
            build,
        })
    }
}

fn parse_identifier(identifier: &str) -> Result<Identifier, VersionParseError> {
    if identifier.is_empty()
        || !identifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return Err(VersionParseError::InvalidIdentifier(identifier.to_string()));
    }
    if identifier.bytes().all(|b| b.is_ascii_digit()) {
        match identifier.parse() {
            Ok(n) => Ok(Identifier::Numeric(n)),
            Err(_) => Err(VersionParseError::InvalidNumber(identifier.to_string())),
        }
    } else {
        Ok(Identifier::AlphaNumeric(identifier.to_string()))
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use super::*;

    fn v(input: &str) -> Version {
        Version::parse(input).unwrap()
    }

    #[test]
    fn parse_full_version() {
        let version = v("3.2.11");
        assert_eq!((version.major, version.minor, version.patch), (3, 2, 11));
        assert!(version.pre.is_empty());
        assert!(version.build.is_none());
    }

    #[test]
    fn parse_pads_missing_components() {
        assert_eq!(v("264901"), Version::new(264901, 0, 0));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
    }

    #[test]
    fn parse_pre_release_and_build() {
        let version = v("1.0.0-alpha.3+20130417.amd64");
        assert_eq!(
            version.pre,
            vec![
                Identifier::AlphaNumeric("alpha".to_string()),
                Identifier::Numeric(3)
            ]
        );
        assert_eq!(version.build.as_deref(), Some("20130417.amd64"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("Hello").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
        assert!(Version::parse("1.-2.3").is_err());
        assert!(Version::parse("1.0.0-").is_err());
        assert!(Version::parse("1.0.0+").is_err());
    }

    #[test]
    fn precedence_follows_semver() {
        let ordered = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
            "1.0.1-0",
            "1.0.1",
            "1.1.0",
            "2.0.0",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn build_metadata_is_ignored_for_ordering() {
        assert_eq!(v("1.0.0+build.1"), v("1.0.0+build.2"));
        assert_eq!(v("1.0.0+build.1").cmp(&v("1.0.0")), Ordering::Equal);
    }

    #[test]
    fn display_preserves_all_parts() {
        for input in ["1.2.3", "0.1.0-rc.1", "1.0.0-alpha+001", "2.0.0+linux"] {
            assert_eq!(v(input).to_string(), input);
        }
    }

    #[test]
    fn lowest_pre_sorts_below_its_release() {
        assert!(Version::lowest_pre(2, 0, 0) < Version::new(2, 0, 0));
        assert!(Version::lowest_pre(2, 0, 0) < v("2.0.0-alpha"));
        assert!(Version::new(1, 99, 99) < Version::lowest_pre(2, 0, 0));
    }
}
