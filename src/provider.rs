// SPDX-License-Identifier: MPL-2.0

//! The mod provider interface and the catalog data model it serves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BoxError, ResolveError};

/// Capability interface over the remote mod catalog.
///
/// The resolver consumes exactly two operations; everything network or
/// GraphQL shaped lives behind this trait, and tests substitute an
/// in-memory mock. Both operations may fail with an arbitrary error,
/// which the resolver surfaces as a fetch error wrapping the package name.
pub trait Provider {
    /// All published versions of a mod, with their dependencies.
    fn mod_versions_with_dependencies(&self, mod_id: &str) -> Result<Vec<ModVersion>, BoxError>;

    /// The human-readable name of a mod. Only used when rendering
    /// resolution failures.
    fn get_mod_name(&self, mod_reference: &str) -> Result<ModName, BoxError>;
}

/// A named deployment flavor of the game, the closed set of places a
/// mod artifact can be installed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetName {
    /// The game client.
    Windows,
    /// The dedicated server on Windows.
    WindowsServer,
    /// The dedicated server on Linux.
    LinuxServer,
}

impl TargetName {
    /// Every member of the closed target set.
    pub const ALL: [TargetName; 3] = [
        TargetName::Windows,
        TargetName::WindowsServer,
        TargetName::LinuxServer,
    ];

    /// Whether this target is a client flavor.
    pub fn is_client(self) -> bool {
        matches!(self, TargetName::Windows)
    }

    /// Whether this target is a dedicated server flavor.
    pub fn is_server(self) -> bool {
        !self.is_client()
    }

    /// The name as spelled in the catalog and in lock files.
    pub fn as_str(self) -> &'static str {
        match self {
            TargetName::Windows => "Windows",
            TargetName::WindowsServer => "WindowsServer",
            TargetName::LinuxServer => "LinuxServer",
        }
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetName {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Windows" => Ok(TargetName::Windows),
            "WindowsServer" => Ok(TargetName::WindowsServer),
            "LinuxServer" => Ok(TargetName::LinuxServer),
            other => Err(ResolveError::InvalidTarget(other.to_string())),
        }
    }
}

/// One published version of a mod, as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModVersion {
    /// Catalog identifier of this version.
    #[serde(default)]
    pub id: String,
    /// The version string; parsed as a semantic version by the resolver.
    pub version: String,
    /// Constraint on the game build number. An empty string declares no
    /// game-version requirement at all.
    #[serde(default)]
    pub game_version: String,
    /// Declared dependencies on other mods.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Artifacts per deployment target.
    #[serde(default)]
    pub targets: Vec<VersionTarget>,
    /// Whether this mod must ship to every deployed target, or may be
    /// delivered only where applicable (e.g. a pure client-side mod).
    #[serde(default)]
    pub required_on_remote: bool,
}

/// A single dependency declaration of a mod version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// The mod reference this dependency points at.
    pub mod_id: String,
    /// The version constraint, in catalog comparator syntax.
    pub condition: String,
    /// Optional dependencies contribute constraints but never force the
    /// target mod into the solution.
    #[serde(default)]
    pub optional: bool,
}

/// The artifact a mod version ships for one deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTarget {
    /// Catalog identifier of the version this artifact belongs to.
    #[serde(default)]
    pub version_id: String,
    /// The deployment target the artifact is built for.
    pub target_name: TargetName,
    /// Download link.
    #[serde(default)]
    pub link: String,
    /// Content hash of the artifact.
    #[serde(default)]
    pub hash: String,
    /// Size of the artifact in bytes.
    #[serde(default)]
    pub size: i64,
}

impl VersionTarget {
    /// An artifact entry with only the fields every catalog row has.
    pub fn new(target_name: TargetName, hash: impl Into<String>) -> Self {
        Self {
            version_id: String::new(),
            target_name,
            link: String::new(),
            hash: hash.into(),
            size: 0,
        }
    }
}

/// The identifying names of a mod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModName {
    /// Catalog identifier.
    pub id: String,
    /// The stable reference used in dependency declarations.
    pub mod_reference: String,
    /// The human-readable display name.
    pub name: String,
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_names_round_trip() {
        for target in TargetName::ALL {
            assert_eq!(target.as_str().parse::<TargetName>().unwrap(), target);
        }
    }

    #[test]
    fn unknown_target_is_an_error() {
        let err = "NotARealTarget".parse::<TargetName>().unwrap_err();
        assert_eq!(err.to_string(), "invalid target: NotARealTarget");
    }

    #[test]
    fn client_server_partition() {
        assert!(TargetName::Windows.is_client());
        assert!(TargetName::WindowsServer.is_server());
        assert!(TargetName::LinuxServer.is_server());
        assert!(!TargetName::LinuxServer.is_client());
    }
}
