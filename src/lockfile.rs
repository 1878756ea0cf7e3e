// SPDX-License-Identifier: MPL-2.0

//! The lock-file data model: the output of a successful resolution and
//! an input hint to version selection on the next one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A complete, consistent assignment of every resolved mod to one
/// concrete version plus its per-target artifacts.
///
/// Lock files are immutable by convention: mutating operations return a
/// new lock file, and a lock file passed into a resolution is never
/// touched. Keys are kept sorted so equality is structural and the
/// serialized form is canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    /// The locked mods, keyed by mod reference.
    pub mods: BTreeMap<String, LockedMod>,
}

/// One locked mod: its version and artifact references per target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedMod {
    /// The locked version, rendered as published by the catalog.
    pub version: String,
    /// Artifact references, keyed by target name.
    #[serde(default)]
    pub targets: BTreeMap<String, LockedModTarget>,
}

/// The artifact reference of a locked mod for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedModTarget {
    /// Download link.
    #[serde(default)]
    pub link: String,
    /// Content hash of the artifact.
    pub hash: String,
}

impl LockFile {
    /// An empty lock file.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this lock file without the given package.
    /// Removing an absent package is a no-op.
    pub fn remove(&self, package: &str) -> Self {
        let mut out = self.clone();
        out.mods.remove(package);
        out
    }
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use super::*;

    fn locked(version: &str) -> LockedMod {
        LockedMod {
            version: version.to_string(),
            targets: BTreeMap::new(),
        }
    }

    #[test]
    fn clone_is_independent() {
        let mut first = LockFile::new();
        first.mods.insert("Hello".to_string(), locked("1.0.0"));
        first.mods.insert("World".to_string(), locked("2.0.0"));

        let mut second = first.clone();
        second.mods.insert("Foo".to_string(), locked("3.0.0"));
        second.mods.insert("Bar".to_string(), locked("4.0.0"));

        assert_eq!(second.mods["Hello"].version, "1.0.0");
        assert!(!first.mods.contains_key("Foo"));
        assert!(!first.mods.contains_key("Bar"));

        let first = first.remove("Hello");
        assert!(!first.mods.contains_key("Hello"));
        assert_eq!(second.mods["Hello"].version, "1.0.0");
    }

    #[test]
    fn remove_is_idempotent_for_absent_keys() {
        let mut lock = LockFile::new();
        lock.mods.insert("Hello".to_string(), locked("1.0.0"));

        let removed = lock.remove("Absent");
        assert_eq!(removed, lock);
        assert_eq!(removed.remove("Absent"), lock);
    }

    #[test]
    fn serde_round_trip() {
        let mut lock = LockFile::new();
        lock.mods.insert(
            "RefinedPower".to_string(),
            LockedMod {
                version: "3.2.10".to_string(),
                targets: BTreeMap::from([(
                    "Windows".to_string(),
                    LockedModTarget {
                        link: "https://example.com/rp.smod".to_string(),
                        hash: "698df202".to_string(),
                    },
                )]),
            },
        );

        let json = serde_json::to_string(&lock).unwrap();
        let back: LockFile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lock);
        assert!(json.contains("\"hash\":\"698df202\""));
    }
}
