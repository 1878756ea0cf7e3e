// SPDX-License-Identifier: MPL-2.0

//! End-to-end resolution scenarios against an in-memory mock of the mod
//! catalog.

use std::io::Write;
use std::sync::atomic::AtomicBool;

use indexmap::IndexMap;
use log::LevelFilter;

use ficsit_resolver::{
    BoxError, Dependency, DependencyResolver, LockFile, LockedMod, ModName, ModVersion, Provider,
    ResolveError, TargetName, VersionTarget,
};

const MAX_GAME_VERSION: u32 = u32::MAX;

fn init_log() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Info)
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .is_test(true)
        .try_init();
}

fn constraints(entries: &[(&str, &str)]) -> IndexMap<String, String> {
    entries
        .iter()
        .map(|(package, constraint)| (package.to_string(), constraint.to_string()))
        .collect()
}

fn targets(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn dep(mod_id: &str, condition: &str) -> Dependency {
    Dependency {
        mod_id: mod_id.to_string(),
        condition: condition.to_string(),
        optional: false,
    }
}

fn optional_dep(mod_id: &str, condition: &str) -> Dependency {
    Dependency {
        optional: true,
        ..dep(mod_id, condition)
    }
}

fn common_targets() -> Vec<VersionTarget> {
    vec![
        VersionTarget::new(
            TargetName::Windows,
            "698df20278b3de3ec30405569a22050c6721cc682389312258c14948bd8f38ae",
        ),
        VersionTarget::new(
            TargetName::WindowsServer,
            "7be01ed372e0cf3287a04f5cb32bb9dcf6f6e7a5b7603b7e43669ec4c6c1457f",
        ),
        VersionTarget::new(
            TargetName::LinuxServer,
            "bdbd4cb1b472a5316621939ae2fe270fd0e3c0f0a75666a9cbe74ff1313c3663",
        ),
    ]
}

fn mod_version(
    version: &str,
    dependencies: Vec<Dependency>,
    targets: Vec<VersionTarget>,
) -> ModVersion {
    ModVersion {
        version: version.to_string(),
        required_on_remote: true,
        dependencies,
        targets,
        ..Default::default()
    }
}

fn sml_version(version: &str, game_version: &str, targets: Vec<VersionTarget>) -> ModVersion {
    ModVersion {
        game_version: game_version.to_string(),
        ..mod_version(version, Vec::new(), targets)
    }
}

struct MockProvider;

impl Provider for MockProvider {
    fn mod_versions_with_dependencies(&self, mod_id: &str) -> Result<Vec<ModVersion>, BoxError> {
        let sml3 = dep("SML", "^3.6.0");

        match mod_id {
            "RefinedPower" => Ok(vec![
                mod_version(
                    "3.2.13",
                    vec![
                        dep("ModularUI", "^2.1.11"),
                        dep("RefinedRDLib", "^1.1.7"),
                        dep("SML", "^3.6.1"),
                    ],
                    common_targets(),
                ),
                mod_version(
                    "3.2.11",
                    vec![
                        dep("ModularUI", "^2.1.10"),
                        dep("RefinedRDLib", "^1.1.6"),
                        sml3.clone(),
                    ],
                    common_targets(),
                ),
                mod_version(
                    "3.2.10",
                    vec![
                        dep("ModularUI", "^2.1.9"),
                        dep("RefinedRDLib", "^1.1.5"),
                        sml3.clone(),
                    ],
                    common_targets(),
                ),
            ]),
            "RefinedRDLib" => Ok(vec![
                mod_version("1.1.7", vec![dep("SML", "^3.6.1")], common_targets()),
                mod_version("1.1.6", vec![sml3.clone()], common_targets()),
                mod_version("1.1.5", vec![sml3.clone()], common_targets()),
            ]),
            "ModularUI" => Ok(vec![
                mod_version("2.1.12", vec![dep("SML", "^3.6.1")], common_targets()),
                mod_version("2.1.11", vec![sml3.clone()], common_targets()),
                mod_version("2.1.10", vec![sml3.clone()], common_targets()),
            ]),
            "PowerSuit" => Ok(vec![ModVersion {
                dependencies: vec![sml3.clone(), optional_dep("ModularUI", "<=2.1.11")],
                ..mod_version("1.0.0", Vec::new(), common_targets())
            }]),
            "ThisModDoesNotExist$$$" => Err("mod not found".into()),
            "ComplexMod" => Ok(vec![
                mod_version(
                    "3.0.0",
                    vec![sml3.clone()],
                    vec![VersionTarget::new(
                        TargetName::LinuxServer,
                        "8739c76e681f900923b900c9df0ef75cf421d39cabb54650c4b9ad19b6a76d85",
                    )],
                ),
                mod_version("2.0.0", vec![sml3.clone()], common_targets()),
                mod_version(
                    "1.0.0",
                    vec![sml3.clone()],
                    vec![VersionTarget::new(
                        TargetName::Windows,
                        "62f5c84eca8480b3ffe7d6c90f759e3b463f482530e27d854fd48624fdd3acc9",
                    )],
                ),
            ]),
            "SML" => Ok(vec![
                sml_version("2.2.1", ">=125236", Vec::new()),
                sml_version(
                    "3.3.2",
                    ">=194714",
                    vec![VersionTarget::new(TargetName::Windows, "unknown")],
                ),
                sml_version(
                    "3.6.0",
                    ">=264901",
                    vec![
                        VersionTarget::new(TargetName::Windows, "unknown"),
                        VersionTarget::new(TargetName::WindowsServer, "unknown"),
                        VersionTarget::new(TargetName::LinuxServer, "unknown"),
                    ],
                ),
                sml_version(
                    "3.6.1",
                    ">=264901",
                    vec![
                        VersionTarget::new(TargetName::Windows, "unknown"),
                        VersionTarget::new(TargetName::WindowsServer, "unknown"),
                        VersionTarget::new(TargetName::LinuxServer, "unknown"),
                    ],
                ),
            ]),
            "ClientOnlyMod" => Ok(vec![ModVersion {
                required_on_remote: false,
                ..mod_version(
                    "1.0.0",
                    Vec::new(),
                    vec![VersionTarget::new(
                        TargetName::Windows,
                        "8739c76e681f900923b900c9df0ef75cf421d39cabb54650c4b9ad19b6a76d85",
                    )],
                )
            }]),
            "ServerOnlyMod" => Ok(vec![
                ModVersion {
                    required_on_remote: false,
                    ..mod_version(
                        "2.0.0",
                        Vec::new(),
                        vec![VersionTarget::new(
                            TargetName::WindowsServer,
                            "8739c76e681f900923b900c9df0ef75cf421d39cabb54650c4b9ad19b6a76d85",
                        )],
                    )
                },
                ModVersion {
                    required_on_remote: false,
                    ..mod_version(
                        "1.0.0",
                        Vec::new(),
                        vec![
                            VersionTarget::new(
                                TargetName::WindowsServer,
                                "8739c76e681f900923b900c9df0ef75cf421d39cabb54650c4b9ad19b6a76d85",
                            ),
                            VersionTarget::new(
                                TargetName::LinuxServer,
                                "8739c76e681f900923b900c9df0ef75cf421d39cabb54650c4b9ad19b6a76d85",
                            ),
                        ],
                    )
                },
            ]),
            other => panic!("mod_versions_with_dependencies: {other}"),
        }
    }

    fn get_mod_name(&self, mod_reference: &str) -> Result<ModName, BoxError> {
        let entry = |id: &str, name: &str| {
            Ok(ModName {
                id: id.to_string(),
                mod_reference: mod_reference.to_string(),
                name: name.to_string(),
            })
        };

        match mod_reference {
            "RefinedPower" => entry("DGiLzB3ZErWu2V", "Refined Power"),
            "RefinedRDLib" => entry("B24emzbs6xVZQr", "RefinedRDLib"),
            "ModularUI" => entry("As2uJmQLLxjXLG", "ModularUI"),
            "PowerSuit" => entry("9LguyCdDUrpT9N", "PowerSuit"),
            "ComplexMod" => entry("asd32rfewqhy4", "ComplexMod"),
            "ClientOnlyMod" => entry("asd32rfewqhy4", "ClientOnlyMod"),
            "ServerOnlyMod" => entry("asd32rfewqhy4", "ServerOnlyMod"),
            "SML" => entry("SML", "Satisfactory Mod Loader"),
            other => panic!("get_mod_name: {other}"),
        }
    }
}

fn resolver() -> DependencyResolver<MockProvider> {
    DependencyResolver::new(MockProvider)
}

#[test]
fn profile_resolution() {
    init_log();
    let resolved = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("RefinedPower", "3.2.10")]),
            None,
            MAX_GAME_VERSION,
            &[],
        )
        .unwrap();

    assert_eq!(resolved.mods.len(), 4);
    assert_eq!(resolved.mods["RefinedPower"].version, "3.2.10");
    assert_eq!(resolved.mods["SML"].version, "3.6.1");
    // Artifact metadata is carried over from the catalog.
    assert_eq!(
        resolved.mods["RefinedPower"].targets["Windows"].hash,
        "698df20278b3de3ec30405569a22050c6721cc682389312258c14948bd8f38ae"
    );
}

#[test]
fn profile_required_older_version() {
    init_log();
    let err = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("RefinedPower", "3.2.11"), ("RefinedRDLib", "1.1.5")]),
            None,
            MAX_GAME_VERSION,
            &[],
        )
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Because installing Refined Power (RefinedPower) \"3.2.11\" and Refined Power (RefinedPower) \"3.2.11\" depends on RefinedRDLib \"^1.1.6\", installing RefinedRDLib \"^1.1.6\".\nSo, because installing RefinedRDLib \"1.1.5\", version solving failed."
    );
}

#[test]
fn resolution_non_existent_mod() {
    init_log();
    let err = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("ThisModDoesNotExist$$$", ">0.0.0")]),
            None,
            MAX_GAME_VERSION,
            &[],
        )
        .unwrap_err();

    assert!(matches!(err, ResolveError::Fetch { .. }));
    assert_eq!(
        err.to_string(),
        "failed to fetch mod ThisModDoesNotExist$$$: mod not found"
    );
}

#[test]
fn invalid_constraint() {
    init_log();
    let err = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("ThisModDoesNotExist$$$", "Hello")]),
            None,
            MAX_GAME_VERSION,
            &[],
        )
        .unwrap_err();

    assert!(matches!(err, ResolveError::InvalidConstraint { .. }));
    let message = err.to_string();
    assert!(message.starts_with("failed to parse constraint Hello:"), "{message}");
    assert!(message.ends_with("invalid comparator string: Hello"), "{message}");
}

#[test]
fn old_game_version() {
    init_log();
    let err = resolver()
        .resolve_mod_dependencies(&constraints(&[("RefinedPower", "*")]), None, 0, &[])
        .unwrap_err();

    assert!(matches!(err, ResolveError::SolvingFailed(_)));
    let message = err.to_string();
    assert!(message.contains("Satisfactory CL0 is installed"), "{message}");
    assert!(message.ends_with("version solving failed."), "{message}");
}

#[test]
fn lockfile_resolution() {
    init_log();
    let mut lockfile = LockFile::new();
    lockfile.mods.insert(
        "RefinedPower".to_string(),
        LockedMod {
            version: "3.2.11".to_string(),
            ..Default::default()
        },
    );
    let input_snapshot = lockfile.clone();

    let resolved = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("RefinedPower", ">=3.2.10")]),
            Some(&lockfile),
            MAX_GAME_VERSION,
            &[],
        )
        .unwrap();

    assert_eq!(resolved.mods.len(), 4);
    assert_eq!(resolved.mods["RefinedPower"].version, "3.2.11");
    // The input lock file is a hint, never an output: it must not change.
    assert_eq!(lockfile, input_snapshot);
}

#[test]
fn lockfile_pin_is_ignored_when_inadmissible() {
    init_log();
    let mut lockfile = LockFile::new();
    lockfile.mods.insert(
        "RefinedPower".to_string(),
        LockedMod {
            version: "3.2.10".to_string(),
            ..Default::default()
        },
    );

    let resolved = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("RefinedPower", ">=3.2.11")]),
            Some(&lockfile),
            MAX_GAME_VERSION,
            &[],
        )
        .unwrap();

    assert_eq!(resolved.mods["RefinedPower"].version, "3.2.13");
}

#[test]
fn re_resolving_with_output_lock_is_stable() {
    init_log();
    let requested = constraints(&[("RefinedPower", ">=3.2.10")]);
    let first = resolver()
        .resolve_mod_dependencies(&requested, None, MAX_GAME_VERSION, &[])
        .unwrap();
    let second = resolver()
        .resolve_mod_dependencies(&requested, Some(&first), MAX_GAME_VERSION, &[])
        .unwrap();

    assert_eq!(first, second);
}

#[test]
fn missing_target() {
    init_log();
    let err = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("RefinedPower", "*")]),
            None,
            MAX_GAME_VERSION,
            &targets(&["NotARealTarget"]),
        )
        .unwrap_err();

    assert!(matches!(err, ResolveError::InvalidTarget(_)));
    assert_eq!(err.to_string(), "invalid target: NotARealTarget");
}

#[test]
fn resolve_for_all_targets() {
    init_log();
    let resolved = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("ComplexMod", "*")]),
            None,
            MAX_GAME_VERSION,
            &targets(&["Windows", "LinuxServer"]),
        )
        .unwrap();

    assert_eq!(resolved.mods.len(), 2);
    assert_eq!(resolved.mods["ComplexMod"].version, "2.0.0");
}

#[test]
fn no_match_for_all_targets() {
    init_log();
    let err = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("ComplexMod", ">=3.0.0")]),
            None,
            MAX_GAME_VERSION,
            &targets(&["Windows", "LinuxServer"]),
        )
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "So, because installing ComplexMod \"3.0.0\" and ComplexMod \"3.0.0\" is forbidden, version solving failed."
    );
}

#[test]
fn match_for_all_targets_not_required_on_remote() {
    init_log();
    let resolved = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("ClientOnlyMod", "*")]),
            None,
            MAX_GAME_VERSION,
            &targets(&["Windows", "WindowsServer", "LinuxServer"]),
        )
        .unwrap();

    assert_eq!(resolved.mods.len(), 1);
    assert_eq!(resolved.mods["ClientOnlyMod"].version, "1.0.0");

    let resolved = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("ServerOnlyMod", "<=1.0.0")]),
            None,
            MAX_GAME_VERSION,
            &targets(&["Windows", "WindowsServer", "LinuxServer"]),
        )
        .unwrap();

    assert_eq!(resolved.mods.len(), 1);
    assert_eq!(resolved.mods["ServerOnlyMod"].version, "1.0.0");

    let resolved = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("ClientOnlyMod", "*"), ("ServerOnlyMod", "<=1.0.0")]),
            None,
            MAX_GAME_VERSION,
            &targets(&["Windows", "WindowsServer", "LinuxServer"]),
        )
        .unwrap();

    assert_eq!(resolved.mods.len(), 2);
    assert_eq!(resolved.mods["ClientOnlyMod"].version, "1.0.0");
    assert_eq!(resolved.mods["ServerOnlyMod"].version, "1.0.0");
}

#[test]
fn no_match_for_all_targets_not_required_on_remote() {
    init_log();
    let err = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("ServerOnlyMod", ">=2.0.0")]),
            None,
            MAX_GAME_VERSION,
            &targets(&["WindowsServer", "LinuxServer"]),
        )
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "So, because installing ServerOnlyMod \"2.0.0\" and ServerOnlyMod \"2.0.0\" is forbidden, version solving failed."
    );
}

#[test]
fn optional_dependencies_do_not_pull_mods() {
    init_log();
    let resolved = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("PowerSuit", "*")]),
            None,
            MAX_GAME_VERSION,
            &[],
        )
        .unwrap();

    assert_eq!(resolved.mods.len(), 2);
    assert!(resolved.mods.contains_key("PowerSuit"));
    assert!(resolved.mods.contains_key("SML"));
    assert!(!resolved.mods.contains_key("ModularUI"));
}

#[test]
fn optional_dependencies_constrain_present_mods() {
    init_log();
    let resolved = resolver()
        .resolve_mod_dependencies(
            &constraints(&[("PowerSuit", "*"), ("ModularUI", "*")]),
            None,
            MAX_GAME_VERSION,
            &[],
        )
        .unwrap();

    // ModularUI alone would resolve to 2.1.12, but PowerSuit's optional
    // dependency caps it once ModularUI is required anyway.
    assert_eq!(resolved.mods.len(), 3);
    assert_eq!(resolved.mods["ModularUI"].version, "2.1.11");
}

#[test]
fn resolution_is_deterministic() {
    init_log();
    let requested = constraints(&[("RefinedPower", ">=3.2.10")]);
    let first = resolver()
        .resolve_mod_dependencies(&requested, None, MAX_GAME_VERSION, &[])
        .unwrap();
    for _ in 0..5 {
        let again = resolver()
            .resolve_mod_dependencies(&requested, None, MAX_GAME_VERSION, &[])
            .unwrap();
        assert_eq!(first, again);
    }

    let conflicting = constraints(&[("RefinedPower", "3.2.11"), ("RefinedRDLib", "1.1.5")]);
    let first_err = resolver()
        .resolve_mod_dependencies(&conflicting, None, MAX_GAME_VERSION, &[])
        .unwrap_err()
        .to_string();
    for _ in 0..5 {
        let again = resolver()
            .resolve_mod_dependencies(&conflicting, None, MAX_GAME_VERSION, &[])
            .unwrap_err()
            .to_string();
        assert_eq!(first_err, again);
    }
}

#[test]
fn cancellation_is_honored() {
    init_log();
    let cancelled = AtomicBool::new(true);
    let err = resolver()
        .resolve_mod_dependencies_cancellable(
            &constraints(&[("RefinedPower", "*")]),
            None,
            MAX_GAME_VERSION,
            &[],
            &cancelled,
        )
        .unwrap_err();

    assert!(matches!(err, ResolveError::Cancelled));
    assert_eq!(err.to_string(), "resolution cancelled");
}
