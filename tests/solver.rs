// SPDX-License-Identifier: MPL-2.0

//! Solver scenarios over an in-memory source, following the classic
//! PubGrub walkthroughs plus the optional-dependency rules specific to
//! this solver.

use std::io::Write;

use log::LevelFilter;

use ficsit_resolver::{solve, Constraint, OfflineSource, SolveError, Version};

fn init_log() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Trace)
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .is_test(true)
        .try_init();
}

fn c(input: &str) -> Constraint {
    Constraint::parse(input).unwrap()
}

fn v(input: &str) -> Version {
    Version::parse(input).unwrap()
}

#[test]
/// https://github.com/dart-lang/pub/blob/master/doc/solver.md#no-conflicts
fn no_conflict() {
    init_log();
    let mut source = OfflineSource::new();
    source.add_dependencies("root", (1, 0, 0), [("foo", c("^1.0.0"))]);
    source.add_dependencies("foo", (1, 0, 0), [("bar", c("^1.0.0"))]);
    source.add_dependencies("bar", (1, 0, 0), []);
    source.add_dependencies("bar", (2, 0, 0), []);

    let solution = solve(&source, "root", Version::new(1, 0, 0)).unwrap();

    assert_eq!(solution.len(), 3);
    assert_eq!(solution["root"], v("1.0.0"));
    assert_eq!(solution["foo"], v("1.0.0"));
    assert_eq!(solution["bar"], v("1.0.0"));
}

#[test]
/// https://github.com/dart-lang/pub/blob/master/doc/solver.md#avoiding-conflict-during-decision-making
fn avoiding_conflict_during_decision_making() {
    init_log();
    let mut source = OfflineSource::new();
    source.add_dependencies(
        "root",
        (1, 0, 0),
        [("foo", c("^1.0.0")), ("bar", c("^1.0.0"))],
    );
    source.add_dependencies("foo", (1, 1, 0), [("bar", c("^2.0.0"))]);
    source.add_dependencies("foo", (1, 0, 0), []);
    source.add_dependencies("bar", (1, 0, 0), []);
    source.add_dependencies("bar", (1, 1, 0), []);
    source.add_dependencies("bar", (2, 0, 0), []);

    let solution = solve(&source, "root", Version::new(1, 0, 0)).unwrap();

    // foo 1.1.0 would force bar ^2.0.0 against the root's bar ^1.0.0,
    // so the solver steps foo back without a full conflict.
    assert_eq!(solution.len(), 3);
    assert_eq!(solution["foo"], v("1.0.0"));
    assert_eq!(solution["bar"], v("1.1.0"));
}

#[test]
/// https://github.com/dart-lang/pub/blob/master/doc/solver.md#performing-conflict-resolution
fn conflict_resolution() {
    init_log();
    let mut source = OfflineSource::new();
    source.add_dependencies("root", (1, 0, 0), [("foo", c(">=1.0.0"))]);
    source.add_dependencies("foo", (2, 0, 0), [("bar", c("^1.0.0"))]);
    source.add_dependencies("foo", (1, 0, 0), []);
    source.add_dependencies("bar", (1, 0, 0), [("foo", c("^1.0.0"))]);

    let solution = solve(&source, "root", Version::new(1, 0, 0)).unwrap();

    assert_eq!(solution.len(), 2);
    assert_eq!(solution["foo"], v("1.0.0"));
    assert!(!solution.contains_key("bar"));
}

#[test]
fn no_version_in_constraint_fails() {
    init_log();
    let mut source = OfflineSource::new();
    source.add_dependencies("root", (1, 0, 0), [("foo", c("^2.0.0"))]);
    source.add_dependencies("foo", (1, 0, 0), []);

    assert!(matches!(
        solve(&source, "root", Version::new(1, 0, 0)),
        Err(SolveError::NoSolution(_))
    ));
}

#[test]
fn unknown_package_fails() {
    init_log();
    let mut source = OfflineSource::new();
    source.add_dependencies("root", (1, 0, 0), [("ghost", c("*"))]);

    assert!(matches!(
        solve(&source, "root", Version::new(1, 0, 0)),
        Err(SolveError::NoSolution(_))
    ));
}

#[test]
fn dependency_cycles_are_fine() {
    init_log();
    let mut source = OfflineSource::new();
    source.add_dependencies("root", (1, 0, 0), [("a", c("^1.0.0"))]);
    source.add_dependencies("a", (1, 0, 0), [("b", c("^1.0.0"))]);
    source.add_dependencies("b", (1, 0, 0), [("a", c("^1.0.0"))]);

    let solution = solve(&source, "root", Version::new(1, 0, 0)).unwrap();

    assert_eq!(solution.len(), 3);
    assert_eq!(solution["a"], v("1.0.0"));
    assert_eq!(solution["b"], v("1.0.0"));
}

#[test]
fn optional_dependency_never_forces_existence() {
    init_log();
    let mut source = OfflineSource::new();
    source.add_dependencies("root", (1, 0, 0), [("a", c("*"))]);
    source.add_dependencies("a", (1, 0, 0), []);
    source.add_optional_dependencies("a", (1, 0, 0), [("b", c("^1.0.0"))]);
    source.add_dependencies("b", (1, 0, 0), []);
    source.add_dependencies("b", (2, 0, 0), []);

    let solution = solve(&source, "root", Version::new(1, 0, 0)).unwrap();

    // b is only mentioned optionally, so it must not be pulled in.
    assert_eq!(solution.len(), 2);
    assert!(!solution.contains_key("b"));
}

#[test]
fn optional_dependency_constrains_once_required() {
    init_log();
    let mut source = OfflineSource::new();
    source.add_dependencies("root", (1, 0, 0), [("a", c("*")), ("b", c("*"))]);
    source.add_dependencies("a", (1, 0, 0), []);
    source.add_optional_dependencies("a", (1, 0, 0), [("b", c("^1.0.0"))]);
    source.add_dependencies("b", (1, 0, 0), []);
    source.add_dependencies("b", (2, 0, 0), []);

    let solution = solve(&source, "root", Version::new(1, 0, 0)).unwrap();

    // b would resolve to 2.0.0 on its own, but a's optional constraint
    // applies as soon as b is required through the root.
    assert_eq!(solution.len(), 3);
    assert_eq!(solution["b"], v("1.0.0"));
}

#[test]
fn optional_dependency_conflict_is_a_real_conflict() {
    init_log();
    let mut source = OfflineSource::new();
    source.add_dependencies("root", (1, 0, 0), [("a", c("*")), ("b", c("^2.0.0"))]);
    source.add_dependencies("a", (1, 0, 0), []);
    source.add_optional_dependencies("a", (1, 0, 0), [("b", c("^1.0.0"))]);
    source.add_dependencies("b", (2, 0, 0), []);

    // No version of a is optional-compatible with the required b ^2.0.0,
    // and a has a single version: unsolvable.
    assert!(matches!(
        solve(&source, "root", Version::new(1, 0, 0)),
        Err(SolveError::NoSolution(_))
    ));
}

#[test]
fn lowest_version_priority_is_honored() {
    init_log();
    let mut source = OfflineSource::new().prefer_lowest_versions();
    source.add_dependencies("root", (1, 0, 0), [("foo", c(">=1.0.0"))]);
    source.add_dependencies("foo", (1, 0, 0), []);
    source.add_dependencies("foo", (1, 5, 0), []);
    source.add_dependencies("foo", (2, 0, 0), []);

    let solution = solve(&source, "root", Version::new(1, 0, 0)).unwrap();

    assert_eq!(solution["foo"], v("1.0.0"));
}

#[test]
fn same_result_on_repeated_runs() {
    init_log();
    let mut source = OfflineSource::new();
    source.add_dependencies("c", (0, 1, 0), []);
    source.add_dependencies("c", (2, 0, 0), []);
    source.add_dependencies("b", (0, 1, 0), []);
    source.add_dependencies("b", (1, 0, 0), [("c", c("<1.0.0"))]);
    source.add_dependencies("a", (0, 1, 0), [("b", c("*")), ("c", c("*"))]);

    let first = solve(&source, "a", Version::new(0, 1, 0)).unwrap();
    for _ in 0..10 {
        assert_eq!(solve(&source, "a", Version::new(0, 1, 0)).unwrap(), first);
    }
}
