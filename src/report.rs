// SPDX-License-Identifier: MPL-2.0

//! Build a report as clear as possible as to why
//! dependency solving failed.

use std::cell::RefCell;
use std::sync::Arc;

use crate::catalog::{FACTORY_GAME_PKG, ROOT_PKG};
use crate::constraint::Constraint;
use crate::provider::Provider;
use crate::term::Term;
use crate::type_aliases::Map;
use crate::version::Version;

/// Reporter trait.
pub trait Reporter {
    /// Output type of the report.
    type Output;

    /// Generate a report from the derivation tree
    /// describing the resolution failure.
    fn report(
        derivation_tree: &DerivationTree,
        formatter: &impl ReportFormatter<Output = Self::Output>,
    ) -> Self::Output;
}

/// Derivation tree resulting in the impossibility
/// to solve the dependencies of our root package.
#[derive(Debug, Clone)]
pub enum DerivationTree {
    /// External incompatibility.
    External(External),
    /// Incompatibility derived from two others.
    Derived(Derived),
}

/// Incompatibilities that are not derived from others,
/// they have their own reason.
#[derive(Debug, Clone)]
pub enum External {
    /// Initial incompatibility aiming at picking the root package for the first decision.
    NotRoot(String, Version),
    /// There are no versions in the given constraint for this package.
    NoVersions(String, Constraint),
    /// Incompatibility coming from the dependencies of a given package.
    FromDependencyOf(String, Constraint, String, Constraint),
}

/// Incompatibility derived from two others.
#[derive(Debug, Clone)]
pub struct Derived {
    /// Terms of the incompatibility, in the deterministic order the
    /// solver built them.
    pub terms: Vec<(String, Term)>,
    /// Indicate if that incompatibility is present multiple times
    /// in the derivation tree.
    /// If that is the case, it has a unique id, provided in that option.
    /// Then, we may want to only explain it once,
    /// and refer to the explanation for the other times.
    pub shared_id: Option<usize>,
    /// First cause.
    pub cause1: Arc<DerivationTree>,
    /// Second cause.
    pub cause2: Arc<DerivationTree>,
}

/// Trait for formatting outputs in the reporter.
///
/// Every sentence-producing method receives a `conclusion` flag telling
/// whether the incompatibility being explained is the root failure; the
/// concluding sentence is introduced differently ("So, because …").
pub trait ReportFormatter {
    /// Output type of the report.
    type Output;

    /// Format an [External] incompatibility.
    fn format_external(&self, external: &External) -> Self::Output;

    /// Format terms of an incompatibility.
    fn format_terms(&self, terms: &[(String, Term)]) -> Self::Output;

    /// Simplest case, we just combine two external incompatibilities.
    fn explain_both_external(
        &self,
        external1: &External,
        external2: &External,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> Self::Output;

    /// Both causes have already been explained so we use their refs.
    fn explain_both_ref(
        &self,
        ref_id1: usize,
        derived1: &Derived,
        ref_id2: usize,
        derived2: &Derived,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> Self::Output;

    /// One cause is derived (already explained so one-line),
    /// the other is a one-line external cause,
    /// and finally we conclude with the current incompatibility.
    fn explain_ref_and_external(
        &self,
        ref_id: usize,
        derived: &Derived,
        external: &External,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> Self::Output;

    /// Add an external cause to the chain of explanations.
    fn and_explain_external(
        &self,
        external: &External,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> Self::Output;

    /// Add an already explained incompat to the chain of explanations.
    fn and_explain_ref(
        &self,
        ref_id: usize,
        derived: &Derived,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> Self::Output;

    /// Add an already explained incompat to the chain of explanations.
    fn and_explain_prior_and_external(
        &self,
        prior_external: &External,
        external: &External,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> Self::Output;
}

/// Formatter resolving human-friendly mod names through the [Provider].
///
/// Names and version lists are fetched lazily and cached; any provider
/// failure falls back to the raw package reference, so formatting a
/// report never fails. The game pseudo-package gets its dedicated
/// renderings: `Satisfactory CL<n> is installed` for a game-only
/// incompatibility, and game constraints stripped of the `.0.0` padding
/// the constraint parser inserts on bare build numbers.
pub struct FriendlyReportFormatter<'a, P> {
    provider: &'a P,
    game_version: u32,
    names: RefCell<Map<String, String>>,
    versions: RefCell<Map<String, Arc<Vec<Version>>>>,
}

impl<'a, P: Provider> FriendlyReportFormatter<'a, P> {
    /// Build a formatter for one report.
    pub fn new(provider: &'a P, game_version: u32) -> Self {
        Self {
            provider,
            game_version,
            names: RefCell::new(Map::default()),
            versions: RefCell::new(Map::default()),
        }
    }

    fn package_name(&self, package: &str) -> String {
        if package == FACTORY_GAME_PKG {
            return "Satisfactory".to_string();
        }
        // The synthetic root is never shown with a friendly name.
        if package == ROOT_PKG {
            return package.to_string();
        }
        if let Some(name) = self.names.borrow().get(package) {
            return name.clone();
        }
        match self.provider.get_mod_name(package) {
            Ok(mod_name) => {
                self.names
                    .borrow_mut()
                    .insert(package.to_string(), mod_name.name.clone());
                mod_name.name
            }
            Err(_) => package.to_string(),
        }
    }

    fn full_name(&self, package: &str) -> String {
        let name = self.package_name(package);
        if name == package {
            package.to_string()
        } else {
            format!("{} ({})", name, package)
        }
    }

    fn known_versions(&self, package: &str) -> Arc<Vec<Version>> {
        if let Some(versions) = self.versions.borrow().get(package) {
            return versions.clone();
        }
        let versions = Arc::new(
            self.provider
                .mod_versions_with_dependencies(package)
                .map(|response| {
                    response
                        .iter()
                        .filter_map(|mod_version| Version::parse(&mod_version.version).ok())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
        );
        self.versions
            .borrow_mut()
            .insert(package.to_string(), versions.clone());
        versions
    }

    /// Render a package with its constraint, as in `Refined Power
    /// (RefinedPower) "^3.2.10"`. A constraint matching exactly one
    /// known catalog version renders as that version.
    fn term_string(&self, package: &str, constraint: &Constraint) -> String {
        let full_name = self.full_name(package);
        if constraint.is_any() {
            return format!("every version of {}", full_name);
        }
        if package == ROOT_PKG {
            return format!("{} \"{}\"", full_name, constraint);
        }
        if package == FACTORY_GAME_PKG {
            // Only the major number is ever used for game builds.
            return format!(
                "{} \"{}\"",
                full_name,
                constraint.to_string().replace(".0.0", "")
            );
        }
        let known = self.known_versions(package);
        let mut matched = known.iter().filter(|v| constraint.contains(v));
        if let (Some(version), None) = (matched.next(), matched.next()) {
            return format!("{} \"{}\"", full_name, version);
        }
        format!("{} \"{}\"", full_name, constraint)
    }

    fn because(conclusion: bool) -> &'static str {
        if conclusion {
            "So, because"
        } else {
            "Because"
        }
    }

    fn and_because(conclusion: bool) -> &'static str {
        if conclusion {
            "So, because"
        } else {
            "And because"
        }
    }
}

impl<P: Provider> ReportFormatter for FriendlyReportFormatter<'_, P> {
    type Output = String;

    fn format_external(&self, external: &External) -> String {
        match external {
            External::NotRoot(package, version) => {
                format!("we are solving dependencies of {} {}", package, version)
            }
            External::NoVersions(package, constraint) => {
                if package.as_str() == FACTORY_GAME_PKG {
                    format!("Satisfactory CL{} is installed", self.game_version)
                } else {
                    format!("{} is forbidden", self.term_string(package, constraint))
                }
            }
            External::FromDependencyOf(package, versions, dep_package, dep_constraint) => {
                if package.as_str() == ROOT_PKG {
                    format!("installing {}", self.term_string(dep_package, dep_constraint))
                } else {
                    format!(
                        "{} depends on {}",
                        self.term_string(package, versions),
                        self.term_string(dep_package, dep_constraint)
                    )
                }
            }
        }
    }

    fn format_terms(&self, terms: &[(String, Term)]) -> String {
        match terms {
            [] => "version solving failed".to_string(),
            [(package, _)] if package.as_str() == ROOT_PKG => "version solving failed".to_string(),
            [(package, _)] if package.as_str() == FACTORY_GAME_PKG => {
                format!("Satisfactory CL{} is installed", self.game_version)
            }
            [(package, Term::Positive(constraint))] => {
                format!("{} is forbidden", self.term_string(package, constraint))
            }
            [(package, Term::Negative(constraint))] => {
                format!("installing {}", self.term_string(package, constraint))
            }
            [(p1, Term::Positive(c1)), (p2, Term::Negative(c2))] => self.format_external(
                &External::FromDependencyOf(p1.clone(), c1.clone(), p2.clone(), c2.clone()),
            ),
            [(p1, Term::Negative(c1)), (p2, Term::Positive(c2))] => self.format_external(
                &External::FromDependencyOf(p2.clone(), c2.clone(), p1.clone(), c1.clone()),
            ),
            slice => {
                let str_terms: Vec<_> = slice
                    .iter()
                    .map(|(package, term)| match term {
                        Term::Positive(c) => self.term_string(package, c),
                        Term::Negative(c) => format!("not {}", self.term_string(package, c)),
                    })
                    .collect();
                str_terms.join(", ") + " are incompatible"
            }
        }
    }

    fn explain_both_external(
        &self,
        external1: &External,
        external2: &External,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> String {
        format!(
            "{} {} and {}, {}.",
            Self::because(conclusion),
            self.format_external(external1),
            self.format_external(external2),
            self.format_terms(current_terms)
        )
    }

    fn explain_both_ref(
        &self,
        ref_id1: usize,
        derived1: &Derived,
        ref_id2: usize,
        derived2: &Derived,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> String {
        format!(
            "{} {} ({}) and {} ({}), {}.",
            Self::because(conclusion),
            self.format_terms(&derived1.terms),
            ref_id1,
            self.format_terms(&derived2.terms),
            ref_id2,
            self.format_terms(current_terms)
        )
    }

    fn explain_ref_and_external(
        &self,
        ref_id: usize,
        derived: &Derived,
        external: &External,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> String {
        format!(
            "{} {} ({}) and {}, {}.",
            Self::because(conclusion),
            self.format_terms(&derived.terms),
            ref_id,
            self.format_external(external),
            self.format_terms(current_terms)
        )
    }

    fn and_explain_external(
        &self,
        external: &External,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> String {
        format!(
            "{} {}, {}.",
            Self::and_because(conclusion),
            self.format_external(external),
            self.format_terms(current_terms)
        )
    }

    fn and_explain_ref(
        &self,
        ref_id: usize,
        derived: &Derived,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> String {
        format!(
            "{} {} ({}), {}.",
            Self::and_because(conclusion),
            self.format_terms(&derived.terms),
            ref_id,
            self.format_terms(current_terms)
        )
    }

    fn and_explain_prior_and_external(
        &self,
        prior_external: &External,
        external: &External,
        current_terms: &[(String, Term)],
        conclusion: bool,
    ) -> String {
        format!(
            "{} {} and {}, {}.",
            Self::and_because(conclusion),
            self.format_external(prior_external),
            self.format_external(external),
            self.format_terms(current_terms)
        )
    }
}

/// Default reporter able to generate an explanation as a [String].
pub struct DefaultStringReporter {
    /// Number of explanations already with a line reference.
    ref_count: usize,
    /// Shared nodes that have already been marked with a line reference.
    /// The incompatibility ids are the keys, and the line references are the values.
    shared_with_ref: Map<usize, usize>,
    /// Accumulated lines of the report already generated.
    lines: Vec<String>,
}

impl DefaultStringReporter {
    /// Initialize the reporter.
    fn new() -> Self {
        Self {
            ref_count: 0,
            shared_with_ref: Map::default(),
            lines: Vec::new(),
        }
    }

    fn build_recursive<F: ReportFormatter<Output = String>>(
        &mut self,
        derived: &Derived,
        formatter: &F,
        conclusion: bool,
    ) {
        self.build_recursive_helper(derived, formatter, conclusion);
        if let Some(id) = derived.shared_id {
            if self.shared_with_ref.get(&id).is_none() {
                self.add_line_ref();
                self.shared_with_ref.insert(id, self.ref_count);
            }
        };
    }

    fn build_recursive_helper<F: ReportFormatter<Output = String>>(
        &mut self,
        current: &Derived,
        formatter: &F,
        conclusion: bool,
    ) {
        match (current.cause1.as_ref(), current.cause2.as_ref()) {
            (DerivationTree::External(external1), DerivationTree::External(external2)) => {
                // Simplest case, we just combine two external incompatibilities.
                self.lines.push(formatter.explain_both_external(
                    external1,
                    external2,
                    &current.terms,
                    conclusion,
                ));
            }
            (DerivationTree::Derived(derived), DerivationTree::External(external)) => {
                // One cause is derived, so we explain this first
                // then we add the one-line external part
                // and finally conclude with the current incompatibility.
                self.report_one_each(derived, external, &current.terms, formatter, conclusion);
            }
            (DerivationTree::External(external), DerivationTree::Derived(derived)) => {
                self.report_one_each(derived, external, &current.terms, formatter, conclusion);
            }
            (DerivationTree::Derived(derived1), DerivationTree::Derived(derived2)) => {
                // This is the most complex case since both causes are also derived.
                match (
                    self.line_ref_of(derived1.shared_id),
                    self.line_ref_of(derived2.shared_id),
                ) {
                    // If both causes already have been referenced (shared_id),
                    // the explanation simply uses those references.
                    (Some(ref1), Some(ref2)) => self.lines.push(formatter.explain_both_ref(
                        ref1,
                        derived1,
                        ref2,
                        derived2,
                        &current.terms,
                        conclusion,
                    )),
                    // Otherwise, if one only has a line number reference,
                    // we recursively call the one without reference and then
                    // add the one with reference to conclude.
                    (Some(ref1), None) => {
                        self.build_recursive(derived2, formatter, false);
                        self.lines.push(formatter.and_explain_ref(
                            ref1,
                            derived1,
                            &current.terms,
                            conclusion,
                        ));
                    }
                    (None, Some(ref2)) => {
                        self.build_recursive(derived1, formatter, false);
                        self.lines.push(formatter.and_explain_ref(
                            ref2,
                            derived2,
                            &current.terms,
                            conclusion,
                        ));
                    }
                    // Finally, if no line reference exists yet,
                    // we call recursively the first one and then,
                    //   - if this was a shared node, it will get a line ref
                    //     and we can simply recall this with the current node.
                    //   - otherwise, we add a line reference to it,
                    //     recursively call on the second node,
                    //     and finally conclude.
                    (None, None) => {
                        self.build_recursive(derived1, formatter, false);
                        if derived1.shared_id.is_some() {
                            self.lines.push("".into());
                            self.build_recursive(current, formatter, conclusion);
                        } else {
                            self.add_line_ref();
                            let ref1 = self.ref_count;
                            self.lines.push("".into());
                            self.build_recursive(derived2, formatter, false);
                            self.lines.push(formatter.and_explain_ref(
                                ref1,
                                derived1,
                                &current.terms,
                                conclusion,
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Report a derived and an external incompatibility.
    ///
    /// The result will depend on the fact that the derived incompatibility
    /// has already been explained or not.
    fn report_one_each<F: ReportFormatter<Output = String>>(
        &mut self,
        derived: &Derived,
        external: &External,
        current_terms: &[(String, Term)],
        formatter: &F,
        conclusion: bool,
    ) {
        match self.line_ref_of(derived.shared_id) {
            Some(ref_id) => self.lines.push(formatter.explain_ref_and_external(
                ref_id,
                derived,
                external,
                current_terms,
                conclusion,
            )),
            None => {
                self.report_recurse_one_each(derived, external, current_terms, formatter, conclusion)
            }
        }
    }

    /// Report one derived (without a line ref yet) and one external.
    fn report_recurse_one_each<F: ReportFormatter<Output = String>>(
        &mut self,
        derived: &Derived,
        external: &External,
        current_terms: &[(String, Term)],
        formatter: &F,
        conclusion: bool,
    ) {
        match (derived.cause1.as_ref(), derived.cause2.as_ref()) {
            // If the derived cause has itself one external prior cause,
            // we can chain the external explanations.
            (DerivationTree::Derived(prior_derived), DerivationTree::External(prior_external)) => {
                self.build_recursive(prior_derived, formatter, false);
                self.lines.push(formatter.and_explain_prior_and_external(
                    prior_external,
                    external,
                    current_terms,
                    conclusion,
                ));
            }
            (DerivationTree::External(prior_external), DerivationTree::Derived(prior_derived)) => {
                self.build_recursive(prior_derived, formatter, false);
                self.lines.push(formatter.and_explain_prior_and_external(
                    prior_external,
                    external,
                    current_terms,
                    conclusion,
                ));
            }
            _ => {
                self.build_recursive(derived, formatter, false);
                self.lines
                    .push(formatter.and_explain_external(external, current_terms, conclusion));
            }
        }
    }

    // Helper functions ########################################################

    fn add_line_ref(&mut self) {
        let new_count = self.ref_count + 1;
        self.ref_count = new_count;
        if let Some(line) = self.lines.last_mut() {
            *line = format!("{} ({})", line, new_count);
        }
    }

    fn line_ref_of(&self, shared_id: Option<usize>) -> Option<usize> {
        shared_id.and_then(|id| self.shared_with_ref.get(&id).cloned())
    }
}

impl Reporter for DefaultStringReporter {
    type Output = String;

    fn report(
        derivation_tree: &DerivationTree,
        formatter: &impl ReportFormatter<Output = Self::Output>,
    ) -> Self::Output {
        match derivation_tree {
            DerivationTree::External(external) => formatter.format_external(external),
            DerivationTree::Derived(derived) => {
                let mut reporter = Self::new();
                reporter.build_recursive(derived, formatter, true);
                reporter.lines.join("\n")
            }
        }
    }
}
