//! Builds the lifted and grounded models of a PDDL planning task.
//!
//! The lifted model ([`Domain`], [`Problem`]) comes straight from the PDDL
//! text. The grounded model ([`GroundedProblem`]) is read back from the SAS+
//! file an external translator writes for the task.

pub mod domain;
pub mod error;
pub mod expression;
pub mod grounded;
pub mod pddl;
pub mod problem;
pub mod sas;
pub mod translate;

use std::fs::read_to_string;
use std::path::Path;
use tracing::info;

pub use crate::domain::{ActionSchema, Domain, Function, Predicate};
pub use crate::error::{Error, Result};
pub use crate::expression::{ComparatorType, NumericCondition, NumericExpression, OperatorType};
pub use crate::grounded::{Action, GroundedProblem, Variable};
pub use crate::pddl::{PddlDomain, PddlDomainParser, PddlProblem, PddlProblemParser};
pub use crate::problem::{Atom, Fluent, Problem};
pub use crate::translate::Grounder;

use crate::translate::require_file;

fn read_domain(domain_path: &Path) -> Result<PddlDomain> {
    require_file("domain", domain_path)?;
    PddlDomainParser::parse(read_to_string(domain_path)?.as_str())
}

/// `domain_name` overrides the name declared in the file.
pub fn parse_domain(domain_path: &Path, domain_name: Option<&str>, keep_statics: bool) -> Result<Domain> {
    Domain::from_pddl(&read_domain(domain_path)?, domain_name, keep_statics)
}

pub fn parse_problem(domain_path: &Path, problem_path: &Path, keep_statics: bool) -> Result<Problem> {
    require_file("problem", problem_path)?;
    let domain = read_domain(domain_path)?;
    let problem = PddlProblemParser::parse(read_to_string(problem_path)?.as_str())?;
    Problem::from_pddl(&domain, &problem, keep_statics)
}

/// Grounds the task with `grounder` and reads its output back against the
/// lifted domain. The domain keeps all declared predicates.
pub fn parse_grounded_problem(domain_path: &Path, problem_path: &Path, grounder: &Grounder) -> Result<GroundedProblem> {
    require_file("problem", problem_path)?;
    let domain = parse_domain(domain_path, None, true)?;
    let sas = grounder.translate(domain_path, problem_path)?;
    info!(bytes = sas.len(), "read translator output");
    GroundedProblem::from_sas(&sas, &domain)
}
