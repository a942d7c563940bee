//! Lifted problem: objects, fluents with their initial values, and goals
//! partitioned into positive atoms, negative atoms and numeric conditions.

use std::collections::BTreeMap;
use std::fmt;
use serde::Serialize;
use tracing::info;
use crate::domain::{collect_functions, collect_predicates, Domain, Function, Predicate};
use crate::error::{Error, Result};
use crate::expression::{fluent_label, translate_expression, ComparatorType, FluentTable, NumericCondition};
use crate::pddl::{Application, ArithOp, Comparison, Condition, Expr, PddlDomain, PddlProblem};

#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct Fluent {
    pub function: Function,
    pub objects: Vec<String>
}

impl Fluent {
    pub fn label(&self) -> String {
        fluent_label(&self.function.name, &self.objects)
    }
}

impl fmt::Display for Fluent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Clone,Debug,PartialEq,Eq,Hash,Serialize)]
pub struct Atom {
    pub predicate: Predicate,
    pub objects: Vec<String>
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.predicate.name, self.objects.join(", "))
    }
}

#[derive(Clone,Debug,Default,PartialEq,Serialize)]
pub struct Goals {
    pub positive: Vec<Atom>,
    pub negative: Vec<Atom>,
    pub numeric: Vec<NumericCondition>
}

/// Lookup tables every goal normalization step reads from.
pub struct GoalContext<'a> {
    pub predicates: &'a BTreeMap<String,Predicate>,
    pub fluents: &'a FluentTable
}

impl GoalContext<'_> {
    fn atom(&self, app: &Application) -> Result<Atom> {
        let predicate = match self.predicates.get(app.get_tag()) {
            None => return Err(Error::Inconsistent(format!("{} uses an unknown predicate", app))),
            Some(p) => p
        };
        if predicate.arity != app.num_args() {
            return Err(Error::Inconsistent(format!("{} does not match predicate {}", app, predicate)));
        }
        Ok(Atom {predicate: predicate.clone(), objects: app.args().to_vec()})
    }
}

/// Rewrites `lhs cmp rhs` into `expression cmp' 0` with `cmp'` one of `=`, `>`, `>=`.
pub fn normalize_comparison(cmp: Comparison, lhs: &Expr, rhs: &Expr, fluents: &FluentTable) -> Result<NumericCondition> {
    let (comparator, a, b) = match cmp {
        Comparison::Eq => (ComparatorType::Equal, lhs, rhs),
        Comparison::Lt => (ComparatorType::GreaterThan, rhs, lhs),
        Comparison::Le => (ComparatorType::GreaterEqualThan, rhs, lhs),
        Comparison::Gt => (ComparatorType::GreaterThan, lhs, rhs),
        Comparison::Ge => (ComparatorType::GreaterEqualThan, lhs, rhs)
    };
    let difference = Expr::Binary(ArithOp::Minus, Box::new(a.clone()), Box::new(b.clone()));
    Ok(NumericCondition {comparator, expression: translate_expression(&difference, fluents)?})
}

fn normalize_operand(goal: &Condition, ctx: &GoalContext, goals: &mut Goals) -> Result<()> {
    match goal {
        Condition::Atom(app) => goals.positive.push(ctx.atom(app)?),
        Condition::Not(inner) => match inner.as_ref() {
            Condition::Atom(app) => goals.negative.push(ctx.atom(app)?),
            other => return Err(Error::UnknownGoal(format!("Not({:?})", other)))
        },
        Condition::Compare(cmp, lhs, rhs) => goals.numeric.push(normalize_comparison(*cmp, lhs, rhs, ctx.fluents)?),
        other => return Err(Error::UnknownGoal(format!("{:?}", other)))
    }
    Ok(())
}

/// A top-level conjunction is split into its operands; anything else is a
/// single goal.
pub fn normalize_goal(goal: &Condition, ctx: &GoalContext) -> Result<Goals> {
    let operands = match goal {
        Condition::And(operands) => operands.as_slice(),
        other => std::slice::from_ref(other)
    };
    let mut goals = Goals::default();
    for operand in operands.iter() {
        normalize_operand(operand, ctx, &mut goals)?;
    }
    Ok(goals)
}

#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct Problem {
    pub domain: Domain,
    pub objects: Vec<String>,
    pub statics: Vec<Atom>,
    pub fluents: Vec<Fluent>,
    pub fluent_values: Vec<f64>,
    pub positive_goals: Vec<Atom>,
    pub negative_goals: Vec<Atom>,
    pub numeric_goals: Vec<NumericCondition>
}

impl Problem {
    pub fn from_pddl(domain: &PddlDomain, problem: &PddlProblem, keep_statics: bool) -> Result<Self> {
        let lifted = Domain::from_pddl(domain, None, keep_statics)?;
        let predicates = collect_predicates(domain, keep_statics)?;
        let functions = collect_functions(domain);

        let mut objects = problem.objects.symbols().map(str::to_string).collect::<Vec<_>>();
        objects.sort();

        // numeric_state iterates in sorted order, so ids do not depend on file layout
        let mut table = FluentTable::new();
        let mut fluents = Vec::new();
        let mut fluent_values = Vec::new();
        for (app, value) in problem.numeric_state.iter() {
            let function = match functions.get(app.get_tag()) {
                None => return Err(Error::Inconsistent(format!("{} initializes an undeclared function", app))),
                Some(f) => f
            };
            if function.arity != app.num_args() {
                return Err(Error::Inconsistent(format!("{} does not match function {}", app, function)));
            }
            let fluent = Fluent {function: function.clone(), objects: app.args().to_vec()};
            table.register(fluent.label());
            fluents.push(fluent);
            fluent_values.push(*value);
        }

        let ctx = GoalContext {predicates: &predicates, fluents: &table};
        let statics = if keep_statics {
            let modified = collect_predicates(domain, false)?;
            problem.bool_state.iter()
                .filter(|app| predicates.contains_key(app.get_tag()) && !modified.contains_key(app.get_tag()))
                .map(|app| ctx.atom(app))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let goals = normalize_goal(&problem.goal, &ctx)?;
        info!(problem = %problem.name, objects = objects.len(), fluents = fluents.len(),
              positive = goals.positive.len(), negative = goals.negative.len(), numeric = goals.numeric.len(),
              "built lifted problem");
        Ok(Problem {
            domain: lifted, objects, statics, fluents, fluent_values,
            positive_goals: goals.positive, negative_goals: goals.negative, numeric_goals: goals.numeric
        })
    }
}
