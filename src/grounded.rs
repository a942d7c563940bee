use std::collections::BTreeSet;
use std::fmt;
use serde::Serialize;
use tracing::{info, warn};
use crate::domain::{ActionSchema, Domain};
use crate::error::{Error, Result};
use crate::sas::{parse_sas, SasTask};

#[derive(Clone,Debug,PartialEq,Eq,Serialize)]
pub struct Variable {
    pub name: String,
    pub domain_size: usize,
    pub values: Vec<String>
}

/// A grounded operator. A variable may occur in both sets with different
/// values: the precondition is the value before, the effect the value after.
#[derive(Clone,Debug,PartialEq,Eq,Serialize)]
pub struct Action {
    pub schema: ActionSchema,
    pub arguments: Vec<String>,
    pub preconditions: BTreeSet<(usize,usize)>,
    pub effects: BTreeSet<(usize,usize)>,
    pub cost: Option<i64>
}

impl Action {
    pub fn precondition_indexes(&self) -> BTreeSet<usize> {
        self.preconditions.iter().map(|(var, _)| *var).collect()
    }

    pub fn effect_indexes(&self) -> BTreeSet<usize> {
        self.effects.iter().map(|(var, _)| *var).collect()
    }
}

fn pairs(set: &BTreeSet<(usize,usize)>, arrow: &str) -> String {
    set.iter().map(|(var, value)| format!("{}{}{}", var, arrow, value)).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(precond=[{}], effects=[{}])", self.schema, pairs(&self.preconditions, "<-"), pairs(&self.effects, "->"))
    }
}

#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct GroundedProblem {
    pub domain: Domain,
    pub variables: Vec<Variable>,
    pub initial_state: Vec<usize>,
    pub goals: Vec<(usize,usize)>,
    pub actions: Vec<Action>
}

impl GroundedProblem {
    pub fn from_sas(text: &str, domain: &Domain) -> Result<Self> {
        reconstruct(parse_sas(text)?, domain)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn variable_domain_sizes(&self) -> Vec<usize> {
        self.variables.iter().map(|v| v.domain_size).collect()
    }
}

impl fmt::Display for GroundedProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "domain={}", self.domain)?;
        let variables = self.variables.iter().map(|v| format!("{}/{}", v.name, v.domain_size)).collect::<Vec<_>>();
        writeln!(f, "variables=[{}]", variables.join(", "))?;
        let goals = self.goals.iter()
            .map(|(var, value)| match self.variables.get(*var) {
                Some(v) => format!("({}, {})", v.name, value),
                None => format!("({}, {})", var, value)
            })
            .collect::<Vec<_>>();
        writeln!(f, "goals=[{}]", goals.join(", "))?;
        let actions = self.actions.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        writeln!(f, "actions=[{}]", actions.join(", "))
    }
}

/// Ties each parsed operator to the lifted action schema it instantiates.
pub fn reconstruct(task: SasTask, domain: &Domain) -> Result<GroundedProblem> {
    let schemas = domain.name_to_action_schema();
    let mut actions = Vec::with_capacity(task.operators.len());
    for op in task.operators {
        let schema = match schemas.get(op.name.as_str()) {
            None => return Err(Error::UnknownSchema(op.name)),
            Some(schema) => *schema
        };
        if op.arguments.len() != schema.arity {
            warn!(operator = %op.name, line = op.line, arguments = op.arguments.len(), arity = schema.arity,
                  "operator argument count differs from schema arity");
        }
        actions.push(Action {
            schema: schema.clone(),
            arguments: op.arguments,
            preconditions: op.preconditions,
            effects: op.effects,
            cost: op.cost
        });
    }
    let variables = task.variables.into_iter()
        .map(|v| Variable {name: v.name, domain_size: v.domain_size, values: v.values})
        .collect::<Vec<_>>();
    info!(domain = %domain.name, variables = variables.len(), goals = task.goal.len(), actions = actions.len(),
          "built grounded problem");
    Ok(GroundedProblem {domain: domain.clone(), variables, initial_state: task.initial_state, goals: task.goal, actions})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pddl::PddlDomainParser;
    use crate::sas::tests::BLOCKS_SAS;

    const BLOCKS: &str = "(define (domain blocks)
  (:predicates (on ?x ?y) (ontable ?x) (clear ?x) (handempty) (holding ?x))
  (:action pick-up :parameters (?x)
     :precondition (and (clear ?x) (ontable ?x) (handempty))
     :effect (and (not (ontable ?x)) (not (clear ?x)) (not (handempty)) (holding ?x)))
  (:action stack :parameters (?x ?y)
     :precondition (and (holding ?x) (clear ?y))
     :effect (and (not (holding ?x)) (not (clear ?y)) (clear ?x) (handempty) (on ?x ?y))))";

    fn blocks() -> Domain {
        Domain::from_pddl(&PddlDomainParser::parse(BLOCKS).unwrap(), None, true).unwrap()
    }

    #[test]
    fn reconstructs_actions() {
        let grounded = GroundedProblem::from_sas(BLOCKS_SAS, &blocks()).unwrap();
        assert_eq!(grounded.variable_names(), vec!["var0", "var1", "var2"]);
        assert_eq!(grounded.variable_domain_sizes(), vec![2, 2, 3]);
        assert_eq!(grounded.goals, vec![(2, 1)]);
        assert_eq!(grounded.initial_state, vec![0, 0, 2]);
        assert_eq!(grounded.actions[0].to_string(), "pick-up/1(precond=[0<-0, 1<-0, 2<-2], effects=[0->1, 1->1, 2->0])");
        assert_eq!(grounded.actions[1].to_string(), "stack/2(precond=[1<-1, 2<-0], effects=[0->0, 2->1])");
        assert_eq!(grounded.actions[1].arguments, vec!["a", "b"]);
        assert_eq!(grounded.actions[1].precondition_indexes(), BTreeSet::from([1, 2]));
        assert_eq!(grounded.actions[1].effect_indexes(), BTreeSet::from([0, 2]));
    }

    #[test]
    fn dump_format() {
        let grounded = GroundedProblem::from_sas(BLOCKS_SAS, &blocks()).unwrap();
        let dump = grounded.to_string();
        let lines = dump.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("domain=Domain(name=blocks"));
        assert_eq!(lines[1], "variables=[var0/2, var1/2, var2/3]");
        assert_eq!(lines[2], "goals=[(var2, 1)]");
        assert!(lines[3].starts_with("actions=[pick-up/1(precond="));
    }

    #[test]
    fn dump_with_unknown_goal_variable() {
        let mut grounded = GroundedProblem::from_sas(BLOCKS_SAS, &blocks()).unwrap();
        grounded.goals.push((7, 0));
        assert!(grounded.to_string().contains("goals=[(var2, 1), (7, 0)]"));
    }

    #[test]
    fn unknown_schema() {
        let text = BLOCKS_SAS.replace("stack a b", "unstack a b");
        match GroundedProblem::from_sas(&text, &blocks()) {
            Err(Error::UnknownSchema(name)) => assert_eq!(name, "unstack"),
            other => panic!("unexpected {:?}", other)
        }
    }

    #[test]
    fn serializes_to_json() {
        let grounded = GroundedProblem::from_sas(BLOCKS_SAS, &blocks()).unwrap();
        let json = serde_json::to_value(&grounded).unwrap();
        assert_eq!(json["variables"][2]["domain_size"], 3);
        assert_eq!(json["actions"][0]["schema"]["name"], "pick-up");
        assert_eq!(json["goals"][0], serde_json::json!([2, 1]));
    }
}
