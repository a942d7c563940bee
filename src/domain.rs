//! Lifted vocabulary: predicates, functions and action schemas collected
//! from a parsed domain.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use crate::error::{Error, Result};
use crate::pddl::{Effect, PddlDomain};

#[derive(Clone,Debug,PartialEq,Eq,Hash,Serialize)]
pub struct Predicate {
    pub name: String,
    pub arity: usize
}

impl Predicate {
    pub fn new(name: &str, arity: usize) -> Self {
        Predicate {name: name.to_lowercase(), arity}
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

#[derive(Clone,Debug,PartialEq,Eq,Hash,Serialize)]
pub struct Function {
    pub name: String,
    pub arity: usize
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

#[derive(Clone,Debug,PartialEq,Eq,Hash,Serialize)]
pub struct ActionSchema {
    pub name: String,
    pub arity: usize
}

impl fmt::Display for ActionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// With `keep_statics` every declared predicate is kept; otherwise only
/// predicates that some action adds or deletes.
pub fn collect_predicates(domain: &PddlDomain, keep_statics: bool) -> Result<BTreeMap<String,Predicate>> {
    let mut predicates = BTreeMap::new();
    if keep_statics {
        for spec in domain.predicates.values() {
            let predicate = Predicate::new(&spec.name, spec.arity());
            predicates.insert(predicate.name.clone(), predicate);
        }
        return Ok(predicates);
    }
    for action in domain.actions.values() {
        for effect in action.effects.iter() {
            let atom = match effect {
                Effect::Add(atom) | Effect::Del(atom) => atom,
                _ => continue
            };
            let predicate = Predicate::new(atom.get_tag(), atom.num_args());
            match predicates.get(&predicate.name) {
                None => {
                    predicates.insert(predicate.name.clone(), predicate);
                }
                Some(seen) if *seen != predicate => {
                    return Err(Error::Inconsistent(format!("predicate {} used as both {} and {} in action {}",
                                                           predicate.name, seen, predicate, action.name)));
                }
                Some(_) => {}
            }
        }
    }
    Ok(predicates)
}

pub fn collect_functions(domain: &PddlDomain) -> BTreeMap<String,Function> {
    domain.functions.values()
        .map(|spec| (spec.name.clone(), Function {name: spec.name.clone(), arity: spec.arity()}))
        .collect()
}

pub fn collect_action_schemas(domain: &PddlDomain) -> BTreeMap<String,ActionSchema> {
    domain.actions.values()
        .map(|action| (action.name.clone(), ActionSchema {name: action.name.clone(), arity: action.params.len()}))
        .collect()
}

fn sorted_by_rendering<T: fmt::Display>(mut items: Vec<T>) -> Vec<T> {
    items.sort_by_cached_key(|item| item.to_string());
    items
}

#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct Domain {
    pub name: String,
    pub predicates: Vec<Predicate>,
    pub functions: Vec<Function>,
    pub constant_objects: Vec<String>,
    pub action_schemas: Vec<ActionSchema>
}

impl Domain {
    pub fn new(name: String, predicates: Vec<Predicate>, functions: Vec<Function>,
               mut constant_objects: Vec<String>, action_schemas: Vec<ActionSchema>) -> Self {
        constant_objects.sort();
        Domain {
            name,
            predicates: sorted_by_rendering(predicates),
            functions: sorted_by_rendering(functions),
            constant_objects,
            action_schemas: sorted_by_rendering(action_schemas)
        }
    }

    pub fn from_pddl(pddl: &PddlDomain, name: Option<&str>, keep_statics: bool) -> Result<Self> {
        let predicates = collect_predicates(pddl, keep_statics)?;
        let functions = collect_functions(pddl);
        let action_schemas = collect_action_schemas(pddl);
        debug!(domain = %pddl.name, predicates = predicates.len(), functions = functions.len(),
               action_schemas = action_schemas.len(), "collected domain symbols");
        Ok(Domain::new(
            name.map_or_else(|| pddl.name.clone(), str::to_string),
            predicates.into_values().collect(),
            functions.into_values().collect(),
            pddl.constants.symbols().map(str::to_string).collect(),
            action_schemas.into_values().collect()))
    }

    pub fn name_to_predicate(&self) -> HashMap<&str,&Predicate> {
        self.predicates.iter().map(|p| (p.name.as_str(), p)).collect()
    }

    pub fn name_to_function(&self) -> HashMap<&str,&Function> {
        self.functions.iter().map(|f| (f.name.as_str(), f)).collect()
    }

    pub fn name_to_action_schema(&self) -> HashMap<&str,&ActionSchema> {
        self.action_schemas.iter().map(|a| (a.name.as_str(), a)).collect()
    }

    /// Position of each predicate in the sorted predicate list.
    pub fn predicate_to_colour(&self) -> HashMap<String,usize> {
        self.predicates.iter().enumerate().map(|(i, p)| (p.name.clone(), i)).collect()
    }

    pub fn action_schema_to_colour(&self) -> HashMap<String,usize> {
        self.action_schemas.iter().enumerate().map(|(i, a)| (a.name.clone(), i)).collect()
    }

    pub fn max_arity(&self) -> usize {
        self.predicates.iter().map(|p| p.arity).max().unwrap_or(0)
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "predicates": self.predicates,
            "functions": self.functions,
            "constant_objects": self.constant_objects,
            "action_schemas": self.action_schemas,
        })
    }
}

fn joined<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Domain(name={}, predicates=[{}], functions=[{}], constant_objects=[{}], action_schemas=[{}])",
               self.name, joined(&self.predicates), joined(&self.functions),
               self.constant_objects.join(", "), joined(&self.action_schemas))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pddl::PddlDomainParser;

    pub const GRIPPER: &str = "(define (domain gripper-strips)
   (:predicates (room ?r) (ball ?b) (gripper ?g)
                (at-robby ?r) (at ?b ?r) (free ?g) (carry ?o ?g))
   (:action move
       :parameters  (?from ?to)
       :precondition (and  (room ?from) (room ?to) (at-robby ?from))
       :effect (and  (at-robby ?to) (not (at-robby ?from))))
   (:action pick
       :parameters (?obj ?room ?gripper)
       :precondition  (and  (ball ?obj) (room ?room) (gripper ?gripper)
                            (at ?obj ?room) (at-robby ?room) (free ?gripper))
       :effect (and (carry ?obj ?gripper) (not (at ?obj ?room)) (not (free ?gripper))
                    (increase (total-cost) 1)))
   (:action drop
       :parameters  (?obj ?room ?gripper)
       :precondition  (and  (ball ?obj) (room ?room) (gripper ?gripper)
                            (carry ?obj ?gripper) (at-robby ?room))
       :effect (and (at ?obj ?room) (free ?gripper) (not (carry ?obj ?gripper)))))";

    fn gripper() -> PddlDomain {
        PddlDomainParser::parse(GRIPPER).unwrap()
    }

    #[test]
    fn keep_statics_collects_declarations() {
        let domain = Domain::from_pddl(&gripper(), None, true).unwrap();
        assert_eq!(domain.name, "gripper-strips");
        assert_eq!(joined(&domain.predicates), "at-robby/1, at/2, ball/1, carry/2, free/1, gripper/1, room/1");
        assert_eq!(joined(&domain.action_schemas), "drop/3, move/2, pick/3");
        assert_eq!(domain.max_arity(), 2);
    }

    #[test]
    fn derived_predicates_skip_statics_and_numeric_effects() {
        let domain = Domain::from_pddl(&gripper(), None, false).unwrap();
        assert_eq!(joined(&domain.predicates), "at-robby/1, at/2, carry/2, free/1");
    }

    #[test]
    fn derivation_agrees_with_declarations() {
        let declared = collect_predicates(&gripper(), true).unwrap();
        let derived = collect_predicates(&gripper(), false).unwrap();
        assert!(!derived.is_empty());
        for (name, predicate) in derived.iter() {
            assert_eq!(declared.get(name), Some(predicate));
        }
    }

    #[test]
    fn conflicting_effect_arity() {
        let pddl = "(define (domain broken)
  (:predicates (p ?x))
  (:action a :parameters (?x) :effect (p ?x))
  (:action b :parameters (?x ?y) :effect (not (p ?x ?y))))";
        let parsed = PddlDomainParser::parse(pddl).unwrap();
        assert!(matches!(collect_predicates(&parsed, false), Err(Error::Inconsistent(_))));
    }

    #[test]
    fn conflicting_declared_arity() {
        let predicates = "(define (domain broken) (:predicates (p ?x) (p ?x ?y)))";
        assert!(matches!(PddlDomainParser::parse(predicates), Err(Error::Inconsistent(_))));
        let functions = "(define (domain broken) (:predicates (p ?x)) (:functions (f ?x) - number (f)))";
        assert!(matches!(PddlDomainParser::parse(functions), Err(Error::Inconsistent(_))));
        let repeated = "(define (domain fine) (:predicates (p ?x) (p ?y)))";
        let domain = Domain::from_pddl(&PddlDomainParser::parse(repeated).unwrap(), None, true).unwrap();
        assert_eq!(joined(&domain.predicates), "p/1");
    }

    #[test]
    fn ordering_is_by_rendering() {
        let domain = Domain::new("d".to_string(),
                                 vec![Predicate::new("on", 2), Predicate::new("On-Table", 1)],
                                 vec![], vec!["b".to_string(), "a".to_string()], vec![]);
        assert_eq!(joined(&domain.predicates), "on-table/1, on/2");
        assert_eq!(domain.constant_objects, vec!["a", "b"]);
        assert_eq!(domain.predicate_to_colour()["on"], 1);
    }

    #[test]
    fn lookups_by_name() {
        let mut pddl = gripper();
        pddl.functions.insert("capacity".to_string(), crate::pddl::PredicateSpec::from_symbols(&["capacity".to_string(), "?g".to_string()]).unwrap());
        let domain = Domain::from_pddl(&pddl, None, true).unwrap();
        assert_eq!(domain.name_to_predicate()["carry"].arity, 2);
        assert_eq!(domain.name_to_function()["capacity"].to_string(), "capacity/1");
        assert_eq!(domain.name_to_action_schema()["move"].arity, 2);
        assert_eq!(domain.action_schema_to_colour()["pick"], 2);
        assert!(!domain.name_to_predicate().contains_key("total-cost"));
    }

    #[test]
    fn repeated_collection_is_deterministic() {
        let first = Domain::from_pddl(&gripper(), Some("gripper"), true).unwrap();
        let second = Domain::from_pddl(&gripper(), Some("gripper"), true).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_json()["predicates"][1]["name"], "at");
        assert_eq!(first.to_string(), second.to_string());
    }
}
