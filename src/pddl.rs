//! PDDL front-end: reads domain and problem text into the AST the lifted
//! model is built from. Shape-checking only; no semantic validation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use sexpr_parser::{Parser, SexprTree};
use sexpr_parser::SexprTree::{Sym, Sub};
use crate::error::{Error, Result};

pub const UNTYPED: &str = "untyped";

fn syntax<T>(msg: String) -> Result<T> {
    Err(Error::Syntax(msg))
}

/// A symbol applied to arguments, e.g. `(on a b)` or `(fuel ?s)`.
#[derive(Clone,Debug,Ord,PartialOrd,PartialEq,Eq)]
pub struct Application {
    elements: Vec<String>
}

impl Application {
    pub fn new(tag: String) -> Self {
        Application { elements: vec![tag]}
    }

    pub fn add_arg(&mut self, arg: String) {
        self.elements.push(arg);
    }

    pub fn get_tag(&self) -> &str {
        self.elements[0].as_str()
    }

    pub fn num_args(&self) -> usize {
        self.elements.len() - 1
    }

    pub fn args(&self) -> &[String] {
        &self.elements[1..]
    }

    pub fn from_symbols(symbols: &[String]) -> Result<Self> {
        match symbols.split_first() {
            None => syntax(format!("Empty application")),
            Some((tag, args)) => {
                let mut result = Application::new(tag.clone());
                args.iter().for_each(|a| result.add_arg(a.clone()));
                Ok(result)
            }
        }
    }

    pub fn from_tree(tree: &SexprTree) -> Result<Self> {
        match tree {
            Sym(s) => syntax(format!("{}: expected a parenthesized application", s)),
            Sub(v) => {
                let mut symbols = Vec::with_capacity(v.len());
                for t in v.iter() {
                    match t {
                        Sym(s) => symbols.push(s.clone()),
                        Sub(_) => return syntax(format!("Nested list inside application {:?}", tree.flatten()))
                    }
                }
                Application::from_symbols(&symbols)
            }
        }
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.elements.join(" "))
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum ArithOp {
    Plus,
    Minus,
    Times,
    Divide
}

impl ArithOp {
    fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "+" => Some(ArithOp::Plus),
            "-" => Some(ArithOp::Minus),
            "*" => Some(ArithOp::Times),
            "/" => Some(ArithOp::Divide),
            _ => None
        }
    }
}

#[derive(Clone,Debug,PartialEq)]
pub enum Expr {
    Fluent(Application),
    Number(f64),
    Binary(ArithOp, Box<Expr>, Box<Expr>)
}

impl Expr {
    pub fn from(tree: &SexprTree) -> Result<Self> {
        match tree {
            Sym(s) => match number(s) {
                Some(n) => Ok(Expr::Number(n)),
                None => syntax(format!("{}: not a number or function application", s))
            },
            Sub(v) => match v.first() {
                Some(Sym(head)) => match ArithOp::from_symbol(head) {
                    None => Ok(Expr::Fluent(Application::from_tree(tree)?)),
                    Some(op) if v.len() == 3 =>
                        Ok(Expr::Binary(op, Box::new(Expr::from(&v[1])?), Box::new(Expr::from(&v[2])?))),
                    Some(_) => syntax(format!("Operator {} expects exactly two operands", head))
                },
                _ => syntax(format!("Malformed numeric expression: {:?}", tree.flatten()))
            }
        }
    }
}

/// Finite numeric literal; `inf` and `nan` stay object names.
fn number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Le,
    Gt,
    Ge
}

#[derive(Clone,Debug,PartialEq)]
pub enum Condition {
    Atom(Application),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Imply(Box<Condition>, Box<Condition>),
    Exists(ParamSpec, Box<Condition>),
    Forall(ParamSpec, Box<Condition>),
    Compare(Comparison, Expr, Expr),
    /// Object (in)equality such as `(= ?x ?y)`.
    Equality(String, String)
}

impl Condition {
    pub fn from(tree: &SexprTree) -> Result<Self> {
        decode_compound_subtree(tree, |s, v, a, b| Ok(match s {
            "and" => Condition::And(operands(v)?.iter().map(Condition::from).collect::<Result<_>>()?),
            "or" => Condition::Or(operands(v)?.iter().map(Condition::from).collect::<Result<_>>()?),
            "not" => Condition::Not(Box::new(Condition::from(required(a, s)?)?)),
            "imply" => Condition::Imply(Box::new(Condition::from(required(a, s)?)?),
                                        Box::new(Condition::from(required(b, s)?)?)),
            "exists" => Condition::Exists(ParamSpec::new(&required(a, s)?.flatten())?,
                                          Box::new(Condition::from(required(b, s)?)?)),
            "forall" => Condition::Forall(ParamSpec::new(&required(a, s)?.flatten())?,
                                          Box::new(Condition::from(required(b, s)?)?)),
            "=" => equality(required(a, s)?, required(b, s)?)?,
            "<" => compare(Comparison::Lt, a, b, s)?,
            "<=" => compare(Comparison::Le, a, b, s)?,
            ">" => compare(Comparison::Gt, a, b, s)?,
            ">=" => compare(Comparison::Ge, a, b, s)?,
            _ => Condition::Atom(Application::from_tree(v)?)
        }))
    }
}

fn is_object_symbol(tree: &SexprTree) -> bool {
    match tree {
        Sym(s) => number(s).is_none(),
        Sub(_) => false
    }
}

fn equality(a: &SexprTree, b: &SexprTree) -> Result<Condition> {
    match (a, b) {
        (Sym(x), Sym(y)) if is_object_symbol(a) || is_object_symbol(b) => Ok(Condition::Equality(x.clone(), y.clone())),
        _ if is_object_symbol(a) || is_object_symbol(b) =>
            syntax(format!("Cannot compare object {:?} with {:?}", a.flatten(), b.flatten())),
        _ => Ok(Condition::Compare(Comparison::Eq, Expr::from(a)?, Expr::from(b)?))
    }
}

fn compare(cmp: Comparison, a: Option<&SexprTree>, b: Option<&SexprTree>, tag: &str) -> Result<Condition> {
    Ok(Condition::Compare(cmp, Expr::from(required(a, tag)?)?, Expr::from(required(b, tag)?)?))
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Assignment {
    Assign,
    Increase,
    Decrease,
    ScaleUp,
    ScaleDown
}

#[derive(Clone,Debug,PartialEq)]
pub enum Effect {
    Add(Application),
    Del(Application),
    Numeric(Assignment, Application, Expr),
    When(Condition, Vec<Effect>),
    Forall(ParamSpec, Vec<Effect>)
}

impl Effect {
    pub fn from(tree: &SexprTree) -> Result<Self> {
        decode_compound_subtree(tree, |s, v, a, b| Ok(match s {
            "not" => Effect::Del(Application::from_tree(required(a, s)?)?),
            "assign" => numeric(Assignment::Assign, a, b, s)?,
            "increase" => numeric(Assignment::Increase, a, b, s)?,
            "decrease" => numeric(Assignment::Decrease, a, b, s)?,
            "scale-up" => numeric(Assignment::ScaleUp, a, b, s)?,
            "scale-down" => numeric(Assignment::ScaleDown, a, b, s)?,
            "when" => Effect::When(Condition::from(required(a, s)?)?, compound_parse(required(b, s)?, Effect::from, "effect")?),
            "forall" => Effect::Forall(ParamSpec::new(&required(a, s)?.flatten())?,
                                       compound_parse(required(b, s)?, Effect::from, "effect")?),
            _ => Effect::Add(Application::from_tree(v)?)
        }))
    }
}

fn numeric(op: Assignment, a: Option<&SexprTree>, b: Option<&SexprTree>, tag: &str) -> Result<Effect> {
    Ok(Effect::Numeric(op, Application::from_tree(required(a, tag)?)?, Expr::from(required(b, tag)?)?))
}

fn required<'a>(tree: Option<&'a SexprTree>, tag: &str) -> Result<&'a SexprTree> {
    match tree {
        None => syntax(format!("\"{}\" is missing an operand", tag)),
        Some(t) => Ok(t)
    }
}

fn operands(tree: &SexprTree) -> Result<&[SexprTree]> {
    match tree {
        Sym(s) => syntax(format!("{}: expected a list", s)),
        Sub(v) => Ok(if v.is_empty() {&v[..]} else {&v[1..]})
    }
}

fn decode_compound_subtree<T,F:Fn(&str,&SexprTree,Option<&SexprTree>,Option<&SexprTree>)->Result<T>>(tree: &SexprTree, parser: F) -> Result<T> {
    match tree {
        Sym(s) => syntax(format!("{}: Not a formula", s)),
        Sub(v) => match v.get(0) {
            None => syntax(format!("No content to formula")),
            Some(st) => match st {
                Sym(s) => parser(s.as_str(), tree, v.get(1), v.get(2)),
                Sub(_) => syntax(format!("Formula starts with a list"))
            }
        }
    }
}

/// Flattens a top-level `and`; `()` yields no items.
fn compound_parse<T,F:Fn(&SexprTree)->Result<T>>(tree: &SexprTree, parser: F, tag: &str) -> Result<Vec<T>> {
    match tree {
        Sym(s) => syntax(format!("{}: Not a {}", s, tag)),
        Sub(v) => match v.get(0) {
            None => Ok(Vec::new()),
            Some(s) if s.is("and") => v[1..].iter().map(|t| parser(t)).collect(),
            Some(_) => Ok(vec![parser(tree)?])
        }
    }
}

/// Ordered typed list, e.g. `?a ?b - block ?c`.
#[derive(Clone,Debug,Default,PartialEq)]
pub struct ParamSpec {
    symbol2type: Vec<(String,String)>
}

impl ParamSpec {
    pub fn new(params: &[String]) -> Result<Self> {
        let mut symbols = Vec::new();
        let mut types = Vec::new();
        let mut i = 0;
        while i < params.len() {
            let param = params[i].clone();
            if param == "-" {
                return syntax(format!("Error parsing typed list: \"-\" without a preceding name"));
            }
            let mut had_type = false;
            if let Some(next) = params.get(i+1) {
                if next == "-" {
                    match params.get(i+2) {
                        None => return syntax(format!("Error parsing typed list: \"-\" not followed by a type")),
                        Some(param_type) => {
                            types.push(param_type.clone());
                            i += 2;
                            had_type = true;
                        }
                    }
                }
            }
            symbols.push(param);
            i += 1;
            if !had_type {
                types.push(String::from(UNTYPED));
            }
        }
        Ok(ParamSpec {symbol2type: symbols.into_iter().zip(resolve_duplicate_types(types)).collect()})
    }

    pub fn len(&self) -> usize {
        self.symbol2type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbol2type.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item=&str> {
        self.symbol2type.iter().map(|(s, _)| s.as_str())
    }

    pub fn type_of(&self, symbol: &str) -> Option<&str> {
        self.symbol2type.iter().find(|(s, _)| s == symbol).map(|(_, t)| t.as_str())
    }
}

// An untyped entry takes the type of the next typed entry to its right.
fn resolve_duplicate_types(mut types: Vec<String>) -> Vec<String> {
    let mut trailing_type = String::from(UNTYPED);
    for t in types.iter_mut().rev() {
        if t.as_str() == UNTYPED {
            *t = trailing_type.clone();
        } else {
            trailing_type = t.clone();
        }
    }
    types
}

#[derive(Clone,Debug,PartialEq)]
pub struct PredicateSpec {
    pub name: String,
    pub params: ParamSpec
}

impl PredicateSpec {
    pub fn from_symbols(symbols: &[String]) -> Result<Self> {
        match symbols.split_first() {
            None => syntax(format!("Empty predicate declaration")),
            Some((name, params)) => Ok(PredicateSpec {name: name.clone(), params: ParamSpec::new(params)?})
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Clone,Debug,PartialEq)]
pub struct ActionSpec {
    pub name: String,
    pub params: ParamSpec,
    pub preconditions: Vec<Condition>,
    pub effects: Vec<Effect>
}

#[derive(Clone,Debug,Default)]
pub struct PddlDomain {
    pub name: String,
    pub types: BTreeSet<String>,
    pub constants: ParamSpec,
    pub predicates: BTreeMap<String,PredicateSpec>,
    pub functions: BTreeMap<String,PredicateSpec>,
    pub actions: BTreeMap<String,ActionSpec>
}

#[derive(Clone,Debug,PartialEq)]
pub enum Metric {
    Minimize(Expr),
    Maximize(Expr)
}

#[derive(Clone,Debug)]
pub struct PddlProblem {
    pub name: String,
    pub domain: String,
    pub objects: ParamSpec,
    pub bool_state: BTreeSet<Application>,
    pub numeric_state: BTreeMap<Application,f64>,
    pub goal: Condition,
    pub metric: Option<Metric>
}

/// Drops `;` comments, which the s-expression reader does not understand.
pub fn strip_comments(pddl: &str) -> String {
    pddl.lines()
        .map(|line| line.split(';').next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

fn section_items<'a>(tree: &'a SexprTree, tag: &str) -> Result<&'a [SexprTree]> {
    match tree {
        Sym(s) => syntax(format!("{}: expected a {} section", s, tag)),
        Sub(v) => {
            check(v, 0, tag)?;
            Ok(&v[1..])
        }
    }
}

fn check(parsed: &[SexprTree], i: usize, target: &str) -> Result<()> {
    match parsed.get(i).unwrap_or(&SexprTree::sym("")) {
        Sub(_) => syntax(format!("Expected symbol \"{}\", received a list", target)),
        Sym(parsed) => {
            if parsed.as_str() == target {
                Ok(())
            } else {
                syntax(format!("Symbol \"{}\" does not match expected symbol \"{}\"", parsed, target))
            }
        }
    }
}

fn named_section(tree: &SexprTree, tag: &str) -> Result<String> {
    match section_items(tree, tag)?.first() {
        Some(Sym(name)) => Ok(name.clone()),
        _ => syntax(format!("Incorrect {} naming", tag))
    }
}

fn typed_list(tree: &SexprTree, tag: &str) -> Result<ParamSpec> {
    let mut symbols = Vec::new();
    for item in section_items(tree, tag)?.iter() {
        match item {
            Sym(s) => symbols.push(s.clone()),
            Sub(_) => return syntax(format!("Unexpected list in {}: {:?}", tag, item.flatten()))
        }
    }
    ParamSpec::new(&symbols)
}

fn process_pred_list(tag: &str, symbols: &SexprTree, storage: &mut BTreeMap<String,PredicateSpec>) -> Result<()> {
    let items = section_items(symbols, tag)?;
    let mut i = 0;
    while i < items.len() {
        match &items[i] {
            // `- number` after a function declaration
            Sym(s) if s == "-" => i += 1,
            Sym(s) => return syntax(format!("{}: unexpected symbol in {}", s, tag)),
            Sub(_) => {
                let pred_spec = PredicateSpec::from_symbols(&items[i].flatten())?;
                if let Some(seen) = storage.get(&pred_spec.name) {
                    if seen.arity() != pred_spec.arity() {
                        return Err(Error::Inconsistent(format!("{} {} declared with arity {} and {}",
                                                               tag, pred_spec.name, seen.arity(), pred_spec.arity())));
                    }
                }
                storage.insert(pred_spec.name.clone(), pred_spec);
            }
        }
        i += 1;
    }
    Ok(())
}

pub struct PddlDomainParser {
    domain: PddlDomain
}

impl PddlDomainParser {
    pub fn parse(pddl: &str) -> Result<PddlDomain> {
        let mut parser = PddlDomainParser { domain: PddlDomain::default() };
        parser.define(&Parser::build_parse_tree(strip_comments(pddl).as_str())?)?;
        Ok(parser.domain)
    }

    fn define(&mut self, tree: &SexprTree) -> Result<()> {
        match tree {
            Sub(syms)=> {
                check(syms, 0, "define")?;
                for i in 1..syms.len() {
                    match syms[i].head() {
                        None => {},
                        Some(tag) => match tag.as_str() {
                            ":requirements" => {},
                            ":types" => {
                                for t in typed_list(&syms[i], ":types")?.symbols() {
                                    self.domain.types.insert(t.to_string());
                                }
                            },
                            ":constants" => self.domain.constants = typed_list(&syms[i], ":constants")?,
                            ":predicates" => process_pred_list(":predicates", &syms[i], &mut self.domain.predicates)?,
                            ":functions" => process_pred_list(":functions", &syms[i], &mut self.domain.functions)?,
                            ":action" => self.process_action(&syms[i])?,
                            "domain" => self.domain.name = named_section(&syms[i], "domain")?,
                            _ => return syntax(format!("Unrecognized tag: \"{}\"; i: {}", tag, i))
                        }
                    }
                }
            },
            Sym(sym)=> {
                return syntax(format!("\"{}\": No domain details defined.", sym))
            }
        }
        Ok(())
    }

    fn process_action(&mut self, symbols: &SexprTree) -> Result<()> {
        let name;
        let mut params = ParamSpec::default();
        let mut preconditions = Vec::new();
        let mut effects = Vec::new();
        match symbols {
            Sym(_) => return syntax(format!("Not a proper :action specification")),
            Sub(v) => {
                check(v, 0, ":action")?;
                match v.get(1) {
                    Some(Sym(s)) => name = s.clone(),
                    _ => return syntax(format!("Action has no name"))
                };
                for i in (2..v.len()).step_by(2) {
                    let value = match v.get(i+1) {
                        None => return syntax(format!("Action {}: tag {:?} has no value", name, v[i].flatten())),
                        Some(value) => value
                    };
                    match &v[i] {
                        Sub(_) => return syntax(format!("No tag: {:?}", v[i].flatten())),
                        Sym(s) => match s.as_str() {
                            ":parameters" => params = ParamSpec::new(&value.flatten())?,
                            ":precondition" => preconditions = compound_parse(value, Condition::from, "precondition")?,
                            ":effect" => effects = compound_parse(value, Effect::from, "effect")?,
                            _ => return syntax(format!("Unrecognized tag: {}; i: {}", s, i))
                        }
                    }
                }
            }
        }
        let action = ActionSpec {name, params, preconditions, effects};
        self.domain.actions.insert(action.name.clone(), action);
        Ok(())
    }
}

pub struct PddlProblemParser {
    name: String,
    domain: String,
    objects: ParamSpec,
    bool_state: BTreeSet<Application>,
    numeric_state: BTreeMap<Application,f64>,
    goal: Option<Condition>,
    metric: Option<Metric>
}

impl PddlProblemParser {
    pub fn parse(pddl: &str) -> Result<PddlProblem> {
        let mut parser = PddlProblemParser {
            name: String::new(), domain: String::new(), objects: ParamSpec::default(),
            bool_state: BTreeSet::new(), numeric_state: BTreeMap::new(), goal: None, metric: None };
        parser.define(&Parser::build_parse_tree(strip_comments(pddl).as_str())?)?;
        match parser.goal {
            None => syntax(format!("Problem {} has no :goal", parser.name)),
            Some(goal) => Ok(PddlProblem {
                name: parser.name, domain: parser.domain, objects: parser.objects,
                bool_state: parser.bool_state, numeric_state: parser.numeric_state,
                goal, metric: parser.metric })
        }
    }

    fn define(&mut self, tree: &SexprTree) -> Result<()> {
        match tree {
            Sym(sym) => syntax(format!("\"{}\": No problem details defined.", sym)),
            Sub(syms) => {
                check(syms, 0, "define")?;
                for item in syms[1..].iter() {
                    match item.head() {
                        None => {},
                        Some(tag) => match tag.as_str() {
                            "problem" => self.name = named_section(item, "problem")?,
                            ":domain" => self.domain = named_section(item, ":domain")?,
                            ":requirements" => {},
                            ":objects" => self.objects = typed_list(item, ":objects")?,
                            ":init" => self.init(section_items(item, ":init")?)?,
                            ":goal" => match section_items(item, ":goal")?.first() {
                                None => return syntax(format!("Empty :goal")),
                                Some(g) => self.goal = Some(Condition::from(g)?)
                            },
                            ":metric" => self.metric(section_items(item, ":metric")?)?,
                            _ => return syntax(format!("Unrecognized tag: \"{}\"", tag))
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn init(&mut self, facts: &[SexprTree]) -> Result<()> {
        for fact in facts.iter() {
            match fact {
                Sub(v) if v.first().map_or(false, |h| h.is("=")) => {
                    let key = Application::from_tree(required(v.get(1), "=")?)?;
                    let value = match Expr::from(required(v.get(2), "=")?)? {
                        Expr::Number(n) => n,
                        _ => return syntax(format!("Initial value of {} is not a number", key))
                    };
                    if let Some(old) = self.numeric_state.insert(key.clone(), value) {
                        if old != value {
                            return Err(Error::Inconsistent(format!("{} is initialized to both {} and {}", key, old, value)));
                        }
                    }
                }
                _ => {
                    self.bool_state.insert(Application::from_tree(fact)?);
                }
            }
        }
        Ok(())
    }

    fn metric(&mut self, items: &[SexprTree]) -> Result<()> {
        let tag = match items.first() {
            Some(Sym(tag)) => tag.clone(),
            _ => return syntax(format!("Metric without direction"))
        };
        let expr = Expr::from(required(items.get(1), ":metric")?)?;
        self.metric = Some(match tag.as_str() {
            "minimize" => Metric::Minimize(expr),
            "maximize" => Metric::Maximize(expr),
            _ => return syntax(format!("Unrecognized metric tag: {}", tag))
        });
        Ok(())
    }
}
