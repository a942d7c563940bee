use std::collections::HashMap;
use std::fmt;
use serde::Serialize;
use crate::error::{Error, Result};
use crate::pddl::{Application, ArithOp, Expr};

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize)]
pub enum OperatorType {
    Plus,
    Minus,
    Multiply,
    Divide
}

impl From<ArithOp> for OperatorType {
    fn from(op: ArithOp) -> Self {
        match op {
            ArithOp::Plus => OperatorType::Plus,
            ArithOp::Minus => OperatorType::Minus,
            ArithOp::Times => OperatorType::Multiply,
            ArithOp::Divide => OperatorType::Divide
        }
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatorType::Plus => "+",
            OperatorType::Minus => "-",
            OperatorType::Multiply => "*",
            OperatorType::Divide => "/"
        })
    }
}

#[derive(Clone,Debug,PartialEq,Serialize)]
pub enum NumericExpression {
    Constant(f64),
    Fluent { id: usize, label: String },
    Formula { op: OperatorType, left: Box<NumericExpression>, right: Box<NumericExpression> }
}

impl NumericExpression {
    /// `fluent_values` is indexed by fluent id.
    pub fn evaluate(&self, fluent_values: &[f64]) -> Result<f64> {
        Ok(match self {
            NumericExpression::Constant(value) => *value,
            NumericExpression::Fluent {id, label} => match fluent_values.get(*id) {
                None => return Err(Error::UnresolvedFluent(label.clone())),
                Some(value) => *value
            },
            NumericExpression::Formula {op, left, right} => {
                let (a, b) = (left.evaluate(fluent_values)?, right.evaluate(fluent_values)?);
                match op {
                    OperatorType::Plus => a + b,
                    OperatorType::Minus => a - b,
                    OperatorType::Multiply => a * b,
                    OperatorType::Divide => a / b
                }
            }
        })
    }
}

impl fmt::Display for NumericExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericExpression::Constant(value) => write!(f, "{}", value),
            NumericExpression::Fluent {label, ..} => f.write_str(label),
            NumericExpression::Formula {op, left, right} => write!(f, "({} {} {})", left, op, right)
        }
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize)]
pub enum ComparatorType {
    Equal,
    GreaterThan,
    GreaterEqualThan
}

/// Holds iff `expression` compared against zero satisfies `comparator`.
#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct NumericCondition {
    pub comparator: ComparatorType,
    pub expression: NumericExpression
}

impl NumericCondition {
    pub fn holds(&self, fluent_values: &[f64]) -> Result<bool> {
        let value = self.expression.evaluate(fluent_values)?;
        Ok(match self.comparator {
            ComparatorType::Equal => value == 0.0,
            ComparatorType::GreaterThan => value > 0.0,
            ComparatorType::GreaterEqualThan => value >= 0.0
        })
    }
}

impl fmt::Display for NumericCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cmp = match self.comparator {
            ComparatorType::Equal => "=",
            ComparatorType::GreaterThan => ">",
            ComparatorType::GreaterEqualThan => ">="
        };
        write!(f, "{} {} 0", self.expression, cmp)
    }
}

/// Renders `name(a, b)`, the key fluents are registered under.
pub fn fluent_label(name: &str, args: &[String]) -> String {
    format!("{}({})", name, args.join(", "))
}

/// Fluent label to id, ids handed out in registration order.
#[derive(Clone,Debug,Default)]
pub struct FluentTable {
    ids: HashMap<String,usize>,
    labels: Vec<String>
}

impl FluentTable {
    pub fn new() -> Self {
        FluentTable::default()
    }

    /// Returns the id of `label`, registering it if it is new.
    pub fn register(&mut self, label: String) -> usize {
        match self.ids.get(&label) {
            Some(id) => *id,
            None => {
                let id = self.labels.len();
                self.ids.insert(label.clone(), id);
                self.labels.push(label);
                id
            }
        }
    }

    pub fn id_of(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

fn translate_fluent(app: &Application, fluents: &FluentTable) -> Result<NumericExpression> {
    let label = fluent_label(app.get_tag(), app.args());
    match fluents.id_of(&label) {
        None => Err(Error::UnresolvedFluent(label)),
        Some(id) => Ok(NumericExpression::Fluent {id, label})
    }
}

pub fn translate_expression(expr: &Expr, fluents: &FluentTable) -> Result<NumericExpression> {
    Ok(match expr {
        Expr::Fluent(app) => translate_fluent(app, fluents)?,
        Expr::Number(n) => NumericExpression::Constant(*n),
        Expr::Binary(op, a, b) => NumericExpression::Formula {
            op: OperatorType::from(*op),
            left: Box::new(translate_expression(a, fluents)?),
            right: Box::new(translate_expression(b, fluents)?)
        }
    })
}
