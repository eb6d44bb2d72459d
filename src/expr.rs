//! Expression module: the operand side of filters.
//!
//! Expressions evaluate against a record to a value, or to `None` when something they
//! reference is missing. `None` propagates through arithmetic and function calls, and
//! every filter treats it as `false`.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wkt::ToWkt;

use crate::context::Record;
use crate::convert;
use crate::functions;
use crate::lexer;
use crate::types::{format_date, format_float, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl MathOp {
    pub fn symbol(&self) -> char {
        match self {
            MathOp::Add => '+',
            MathOp::Subtract => '-',
            MathOp::Multiply => '*',
            MathOp::Divide => '/',
        }
    }

    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            MathOp::Add => a + b,
            MathOp::Subtract => a - b,
            MathOp::Multiply => a * b,
            MathOp::Divide => a / b,
        }
    }
}

impl fmt::Display for MathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A named, possibly dotted, reference into a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Property {
    name: String,
}

impl Property {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the property. The full name is looked up first so that records with dotted
    /// field names work; otherwise the path is walked one segment at a time.
    pub fn evaluate(&self, record: &dyn Record) -> Option<Value> {
        if let Some(v) = lookup(record, &self.name) {
            return Some(v);
        }
        if !self.name.contains('.') {
            return None;
        }
        let mut segments = self.name.split('.');
        let mut current = lookup(record, segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Map(mut map) => map.remove(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn has(&self, record: &dyn Record) -> bool {
        self.evaluate(record).is_some()
    }
}

fn lookup(record: &dyn Record, key: &str) -> Option<Value> {
    record.get(key).or_else(|| record.accessor(key))
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if lexer::is_plain_identifier(&self.name) {
            f.write_str(&self.name)
        } else {
            write!(f, "\"{}\"", self.name.replace('"', "\"\""))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Math {
    op: MathOp,
    left: Box<Expression>,
    right: Box<Expression>,
}

impl Math {
    pub fn new(op: MathOp, left: Expression, right: Expression) -> Self {
        Self {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn op(&self) -> MathOp {
        self.op
    }

    pub fn left(&self) -> &Expression {
        &self.left
    }

    pub fn right(&self) -> &Expression {
        &self.right
    }

    pub fn evaluate(&self, record: &dyn Record) -> Option<Value> {
        let l = self.left.evaluate(record)?;
        let r = self.right.evaluate(record)?;
        match (convert::to_number(&l), convert::to_number(&r)) {
            (Some(a), Some(b)) => Some(Value::Double(self.op.apply(a.as_f64(), b.as_f64()))),
            _ => {
                debug!(op = %self.op, left = %l, right = %r, "non-numeric operand in arithmetic");
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    name: String,
    args: Vec<Expression>,
}

impl Function {
    pub fn new(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }

    pub fn evaluate(&self, record: &dyn Record) -> Option<Value> {
        let Some(func) = functions::builtins().get(&self.name) else {
            warn!(function = %self.name, "unknown function");
            return None;
        };
        let args = self
            .args
            .iter()
            .map(|a| a.evaluate(record))
            .collect::<Option<Vec<_>>>()?;
        func.call(&args)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Expression {
    Literal(Value),
    Property(Property),
    Math(Math),
    Function(Function),
    /// The record itself.
    SelfRef,
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn property(name: impl Into<String>) -> Self {
        Expression::Property(Property::new(name))
    }

    pub fn math(op: MathOp, left: Expression, right: Expression) -> Self {
        Expression::Math(Math::new(op, left, right))
    }

    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Function(Function::new(name, args))
    }

    pub fn as_property(&self) -> Option<&Property> {
        match self {
            Expression::Property(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Expression::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_property(&self) -> bool {
        matches!(self, Expression::Property(_))
    }

    pub fn evaluate(&self, record: &dyn Record) -> Option<Value> {
        match self {
            Expression::Literal(v) => Some(v.clone()),
            Expression::Property(p) => p.evaluate(record),
            Expression::Math(m) => m.evaluate(record),
            Expression::Function(func) => func.evaluate(record),
            Expression::SelfRef => Some(record.to_value()),
        }
    }
}

impl From<Property> for Expression {
    fn from(p: Property) -> Self {
        Expression::Property(p)
    }
}

impl From<Value> for Expression {
    fn from(v: Value) -> Self {
        Expression::Literal(v)
    }
}

/// Writes a value in the form it takes as a CQL literal.
pub(crate) fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("NULL"),
        Value::Bool(true) => f.write_str("TRUE"),
        Value::Bool(false) => f.write_str("FALSE"),
        Value::Float(n) => f.write_str(&format_float(f64::from(*n))),
        Value::Double(n) => f.write_str(&format_float(*n)),
        Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Value::Date(d) => f.write_str(&format_date(d)),
        Value::Geometry(g) => f.write_str(&g.wkt_string()),
        Value::Map(_) => write!(f, "'{}'", value.to_string().replace('\'', "''")),
        other => write!(f, "{other}"),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => write_literal(f, v),
            Expression::Property(p) => write!(f, "{p}"),
            Expression::Math(m) => write!(f, "({} {} {})", m.left, m.op, m.right),
            Expression::Function(func) => {
                write!(f, "{}(", func.name)?;
                for (i, arg) in func.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Expression::SelfRef => f.write_str("@self"),
        }
    }
}
