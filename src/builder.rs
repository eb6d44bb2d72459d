//! Operand-stack filter builder.
//!
//! Expressions and filters are pushed onto a stack; each reducing call pops its operands
//! and pushes the node it builds. The CQL parser drives it one closed production at a
//! time, and it doubles as a programmatic API:
//!
//! ```
//! use jeo_filter::FilterBuilder;
//!
//! let filter = FilterBuilder::new()
//!     .property("foo").literal(1).eq()
//!     .property("bar").literal("x").neq()
//!     .and()
//!     .filter()
//!     .unwrap();
//! assert_eq!(filter.to_string(), "foo = 1 AND bar <> 'x'");
//! ```
//!
//! The first failing call is remembered and every later call becomes a no-op; the error
//! surfaces from [`FilterBuilder::filter`].

use geo::{coord, Rect};

use crate::convert;
use crate::expr::{Expression, MathOp, Property};
use crate::filter::{Comparison, ComparisonType, Filter, Id, In, Like, Logic, LogicType, Null, TypeOf};
use crate::spatial::{Spatial, SpatialType};
use crate::types::{FieldType, Value};
use crate::FilterError;

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Expr(Expression),
    Filter(Filter),
}

#[derive(Debug, Default)]
pub struct FilterBuilder {
    stack: Vec<Item>,
    error: Option<FilterError>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn reduce(&mut self, f: impl FnOnce(&mut Self) -> Result<Item, FilterError>) -> &mut Self {
        if self.error.is_none() {
            match f(self) {
                Ok(item) => self.stack.push(item),
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    fn pop(&mut self) -> Result<Item, FilterError> {
        self.stack
            .pop()
            .ok_or_else(|| FilterError::Construction("operand stack is empty".into()))
    }

    fn pop_expr(&mut self) -> Result<Expression, FilterError> {
        match self.pop()? {
            Item::Expr(e) => Ok(e),
            Item::Filter(f) => Err(FilterError::Construction(format!(
                "expected an expression, found filter {f}"
            ))),
        }
    }

    /// Pops `n` expressions, returned in push order.
    fn pop_exprs(&mut self, n: usize) -> Result<Vec<Expression>, FilterError> {
        let mut exprs = (0..n).map(|_| self.pop_expr()).collect::<Result<Vec<_>, _>>()?;
        exprs.reverse();
        Ok(exprs)
    }

    fn pop_property(&mut self) -> Result<Property, FilterError> {
        match self.pop_expr()? {
            Expression::Property(p) => Ok(p),
            other => Err(FilterError::Construction(format!(
                "expected a property, found {other}"
            ))),
        }
    }

    fn pop_filter(&mut self) -> Result<Filter, FilterError> {
        match self.pop()? {
            Item::Filter(f) => Ok(f),
            Item::Expr(e) => Err(FilterError::Construction(format!(
                "expected a filter, found expression {e}"
            ))),
        }
    }

    fn pop_filters(&mut self, n: usize) -> Result<Vec<Filter>, FilterError> {
        let mut filters = (0..n).map(|_| self.pop_filter()).collect::<Result<Vec<_>, _>>()?;
        filters.reverse();
        Ok(filters)
    }

    pub fn literal(&mut self, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        self.reduce(|_| Ok(Item::Expr(Expression::Literal(value))))
    }

    pub fn property(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.reduce(|_| Ok(Item::Expr(Expression::property(name))))
    }

    pub fn self_ref(&mut self) -> &mut Self {
        self.reduce(|_| Ok(Item::Expr(Expression::SelfRef)))
    }

    pub fn math(&mut self, op: MathOp) -> &mut Self {
        self.reduce(|b| {
            let right = b.pop_expr()?;
            let left = b.pop_expr()?;
            Ok(Item::Expr(Expression::math(op, left, right)))
        })
    }

    pub fn add(&mut self) -> &mut Self {
        self.math(MathOp::Add)
    }

    pub fn subtract(&mut self) -> &mut Self {
        self.math(MathOp::Subtract)
    }

    pub fn multiply(&mut self) -> &mut Self {
        self.math(MathOp::Multiply)
    }

    pub fn divide(&mut self) -> &mut Self {
        self.math(MathOp::Divide)
    }

    /// Pops `argc` arguments and pushes a call to `name`.
    pub fn function(&mut self, name: impl Into<String>, argc: usize) -> &mut Self {
        let name = name.into();
        self.reduce(|b| {
            let args = b.pop_exprs(argc)?;
            Ok(Item::Expr(Expression::function(name, args)))
        })
    }

    /// Pops four numeric literals `minx, miny, maxx, maxy` and pushes an envelope literal.
    pub fn envelope(&mut self) -> &mut Self {
        self.reduce(|b| {
            let coords = b
                .pop_exprs(4)?
                .iter()
                .map(|e| {
                    e.as_literal()
                        .and_then(convert::to_number)
                        .map(|n| n.as_f64())
                        .ok_or_else(|| {
                            FilterError::Construction(format!("envelope coordinate must be a number, found {e}"))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let rect = Rect::new(
                coord! { x: coords[0], y: coords[1] },
                coord! { x: coords[2], y: coords[3] },
            );
            Ok(Item::Expr(Expression::literal(rect)))
        })
    }

    pub fn compare(&mut self, kind: ComparisonType) -> &mut Self {
        self.reduce(|b| {
            let right = b.pop_expr()?;
            let left = b.pop_expr()?;
            Ok(Item::Filter(Filter::Comparison(Comparison::new(kind, left, right))))
        })
    }

    pub fn eq(&mut self) -> &mut Self {
        self.compare(ComparisonType::Equal)
    }

    pub fn neq(&mut self) -> &mut Self {
        self.compare(ComparisonType::NotEqual)
    }

    pub fn lt(&mut self) -> &mut Self {
        self.compare(ComparisonType::Less)
    }

    pub fn lte(&mut self) -> &mut Self {
        self.compare(ComparisonType::LessOrEqual)
    }

    pub fn gt(&mut self) -> &mut Self {
        self.compare(ComparisonType::Greater)
    }

    pub fn gte(&mut self) -> &mut Self {
        self.compare(ComparisonType::GreaterOrEqual)
    }

    /// Pops `expr, low, high` and pushes `expr >= low AND expr <= high`.
    pub fn between(&mut self) -> &mut Self {
        self.reduce(|b| {
            let high = b.pop_expr()?;
            let low = b.pop_expr()?;
            let expr = b.pop_expr()?;
            Ok(Item::Filter(Filter::Logic(Logic::new(
                LogicType::And,
                vec![
                    Filter::Comparison(Comparison::new(ComparisonType::GreaterOrEqual, expr.clone(), low)),
                    Filter::Comparison(Comparison::new(ComparisonType::LessOrEqual, expr, high)),
                ],
            )?)))
        })
    }

    /// Pops `expr, start, end` and pushes `expr > start AND expr < end`.
    pub fn during(&mut self) -> &mut Self {
        self.reduce(|b| {
            let end = b.pop_expr()?;
            let start = b.pop_expr()?;
            let expr = b.pop_expr()?;
            Ok(Item::Filter(Filter::Logic(Logic::new(
                LogicType::And,
                vec![
                    Filter::Comparison(Comparison::new(ComparisonType::Greater, expr.clone(), start)),
                    Filter::Comparison(Comparison::new(ComparisonType::Less, expr, end)),
                ],
            )?)))
        })
    }

    fn in_list(&mut self, count: usize, negated: bool) -> &mut Self {
        self.reduce(|b| {
            let values = b.pop_exprs(count)?;
            let property = b.pop_property()?;
            Ok(Item::Filter(Filter::In(In::new(property, values, negated))))
        })
    }

    /// Pops a property followed by `count` values.
    pub fn in_(&mut self, count: usize) -> &mut Self {
        self.in_list(count, false)
    }

    pub fn not_in(&mut self, count: usize) -> &mut Self {
        self.in_list(count, true)
    }

    fn like_pattern(&mut self, negated: bool) -> &mut Self {
        self.reduce(|b| {
            let pattern = b.pop_expr()?;
            let property = b.pop_property()?;
            Ok(Item::Filter(Filter::Like(Like::new(property, pattern, negated)?)))
        })
    }

    pub fn like(&mut self) -> &mut Self {
        self.like_pattern(false)
    }

    pub fn not_like(&mut self) -> &mut Self {
        self.like_pattern(true)
    }

    fn null_check(&mut self, negated: bool) -> &mut Self {
        self.reduce(|b| {
            let property = b.pop_property()?;
            Ok(Item::Filter(Filter::Null(Null::new(property, negated))))
        })
    }

    pub fn is_null(&mut self) -> &mut Self {
        self.null_check(false)
    }

    pub fn is_not_null(&mut self) -> &mut Self {
        self.null_check(true)
    }

    /// Pops `left, right` (and a distance for DWITHIN/BEYOND) and pushes the predicate.
    pub fn spatial(&mut self, kind: SpatialType) -> &mut Self {
        self.reduce(|b| {
            let distance = if kind.requires_distance() {
                Some(b.pop_expr()?)
            } else {
                None
            };
            let right = b.pop_expr()?;
            let left = b.pop_expr()?;
            Ok(Item::Filter(Filter::Spatial(Spatial::new(kind, left, right, distance)?)))
        })
    }

    pub fn bbox(&mut self) -> &mut Self {
        self.spatial(SpatialType::BBox)
    }

    pub fn id(&mut self, count: usize) -> &mut Self {
        self.reduce(|b| {
            let ids = b.pop_exprs(count)?;
            Ok(Item::Filter(Filter::Id(Id::new(ids)?)))
        })
    }

    /// Pops the expression to test, or tests the record itself when the stack has no
    /// expression on top.
    pub fn type_of(&mut self, kind: FieldType) -> &mut Self {
        self.reduce(|b| {
            let expr = match b.stack.last() {
                Some(Item::Expr(_)) => b.pop_expr()?,
                _ => Expression::SelfRef,
            };
            Ok(Item::Filter(Filter::TypeOf(TypeOf::new(expr, kind))))
        })
    }

    pub fn all(&mut self) -> &mut Self {
        self.reduce(|_| Ok(Item::Filter(Filter::All)))
    }

    pub fn none(&mut self) -> &mut Self {
        self.reduce(|_| Ok(Item::Filter(Filter::None)))
    }

    /// Pops the top `count` filters into one logic node.
    pub(crate) fn logic(&mut self, kind: LogicType, count: usize) -> &mut Self {
        self.reduce(|b| {
            let parts = b.pop_filters(count)?;
            Ok(Item::Filter(Filter::Logic(Logic::new(kind, parts)?)))
        })
    }

    fn filter_run(&self) -> usize {
        self.stack
            .iter()
            .rev()
            .take_while(|i| matches!(i, Item::Filter(_)))
            .count()
    }

    /// Combines every filter on top of the stack with AND.
    pub fn and(&mut self) -> &mut Self {
        let n = self.filter_run();
        self.logic(LogicType::And, n)
    }

    /// Combines every filter on top of the stack with OR.
    pub fn or(&mut self) -> &mut Self {
        let n = self.filter_run();
        self.logic(LogicType::Or, n)
    }

    pub fn not(&mut self) -> &mut Self {
        self.logic(LogicType::Not, 1)
    }

    pub(crate) fn take_error(&mut self) -> Option<FilterError> {
        self.error.take()
    }

    pub(crate) fn top_is_literal(&self) -> bool {
        matches!(self.stack.last(), Some(Item::Expr(Expression::Literal(_))))
    }

    pub(crate) fn mark(&self) -> usize {
        self.stack.len()
    }

    /// Drops everything pushed since `mark` and forgets any error.
    pub(crate) fn reset(&mut self, mark: usize) {
        self.stack.truncate(mark);
        self.error = None;
    }

    /// Takes the finished filter. The stack must hold exactly one filter.
    pub fn filter(&mut self) -> Result<Filter, FilterError> {
        if let Some(e) = self.error.take() {
            self.stack.clear();
            return Err(e);
        }
        let filter = self.pop_filter()?;
        if !self.stack.is_empty() {
            let leftover = self.stack.len();
            self.stack.clear();
            return Err(FilterError::Construction(format!(
                "{leftover} unused operand(s) left on the stack"
            )));
        }
        Ok(filter)
    }

    /// Takes a finished expression. The stack must hold exactly one expression.
    pub fn expression(&mut self) -> Result<Expression, FilterError> {
        if let Some(e) = self.error.take() {
            self.stack.clear();
            return Err(e);
        }
        let expr = self.pop_expr()?;
        if !self.stack.is_empty() {
            self.stack.clear();
            return Err(FilterError::Construction("unused operands left on the stack".into()));
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Feature;

    #[test]
    fn test_comparison() {
        let f = FilterBuilder::new().property("foo").literal(12).eq().filter().unwrap();
        assert_eq!(
            f,
            Filter::Comparison(Comparison::new(
                ComparisonType::Equal,
                Expression::property("foo"),
                Expression::literal(12)
            ))
        );
    }

    #[test]
    fn test_logic_collects_filter_run() {
        let f = FilterBuilder::new()
            .property("a").literal(1).eq()
            .property("b").literal(2).eq()
            .property("c").literal(3).eq()
            .or()
            .filter()
            .unwrap();
        let Filter::Logic(l) = f else { panic!("expected logic") };
        assert_eq!(l.kind(), LogicType::Or);
        assert_eq!(l.parts().len(), 3);
    }

    #[test]
    fn test_math_and_functions() {
        let e = FilterBuilder::new()
            .property("x").literal(2).multiply()
            .function("abs", 1)
            .expression()
            .unwrap();
        assert_eq!(e.to_string(), "abs((x * 2))");
        assert_eq!(e.evaluate(&Feature::new().with("x", -3)), Some(Value::Double(6.0)));
    }

    #[test]
    fn test_between() {
        let f = FilterBuilder::new().property("x").literal(1).literal(5).between().filter().unwrap();
        assert_eq!(f.to_string(), "x >= 1 AND x <= 5");
    }

    #[test]
    fn test_in_and_like() {
        let f = FilterBuilder::new()
            .property("x").literal("six").literal(6).in_(2)
            .filter()
            .unwrap();
        assert_eq!(f.to_string(), "x IN ('six', 6)");
        let f = FilterBuilder::new().property("n").literal("a%").not_like().filter().unwrap();
        assert_eq!(f.to_string(), "n NOT LIKE 'a%'");
    }

    #[test]
    fn test_envelope_and_bbox() {
        let f = FilterBuilder::new()
            .property("pp")
            .literal(30).literal(-125).literal(40).literal(-110)
            .envelope()
            .bbox()
            .filter()
            .unwrap();
        assert_eq!(f.to_string(), "BBOX(pp, 30.0, -125.0, 40.0, -110.0)");
    }

    #[test]
    fn test_type_of_defaults_to_self() {
        let f = FilterBuilder::new().type_of(FieldType::Map).filter().unwrap();
        assert_eq!(f, Filter::TypeOf(TypeOf::new(Expression::SelfRef, FieldType::Map)));
    }

    #[test]
    fn test_first_error_is_kept() {
        let mut b = FilterBuilder::new();
        b.literal(1).literal(2).like().property("x").literal(1).eq();
        assert!(matches!(b.filter(), Err(FilterError::Construction(_))));
    }

    #[test]
    fn test_spatial_distance_required() {
        let res = FilterBuilder::new()
            .property("geom")
            .literal(geo::point!(x: 0.0, y: 0.0))
            .literal(10)
            .spatial(SpatialType::DWithin)
            .filter();
        assert!(res.is_ok());
        let res = FilterBuilder::new().property("geom").spatial(SpatialType::Beyond).filter();
        assert!(res.is_err());
    }

    #[test]
    fn test_leftover_operands() {
        let res = FilterBuilder::new().property("x").property("y").literal(1).eq().filter();
        assert!(matches!(res, Err(FilterError::Construction(_))));
    }

    #[test]
    fn test_reset_to_mark() {
        let mut b = FilterBuilder::new();
        b.property("x");
        let mark = b.mark();
        b.property("y").literal(1).like();
        b.reset(mark);
        b.literal(1).eq();
        assert_eq!(b.filter().unwrap().to_string(), "x = 1");
    }
}
