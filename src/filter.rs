//! Filter module: the predicate tree evaluated against records.
//!
//! Filters are immutable once built. Constructors check the structural rules (non-empty
//! logic, a literal LIKE pattern, ...) so an existing filter is always well formed.
//! `Display` renders ECQL text that parses back to an equal filter.

use std::fmt;
use std::ops;

use serde::{Deserialize, Serialize};

use crate::context::Record;
use crate::convert;
use crate::expr::{write_literal, Expression, Property};
use crate::spatial::Spatial;
use crate::types::{FieldType, Value};
use crate::FilterError;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Filter {
    /// Matches everything.
    All,
    /// Matches nothing.
    None,
    Comparison(Comparison),
    Logic(Logic),
    Spatial(Spatial),
    Id(Id),
    In(In),
    Like(Like),
    Null(Null),
    TypeOf(TypeOf),
}

impl Filter {
    /// Evaluates the filter. A missing operand makes a predicate false; only values that
    /// cannot be compared at all produce an error.
    pub fn test(&self, record: &dyn Record) -> Result<bool, FilterError> {
        match self {
            Filter::All => Ok(true),
            Filter::None => Ok(false),
            Filter::Comparison(c) => c.test(record),
            Filter::Logic(l) => l.test(record),
            Filter::Spatial(s) => s.test(record),
            Filter::Id(i) => Ok(i.test(record)),
            Filter::In(i) => Ok(i.test(record)),
            Filter::Like(l) => Ok(l.test(record)),
            Filter::Null(n) => Ok(n.test(record)),
            Filter::TypeOf(t) => Ok(t.test(record)),
        }
    }

    /// Normalizes a comparison or spatial filter so that its left side is a property.
    /// Other filters are returned unchanged.
    pub fn normalize(&self) -> Result<Filter, FilterError> {
        match self {
            Filter::Comparison(c) => c.normalize().map(Filter::Comparison),
            Filter::Spatial(s) => s.normalize().map(Filter::Spatial),
            other => Ok(other.clone()),
        }
    }

    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::None, _) | (_, Filter::None) => Filter::None,
            (a, b) => Filter::Logic(Logic {
                kind: LogicType::And,
                parts: vec![a, b],
            }),
        }
    }

    pub fn or(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, _) | (_, Filter::All) => Filter::All,
            (Filter::None, f) | (f, Filter::None) => f,
            (a, b) => Filter::Logic(Logic {
                kind: LogicType::Or,
                parts: vec![a, b],
            }),
        }
    }

    /// Conjunction of `parts`: `All` when empty, the part itself when there is one.
    pub fn all_of(parts: Vec<Filter>) -> Filter {
        let mut parts: Vec<Filter> = parts.into_iter().filter(|f| *f != Filter::All).collect();
        if parts.contains(&Filter::None) {
            return Filter::None;
        }
        match parts.len() {
            0 => Filter::All,
            1 => parts.remove(0),
            _ => Filter::Logic(Logic {
                kind: LogicType::And,
                parts,
            }),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }

    pub fn is_logic(&self) -> bool {
        matches!(self, Filter::Logic(_))
    }
}

impl ops::Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        Filter::Logic(Logic {
            kind: LogicType::Not,
            parts: vec![self],
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => f.write_str("INCLUDE"),
            Filter::None => f.write_str("EXCLUDE"),
            Filter::Comparison(c) => write!(f, "{c}"),
            Filter::Logic(l) => write!(f, "{l}"),
            Filter::Spatial(s) => write!(f, "{s}"),
            Filter::Id(i) => write!(f, "{i}"),
            Filter::In(i) => write!(f, "{i}"),
            Filter::Like(l) => write!(f, "{l}"),
            Filter::Null(n) => write!(f, "{n}"),
            Filter::TypeOf(t) => write!(f, "{t}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonType {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl ComparisonType {
    /// The operator that holds with the operands swapped.
    pub fn invert(self) -> Self {
        match self {
            ComparisonType::Less => ComparisonType::Greater,
            ComparisonType::Greater => ComparisonType::Less,
            ComparisonType::LessOrEqual => ComparisonType::GreaterOrEqual,
            ComparisonType::GreaterOrEqual => ComparisonType::LessOrEqual,
            other => other,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonType::Equal => "=",
            ComparisonType::NotEqual => "<>",
            ComparisonType::Less => "<",
            ComparisonType::LessOrEqual => "<=",
            ComparisonType::Greater => ">",
            ComparisonType::GreaterOrEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    kind: ComparisonType,
    left: Expression,
    right: Expression,
}

impl Comparison {
    pub fn new(kind: ComparisonType, left: Expression, right: Expression) -> Self {
        Self { kind, left, right }
    }

    pub fn kind(&self) -> ComparisonType {
        self.kind
    }

    pub fn left(&self) -> &Expression {
        &self.left
    }

    pub fn right(&self) -> &Expression {
        &self.right
    }

    /// The property operand of a normalized comparison.
    pub fn property(&self) -> Option<&Property> {
        self.left.as_property()
    }

    pub fn invert(&self) -> Self {
        Self {
            kind: self.kind.invert(),
            left: self.right.clone(),
            right: self.left.clone(),
        }
    }

    pub fn normalize(&self) -> Result<Self, FilterError> {
        if self.left.is_property() {
            Ok(self.clone())
        } else if self.right.is_property() {
            Ok(self.invert())
        } else {
            Err(FilterError::NotNormalizable(format!(
                "{self}: neither operand is a property"
            )))
        }
    }

    pub fn test(&self, record: &dyn Record) -> Result<bool, FilterError> {
        let (Some(l), Some(r)) = (self.left.evaluate(record), self.right.evaluate(record)) else {
            return Ok(false);
        };
        if l.is_null() || r.is_null() {
            return Ok(false);
        }
        let ord = match self.kind {
            ComparisonType::Equal => return Ok(convert::equals(&l, &r)),
            ComparisonType::NotEqual => return Ok(!convert::equals(&l, &r)),
            _ => convert::compare(&l, &r)?,
        };
        let Some(ord) = ord else {
            return Ok(false);
        };
        Ok(match self.kind {
            ComparisonType::Less => ord.is_lt(),
            ComparisonType::LessOrEqual => ord.is_le(),
            ComparisonType::Greater => ord.is_gt(),
            ComparisonType::GreaterOrEqual => ord.is_ge(),
            ComparisonType::Equal | ComparisonType::NotEqual => false,
        })
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.kind.symbol(), self.right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicType {
    And,
    Or,
    Not,
}

impl LogicType {
    pub fn name(self) -> &'static str {
        match self {
            LogicType::And => "AND",
            LogicType::Or => "OR",
            LogicType::Not => "NOT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Logic {
    kind: LogicType,
    parts: Vec<Filter>,
}

impl Logic {
    pub fn new(kind: LogicType, parts: Vec<Filter>) -> Result<Self, FilterError> {
        if parts.is_empty() {
            return Err(FilterError::Construction(format!(
                "{} requires at least one part",
                kind.name()
            )));
        }
        if kind == LogicType::Not && parts.len() != 1 {
            return Err(FilterError::Construction(format!(
                "NOT requires exactly one part, got {}",
                parts.len()
            )));
        }
        Ok(Self { kind, parts })
    }

    pub fn kind(&self) -> LogicType {
        self.kind
    }

    pub fn parts(&self) -> &[Filter] {
        &self.parts
    }

    pub fn test(&self, record: &dyn Record) -> Result<bool, FilterError> {
        match self.kind {
            LogicType::And => {
                for part in &self.parts {
                    if !part.test(record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            LogicType::Or => {
                for part in &self.parts {
                    if part.test(record)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            LogicType::Not => Ok(!self.parts[0].test(record)?),
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == LogicType::Not {
            return write!(f, "NOT ({})", self.parts[0]);
        }
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.kind.name())?;
            }
            if matches!(part, Filter::Logic(l) if l.kind != LogicType::Not) {
                write!(f, "({part})")?;
            } else {
                write!(f, "{part}")?;
            }
        }
        Ok(())
    }
}

/// Matches records by identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Id {
    ids: Vec<Expression>,
}

impl Id {
    pub fn new(ids: Vec<Expression>) -> Result<Self, FilterError> {
        if ids.is_empty() {
            return Err(FilterError::Construction("id filter requires at least one id".into()));
        }
        Ok(Self { ids })
    }

    pub fn ids(&self) -> &[Expression] {
        &self.ids
    }

    pub fn test(&self, record: &dyn Record) -> bool {
        let Some(id) = record.id() else {
            return false;
        };
        self.ids
            .iter()
            .filter_map(|e| e.evaluate(record))
            .any(|v| v.to_string() == id)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IN (")?;
        write_list(f, &self.ids)?;
        f.write_str(")")
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[Expression]) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct In {
    property: Property,
    values: Vec<Expression>,
    negated: bool,
}

impl In {
    pub fn new(property: Property, values: Vec<Expression>, negated: bool) -> Self {
        Self {
            property,
            values,
            negated,
        }
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn values(&self) -> &[Expression] {
        &self.values
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn test(&self, record: &dyn Record) -> bool {
        let v = match self.property.evaluate(record) {
            Some(v) if !v.is_null() => v,
            _ => return false,
        };
        let found = self
            .values
            .iter()
            .filter_map(|e| e.evaluate(record))
            .any(|x| convert::equals(&v, &x));
        found != self.negated
    }
}

impl fmt::Display for In {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}IN (", self.property, if self.negated { "NOT " } else { "" })?;
        write_list(f, &self.values)?;
        f.write_str(")")
    }
}

/// A compiled LIKE pattern: `%` matches any run of characters, `_` exactly one.
#[derive(Debug, Clone)]
struct LikePattern {
    #[cfg(feature = "regex")]
    regex: regex::Regex,
    #[cfg(not(feature = "regex"))]
    chars: Vec<char>,
}

impl LikePattern {
    #[cfg(feature = "regex")]
    fn compile(pattern: &str) -> Result<Self, FilterError> {
        let mut re = String::from("(?s)^");
        let mut literal = String::new();
        for c in pattern.chars() {
            match c {
                '%' | '_' => {
                    re.push_str(&regex::escape(&literal));
                    literal.clear();
                    re.push_str(if c == '%' { ".*" } else { "." });
                }
                _ => literal.push(c),
            }
        }
        re.push_str(&regex::escape(&literal));
        re.push('$');
        let regex = regex::Regex::new(&re)
            .map_err(|e| FilterError::Construction(format!("invalid LIKE pattern '{pattern}': {e}")))?;
        Ok(Self { regex })
    }

    #[cfg(feature = "regex")]
    fn matches(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }

    #[cfg(not(feature = "regex"))]
    fn compile(pattern: &str) -> Result<Self, FilterError> {
        Ok(Self {
            chars: pattern.chars().collect(),
        })
    }

    #[cfg(not(feature = "regex"))]
    fn matches(&self, s: &str) -> bool {
        let s: Vec<char> = s.chars().collect();
        wildcard_match(&s, &self.chars)
    }
}

#[cfg(not(feature = "regex"))]
fn wildcard_match(s: &[char], pat: &[char]) -> bool {
    if pat.is_empty() {
        return s.is_empty();
    }
    match pat[0] {
        '%' => (0..=s.len()).any(|i| wildcard_match(&s[i..], &pat[1..])),
        '_' => !s.is_empty() && wildcard_match(&s[1..], &pat[1..]),
        c => !s.is_empty() && s[0] == c && wildcard_match(&s[1..], &pat[1..]),
    }
}

#[derive(Debug, Clone)]
pub struct Like {
    property: Property,
    pattern: Expression,
    negated: bool,
    matcher: LikePattern,
}

impl Like {
    /// The pattern must be a string that evaluates without a record.
    pub fn new(property: Property, pattern: Expression, negated: bool) -> Result<Self, FilterError> {
        let Some(Value::String(text)) = pattern.evaluate(&()) else {
            return Err(FilterError::Construction(format!(
                "LIKE pattern must be a string literal, got {pattern}"
            )));
        };
        let matcher = LikePattern::compile(&text)?;
        Ok(Self {
            property,
            pattern,
            negated,
            matcher,
        })
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn pattern(&self) -> &Expression {
        &self.pattern
    }

    /// The pattern text.
    pub fn pattern_text(&self) -> String {
        self.pattern
            .as_literal()
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn test(&self, record: &dyn Record) -> bool {
        match self.property.evaluate(record) {
            Some(v) if !v.is_null() => self.matcher.matches(&v.to_string()) != self.negated,
            _ => false,
        }
    }
}

impl PartialEq for Like {
    fn eq(&self, other: &Self) -> bool {
        self.property == other.property && self.pattern == other.pattern && self.negated == other.negated
    }
}

impl fmt::Display for Like {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}LIKE {}", self.property, if self.negated { "NOT " } else { "" }, self.pattern)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Null {
    property: Property,
    negated: bool,
}

impl Null {
    pub fn new(property: Property, negated: bool) -> Self {
        Self { property, negated }
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// An absent property is neither null nor not null.
    pub fn test(&self, record: &dyn Record) -> bool {
        match self.property.evaluate(record) {
            Some(v) => v.is_null() != self.negated,
            None => false,
        }
    }
}

impl fmt::Display for Null {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} IS {}NULL", self.property, if self.negated { "NOT " } else { "" })
    }
}

/// Matches when an expression evaluates to a value of the given type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeOf {
    expr: Expression,
    kind: FieldType,
}

impl TypeOf {
    pub fn new(expr: Expression, kind: FieldType) -> Self {
        Self { expr, kind }
    }

    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    pub fn kind(&self) -> FieldType {
        self.kind
    }

    pub fn test(&self, record: &dyn Record) -> bool {
        self.expr
            .evaluate(record)
            .and_then(|v| v.field_type())
            .is_some_and(|t| t == self.kind)
    }
}

impl fmt::Display for TypeOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TYPEOF({}, ", self.expr)?;
        write_literal(f, &Value::from(self.kind.name()))?;
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Feature;
    use crate::expr::MathOp;

    fn record() -> Feature {
        Feature::new().with("x", 5).with("name", "abcdef").with("empty", Value::Null)
    }

    fn cmp(kind: ComparisonType, left: Expression, right: Expression) -> Filter {
        Filter::Comparison(Comparison::new(kind, left, right))
    }

    fn prop(name: &str) -> Expression {
        Expression::property(name)
    }

    #[test]
    fn test_comparison_coerces() {
        let r = record();
        assert!(cmp(ComparisonType::Equal, prop("x"), Expression::literal(5.0)).test(&r).unwrap());
        assert!(cmp(ComparisonType::Equal, prop("x"), Expression::literal("5")).test(&r).unwrap());
        assert!(cmp(ComparisonType::LessOrEqual, prop("x"), Expression::literal(5)).test(&r).unwrap());
        assert!(!cmp(ComparisonType::Less, prop("x"), Expression::literal(5)).test(&r).unwrap());
        assert!(cmp(ComparisonType::Greater, Expression::literal(6), prop("x")).test(&r).unwrap());
    }

    #[test]
    fn test_missing_operand_is_false() {
        let r = record();
        for kind in [
            ComparisonType::Equal,
            ComparisonType::NotEqual,
            ComparisonType::Less,
            ComparisonType::GreaterOrEqual,
        ] {
            assert!(!cmp(kind, prop("y"), Expression::literal(5)).test(&r).unwrap());
            assert!(!cmp(kind, Expression::literal(5), prop("y")).test(&r).unwrap());
        }
        let math = Expression::math(MathOp::Add, prop("x"), Expression::literal(5));
        assert!(!cmp(ComparisonType::Less, prop("y"), math.clone()).test(&r).unwrap());
        let math = Expression::math(MathOp::Add, prop("y"), Expression::literal(5));
        assert!(!cmp(ComparisonType::Less, math, prop("x")).test(&r).unwrap());
    }

    #[test]
    fn test_null_value_operand_is_false() {
        let r = record();
        assert!(!cmp(ComparisonType::Equal, prop("empty"), Expression::literal(5)).test(&r).unwrap());
        assert!(!cmp(ComparisonType::NotEqual, prop("empty"), Expression::literal(5)).test(&r).unwrap());
        assert!(!cmp(ComparisonType::Less, prop("empty"), Expression::literal(5)).test(&r).unwrap());
    }

    #[test]
    fn test_incomparable_is_error() {
        let r = record();
        let f = cmp(ComparisonType::Less, prop("name"), Expression::literal(5));
        assert!(matches!(f.test(&r), Err(FilterError::Evaluation(_))));
    }

    #[test]
    fn test_logic_short_circuits() {
        let r = record();
        let bad = cmp(ComparisonType::Less, prop("name"), Expression::literal(5));
        let yes = cmp(ComparisonType::Equal, prop("x"), Expression::literal(5));
        let missing = cmp(ComparisonType::Greater, prop("y"), Expression::literal(5));
        assert!(Filter::Logic(Logic::new(LogicType::Or, vec![missing.clone(), yes.clone()]).unwrap()).test(&r).unwrap());
        assert!(Filter::Logic(Logic::new(LogicType::Or, vec![yes.clone(), bad.clone()]).unwrap()).test(&r).unwrap());
        assert!(!Filter::Logic(Logic::new(LogicType::And, vec![missing.clone(), bad]).unwrap()).test(&r).unwrap());
        assert!((!missing).test(&r).unwrap());
    }

    #[test]
    fn test_logic_construction_rules() {
        assert!(matches!(Logic::new(LogicType::And, vec![]), Err(FilterError::Construction(_))));
        assert!(Logic::new(LogicType::Not, vec![Filter::All, Filter::None]).is_err());
        assert!(Logic::new(LogicType::Not, vec![Filter::All]).is_ok());
    }

    #[test]
    fn test_combinators() {
        let a = cmp(ComparisonType::Equal, prop("x"), Expression::literal(5));
        assert_eq!(Filter::All.and(a.clone()), a);
        assert_eq!(a.clone().and(Filter::None), Filter::None);
        assert_eq!(a.clone().or(Filter::All), Filter::All);
        assert_eq!(Filter::None.or(a.clone()), a);
        assert_eq!(Filter::all_of(vec![]), Filter::All);
        assert_eq!(Filter::all_of(vec![a.clone()]), a);
        assert!(matches!(Filter::all_of(vec![a.clone(), a]), Filter::Logic(_)));
    }

    #[test]
    fn test_normalize_comparison() {
        let c = Comparison::new(ComparisonType::Less, Expression::literal(5), prop("x"));
        let n = c.normalize().unwrap();
        assert_eq!(n.kind(), ComparisonType::Greater);
        assert_eq!(n.property().map(|p| p.name()), Some("x"));
        assert_eq!(n.normalize().unwrap(), n);
        let c = Comparison::new(ComparisonType::Equal, Expression::literal(1), Expression::literal(2));
        assert!(matches!(c.normalize(), Err(FilterError::NotNormalizable(_))));
    }

    #[test]
    fn test_comparison_inversion_round_trip() {
        for kind in [
            ComparisonType::Equal,
            ComparisonType::NotEqual,
            ComparisonType::Less,
            ComparisonType::LessOrEqual,
            ComparisonType::Greater,
            ComparisonType::GreaterOrEqual,
        ] {
            assert_eq!(kind.invert().invert(), kind);
        }
    }

    #[test]
    fn test_in() {
        let r = record();
        let values = vec![Expression::literal("six"), Expression::literal(5)];
        assert!(Filter::In(In::new(Property::new("x"), values.clone(), false)).test(&r).unwrap());
        assert!(!Filter::In(In::new(Property::new("x"), values.clone(), true)).test(&r).unwrap());
        assert!(!Filter::In(In::new(Property::new("y"), values.clone(), false)).test(&r).unwrap());
        assert!(!Filter::In(In::new(Property::new("y"), values, true)).test(&r).unwrap());
    }

    #[test]
    fn test_like() {
        let r = record();
        let like = |p: &str, negated| Like::new(Property::new("name"), Expression::literal(p), negated).unwrap();
        assert!(like("%cd%", false).test(&r));
        assert!(like("abc___", false).test(&r));
        assert!(!like("abc__", false).test(&r));
        assert!(like("a.c%", true).test(&r));
        assert!(!Like::new(Property::new("y"), Expression::literal("%"), false).unwrap().test(&r));
        let numeric = Like::new(Property::new("x"), Expression::literal("5%"), false).unwrap();
        assert!(numeric.test(&r));
    }

    #[test]
    fn test_like_requires_literal_pattern() {
        let res = Like::new(Property::new("name"), prop("other"), false);
        assert!(matches!(res, Err(FilterError::Construction(_))));
        assert!(Like::new(Property::new("name"), Expression::literal(5), false).is_err());
    }

    #[test]
    fn test_null() {
        let r = record();
        assert!(Null::new(Property::new("empty"), false).test(&r));
        assert!(!Null::new(Property::new("empty"), true).test(&r));
        assert!(Null::new(Property::new("x"), true).test(&r));
        assert!(!Null::new(Property::new("z"), false).test(&r));
        assert!(!Null::new(Property::new("z"), true).test(&r));
    }

    #[test]
    fn test_id() {
        let r = Feature::with_id("foo.1");
        let id = Id::new(vec![Expression::literal("foo.1"), Expression::literal("foo.2")]).unwrap();
        assert!(id.test(&r));
        assert!(!id.test(&record()));
        assert!(Id::new(vec![]).is_err());
    }

    #[test]
    fn test_type_of() {
        let r = record();
        assert!(TypeOf::new(prop("x"), FieldType::Int).test(&r));
        assert!(!TypeOf::new(prop("x"), FieldType::String).test(&r));
        assert!(!TypeOf::new(prop("empty"), FieldType::String).test(&r));
        assert!(!TypeOf::new(prop("missing"), FieldType::Int).test(&r));
    }

    #[test]
    fn test_display() {
        let a = cmp(ComparisonType::Equal, prop("foo"), Expression::literal(true));
        let b = cmp(ComparisonType::NotEqual, prop("x"), Expression::literal(1.0));
        let c = cmp(ComparisonType::Less, prop("y"), Expression::literal("z"));
        assert_eq!(a.to_string(), "foo = TRUE");
        let or = Filter::Logic(Logic::new(LogicType::Or, vec![a.clone(), b.clone()]).unwrap());
        let and = Filter::Logic(Logic::new(LogicType::And, vec![or, c]).unwrap());
        assert_eq!(and.to_string(), "(foo = TRUE OR x <> 1.0) AND y < 'z'");
        assert_eq!((!a).to_string(), "NOT (foo = TRUE)");
        let in_ = Filter::In(In::new(Property::new("s"), vec![Expression::literal("a")], true));
        assert_eq!(in_.to_string(), "s NOT IN ('a')");
        let null = Filter::Null(Null::new(Property::new("s"), false));
        assert_eq!(null.to_string(), "s IS NULL");
        let id = Filter::Id(Id::new(vec![Expression::literal("a.1")]).unwrap());
        assert_eq!(id.to_string(), "IN ('a.1')");
        assert_eq!(Filter::All.to_string(), "INCLUDE");
        assert_eq!(Filter::None.to_string(), "EXCLUDE");
    }
}
