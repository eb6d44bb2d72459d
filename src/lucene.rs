//! Lucene-style query encoding.
//!
//! Filters lower into a small [`Query`] model that mirrors the Lucene query classes a
//! search backend would build: term, term range, typed numeric range, boolean and spatial
//! queries. Comparisons whose literal is not numeric are written as classic query syntax
//! and read back through [`QueryParser`], so the produced queries are exactly what the
//! query syntax would give. `Display` prints queries the way Lucene's `toString` does.

use std::collections::HashMap;
use std::fmt;

use geo::{BoundingRect, Geometry, Rect};
use serde::{Deserialize, Serialize};
use tracing::trace;
use wkt::ToWkt;

use crate::convert;
use crate::cql::{ParseError, MAX_NESTING};
use crate::expr::Expression;
use crate::filter::{Comparison, ComparisonType, Filter, Logic, LogicType};
use crate::schema::Schema;
use crate::spatial::{Spatial, SpatialType};
use crate::splitter::Qualifier;
use crate::types::{format_float, Value};
use crate::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

impl Occur {
    fn prefix(self) -> &'static str {
        match self {
            Occur::Must => "+",
            Occur::Should => "",
            Occur::MustNot => "-",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub query: Query,
    pub occur: Occur,
}

impl Clause {
    pub fn new(query: Query, occur: Occur) -> Self {
        Self { query, occur }
    }
}

/// A numeric range over one field. Open ends are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericRange<T> {
    pub field: String,
    pub min: Option<T>,
    pub max: Option<T>,
    pub min_inclusive: bool,
    pub max_inclusive: bool,
}

impl<T: Copy> NumericRange<T> {
    /// The half-open range matching `field <op> value`.
    fn for_comparison(field: &str, kind: ComparisonType, value: T) -> Self {
        let upper = matches!(kind, ComparisonType::Less | ComparisonType::LessOrEqual);
        Self {
            field: field.to_string(),
            min: (!upper).then_some(value),
            max: upper.then_some(value),
            min_inclusive: kind != ComparisonType::Greater,
            max_inclusive: kind != ComparisonType::Less,
        }
    }
}

fn write_range(
    f: &mut fmt::Formatter<'_>,
    field: &str,
    min: Option<String>,
    max: Option<String>,
    min_inclusive: bool,
    max_inclusive: bool,
) -> fmt::Result {
    write!(
        f,
        "{field}:{}{} TO {}{}",
        if min_inclusive { '[' } else { '{' },
        min.as_deref().unwrap_or("*"),
        max.as_deref().unwrap_or("*"),
        if max_inclusive { ']' } else { '}' }
    )
}

macro_rules! numeric_range_display {
    ($($ty:ty => $text:expr),* $(,)?) => {
        $(
            impl fmt::Display for NumericRange<$ty> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    let text: fn($ty) -> String = $text;
                    write_range(
                        f,
                        &self.field,
                        self.min.map(text),
                        self.max.map(text),
                        self.min_inclusive,
                        self.max_inclusive,
                    )
                }
            }
        )*
    };
}

numeric_range_display! {
    i32 => |n| n.to_string(),
    i64 => |n| n.to_string(),
    f32 => |n| format_float(f64::from(n)),
    f64 => format_float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpatialOperation {
    BBoxIntersects,
    Intersects,
    IsWithin,
    Contains,
    IsEqualTo,
    IsDisjointTo,
}

impl SpatialOperation {
    pub fn name(self) -> &'static str {
        match self {
            SpatialOperation::BBoxIntersects => "BBoxIntersects",
            SpatialOperation::Intersects => "Intersects",
            SpatialOperation::IsWithin => "IsWithin",
            SpatialOperation::Contains => "Contains",
            SpatialOperation::IsEqualTo => "IsEqualTo",
            SpatialOperation::IsDisjointTo => "IsDisjointTo",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rectangle(Rect<f64>),
    Geometry(Geometry<f64>),
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Rectangle(r) => write!(f, "{}", Value::Envelope(*r)),
            Shape::Geometry(g) => f.write_str(&g.wkt_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialQuery {
    pub field: String,
    pub strategy: SpatialStrategy,
    pub operation: SpatialOperation,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    Term {
        field: String,
        text: String,
    },
    /// A term containing unescaped `*` or `?` wildcards.
    Wildcard {
        field: String,
        pattern: String,
    },
    TermRange {
        field: String,
        lower: Option<String>,
        upper: Option<String>,
        include_lower: bool,
        include_upper: bool,
    },
    IntRange(NumericRange<i32>),
    LongRange(NumericRange<i64>),
    FloatRange(NumericRange<f32>),
    DoubleRange(NumericRange<f64>),
    Boolean(Vec<Clause>),
    Spatial(SpatialQuery),
}

impl Query {
    pub fn term(field: impl Into<String>, text: impl Into<String>) -> Self {
        Query::Term {
            field: field.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::MatchAll => f.write_str("*:*"),
            Query::Term { field, text } => write!(f, "{field}:{text}"),
            Query::Wildcard { field, pattern } => write!(f, "{field}:{pattern}"),
            Query::TermRange {
                field,
                lower,
                upper,
                include_lower,
                include_upper,
            } => write_range(f, field, lower.clone(), upper.clone(), *include_lower, *include_upper),
            Query::IntRange(r) => write!(f, "{r}"),
            Query::LongRange(r) => write!(f, "{r}"),
            Query::FloatRange(r) => write!(f, "{r}"),
            Query::DoubleRange(r) => write!(f, "{r}"),
            Query::Boolean(clauses) => {
                for (i, c) in clauses.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    f.write_str(c.occur.prefix())?;
                    match &c.query {
                        Query::Boolean(_) => write!(f, "({})", c.query)?,
                        q => write!(f, "{q}")?,
                    }
                }
                Ok(())
            }
            Query::Spatial(s) => write!(f, "{}:{}({})", s.field, s.operation.name(), s.shape),
        }
    }
}

const SPECIAL: &[char] = &[
    '\\', '+', '-', '!', '(', ')', ':', '^', '[', ']', '"', '{', '}', '~', '*', '?', '|', '&', '/',
];

/// Escapes query syntax characters (and whitespace) in a term.
pub(crate) fn escape_term(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(&c) || c.is_whitespace() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Plus,
    Minus,
    Term { text: String, wildcard: bool },
    Quoted(String),
    Eof,
}

fn lex(input: &str) -> Result<Vec<(Tok, usize)>, ParseError> {
    let mut out = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let single = match c {
            '(' => Some(Tok::LParen),
            ')' => Some(Tok::RParen),
            '[' => Some(Tok::LBracket),
            ']' => Some(Tok::RBracket),
            '{' => Some(Tok::LBrace),
            '}' => Some(Tok::RBrace),
            ':' => Some(Tok::Colon),
            '+' => Some(Tok::Plus),
            '-' | '!' => Some(Tok::Minus),
            _ => None,
        };
        if let Some(tok) = single {
            chars.next();
            out.push((tok, start));
            continue;
        }
        if c == '"' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some((_, '"')) => break,
                    Some((_, '\\')) => match chars.next() {
                        Some((_, e)) => text.push(e),
                        None => return Err(ParseError::new("dangling escape", start, None)),
                    },
                    Some((_, ch)) => text.push(ch),
                    None => return Err(ParseError::new("unterminated phrase", start, None)),
                }
            }
            out.push((Tok::Quoted(text), start));
            continue;
        }
        if matches!(c, '^' | '~' | '/') {
            return Err(ParseError::new(
                format!("unsupported query syntax '{c}'"),
                start,
                Some(c.to_string()),
            ));
        }
        let mut text = String::new();
        let mut wildcard = false;
        while let Some(&(_, ch)) = chars.peek() {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | '[' | ']' | '{' | '}' | ':' | '"' | '^' | '~') {
                break;
            }
            chars.next();
            if ch == '\\' {
                match chars.next() {
                    Some((_, e)) => text.push(e),
                    None => return Err(ParseError::new("dangling escape", start, None)),
                }
            } else {
                wildcard |= matches!(ch, '*' | '?');
                text.push(ch);
            }
        }
        out.push((Tok::Term { text, wildcard }, start));
    }
    out.push((Tok::Eof, input.len()));
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Conj {
    None,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modifier {
    None,
    Required,
    Prohibited,
}

/// Parser for the classic query syntax: `field:term`, `"phrases"`, `[a TO b}` ranges,
/// `AND`/`OR`/`NOT`, `+`/`-` and groups. The default operator is OR. Terms are not
/// analyzed.
#[derive(Debug, Clone)]
pub struct QueryParser {
    default_field: String,
}

impl QueryParser {
    pub fn new(default_field: impl Into<String>) -> Self {
        Self {
            default_field: default_field.into(),
        }
    }

    pub fn parse(&self, text: &str) -> Result<Query, ParseError> {
        let tokens = lex(text)?;
        let mut p = LuceneParser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let q = p.query(&self.default_field)?;
        match p.peek() {
            Tok::Eof => Ok(q),
            _ => Err(p.unexpected("end of query")),
        }
    }
}

struct LuceneParser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    depth: usize,
}

impl LuceneParser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].0
    }

    fn advance(&mut self) -> Tok {
        let tok = self.tokens[self.pos].0.clone();
        if tok != Tok::Eof {
            self.pos += 1;
        }
        tok
    }

    /// Steps back over a token taken with `advance`.
    fn back(&mut self, tok: &Tok) {
        if *tok != Tok::Eof {
            self.pos -= 1;
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let (tok, at) = &self.tokens[self.pos];
        ParseError::new(format!("expected {expected}, found {tok:?}"), *at, None)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Tok::Term { text, wildcard: false } if text == word)
    }

    fn query(&mut self, field: &str) -> Result<Query, ParseError> {
        let mut clauses: Vec<Clause> = Vec::new();
        let mut first_plain = None;
        loop {
            if matches!(self.peek(), Tok::Eof | Tok::RParen) {
                break;
            }
            let conj = if clauses.is_empty() {
                Conj::None
            } else if self.is_word("AND") || self.is_word("&&") {
                self.advance();
                Conj::And
            } else if self.is_word("OR") || self.is_word("||") {
                self.advance();
                Conj::Or
            } else {
                Conj::None
            };
            let modifier = match self.peek() {
                Tok::Plus => {
                    self.advance();
                    Modifier::Required
                }
                Tok::Minus => {
                    self.advance();
                    Modifier::Prohibited
                }
                _ if self.is_word("NOT") => {
                    self.advance();
                    Modifier::Prohibited
                }
                _ => Modifier::None,
            };
            let q = self.clause(field)?;
            if clauses.is_empty() && modifier == Modifier::None && conj == Conj::None {
                first_plain = Some(q.clone());
            }
            add_clause(&mut clauses, conj, modifier, q);
        }
        match (clauses.len(), first_plain) {
            (0, _) => Err(self.unexpected("query")),
            (1, Some(q)) => Ok(q),
            _ => Ok(Query::Boolean(clauses)),
        }
    }

    fn clause(&mut self, field: &str) -> Result<Query, ParseError> {
        let mut field = field.to_string();
        if let Tok::Term { text, .. } = self.peek().clone() {
            if self.tokens.get(self.pos + 1).map(|t| &t.0) == Some(&Tok::Colon) {
                self.pos += 2;
                field = text;
            }
        }
        match self.advance() {
            Tok::LParen => {
                if self.depth >= MAX_NESTING {
                    return Err(ParseError::new("query nested too deeply", self.tokens[self.pos].1, None));
                }
                self.depth += 1;
                let q = self.query(&field);
                self.depth -= 1;
                let q = q?;
                if *self.peek() != Tok::RParen {
                    return Err(self.unexpected("')'"));
                }
                self.advance();
                Ok(q)
            }
            Tok::LBracket => self.range(field, true),
            Tok::LBrace => self.range(field, false),
            Tok::Quoted(text) => Ok(Query::Term { field, text }),
            Tok::Term { text, wildcard } => {
                if field == "*" && text == "*" {
                    Ok(Query::MatchAll)
                } else if wildcard {
                    Ok(Query::Wildcard { field, pattern: text })
                } else {
                    Ok(Query::Term { field, text })
                }
            }
            tok => {
                self.back(&tok);
                Err(self.unexpected("term"))
            }
        }
    }

    fn bound(&mut self) -> Result<Option<String>, ParseError> {
        match self.advance() {
            Tok::Term { text, wildcard: true } if text == "*" => Ok(None),
            Tok::Term { text, .. } | Tok::Quoted(text) => Ok(Some(text)),
            tok => {
                self.back(&tok);
                Err(self.unexpected("range bound"))
            }
        }
    }

    fn range(&mut self, field: String, include_lower: bool) -> Result<Query, ParseError> {
        let lower = self.bound()?;
        if !self.is_word("TO") {
            return Err(self.unexpected("TO"));
        }
        self.advance();
        let upper = self.bound()?;
        let include_upper = match self.advance() {
            Tok::RBracket => true,
            Tok::RBrace => false,
            tok => {
                self.back(&tok);
                return Err(self.unexpected("']' or '}'"));
            }
        };
        Ok(Query::TermRange {
            field,
            lower,
            upper,
            include_lower,
            include_upper,
        })
    }
}

/// Classic query-parser clause rules with OR as the default operator.
fn add_clause(clauses: &mut Vec<Clause>, conj: Conj, modifier: Modifier, query: Query) {
    if let Some(last) = clauses.last_mut() {
        if last.occur != Occur::MustNot {
            match conj {
                Conj::And => last.occur = Occur::Must,
                Conj::Or => last.occur = Occur::Should,
                Conj::None => {}
            }
        }
    }
    let prohibited = modifier == Modifier::Prohibited;
    let required = modifier == Modifier::Required || (conj == Conj::And && !prohibited);
    let occur = if prohibited {
        Occur::MustNot
    } else if required {
        Occur::Must
    } else {
        Occur::Should
    };
    clauses.push(Clause::new(query, occur));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialStrategy {
    /// Points indexed as two numeric fields.
    PointVector,
    /// Shapes indexed by their bounding box.
    BBox,
    /// Shapes indexed in a recursive prefix tree (geohash or quad).
    PrefixTree,
}

impl SpatialStrategy {
    fn operation(self, kind: SpatialType) -> Option<SpatialOperation> {
        use SpatialOperation as Op;
        match (self, kind) {
            (SpatialStrategy::PointVector, SpatialType::Intersects) => Some(Op::Intersects),
            (SpatialStrategy::PointVector, SpatialType::Within) => Some(Op::IsWithin),
            (SpatialStrategy::BBox, SpatialType::BBox) => Some(Op::BBoxIntersects),
            (SpatialStrategy::BBox, SpatialType::Contains) => Some(Op::Contains),
            (SpatialStrategy::BBox, SpatialType::Intersects) => Some(Op::Intersects),
            (SpatialStrategy::BBox, SpatialType::Equals) => Some(Op::IsEqualTo),
            (SpatialStrategy::BBox, SpatialType::Disjoint) => Some(Op::IsDisjointTo),
            (SpatialStrategy::BBox, SpatialType::Within) => Some(Op::IsWithin),
            (SpatialStrategy::PrefixTree, SpatialType::Intersects) => Some(Op::Intersects),
            (SpatialStrategy::PrefixTree, SpatialType::Within) => Some(Op::IsWithin),
            (SpatialStrategy::PrefixTree, SpatialType::Contains) => Some(Op::Contains),
            _ => None,
        }
    }
}

fn default_field() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuceneIndexConfig {
    /// Field used for unqualified terms in query text.
    #[serde(default = "default_field")]
    pub default_field: String,
    /// Spatial fields and the strategy each one is indexed with.
    #[serde(default)]
    pub spatial_fields: HashMap<String, SpatialStrategy>,
}

impl Default for LuceneIndexConfig {
    fn default() -> Self {
        Self {
            default_field: default_field(),
            spatial_fields: HashMap::new(),
        }
    }
}

impl LuceneIndexConfig {
    pub fn with_spatial_field(mut self, field: impl Into<String>, strategy: SpatialStrategy) -> Self {
        self.spatial_fields.insert(field.into(), strategy);
        self
    }
}

#[derive(Debug, Clone)]
pub struct LuceneQueryEncoder {
    config: LuceneIndexConfig,
    schema: Option<Schema>,
    parser: QueryParser,
}

impl Default for LuceneQueryEncoder {
    fn default() -> Self {
        Self::new(LuceneIndexConfig::default())
    }
}

fn unsupported(what: impl fmt::Display, reason: &str) -> FilterError {
    FilterError::Unsupported(format!("unable to encode {what} as a lucene query, {reason}"))
}

impl LuceneQueryEncoder {
    pub fn new(config: LuceneIndexConfig) -> Self {
        let parser = QueryParser::new(config.default_field.clone());
        Self {
            config,
            schema: None,
            parser,
        }
    }

    /// With a schema, comparisons on non-numeric fields always use term queries.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn encode(&self, filter: &Filter) -> Result<Query, FilterError> {
        let query = self.filter(filter)?;
        trace!(filter = %filter, query = %query, "encoded lucene query");
        Ok(query)
    }

    pub fn supports(&self, filter: &Filter) -> bool {
        self.filter(filter).is_ok()
    }

    fn filter(&self, filter: &Filter) -> Result<Query, FilterError> {
        match filter {
            Filter::All => Ok(Query::MatchAll),
            Filter::None => Ok(Query::Boolean(Vec::new())),
            Filter::Comparison(c) => self.comparison(c),
            Filter::Logic(l) => self.logic(l),
            Filter::Spatial(s) => self.spatial(s),
            other => Err(unsupported(other, "filter type has no lucene form")),
        }
    }

    fn logic(&self, logic: &Logic) -> Result<Query, FilterError> {
        let occur = match logic.kind() {
            LogicType::And => Occur::Must,
            LogicType::Or => Occur::Should,
            LogicType::Not => Occur::MustNot,
        };
        let mut clauses = Vec::with_capacity(logic.parts().len() + 1);
        if logic.kind() == LogicType::Not {
            clauses.push(Clause::new(Query::MatchAll, Occur::Should));
        }
        for part in logic.parts() {
            clauses.push(Clause::new(self.filter(part)?, occur));
        }
        Ok(Query::Boolean(clauses))
    }

    fn comparison(&self, c: &Comparison) -> Result<Query, FilterError> {
        let c = c.normalize()?;
        let field = c
            .property()
            .map(|p| p.name())
            .ok_or_else(|| unsupported(&c, "left operand is not a property"))?;
        let Expression::Literal(value) = c.right() else {
            return Err(unsupported(&c, "right operand is not a literal"));
        };
        let kind = c.kind();

        let numeric_field = self
            .schema
            .as_ref()
            .and_then(|s| s.field_type(field))
            .map_or(true, |t| t.is_numeric());
        if !matches!(kind, ComparisonType::Equal | ComparisonType::NotEqual) && numeric_field {
            if let Some(n) = convert::to_numeric(value) {
                let q = match n {
                    Value::Byte(v) => Query::IntRange(NumericRange::for_comparison(field, kind, i32::from(v))),
                    Value::Short(v) => Query::IntRange(NumericRange::for_comparison(field, kind, i32::from(v))),
                    Value::Int(v) => Query::IntRange(NumericRange::for_comparison(field, kind, v)),
                    Value::Long(v) => Query::LongRange(NumericRange::for_comparison(field, kind, v)),
                    Value::Float(v) => Query::FloatRange(NumericRange::for_comparison(field, kind, v)),
                    other => match convert::to_number(&other) {
                        Some(n) => Query::DoubleRange(NumericRange::for_comparison(field, kind, n.as_f64())),
                        None => return Err(unsupported(&c, "literal is not a number")),
                    },
                };
                return Ok(q);
            }
        }

        let field = escape_term(field);
        let term = escape_term(&value.to_string());
        let text = match kind {
            ComparisonType::Equal => format!("{field}:{term}"),
            ComparisonType::NotEqual => format!("*:* AND -({field}:{term})"),
            ComparisonType::Less => format!("{field}:[* TO {term}}}"),
            ComparisonType::LessOrEqual => format!("{field}:[* TO {term}]"),
            ComparisonType::Greater => format!("{field}:{{{term} TO *]"),
            ComparisonType::GreaterOrEqual => format!("{field}:[{term} TO *]"),
        };
        self.parser
            .parse(&text)
            .map_err(|e| unsupported(&c, &format!("query text '{text}' did not parse: {e}")))
    }

    fn spatial(&self, s: &Spatial) -> Result<Query, FilterError> {
        let s = s.normalize()?;
        let field = s
            .property()
            .map(|p| p.name())
            .ok_or_else(|| unsupported(&s, "left operand is not a property"))?;
        let strategy = *self
            .config
            .spatial_fields
            .get(field)
            .ok_or_else(|| unsupported(&s, "field is not a spatial field"))?;
        let geometry = s
            .right()
            .as_literal()
            .and_then(convert::to_geometry)
            .ok_or_else(|| unsupported(&s, "right operand is not a geometry literal"))?;
        let operation = strategy
            .operation(s.kind())
            .ok_or_else(|| unsupported(&s, &format!("{strategy:?} strategy does not support {}", s.kind())))?;
        let shape = match strategy {
            SpatialStrategy::PointVector | SpatialStrategy::BBox => Shape::Rectangle(
                geometry
                    .bounding_rect()
                    .ok_or_else(|| unsupported(&s, "empty geometry"))?,
            ),
            SpatialStrategy::PrefixTree => Shape::Geometry(geometry),
        };
        Ok(Query::Spatial(SpatialQuery {
            field: field.to_string(),
            strategy,
            operation,
            shape,
        }))
    }
}

impl Qualifier for LuceneQueryEncoder {
    fn qualifies(&self, filter: &Filter) -> bool {
        self.supports(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql;
    use crate::expr::Property;
    use crate::types::FieldType;

    fn encode(text: &str) -> Query {
        LuceneQueryEncoder::default().encode(&cql::parse(text).unwrap()).unwrap()
    }

    fn parse(text: &str) -> Query {
        QueryParser::new("text").parse(text).unwrap()
    }

    #[test]
    fn test_parser_terms_and_ranges() {
        assert_eq!(parse("foo:bar"), Query::term("foo", "bar"));
        assert_eq!(parse("bar"), Query::term("text", "bar"));
        assert_eq!(parse("*:*"), Query::MatchAll);
        assert_eq!(parse("f:\"two words\""), Query::term("f", "two words"));
        assert_eq!(parse("f:a\\:b"), Query::term("f", "a:b"));
        assert_eq!(
            parse("f:[* TO x}"),
            Query::TermRange {
                field: "f".into(),
                lower: None,
                upper: Some("x".into()),
                include_lower: true,
                include_upper: false,
            }
        );
        assert!(matches!(parse("f:ab*"), Query::Wildcard { .. }));
    }

    #[test]
    fn test_parser_boolean_rules() {
        assert_eq!(parse("a:1 AND b:2").to_string(), "+a:1 +b:2");
        assert_eq!(parse("a:1 OR b:2").to_string(), "a:1 b:2");
        assert_eq!(parse("a:1 b:2").to_string(), "a:1 b:2");
        assert_eq!(parse("+a:1 -b:2").to_string(), "+a:1 -b:2");
        assert_eq!(parse("a:1 AND NOT b:2").to_string(), "+a:1 -b:2");
        assert_eq!(parse("(a:1 OR b:2) AND c:3").to_string(), "+(a:1 b:2) +c:3");
        assert_eq!(parse("f:(x y)").to_string(), "f:x f:y");
        assert!(QueryParser::new("t").parse("f:[a TO").is_err());
        assert!(QueryParser::new("t").parse("").is_err());
        assert!(QueryParser::new("t").parse("a^2").is_err());
        let deep = format!("{}a{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(QueryParser::new("t").parse(&deep).is_err());
        assert_eq!(parse("((f:a))"), parse("f:a"));
    }

    #[test]
    fn test_not_equal() {
        let q = encode("field <> 5");
        assert_eq!(q, parse("*:* AND -(field:5)"));
        assert_eq!(
            q,
            Query::Boolean(vec![
                Clause::new(Query::MatchAll, Occur::Must),
                Clause::new(Query::term("field", "5"), Occur::MustNot),
            ])
        );
        assert_eq!(q.to_string(), "+*:* -field:5");
    }

    #[test]
    fn test_equal_text() {
        assert_eq!(encode("name = 'Bob Smith'"), Query::term("name", "Bob Smith"));
        assert_eq!(encode("n = 5"), Query::term("n", "5"));
        assert_eq!(encode("'x' = name"), Query::term("name", "x"));
    }

    #[test]
    fn test_numeric_ranges() {
        assert_eq!(encode("n < 5").to_string(), "n:[* TO 5}");
        assert_eq!(encode("n <= 5").to_string(), "n:[* TO 5]");
        assert_eq!(encode("n > 5").to_string(), "n:{5 TO *]");
        assert_eq!(encode("n >= 5").to_string(), "n:[5 TO *]");
        assert!(matches!(encode("n < 5"), Query::IntRange(_)));
        assert!(matches!(encode("n < 5000000000"), Query::LongRange(_)));
        assert!(matches!(encode("n < 1.5"), Query::DoubleRange(_)));
        assert!(matches!(encode("5 > n"), Query::IntRange(NumericRange { max: Some(5), max_inclusive: false, .. })));

        let f = Filter::Comparison(Comparison::new(
            ComparisonType::GreaterOrEqual,
            Expression::Property(Property::new("f")),
            Expression::literal(2.5f32),
        ));
        let q = LuceneQueryEncoder::default().encode(&f).unwrap();
        assert_eq!(
            q,
            Query::FloatRange(NumericRange {
                field: "f".into(),
                min: Some(2.5),
                max: None,
                min_inclusive: true,
                max_inclusive: true,
            })
        );
    }

    #[test]
    fn test_text_ranges() {
        assert_eq!(
            encode("name < 'm'"),
            Query::TermRange {
                field: "name".into(),
                lower: None,
                upper: Some("m".into()),
                include_lower: true,
                include_upper: false,
            }
        );
        let schema = Schema::builder("t").field("code", FieldType::String).build();
        let q = LuceneQueryEncoder::default()
            .with_schema(schema)
            .encode(&cql::parse("code >= 10").unwrap())
            .unwrap();
        assert!(matches!(q, Query::TermRange { .. }));
    }

    #[test]
    fn test_logic() {
        let q = encode("a = 1 AND b = 2");
        assert_eq!(q.to_string(), "+a:1 +b:2");
        let q = encode("a = 1 OR b = 2");
        assert_eq!(q.to_string(), "a:1 b:2");
        let q = encode("NOT (a = 1)");
        assert_eq!(q.to_string(), "*:* -a:1");
        assert_eq!(LuceneQueryEncoder::default().encode(&Filter::All).unwrap(), Query::MatchAll);
    }

    #[test]
    fn test_unsupported() {
        let enc = LuceneQueryEncoder::default();
        for text in ["a IS NULL", "a LIKE 'x%'", "a IN (1, 2)", "a = b", "1 = 2"] {
            let f = cql::parse(text).unwrap();
            assert!(enc.encode(&f).is_err(), "{text}");
            assert!(!enc.supports(&f), "{text}");
        }
    }

    #[test]
    fn test_spatial_strategies() {
        let config = LuceneIndexConfig::default()
            .with_spatial_field("pt", SpatialStrategy::PointVector)
            .with_spatial_field("box", SpatialStrategy::BBox)
            .with_spatial_field("shape", SpatialStrategy::PrefixTree);
        let enc = LuceneQueryEncoder::new(config);
        let q = |text: &str| enc.encode(&cql::parse(text).unwrap());

        let Query::Spatial(s) = q("INTERSECTS(pt, POLYGON((0 0, 2 0, 2 2, 0 0)))").unwrap() else {
            panic!("expected spatial query")
        };
        assert_eq!(s.operation, SpatialOperation::Intersects);
        assert!(matches!(s.shape, Shape::Rectangle(_)));
        assert!(q("CONTAINS(pt, POINT(1 1))").is_err());

        let Query::Spatial(s) = q("BBOX(box, 0, 0, 10, 10)").unwrap() else {
            panic!("expected spatial query")
        };
        assert_eq!(s.operation, SpatialOperation::BBoxIntersects);
        assert!(q("DISJOINT(box, POINT(1 1))").is_ok());
        assert!(q("TOUCHES(box, POINT(1 1))").is_err());

        let Query::Spatial(s) = q("CONTAINS(shape, POINT(1 1))").unwrap() else {
            panic!("expected spatial query")
        };
        assert_eq!(s.shape, Shape::Geometry(geo::Geometry::Point(geo::point!(x: 1.0, y: 1.0))));
        assert!(q("BBOX(shape, 0, 0, 1, 1)").is_err());
        assert!(q("INTERSECTS(other, POINT(1 1))").is_err());

        let Query::Spatial(s) = q("WITHIN(POINT(1 1), shape)").unwrap() else {
            panic!("expected spatial query")
        };
        assert_eq!(s.operation, SpatialOperation::Contains);
    }

    #[test]
    fn test_escape_term() {
        assert_eq!(escape_term("a:b c"), "a\\:b\\ c");
        assert_eq!(escape_term("-5"), "\\-5");
        let date = "2006-11-30T01:30:00Z";
        assert_eq!(parse(&format!("d:{}", escape_term(date))), Query::term("d", date));
    }

    #[test]
    fn test_config_from_json() {
        let config: LuceneIndexConfig =
            serde_json::from_str(r#"{"spatial_fields": {"geom": "prefix_tree"}}"#).unwrap();
        assert_eq!(config.default_field, "text");
        assert_eq!(config.spatial_fields["geom"], SpatialStrategy::PrefixTree);
    }
}
