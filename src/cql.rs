//! CQL and ECQL parsing.
//!
//! A hand-written recursive-descent recognizer over the lexer's tokens. Every closed
//! production is reduced into a [`FilterBuilder`], which owns the operand stack.
//!
//! Both dialects share the recognizer. CQL is the stricter one: predicate subjects must
//! be attribute expressions, spatial predicates take an attribute and a geometry literal,
//! and there is no id predicate and no `INCLUDE`/`EXCLUDE`. [`parse`] tries CQL first and
//! falls back to ECQL.

use std::str::FromStr;

use geo::{coord, Geometry, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use wkt::TryFromWkt;

use crate::builder::FilterBuilder;
use crate::filter::{ComparisonType, Filter, LogicType};
use crate::lexer::{self, Op, Token, TokenKind};
use crate::spatial::SpatialType;
use crate::types::Value;

/// Deepest nesting of groups, negations and sub-expressions a parser accepts.
pub(crate) const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}{}", .token.as_ref().map(|t| format!(" near '{t}'")).unwrap_or_default())]
pub struct ParseError {
    message: String,
    position: usize,
    token: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize, token: Option<String>) -> Self {
        Self {
            message: message.into(),
            position,
            token,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset into the input.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Dialect {
    #[default]
    Cql,
    Ecql,
}

/// Parses CQL, retrying as ECQL. When both fail the CQL error is returned.
pub fn parse(text: &str) -> Result<Filter, ParseError> {
    match parse_with(text, Dialect::Cql) {
        Ok(filter) => Ok(filter),
        Err(cql_err) => {
            debug!(error = %cql_err, "CQL parse failed, retrying as ECQL");
            parse_with(text, Dialect::Ecql).map_err(|ecql_err| {
                debug!(error = %ecql_err, "ECQL parse failed");
                cql_err
            })
        }
    }
}

pub fn parse_ecql(text: &str) -> Result<Filter, ParseError> {
    parse_with(text, Dialect::Ecql)
}

pub fn parse_with(text: &str, dialect: Dialect) -> Result<Filter, ParseError> {
    let tokens = lexer::tokenize(text)?;
    let mut parser = CqlParser {
        text,
        tokens,
        pos: 0,
        depth: 0,
        dialect,
        builder: FilterBuilder::new(),
    };
    parser.filter()?;
    if parser.peek().kind != TokenKind::Eof {
        return Err(parser.unexpected("end of input"));
    }
    parser
        .builder
        .filter()
        .map_err(|e| ParseError::new(e.to_string(), 0, None))
}

impl FromStr for Filter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

struct CqlParser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    dialect: Dialect,
    builder: FilterBuilder,
}

impl<'a> CqlParser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.peek().is_keyword(word)
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.at_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.unexpected(word))
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ParseError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn token_text(&self, token: &Token) -> &'a str {
        &self.text[token.start..token.end]
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        if token.kind == TokenKind::Eof {
            ParseError::new(format!("expected {expected}, found end of input"), token.start, None)
        } else {
            let text = self.token_text(token);
            ParseError::new(
                format!("expected {expected}, found '{text}'"),
                token.start,
                Some(text.to_string()),
            )
        }
    }

    /// Runs `f` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ParseError>) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            let token = self.peek();
            return Err(ParseError::new(
                "filter nested too deeply",
                token.start,
                Some(self.token_text(token).to_string()).filter(|t| !t.is_empty()),
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn require_ecql(&self, what: &str) -> Result<(), ParseError> {
        match self.dialect {
            Dialect::Ecql => Ok(()),
            Dialect::Cql => {
                let token = self.peek();
                Err(ParseError::new(
                    format!("{what} is only supported in ECQL"),
                    token.start,
                    Some(self.token_text(token).to_string()),
                ))
            }
        }
    }

    /// Runs one reduction and turns a builder failure into a parse error spanning the
    /// production that started at `start`.
    fn reduce(
        &mut self,
        start: usize,
        f: impl FnOnce(&mut FilterBuilder) -> &mut FilterBuilder,
    ) -> Result<(), ParseError> {
        f(&mut self.builder);
        match self.builder.take_error() {
            None => Ok(()),
            Some(e) => {
                let end = self.tokens[self.pos.saturating_sub(1)].end.max(start);
                Err(ParseError::new(
                    e.to_string(),
                    start,
                    Some(self.text[start..end].to_string()),
                ))
            }
        }
    }

    fn filter(&mut self) -> Result<(), ParseError> {
        let start = self.peek().start;
        self.and_filter()?;
        let mut count = 1;
        while self.eat_keyword("OR") {
            self.and_filter()?;
            count += 1;
        }
        if count > 1 {
            self.reduce(start, |b| b.logic(LogicType::Or, count))?;
        }
        Ok(())
    }

    fn and_filter(&mut self) -> Result<(), ParseError> {
        let start = self.peek().start;
        self.not_filter()?;
        let mut count = 1;
        while self.eat_keyword("AND") {
            self.not_filter()?;
            count += 1;
        }
        if count > 1 {
            self.reduce(start, |b| b.logic(LogicType::And, count))?;
        }
        Ok(())
    }

    fn not_filter(&mut self) -> Result<(), ParseError> {
        let start = self.peek().start;
        if self.eat_keyword("NOT") {
            self.nested(Self::not_filter)?;
            return self.reduce(start, |b| b.not());
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<(), ParseError> {
        let token = self.peek().clone();
        if token.is_keyword("INCLUDE") || token.is_keyword("EXCLUDE") {
            self.require_ecql(self.token_text(&token))?;
            self.advance();
            let include = token.is_keyword("INCLUDE");
            return self.reduce(token.start, |b| if include { b.all() } else { b.none() });
        }
        if token.kind == TokenKind::LParen {
            return self.nested(Self::group);
        }
        let next_is_paren = self.peek_next().kind == TokenKind::LParen;
        if token.is_keyword("IN") && next_is_paren {
            return self.id_predicate();
        }
        if let TokenKind::Ident(word) = &token.kind {
            if next_is_paren {
                if let Some(kind) = SpatialType::from_name(word) {
                    return self.spatial_predicate(kind);
                }
            }
        }
        self.predicate()
    }

    /// `( filter )`, or a predicate whose subject starts with a parenthesized expression.
    fn group(&mut self) -> Result<(), ParseError> {
        let (saved, mark) = (self.pos, self.builder.mark());
        self.advance();
        let as_filter = self
            .filter()
            .and_then(|_| self.expect(TokenKind::RParen, "')'"));
        let Err(filter_err) = as_filter else {
            return Ok(());
        };
        self.pos = saved;
        self.builder.reset(mark);
        self.predicate().map_err(|predicate_err| {
            if predicate_err.position() >= filter_err.position() {
                predicate_err
            } else {
                filter_err
            }
        })
    }

    fn id_predicate(&mut self) -> Result<(), ParseError> {
        self.require_ecql("id predicate")?;
        let start = self.peek().start;
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let mut count = 0;
        loop {
            match self.peek().kind.clone() {
                TokenKind::Str(s) | TokenKind::Number(s) => self.builder.literal(s),
                _ => return Err(self.unexpected("feature id")),
            };
            self.advance();
            count += 1;
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.reduce(start, |b| b.id(count))
    }

    fn spatial_predicate(&mut self, kind: SpatialType) -> Result<(), ParseError> {
        let start = self.peek().start;
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        match self.dialect {
            Dialect::Cql => self.attribute()?,
            Dialect::Ecql => self.expression()?,
        }
        self.expect(TokenKind::Comma, "','")?;

        if kind == SpatialType::BBox {
            self.expression()?;
            if self.eat(&TokenKind::Comma) {
                for _ in 0..2 {
                    self.expression()?;
                    self.expect(TokenKind::Comma, "','")?;
                }
                self.expression()?;
                if self.eat(&TokenKind::Comma) {
                    let TokenKind::Str(_) = self.peek().kind else {
                        return Err(self.unexpected("coordinate reference system"));
                    };
                    self.advance();
                }
                self.reduce(start, |b| b.envelope())?;
            } else {
                self.require_ecql("BBOX over an expression")?;
            }
            self.expect(TokenKind::RParen, "')'")?;
            return self.reduce(start, |b| b.spatial(kind));
        }

        self.geometry_operand()?;
        if kind.requires_distance() {
            self.expect(TokenKind::Comma, "','")?;
            self.expression()?;
            self.expect(TokenKind::Comma, "','")?;
            self.units()?;
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.reduce(start, |b| b.spatial(kind))
    }

    fn geometry_operand(&mut self) -> Result<(), ParseError> {
        match self.dialect {
            Dialect::Ecql => self.expression(),
            Dialect::Cql => match &self.peek().kind {
                TokenKind::Wkt(_) => self.factor(),
                _ => Err(self.unexpected("geometry literal")),
            },
        }
    }

    /// Distance units are accepted and ignored; distances are in coordinate units.
    fn units(&mut self) -> Result<(), ParseError> {
        let mut words = 0;
        while let TokenKind::Ident(_) = self.peek().kind {
            self.advance();
            words += 1;
        }
        if words == 0 {
            return Err(self.unexpected("distance units"));
        }
        Ok(())
    }

    fn predicate(&mut self) -> Result<(), ParseError> {
        let start = self.peek().start;
        self.expression()?;
        if self.dialect == Dialect::Cql && self.builder.top_is_literal() {
            return Err(ParseError::new(
                "predicate subject must be an attribute expression",
                start,
                Some(self.text[start..self.tokens[self.pos - 1].end].to_string()),
            ));
        }

        if let TokenKind::Op(op) = self.peek().kind {
            let kind = match op {
                Op::Eq => ComparisonType::Equal,
                Op::Ne => ComparisonType::NotEqual,
                Op::Lt => ComparisonType::Less,
                Op::Le => ComparisonType::LessOrEqual,
                Op::Gt => ComparisonType::Greater,
                Op::Ge => ComparisonType::GreaterOrEqual,
                _ => return Err(self.unexpected("comparison operator")),
            };
            self.advance();
            self.expression()?;
            return self.reduce(start, |b| b.compare(kind));
        }

        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("BETWEEN") {
            self.expression()?;
            self.expect_keyword("AND")?;
            self.expression()?;
            self.reduce(start, |b| b.between())?;
            if negated {
                self.reduce(start, |b| b.not())?;
            }
            return Ok(());
        }
        if self.eat_keyword("IN") {
            self.expect(TokenKind::LParen, "'('")?;
            let mut count = 0;
            loop {
                self.expression()?;
                count += 1;
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
            return self.reduce(start, |b| if negated { b.not_in(count) } else { b.in_(count) });
        }
        if self.eat_keyword("LIKE") {
            let TokenKind::Str(pattern) = self.peek().kind.clone() else {
                return Err(self.unexpected("pattern string"));
            };
            self.advance();
            self.builder.literal(pattern);
            return self.reduce(start, |b| if negated { b.not_like() } else { b.like() });
        }
        if negated {
            return Err(self.unexpected("BETWEEN, IN or LIKE"));
        }
        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return self.reduce(start, |b| if negated { b.is_not_null() } else { b.is_null() });
        }
        if self.eat_keyword("BEFORE") {
            self.factor()?;
            return self.reduce(start, |b| b.lt());
        }
        if self.eat_keyword("AFTER") {
            self.factor()?;
            return self.reduce(start, |b| b.gt());
        }
        if self.eat_keyword("DURING") {
            self.factor()?;
            self.expect(TokenKind::Op(Op::Slash), "'/'")?;
            self.factor()?;
            return self.reduce(start, |b| b.during());
        }
        Err(self.unexpected("comparison operator"))
    }

    fn attribute(&mut self) -> Result<(), ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) if !lexer::is_reserved(&name) => {
                self.advance();
                self.builder.property(name);
                Ok(())
            }
            TokenKind::QuotedIdent(name) => {
                self.advance();
                self.builder.property(name);
                Ok(())
            }
            _ => Err(self.unexpected("attribute")),
        }
    }

    fn expression(&mut self) -> Result<(), ParseError> {
        let start = self.peek().start;
        self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Op(Op::Plus) => Op::Plus,
                TokenKind::Op(Op::Minus) => Op::Minus,
                _ => return Ok(()),
            };
            self.advance();
            self.term()?;
            self.reduce(start, |b| if op == Op::Plus { b.add() } else { b.subtract() })?;
        }
    }

    fn term(&mut self) -> Result<(), ParseError> {
        let start = self.peek().start;
        self.factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Op(Op::Star) => Op::Star,
                TokenKind::Op(Op::Slash) => Op::Slash,
                _ => return Ok(()),
            };
            self.advance();
            self.factor()?;
            self.reduce(start, |b| if op == Op::Star { b.multiply() } else { b.divide() })?;
        }
    }

    fn factor(&mut self) -> Result<(), ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(_) | TokenKind::Op(Op::Minus) | TokenKind::Op(Op::Plus) => {
                let value = self.signed_number()?;
                self.builder.literal(value);
            }
            TokenKind::Str(s) => {
                self.advance();
                self.builder.literal(s);
            }
            TokenKind::Date(d) => {
                self.advance();
                self.builder.literal(d);
            }
            TokenKind::Wkt(text) => {
                let geom = Geometry::<f64>::try_from_wkt_str(&text).map_err(|e| {
                    ParseError::new(format!("invalid WKT: {e}"), token.start, Some(text.clone()))
                })?;
                self.advance();
                self.builder.literal(geom);
            }
            TokenKind::QuotedIdent(name) => {
                self.advance();
                self.builder.property(name);
            }
            TokenKind::LParen => {
                self.advance();
                self.nested(Self::expression)?;
                self.expect(TokenKind::RParen, "')'")?;
            }
            TokenKind::Ident(ref word) => {
                let next_is_paren = self.peek_next().kind == TokenKind::LParen;
                if token.is_keyword("TRUE") || token.is_keyword("FALSE") {
                    self.advance();
                    self.builder.literal(token.is_keyword("TRUE"));
                } else if lexer::is_reserved(word) {
                    return Err(self.unexpected("expression"));
                } else if word.eq_ignore_ascii_case("ENVELOPE") && next_is_paren {
                    self.envelope_literal()?;
                } else if next_is_paren {
                    let name = word.clone();
                    self.nested(|p| p.function_call(name))?;
                } else {
                    self.advance();
                    self.builder.property(word.clone());
                }
            }
            _ => return Err(self.unexpected("expression")),
        }
        Ok(())
    }

    fn signed_number(&mut self) -> Result<Value, ParseError> {
        let start = self.peek().start;
        let negative = match self.peek().kind {
            TokenKind::Op(Op::Minus) => {
                self.advance();
                true
            }
            TokenKind::Op(Op::Plus) => {
                self.advance();
                false
            }
            _ => false,
        };
        let token = self.peek().clone();
        let TokenKind::Number(digits) = token.kind else {
            return Err(self.unexpected("number"));
        };
        self.advance();
        let text = if negative { format!("-{digits}") } else { digits };
        parse_number(&text).ok_or_else(|| {
            ParseError::new(format!("invalid number '{text}'"), start, Some(text.clone()))
        })
    }

    fn function_call(&mut self, name: String) -> Result<(), ParseError> {
        let start = self.peek().start;
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let mut argc = 0;
        if !self.eat(&TokenKind::RParen) {
            loop {
                self.expression()?;
                argc += 1;
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
        }
        self.reduce(start, |b| b.function(name, argc))
    }

    /// `ENVELOPE(minx, maxx, maxy, miny)`.
    fn envelope_literal(&mut self) -> Result<(), ParseError> {
        self.require_ecql("ENVELOPE")?;
        let start = self.peek().start;
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let mut coords = [0.0f64; 4];
        for (i, c) in coords.iter_mut().enumerate() {
            if i > 0 {
                self.expect(TokenKind::Comma, "','")?;
            }
            let value = self.signed_number()?;
            *c = crate::convert::to_number(&value)
                .map(|n| n.as_f64())
                .ok_or_else(|| ParseError::new("invalid envelope coordinate", start, None))?;
        }
        self.expect(TokenKind::RParen, "')'")?;
        let [min_x, max_x, max_y, min_y] = coords;
        self.builder
            .literal(Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y }));
        Ok(())
    }
}

/// Integers become `Int` when they fit, otherwise `Long`; anything with a fraction or an
/// exponent is a `Double`.
fn parse_number(text: &str) -> Option<Value> {
    if text.contains(['.', 'e', 'E']) {
        return text.parse::<f64>().ok().map(Value::Double);
    }
    text.parse::<i32>()
        .map(Value::Int)
        .or_else(|_| text.parse::<i64>().map(Value::Long))
        .ok()
        .or_else(|| text.parse::<f64>().ok().map(Value::Double))
}
