//! Tokenizer for CQL and ECQL text.
//!
//! Keywords are not distinguished here: they come out as identifiers and the parser
//! matches them case-insensitively. WKT literals are recognized as a single token so the
//! parser can hand their text to the WKT reader unchanged.

use chrono::{DateTime, Utc};

use crate::convert;
use crate::cql::ParseError;

/// Words that cannot be used as bare attribute names.
const RESERVED: &[&str] = &[
    "AND", "OR", "NOT", "BETWEEN", "IN", "LIKE", "IS", "NULL", "INCLUDE", "EXCLUDE", "TRUE",
    "FALSE", "BEFORE", "AFTER", "DURING",
];

const GEOMETRY_TAGS: &[&str] = &[
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
];

pub(crate) fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | ':')
}

/// Whether `name` can be written as an attribute without double quotes.
pub(crate) fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => {}
        _ => return false,
    }
    chars.all(is_ident_char)
        && !is_reserved(name)
        && !GEOMETRY_TAGS.iter().any(|t| t.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    QuotedIdent(String),
    Str(String),
    Number(String),
    Date(DateTime<Utc>),
    Wkt(String),
    Op(Op),
    LParen,
    RParen,
    Comma,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// Whether this token is the given keyword.
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s.eq_ignore_ascii_case(word))
    }
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer { input, pos: 0 };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>, start: usize) -> ParseError {
        ParseError::new(message, start, Some(self.input[start..self.pos].to_string()))
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            start,
            end: self.pos,
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(c) = self.bump() else {
            return Ok(self.token(TokenKind::Eof, start));
        };
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '=' => TokenKind::Op(Op::Eq),
            '+' => TokenKind::Op(Op::Plus),
            '-' => TokenKind::Op(Op::Minus),
            '*' => TokenKind::Op(Op::Star),
            '/' => TokenKind::Op(Op::Slash),
            '<' => match self.peek() {
                Some('=') => {
                    self.bump();
                    TokenKind::Op(Op::Le)
                }
                Some('>') => {
                    self.bump();
                    TokenKind::Op(Op::Ne)
                }
                _ => TokenKind::Op(Op::Lt),
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Op(Op::Ge)
                } else {
                    TokenKind::Op(Op::Gt)
                }
            }
            '!' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::Op(Op::Ne)
            }
            '\'' => TokenKind::Str(self.quoted('\'', start)?),
            '"' => TokenKind::QuotedIdent(self.quoted('"', start)?),
            c if c.is_ascii_digit() && self.looks_like_date(start) => self.date(start)?,
            c if c.is_ascii_digit() || (c == '.' && self.peek().is_some_and(|n| n.is_ascii_digit())) => {
                self.number();
                TokenKind::Number(self.input[start..self.pos].to_string())
            }
            c if is_ident_start(c) => self.word(start)?,
            _ => return Err(self.error(format!("unexpected character '{c}'"), start)),
        };
        Ok(self.token(kind, start))
    }

    /// Reads the rest of a quoted run; a doubled quote stands for itself.
    fn quoted(&mut self, quote: char, start: usize) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        self.bump();
                        out.push(quote);
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated quoted text", start)),
            }
        }
    }

    fn number(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let digit_at = if matches!(self.peek_at(1), Some('+' | '-')) { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
    }

    fn looks_like_date(&self, start: usize) -> bool {
        let b = self.input[start..].as_bytes();
        b.len() > 10
            && b[..4].iter().all(u8::is_ascii_digit)
            && b[4] == b'-'
            && b[5..7].iter().all(u8::is_ascii_digit)
            && b[7] == b'-'
            && b[8..10].iter().all(u8::is_ascii_digit)
            && b[10] == b'T'
    }

    fn date(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | ':' | '.' | 'T' | 'Z' | '+'))
        {
            self.bump();
        }
        convert::to_date(&self.input[start..self.pos])
            .map(TokenKind::Date)
            .ok_or_else(|| self.error("invalid date", start))
    }

    fn word(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        let word = &self.input[start..self.pos];
        if GEOMETRY_TAGS.iter().any(|t| t.eq_ignore_ascii_case(word)) {
            if let Some(end) = self.wkt_body_end() {
                self.pos = end;
                return Ok(TokenKind::Wkt(self.input[start..end].to_string()));
            }
        }
        Ok(TokenKind::Ident(word.to_string()))
    }

    /// Finds the end of a WKT body following a geometry tag: an optional dimension
    /// marker, then `EMPTY` or a balanced parenthesized coordinate list.
    fn wkt_body_end(&self) -> Option<usize> {
        let rest = &self.input[self.pos..];
        let mut offset = rest.len() - rest.trim_start().len();
        let after_ws = &rest[offset..];
        for dim in ["ZM", "Z", "M"] {
            if after_ws.get(..dim.len()).is_some_and(|s| s.eq_ignore_ascii_case(dim))
                && !after_ws[dim.len()..].starts_with(is_ident_char)
            {
                offset += dim.len();
                break;
            }
        }
        let rest_after_dim = &rest[offset..];
        offset += rest_after_dim.len() - rest_after_dim.trim_start().len();
        let body = &rest[offset..];
        if body.get(..5).is_some_and(|s| s.eq_ignore_ascii_case("EMPTY"))
            && !body[5..].starts_with(is_ident_char)
        {
            return Some(self.pos + offset + 5);
        }
        if !body.starts_with('(') {
            return None;
        }
        let mut depth = 0usize;
        for (i, c) in body.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(self.pos + offset + i + 1);
                    }
                }
                _ => {}
            }
        }
        None
    }
}
