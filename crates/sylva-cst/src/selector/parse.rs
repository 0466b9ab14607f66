//! Recursive-descent parser for the selector language. Every failure
//! carries the byte offset it was detected at.

use sylva_core::NodeKind;
use sylva_error::{ClientError, Error, Result};

use super::{Attribute, AttrField, Combinator, KindSelector, Pseudo, Selector, Step};

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Skip whitespace, reporting whether any was consumed.
    fn skip_ws(&mut self) -> bool {
        let before = self.pos;
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
        self.pos != before
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn err(&self, message: impl Into<String>) -> Error {
        ClientError::InvalidSelector {
            offset: self.pos,
            message: message.into(),
        }
        .into()
    }
}

/// Parse a selector string, validating the whole input.
pub fn parse_selector(input: &str) -> Result<Selector> {
    let mut cursor = Cursor::new(input);
    cursor.skip_ws();
    if cursor.rest().is_empty() {
        return Err(cursor.err("empty selector"));
    }

    let mut steps = Vec::new();
    let mut combinator = Combinator::Root;
    loop {
        let step = parse_step(&mut cursor, combinator)?;
        steps.push(step);

        let had_ws = cursor.skip_ws();
        if cursor.rest().is_empty() {
            break;
        }
        if cursor.eat('>') {
            combinator = Combinator::Child;
            cursor.skip_ws();
            if cursor.rest().is_empty() {
                return Err(cursor.err("expected a step after '>'"));
            }
        } else if had_ws {
            combinator = Combinator::Descendant;
        } else {
            return Err(cursor.err(format!(
                "unexpected character {:?}",
                cursor.peek().unwrap_or('?')
            )));
        }
    }

    Ok(Selector { steps })
}

fn parse_step(cursor: &mut Cursor<'_>, combinator: Combinator) -> Result<Step> {
    let kind = if cursor.eat('*') {
        KindSelector::Any
    } else {
        let start = cursor.pos;
        let ident = cursor.ident();
        if ident.is_empty() {
            return Err(cursor.err("expected a kind or '*'"));
        }
        match NodeKind::parse(ident) {
            Some(kind) => KindSelector::Kind(kind),
            None => {
                return Err(ClientError::InvalidSelector {
                    offset: start,
                    message: format!("unknown kind {ident:?}"),
                }
                .into())
            }
        }
    };

    let mut attributes = Vec::new();
    while cursor.peek() == Some('[') {
        attributes.push(parse_attribute(cursor)?);
    }

    let mut pseudos = Vec::new();
    while cursor.peek() == Some(':') {
        pseudos.push(parse_pseudo(cursor)?);
    }

    Ok(Step {
        combinator,
        kind,
        attributes,
        pseudos,
    })
}

fn parse_attribute(cursor: &mut Cursor<'_>) -> Result<Attribute> {
    cursor.eat('[');
    let start = cursor.pos;
    let field = match cursor.ident() {
        "name" => AttrField::Name,
        "qualname" => AttrField::Qualname,
        "type" => AttrField::Type,
        other => {
            return Err(ClientError::InvalidSelector {
                offset: start,
                message: format!("unknown attribute {other:?}"),
            }
            .into())
        }
    };
    if !cursor.eat('=') {
        return Err(cursor.err("expected '=' in attribute"));
    }
    let quote = match cursor.peek() {
        Some(q @ ('"' | '\'')) => {
            cursor.bump();
            q
        }
        _ => return Err(cursor.err("expected a quoted attribute value")),
    };
    let value_start = cursor.pos;
    while cursor.peek().is_some_and(|c| c != quote) {
        cursor.bump();
    }
    let value = cursor.input[value_start..cursor.pos].to_string();
    if !cursor.eat(quote) {
        return Err(cursor.err("unterminated attribute value"));
    }
    if !cursor.eat(']') {
        return Err(cursor.err("expected ']' after attribute"));
    }
    Ok(Attribute { field, value })
}

fn parse_pseudo(cursor: &mut Cursor<'_>) -> Result<Pseudo> {
    cursor.eat(':');
    let start = cursor.pos;
    match cursor.ident() {
        "first" => Ok(Pseudo::First),
        "last" => Ok(Pseudo::Last),
        "nth" => {
            if !cursor.eat('(') {
                return Err(cursor.err("expected '(' after :nth"));
            }
            let digits_start = cursor.pos;
            while cursor.peek().is_some_and(|c| c.is_ascii_digit()) {
                cursor.bump();
            }
            let digits = &cursor.input[digits_start..cursor.pos];
            let n: usize = digits.parse().map_err(|_| {
                Error::from(ClientError::InvalidSelector {
                    offset: digits_start,
                    message: "expected a number in :nth(n)".into(),
                })
            })?;
            if n == 0 {
                return Err(ClientError::InvalidSelector {
                    offset: digits_start,
                    message: ":nth(n) is 1-based".into(),
                }
                .into());
            }
            if !cursor.eat(')') {
                return Err(cursor.err("expected ')' after :nth(n"));
            }
            Ok(Pseudo::Nth(n))
        }
        other => Err(ClientError::InvalidSelector {
            offset: start,
            message: format!("unknown pseudo-class {other:?}"),
        }
        .into()),
    }
}
