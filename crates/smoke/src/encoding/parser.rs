// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type Encoding Parser
//!
//! Single-pass recursive descent with one byte of lookahead. Failures inside a
//! nested subtree (pointee, array element, aggregate field, block argument)
//! degrade that subtree to [`Type::unknown`] and parsing continues; failures
//! of the outermost token are returned to the caller.

use super::symbol;
use crate::error::EncodingError;
use crate::signature::{ArgumentAttributes, MethodSignature};
use crate::types::{AggregateKind, CompositeKind, Member, PrimitiveKind, Type};
use std::borrow::Cow;

struct Lexer<'a> {
    text: &'a str,
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            input: text.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.pos + ahead).copied()
    }

    /// Consume one character; returns its first byte.
    fn next(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        // the cursor stays on a character boundary
        self.pos += self.remainder().chars().next().map_or(1, char::len_utf8);
        Some(byte)
    }

    fn current_char(&self) -> Option<char> {
        self.remainder().chars().next()
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn read_number(&mut self) -> Option<Result<usize, ()>> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        let digits = String::from_utf8_lossy(&self.input[start..self.pos]);
        Some(digits.parse().map_err(|_| ()))
    }

    fn read_until(&mut self, stops: &[u8]) -> Cow<'a, str> {
        let start = self.pos;
        while self.peek().is_some_and(|b| !stops.contains(&b)) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos])
    }

    /// Read `"..."`; the cursor must be on the opening quote.
    fn read_quoted(&mut self) -> Result<Cow<'a, str>, EncodingError> {
        let start = self.pos;
        self.next(); // opening quote
        let content = self.read_until(&[symbol::QUOTE]);
        if !self.eat(symbol::QUOTE) {
            return Err(EncodingError::malformed(start, "unterminated quoted name"));
        }
        Ok(content)
    }

    fn remainder(&self) -> &'a str {
        self.text.get(self.pos..).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    /// Inside an aggregate whose fields carry quoted names.
    named_fields: bool,
}

pub(crate) struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
        }
    }

    pub(crate) fn remainder(&self) -> &'a str {
        self.lexer.remainder()
    }

    /// Parse one complete type; errors are not degraded at this level.
    pub(crate) fn parse_type(&mut self) -> Result<Type, EncodingError> {
        self.parse_in(Context::default())
    }

    fn parse_in(&mut self, ctx: Context) -> Result<Type, EncodingError> {
        let start = self.lexer.pos;
        let Some(code) = self.lexer.peek() else {
            return Err(EncodingError::malformed(start, "unexpected end of encoding"));
        };

        if is_closer(code) {
            return Err(EncodingError::malformed(
                start,
                format!("unexpected '{}'", code as char),
            ));
        }
        let shown = self.lexer.current_char().unwrap_or('?');
        self.lexer.next();

        match code {
            symbol::VOID => Ok(Type::void()),
            symbol::UNKNOWN => Ok(Type::unknown()),
            symbol::OBJECT => self.parse_object(ctx),
            symbol::CLASS => Ok(Type::class()),
            symbol::BITFIELD => {
                let width = self.read_count(start, "bitfield width")?;
                let width = u32::try_from(width)
                    .map_err(|_| EncodingError::malformed(start, "bitfield width overflows"))?;
                Ok(Type::bitfield(width))
            }
            symbol::ARRAY_OPEN => self.parse_array(start),
            symbol::STRUCT_OPEN => self.parse_aggregate(AggregateKind::Struct, start),
            symbol::UNION_OPEN => self.parse_aggregate(AggregateKind::Union, start),
            _ => {
                if let Some(kind) = CompositeKind::from_code(code) {
                    let inner = self.parse_nested(ctx);
                    return Ok(Type::composite(kind, inner));
                }
                PrimitiveKind::from_code(code)
                    .map(Type::primitive)
                    .ok_or_else(|| {
                        EncodingError::malformed(
                            start,
                            format!("unrecognized type code '{}'", shown),
                        )
                    })
            }
        }
    }

    /// Parse a subtree, degrading any failure to the unknown type.
    fn parse_nested(&mut self, ctx: Context) -> Type {
        let start = self.lexer.pos;
        match self.parse_in(ctx) {
            Ok(ty) => ty,
            Err(err) => {
                log::warn!("[encoding] subtree at byte {} degraded to '?': {}", start, err);
                Type::unknown()
            }
        }
    }

    fn read_count(&mut self, start: usize, what: &str) -> Result<usize, EncodingError> {
        match self.lexer.read_number() {
            Some(Ok(n)) => Ok(n),
            Some(Err(())) => Err(EncodingError::malformed(start, format!("{} overflows", what))),
            None => Err(EncodingError::malformed(
                self.lexer.pos,
                format!("expected {}", what),
            )),
        }
    }

    fn parse_object(&mut self, ctx: Context) -> Result<Type, EncodingError> {
        if self.lexer.eat(symbol::BLOCK_SUFFIX) {
            let signature = if self.lexer.eat(symbol::ANGLE_OPEN) {
                Some(self.parse_block_signature()?)
            } else {
                None
            };
            return Ok(Type::block(signature));
        }

        if self.lexer.peek() == Some(symbol::QUOTE) && self.quoted_is_class(ctx) {
            let spec = self.lexer.read_quoted()?;
            return Ok(class_spec(&spec));
        }

        Ok(Type::object())
    }

    /// Inside named-field aggregates `@"Foo"` may be an object of class `Foo`
    /// or an untyped `@` followed by a field named `Foo`. It is a class name
    /// when the closing quote is followed by another name, the closer, or the
    /// end of input.
    fn quoted_is_class(&self, ctx: Context) -> bool {
        if !ctx.named_fields {
            return true;
        }

        let rest = &self.lexer.input[self.lexer.pos + 1..];
        match rest.iter().position(|&b| b == symbol::QUOTE) {
            None => true,
            Some(close) => matches!(
                rest.get(close + 1),
                None | Some(&symbol::QUOTE) | Some(&symbol::STRUCT_CLOSE) | Some(&symbol::UNION_CLOSE)
            ),
        }
    }

    fn parse_block_signature(&mut self) -> Result<MethodSignature, EncodingError> {
        let start = self.lexer.pos;
        let tokens = self.signature_tokens(Some(symbol::ANGLE_CLOSE))?;
        MethodSignature::from_parts(tokens)
            .ok_or_else(|| EncodingError::malformed(start, "empty block signature"))
    }

    fn parse_array(&mut self, start: usize) -> Result<Type, EncodingError> {
        let count = self.read_count(start, "array length")?;
        let element = self.parse_nested(Context::default());
        if !self.lexer.eat(symbol::ARRAY_CLOSE) {
            return Err(EncodingError::malformed(
                self.lexer.pos,
                "expected ']' to close array",
            ));
        }
        Ok(Type::array(count, element))
    }

    fn parse_aggregate(&mut self, kind: AggregateKind, start: usize) -> Result<Type, EncodingError> {
        let close = kind.close() as u8;
        let name = self.lexer.read_until(&[symbol::NAME_SEPARATOR, close]);

        match self.lexer.next() {
            Some(c) if c == close => return Ok(Type::forward(kind, Some(name.as_ref()))),
            Some(symbol::NAME_SEPARATOR) => {}
            _ => {
                return Err(EncodingError::malformed(
                    start,
                    format!("unterminated {} '{}'", kind.keyword(), name),
                ))
            }
        }

        let ctx = Context {
            named_fields: self.lexer.peek() == Some(symbol::QUOTE),
        };

        let mut members = Vec::new();
        loop {
            match self.lexer.peek() {
                None => {
                    return Err(EncodingError::malformed(
                        start,
                        format!("unterminated {} '{}'", kind.keyword(), name),
                    ))
                }
                Some(c) if c == close => {
                    self.lexer.next();
                    break;
                }
                Some(symbol::QUOTE) => {
                    let field_name = self.lexer.read_quoted()?;
                    let ty = self.parse_nested(ctx);
                    let member = if field_name.is_empty() {
                        Member::new(ty)
                    } else {
                        Member::named(field_name.into_owned(), ty)
                    };
                    members.push(member);
                }
                Some(_) => {
                    let before = self.lexer.pos;
                    let ty = self.parse_nested(ctx);
                    if self.lexer.pos == before {
                        // stray closer of another kind
                        self.lexer.next();
                    }
                    members.push(Member::new(ty));
                }
            }
        }

        Ok(Type::aggregate(kind, Some(name.as_ref()), members))
    }

    /// Read `attributes type offset?` tokens up to `terminator` (or the end).
    pub(crate) fn signature_tokens(
        &mut self,
        terminator: Option<u8>,
    ) -> Result<Vec<(ArgumentAttributes, Type)>, EncodingError> {
        let mut tokens = Vec::new();
        loop {
            self.lexer.skip_whitespace();
            match self.lexer.peek() {
                None if terminator.is_none() => break,
                None => {
                    return Err(EncodingError::malformed(
                        self.lexer.pos,
                        "unterminated signature",
                    ))
                }
                Some(c) if Some(c) == terminator => {
                    self.lexer.next();
                    break;
                }
                Some(_) => {}
            }

            let attributes = self.parse_attributes();
            if self.lexer.is_at_end() {
                return Err(EncodingError::malformed(
                    self.lexer.pos,
                    "argument attributes without a type",
                ));
            }

            let before = self.lexer.pos;
            let ty = self.parse_nested(Context::default());
            if self.lexer.pos == before {
                self.lexer.next();
            }
            self.skip_offset();
            tokens.push((attributes, ty));
        }
        Ok(tokens)
    }

    pub(crate) fn parse_attributes(&mut self) -> ArgumentAttributes {
        let mut attributes = ArgumentAttributes::NONE;
        while let Some(code) = self.lexer.peek() {
            // `![` starts a vector, not the legacy flag
            if code == b'!' && self.lexer.peek_at(1) == Some(symbol::ARRAY_OPEN) {
                break;
            }
            let Some(flag) = ArgumentAttributes::from_code(code) else {
                break;
            };
            attributes |= flag;
            self.lexer.next();
        }
        attributes
    }

    /// Skip a frame offset (`8`, `+8`, `-4`).
    pub(crate) fn skip_offset(&mut self) {
        if matches!(self.lexer.peek(), Some(b'+' | b'-'))
            && self.lexer.peek_at(1).is_some_and(|b| b.is_ascii_digit())
        {
            self.lexer.next();
        }
        while self.lexer.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.lexer.next();
        }
    }
}

fn is_closer(code: u8) -> bool {
    matches!(
        code,
        symbol::ARRAY_CLOSE | symbol::STRUCT_CLOSE | symbol::UNION_CLOSE | symbol::ANGLE_CLOSE
    )
}

/// `Class<Proto1><Proto2>`, either part optional.
fn class_spec(spec: &str) -> Type {
    let (class, protocols) = match spec.find('<') {
        Some(split) => (&spec[..split], &spec[split..]),
        None => (spec, ""),
    };
    let protocols = protocols
        .split(['<', '>'])
        .filter(|p| !p.is_empty());
    let class = (!class.is_empty()).then_some(class);
    Type::object_of(class, protocols)
}
