// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Method and block signatures.

use crate::config::{INT_SLOT_SIZE, POINTER_SIZE};
use crate::encoding::Parser;
use crate::error::EncodingError;
use crate::types::{ObjectKind, PrimitiveKind, Type};
use std::fmt::{self, Write};
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// ArgumentAttributes - Method argument qualifiers (`r`, `n`, `o`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ArgumentAttributes(pub u8);

impl ArgumentAttributes {
    pub const NONE: Self = Self(0);

    /// `r` const
    pub const CONST: Self = Self(1 << 0);

    /// `n` in
    pub const IN: Self = Self(1 << 1);

    /// `o` out
    pub const OUT: Self = Self(1 << 2);

    /// `N` inout
    pub const INOUT: Self = Self(1 << 3);

    /// `O` bycopy
    pub const BYCOPY: Self = Self(1 << 4);

    /// `R` byref
    pub const BYREF: Self = Self(1 << 5);

    /// `V` oneway
    pub const ONEWAY: Self = Self(1 << 6);

    /// `!` legacy garbage-collector invisible
    pub const LEGACY: Self = Self(1 << 7);

    /// Canonical rendering order.
    const CODES: [(u8, Self); 8] = [
        (b'r', Self::CONST),
        (b'n', Self::IN),
        (b'N', Self::INOUT),
        (b'o', Self::OUT),
        (b'O', Self::BYCOPY),
        (b'R', Self::BYREF),
        (b'V', Self::ONEWAY),
        (b'!', Self::LEGACY),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if every bit of `flag` is set
    pub const fn contains(self, flag: Self) -> bool {
        (self.0 & flag.0) == flag.0
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, flag)| *flag)
    }

    fn write_codes(self, out: &mut String) {
        for (code, flag) in Self::CODES {
            if self.contains(flag) {
                out.push(code as char);
            }
        }
    }
}

impl BitOr for ArgumentAttributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ArgumentAttributes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// One argument with its frame offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Argument {
    ty: Type,
    offset: usize,
    attributes: ArgumentAttributes,
}

impl Argument {
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Offset in the argument frame.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn attributes(&self) -> ArgumentAttributes {
        self.attributes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReturnValue {
    ty: Type,
    attributes: ArgumentAttributes,
}

impl ReturnValue {
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn attributes(&self) -> ArgumentAttributes {
        self.attributes
    }
}

/// Return type plus ordered arguments of a method, function or block.
///
/// Frame offsets are always recomputed: each argument occupies
/// `max(size, sizeof(int))` bytes, unsized arguments a pointer slot.
///
/// ```rust
/// use smoke::signature::MethodSignature;
///
/// let sig = MethodSignature::parse("v24@0:8i16").unwrap();
/// assert!(sig.is_method_signature());
/// assert_eq!(sig.arguments().len(), 3);
/// assert_eq!(sig.frame_size(), 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    return_value: ReturnValue,
    arguments: Vec<Argument>,
    frame_size: usize,
}

impl MethodSignature {
    /// Parse `return arg1 arg2 ...`; offsets and whitespace are skipped.
    pub fn parse(encoding: &str) -> Result<Self, EncodingError> {
        if encoding.trim().is_empty() {
            return Err(EncodingError::Empty);
        }
        let mut parser = Parser::new(encoding);
        let tokens = parser.signature_tokens(None)?;
        Self::from_parts(tokens).ok_or(EncodingError::Empty)
    }

    /// Plain C function signature.
    pub fn new(return_type: Type, argument_types: impl IntoIterator<Item = Type>) -> Self {
        let mut tokens = vec![(ArgumentAttributes::NONE, return_type)];
        tokens.extend(
            argument_types
                .into_iter()
                .map(|ty| (ArgumentAttributes::NONE, ty)),
        );
        Self::assemble(tokens)
    }

    /// Method signature: `self` and `_cmd` are prepended.
    pub fn method(return_type: Type, argument_types: impl IntoIterator<Item = Type>) -> Self {
        let implicit = [Type::object(), Type::primitive(PrimitiveKind::Selector)];
        Self::new(return_type, implicit.into_iter().chain(argument_types))
    }

    /// Block signature: the block itself is prepended.
    pub fn block(return_type: Type, argument_types: impl IntoIterator<Item = Type>) -> Self {
        Self::new(
            return_type,
            std::iter::once(Type::block(None)).chain(argument_types),
        )
    }

    /// First token is the return value; `None` when there are no tokens.
    pub(crate) fn from_parts(tokens: Vec<(ArgumentAttributes, Type)>) -> Option<Self> {
        if tokens.is_empty() {
            return None;
        }
        Some(Self::assemble(tokens))
    }

    fn assemble(tokens: Vec<(ArgumentAttributes, Type)>) -> Self {
        let mut tokens = tokens.into_iter();
        let (return_attributes, return_type) = tokens
            .next()
            .unwrap_or((ArgumentAttributes::NONE, Type::void()));

        let mut offset = 0usize;
        let arguments = tokens
            .map(|(attributes, ty)| {
                let slot = match ty.layout() {
                    Some(layout) => layout.size.max(INT_SLOT_SIZE),
                    None => POINTER_SIZE,
                };
                let argument = Argument {
                    ty,
                    offset,
                    attributes,
                };
                offset = offset.saturating_add(slot);
                argument
            })
            .collect();

        Self {
            return_value: ReturnValue {
                ty: return_type,
                attributes: return_attributes,
            },
            arguments,
            frame_size: offset,
        }
    }

    pub fn return_value(&self) -> &ReturnValue {
        &self.return_value
    }

    pub fn return_type(&self) -> &Type {
        &self.return_value.ty
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&Argument> {
        self.arguments.get(index)
    }

    /// Total bytes of the argument frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// First two arguments are the receiver (`@`) and the selector (`:`).
    pub fn is_method_signature(&self) -> bool {
        match self.arguments.as_slice() {
            [receiver, selector, ..] => {
                receiver
                    .ty
                    .as_object()
                    .is_some_and(|o| o.kind() == ObjectKind::Generic)
                    && selector.ty.as_primitive() == Some(PrimitiveKind::Selector)
            }
            _ => false,
        }
    }

    /// First argument is the block itself (`@?`).
    pub fn is_block_signature(&self) -> bool {
        self.arguments.first().is_some_and(|argument| {
            argument
                .ty
                .as_object()
                .is_some_and(|o| o.kind() == ObjectKind::Block)
        })
    }

    /// Canonical encoding with frame size and offsets.
    pub fn encoding(&self) -> String {
        let mut out = String::new();
        self.return_value.attributes.write_codes(&mut out);
        out.push_str(&self.return_value.ty.encoding());
        let _ = write!(out, "{}", self.frame_size);
        for argument in &self.arguments {
            argument.attributes.write_codes(&mut out);
            out.push_str(&argument.ty.encoding());
            let _ = write!(out, "{}", argument.offset);
        }
        out
    }

    /// Encoding without offsets, as embedded in block types.
    pub(crate) fn compact_encoding(&self) -> String {
        let mut out = String::new();
        self.return_value.attributes.write_codes(&mut out);
        out.push_str(&self.return_value.ty.encoding());
        for argument in &self.arguments {
            argument.attributes.write_codes(&mut out);
            out.push_str(&argument.ty.encoding());
        }
        out
    }
}

impl FromStr for MethodSignature {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoding())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_signature() {
        let sig = MethodSignature::parse("@32@0:8@16q24").unwrap();
        assert!(sig.is_method_signature());
        assert!(!sig.is_block_signature());
        assert!(sig.return_type().is_object());
        let offsets: Vec<usize> = sig.arguments().iter().map(Argument::offset).collect();
        assert_eq!(offsets, vec![0, 8, 16, 24]);
        assert_eq!(sig.frame_size(), 32);
    }

    #[test]
    fn test_offsets_recomputed() {
        // bogus offsets in the input are ignored
        let sig = MethodSignature::parse("v99c1s1c1").unwrap();
        let offsets: Vec<usize> = sig.arguments().iter().map(Argument::offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(sig.frame_size(), 12);
    }

    #[test]
    fn test_unsized_argument_takes_pointer_slot() {
        let sig = MethodSignature::parse("v{Opaque}i").unwrap();
        assert_eq!(sig.argument(1).unwrap().offset(), POINTER_SIZE);
    }

    #[test]
    fn test_whitespace_and_signed_offsets() {
        let sig = MethodSignature::parse("i i+0 i-4").unwrap();
        assert_eq!(sig.arguments().len(), 2);
        assert_eq!(sig.encoding(), "i8i0i4");
    }

    #[test]
    fn test_argument_attributes() {
        let sig = MethodSignature::parse("Vv@:o^@nr*").unwrap();
        assert!(sig.return_value().attributes().contains(ArgumentAttributes::ONEWAY));
        let out = sig.argument(2).unwrap().attributes();
        assert!(out.contains(ArgumentAttributes::OUT));
        let input = sig.argument(3).unwrap().attributes();
        assert!(input.contains(ArgumentAttributes::IN | ArgumentAttributes::CONST));
        assert!(!input.contains(ArgumentAttributes::OUT));
    }

    #[test]
    fn test_encoding_roundtrip() {
        let sig = MethodSignature::parse("Vv24@0:8rn^{Point=ii}16").unwrap();
        let reparsed = MethodSignature::parse(&sig.encoding()).unwrap();
        assert_eq!(reparsed, sig);
        assert_eq!(sig.encoding(), "Vv24@0:8rn^{Point=ii}16");
    }

    #[test]
    fn test_constructors() {
        let sig = MethodSignature::method(Type::void(), [Type::primitive(PrimitiveKind::Int)]);
        assert!(sig.is_method_signature());
        assert_eq!(sig.encoding(), "v20@0:8i16");

        let block = MethodSignature::block(Type::primitive(PrimitiveKind::Bool), []);
        assert!(block.is_block_signature());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(MethodSignature::parse("  "), Err(EncodingError::Empty));
        assert!(MethodSignature::parse("v@:n").is_err());
        assert!(MethodSignature::parse("Z").is_ok_and(|s| s.return_type().is_unknown()));
    }
}
