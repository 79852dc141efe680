// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type-code tables: primitive, object, composite and aggregate kinds.

use super::TypeLayout;
use crate::config::{LONG_DOUBLE_ALIGN, LONG_DOUBLE_SIZE, POINTER_ALIGN, POINTER_SIZE};

/// Scalar kinds with a single-character code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Char,
    UnsignedChar,
    Bool,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    /// `l`: a 32-bit quantity regardless of the platform's `long`.
    Long,
    /// `L`: 32-bit unsigned.
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Int128,
    UnsignedInt128,
    Float,
    Double,
    LongDouble,
    /// `*`: `char *`.
    CString,
    /// `:`: `SEL`.
    Selector,
    /// `%`: interned string handle.
    Atom,
}

impl PrimitiveKind {
    /// Every kind, in code-table order.
    pub const ALL: [PrimitiveKind; 19] = [
        Self::Char,
        Self::UnsignedChar,
        Self::Bool,
        Self::Short,
        Self::UnsignedShort,
        Self::Int,
        Self::UnsignedInt,
        Self::Long,
        Self::UnsignedLong,
        Self::LongLong,
        Self::UnsignedLongLong,
        Self::Int128,
        Self::UnsignedInt128,
        Self::Float,
        Self::Double,
        Self::LongDouble,
        Self::CString,
        Self::Selector,
        Self::Atom,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'c' => Self::Char,
            b'C' => Self::UnsignedChar,
            b'B' => Self::Bool,
            b's' => Self::Short,
            b'S' => Self::UnsignedShort,
            b'i' => Self::Int,
            b'I' => Self::UnsignedInt,
            b'l' => Self::Long,
            b'L' => Self::UnsignedLong,
            b'q' => Self::LongLong,
            b'Q' => Self::UnsignedLongLong,
            b't' => Self::Int128,
            b'T' => Self::UnsignedInt128,
            b'f' => Self::Float,
            b'd' => Self::Double,
            b'D' => Self::LongDouble,
            b'*' => Self::CString,
            b':' => Self::Selector,
            b'%' => Self::Atom,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        match self {
            Self::Char => 'c',
            Self::UnsignedChar => 'C',
            Self::Bool => 'B',
            Self::Short => 's',
            Self::UnsignedShort => 'S',
            Self::Int => 'i',
            Self::UnsignedInt => 'I',
            Self::Long => 'l',
            Self::UnsignedLong => 'L',
            Self::LongLong => 'q',
            Self::UnsignedLongLong => 'Q',
            Self::Int128 => 't',
            Self::UnsignedInt128 => 'T',
            Self::Float => 'f',
            Self::Double => 'd',
            Self::LongDouble => 'D',
            Self::CString => '*',
            Self::Selector => ':',
            Self::Atom => '%',
        }
    }

    /// Position in [`Self::ALL`].
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn size(self) -> usize {
        match self {
            Self::Char | Self::UnsignedChar | Self::Bool => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::Int | Self::UnsignedInt | Self::Long | Self::UnsignedLong | Self::Float => 4,
            Self::LongLong | Self::UnsignedLongLong | Self::Double => 8,
            Self::Int128 | Self::UnsignedInt128 => 16,
            Self::LongDouble => LONG_DOUBLE_SIZE,
            Self::CString | Self::Selector | Self::Atom => POINTER_SIZE,
        }
    }

    pub fn alignment(self) -> usize {
        match self {
            Self::LongDouble => LONG_DOUBLE_ALIGN,
            Self::CString | Self::Selector | Self::Atom => POINTER_ALIGN,
            other => other.size(),
        }
    }

    pub(crate) fn layout(self) -> TypeLayout {
        TypeLayout::new(self.size(), self.alignment())
    }

    pub fn is_integer(self) -> bool {
        !self.is_floating() && !self.is_pointer_like()
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double | Self::LongDouble)
    }

    /// Passed as a machine pointer.
    pub fn is_pointer_like(self) -> bool {
        matches!(self, Self::CString | Self::Selector | Self::Atom)
    }

    /// C spelling used by `Type::format`.
    pub fn c_name(self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::UnsignedChar => "unsigned char",
            Self::Bool => "bool",
            Self::Short => "short",
            Self::UnsignedShort => "unsigned short",
            Self::Int => "int",
            Self::UnsignedInt => "unsigned int",
            Self::Long => "long",
            Self::UnsignedLong => "unsigned long",
            Self::LongLong => "long long",
            Self::UnsignedLongLong => "unsigned long long",
            Self::Int128 => "__int128",
            Self::UnsignedInt128 => "unsigned __int128",
            Self::Float => "float",
            Self::Double => "double",
            Self::LongDouble => "long double",
            Self::CString => "char *",
            Self::Selector => "SEL",
            Self::Atom => "atom",
        }
    }
}

/// Object-reference kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// `@`
    Generic,
    /// `@?`
    Block,
    /// `#`
    Class,
}

impl ObjectKind {
    /// Whether a slot of kind `self` accepts an object of kind `source`.
    pub fn accepts(self, source: ObjectKind) -> bool {
        match self {
            Self::Generic => matches!(source, Self::Generic | Self::Block),
            Self::Block => source == Self::Block,
            Self::Class => source == Self::Class,
        }
    }
}

/// Single-inner-type wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Pointer,
    Vector,
    Complex,
    Atomic,
    Const,
}

impl CompositeKind {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'^' => Self::Pointer,
            b'!' => Self::Vector,
            b'j' => Self::Complex,
            b'A' => Self::Atomic,
            b'r' => Self::Const,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        match self {
            Self::Pointer => '^',
            Self::Vector => '!',
            Self::Complex => 'j',
            Self::Atomic => 'A',
            Self::Const => 'r',
        }
    }

    /// Qualifiers that leave the inner layout (and ownership) untouched.
    pub fn is_transparent(self) -> bool {
        matches!(self, Self::Const | Self::Atomic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Struct,
    Union,
}

impl AggregateKind {
    pub fn open(self) -> char {
        match self {
            Self::Struct => '{',
            Self::Union => '(',
        }
    }

    pub fn close(self) -> char {
        match self {
            Self::Struct => '}',
            Self::Union => ')',
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::Union => "union",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_codes_roundtrip() {
        for (i, kind) in PrimitiveKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(PrimitiveKind::from_code(kind.code() as u8), Some(*kind));
        }
        assert_eq!(PrimitiveKind::from_code(b'v'), None);
        assert_eq!(PrimitiveKind::from_code(b'@'), None);
    }

    #[test]
    fn test_primitive_layout_table() {
        assert_eq!(PrimitiveKind::Char.layout(), TypeLayout::new(1, 1));
        assert_eq!(PrimitiveKind::UnsignedShort.layout(), TypeLayout::new(2, 2));
        assert_eq!(PrimitiveKind::Long.layout(), TypeLayout::new(4, 4));
        assert_eq!(PrimitiveKind::Double.layout(), TypeLayout::new(8, 8));
        assert_eq!(PrimitiveKind::Int128.layout(), TypeLayout::new(16, 16));
        assert_eq!(PrimitiveKind::Selector.size(), POINTER_SIZE);
    }

    #[test]
    fn test_object_kind_acceptance() {
        assert!(ObjectKind::Generic.accepts(ObjectKind::Block));
        assert!(!ObjectKind::Block.accepts(ObjectKind::Generic));
        assert!(!ObjectKind::Class.accepts(ObjectKind::Generic));
    }

    #[test]
    fn test_primitive_classes() {
        assert!(PrimitiveKind::Int.is_integer());
        assert!(PrimitiveKind::Bool.is_integer());
        assert!(!PrimitiveKind::Float.is_integer());
        assert!(PrimitiveKind::CString.is_pointer_like());
    }
}
