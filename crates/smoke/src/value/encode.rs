// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rust types with a known encoding.

use crate::runtime::SelectorRef;
use crate::types::{PrimitiveKind, Type};
use std::ffi::{c_char, c_void};

/// A Rust type whose in-memory representation matches an encoded type.
///
/// # Safety
///
/// `encoding()` must describe exactly the size and alignment of `Self`, and
/// every bit pattern a C callee may produce for that encoding, and that
/// `accepts` does not reject, must be a valid `Self`. Implementors must not
/// contain padding bytes.
pub unsafe trait Encode: Copy + 'static {
    fn encoding() -> Type;

    /// Whether `bytes` read back from storage form a valid `Self`.
    fn accepts(_bytes: &[u8]) -> bool {
        true
    }
}

macro_rules! impl_encode {
    ($ty:ty, $kind:ident) => {
        // SAFETY: primitive with the matching C representation.
        unsafe impl Encode for $ty {
            fn encoding() -> Type {
                Type::primitive(PrimitiveKind::$kind)
            }
        }
    };
}

impl_encode!(i8, Char);
impl_encode!(u8, UnsignedChar);
impl_encode!(i16, Short);
impl_encode!(u16, UnsignedShort);
impl_encode!(i32, Int);
impl_encode!(u32, UnsignedInt);
impl_encode!(i64, LongLong);
impl_encode!(u64, UnsignedLongLong);
impl_encode!(i128, Int128);
impl_encode!(u128, UnsignedInt128);
impl_encode!(f32, Float);
impl_encode!(f64, Double);
impl_encode!(*const c_char, CString);
impl_encode!(*mut c_char, CString);

// SAFETY: one byte; only 0 and 1 are let through `accepts`.
unsafe impl Encode for bool {
    fn encoding() -> Type {
        Type::primitive(PrimitiveKind::Bool)
    }

    fn accepts(bytes: &[u8]) -> bool {
        matches!(bytes, [0] | [1])
    }
}

// SAFETY: transparent wrapper over a nullable `const char *`.
unsafe impl Encode for SelectorRef {
    fn encoding() -> Type {
        Type::primitive(PrimitiveKind::Selector)
    }
}

#[cfg(target_pointer_width = "64")]
impl_encode!(isize, LongLong);
#[cfg(target_pointer_width = "64")]
impl_encode!(usize, UnsignedLongLong);
#[cfg(target_pointer_width = "32")]
impl_encode!(isize, Int);
#[cfg(target_pointer_width = "32")]
impl_encode!(usize, UnsignedInt);

// SAFETY: data pointer, encoded `^v`.
unsafe impl Encode for *mut c_void {
    fn encoding() -> Type {
        Type::pointer(Type::void())
    }
}

// SAFETY: data pointer, encoded `^v`.
unsafe impl Encode for *const c_void {
    fn encoding() -> Type {
        Type::pointer(Type::void())
    }
}

// SAFETY: elements are laid out contiguously without padding.
unsafe impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encoding() -> Type {
        Type::array(N, T::encoding())
    }
}

/// Object reference (`@`); null is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Object(pub *mut c_void);

impl Object {
    pub const NULL: Self = Self(std::ptr::null_mut());

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }
}

// SAFETY: transparent over a data pointer.
unsafe impl Encode for Object {
    fn encoding() -> Type {
        Type::object()
    }
}

/// Class reference (`#`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ClassRef(pub *mut c_void);

// SAFETY: transparent over a data pointer.
unsafe impl Encode for ClassRef {
    fn encoding() -> Type {
        Type::class()
    }
}

/// Raw bytes of `value`.
pub(crate) fn bytes_of<T: Encode>(value: &T) -> &[u8] {
    // SAFETY: Encode types are plain data without padding.
    unsafe { std::slice::from_raw_parts((value as *const T).cast::<u8>(), std::mem::size_of::<T>()) }
}
