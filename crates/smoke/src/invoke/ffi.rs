// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mapping from the type model to libffi call interfaces.
//!
//! Scalars map one-to-one. Structs become libffi structures whose elements
//! reproduce the C layout: fixed arrays are expanded element by element and
//! each bitfield storage unit becomes one integer element, absorbing any
//! ordinary member that shares its bytes. Unions have no
//! libffi counterpart and are passed as a struct of integer units (or of
//! floats, when every member is the same floating type) covering the union's
//! size at its alignment.
//!
//! When [`EngineConfig::verify_layouts`](crate::config::EngineConfig) is set,
//! the size and alignment libffi computed for every aggregate are compared
//! with the type model before the descriptor is handed out.

use crate::config::{self, REGISTER_RETURN_LIMIT};
use crate::error::FfiError;
use crate::signature::MethodSignature;
use crate::types::layout::round_up;
use crate::types::{AggregateKind, CompositeKind, PrimitiveKind, Type, TypeKind, TypeLayout};
use libffi::middle::{Cif, CodePtr, Type as FfiType};
use libffi::raw;
use std::ffi::c_void;

/// Prepared call interface for one signature.
pub struct CallDescriptor {
    cif: Cif,
    return_layout: TypeLayout,
    argument_count: usize,
    indirect_return: bool,
}

// SAFETY: the cif and the ffi_type graph it points into are immutable after
// `Cif::new`; `ffi_call` only reads them.
unsafe impl Send for CallDescriptor {}
// SAFETY: see above.
unsafe impl Sync for CallDescriptor {}

impl CallDescriptor {
    /// Prepare a call interface for `signature`.
    pub fn new(signature: &MethodSignature) -> Result<Self, FfiError> {
        let arguments = signature
            .arguments()
            .iter()
            .map(|argument| element_type(argument.ty()))
            .collect::<Result<Vec<_>, _>>()?;

        let return_ty = signature.return_type();
        let result = return_type(return_ty)?;
        let return_layout = if return_ty.unqualified().is_void() {
            TypeLayout::new(0, 1)
        } else {
            return_ty
                .layout()
                .ok_or_else(|| FfiError::UnsupportedType(return_ty.clone()))?
        };

        let cif = Cif::new(arguments, result);
        let descriptor = Self {
            cif,
            return_layout,
            argument_count: signature.arguments().len(),
            indirect_return: is_aggregate(return_ty) && return_layout.size > REGISTER_RETURN_LIMIT,
        };

        if config::get().verify_layouts {
            descriptor.verify(signature)?;
        }
        if descriptor.indirect_return {
            log::debug!(
                "[invoke] {} returns {} bytes through memory",
                return_ty,
                return_layout.size
            );
        }
        Ok(descriptor)
    }

    pub fn argument_count(&self) -> usize {
        self.argument_count
    }

    /// Size and alignment of the declared return type (`0/1` for void).
    pub fn return_layout(&self) -> TypeLayout {
        self.return_layout
    }

    /// Aggregate return too large for registers (returned through a hidden pointer).
    pub fn returns_indirectly(&self) -> bool {
        self.indirect_return
    }

    /// Call `code`.
    ///
    /// # Safety
    ///
    /// `code` must be a function with the described signature, `arguments`
    /// must hold exactly one pointer per argument, each to a value of the
    /// declared type, and `result` must be writable for
    /// `max(return size, FFI_ARG_SIZE)` bytes at the return alignment.
    pub(crate) unsafe fn call(&self, code: CodePtr, arguments: &mut [*mut c_void], result: *mut c_void) {
        debug_assert_eq!(arguments.len(), self.argument_count);
        // SAFETY: forwarded from the caller.
        unsafe {
            raw::ffi_call(
                self.cif.as_raw_ptr(),
                Some(*code.as_fun()),
                result,
                arguments.as_mut_ptr(),
            );
        }
    }

    fn verify(&self, signature: &MethodSignature) -> Result<(), FfiError> {
        let raw_cif = self.cif.as_raw_ptr();
        for (index, argument) in signature.arguments().iter().enumerate() {
            if !is_aggregate(argument.ty()) {
                continue;
            }
            // SAFETY: prep_cif filled `arg_types` with `nargs` initialised types.
            let actual = unsafe { ffi_layout(*(*raw_cif).arg_types.add(index)) };
            check_layout(argument.ty(), actual)?;
        }

        let return_ty = signature.return_type();
        if is_aggregate(return_ty) {
            // SAFETY: prep_cif initialised `rtype`.
            let actual = unsafe { ffi_layout((*raw_cif).rtype) };
            check_layout(return_ty, actual)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CallDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallDescriptor")
            .field("argument_count", &self.argument_count)
            .field("return_layout", &self.return_layout)
            .field("indirect_return", &self.indirect_return)
            .finish_non_exhaustive()
    }
}

/// # Safety
///
/// `ty` must point to an ffi_type initialised by `ffi_prep_cif`.
unsafe fn ffi_layout(ty: *const raw::ffi_type) -> TypeLayout {
    // SAFETY: forwarded from the caller.
    let ty = unsafe { &*ty };
    TypeLayout::new(ty.size, usize::from(ty.alignment))
}

fn check_layout(ty: &Type, actual: TypeLayout) -> Result<(), FfiError> {
    let expected = ty
        .layout()
        .ok_or_else(|| FfiError::UnsupportedType(ty.clone()))?;
    if expected != actual {
        log::warn!(
            "[invoke] layout mismatch for {}: model {}/{}, libffi {}/{}",
            ty,
            expected.size,
            expected.alignment,
            actual.size,
            actual.alignment
        );
        return Err(FfiError::LayoutMismatch {
            ty: ty.clone(),
            expected_size: expected.size,
            expected_align: expected.alignment,
            actual_size: actual.size,
            actual_align: actual.alignment,
        });
    }
    Ok(())
}

fn is_aggregate(ty: &Type) -> bool {
    matches!(ty.unqualified().kind(), TypeKind::Aggregate(_))
}

fn return_type(ty: &Type) -> Result<FfiType, FfiError> {
    if ty.unqualified().is_void() {
        return Ok(FfiType::void());
    }
    element_type(ty)
}

/// libffi type of a value of `ty`.
///
/// Arrays are only meaningful inside aggregates, where the caller expands
/// them; a C array argument decays to a pointer and is encoded as one.
fn element_type(ty: &Type) -> Result<FfiType, FfiError> {
    let unsupported = || FfiError::UnsupportedType(ty.clone());
    match ty.kind() {
        TypeKind::Unknown | TypeKind::Void | TypeKind::Bitfield(_) | TypeKind::Array(_) => {
            Err(unsupported())
        }
        TypeKind::Primitive(p) => primitive_type(*p).ok_or_else(unsupported),
        TypeKind::Object(_) => Ok(FfiType::pointer()),
        TypeKind::Composite(kind, inner) => match kind {
            CompositeKind::Pointer => Ok(FfiType::pointer()),
            CompositeKind::Const | CompositeKind::Atomic => element_type(inner),
            CompositeKind::Complex => {
                let part = element_type(inner)?;
                Ok(FfiType::structure([part.clone(), part]))
            }
            CompositeKind::Vector => Err(unsupported()),
        },
        TypeKind::Aggregate(agg) => {
            let Some(fields) = agg.fields() else {
                return Err(unsupported());
            };
            match agg.kind() {
                AggregateKind::Struct => struct_type(ty, fields),
                AggregateKind::Union => union_type(ty, fields),
            }
        }
    }
}

fn primitive_type(kind: PrimitiveKind) -> Option<FfiType> {
    Some(match kind {
        PrimitiveKind::Char => FfiType::i8(),
        PrimitiveKind::UnsignedChar | PrimitiveKind::Bool => FfiType::u8(),
        PrimitiveKind::Short => FfiType::i16(),
        PrimitiveKind::UnsignedShort => FfiType::u16(),
        PrimitiveKind::Int | PrimitiveKind::Long => FfiType::i32(),
        PrimitiveKind::UnsignedInt | PrimitiveKind::UnsignedLong => FfiType::u32(),
        PrimitiveKind::LongLong => FfiType::i64(),
        PrimitiveKind::UnsignedLongLong => FfiType::u64(),
        PrimitiveKind::Float => FfiType::f32(),
        PrimitiveKind::Double => FfiType::f64(),
        PrimitiveKind::LongDouble => FfiType::longdouble(),
        PrimitiveKind::CString | PrimitiveKind::Selector | PrimitiveKind::Atom => {
            FfiType::pointer()
        }
        PrimitiveKind::Int128 | PrimitiveKind::UnsignedInt128 => return None,
    })
}

/// libffi struct elements with the byte range each one covers.
#[derive(Default)]
struct Elements {
    items: Vec<(usize, usize, FfiType)>,
}

impl Elements {
    fn end(&self) -> usize {
        self.items.last().map_or(0, |(_, end, _)| *end)
    }

    /// Bytes `from..to` as `uint8_t` elements.
    fn fill(&mut self, from: usize, to: usize) {
        self.items
            .extend((from..to).map(|byte| (byte, byte + 1, FfiType::u8())));
    }

    /// Add `ty` at `offset`. Bytes already covered are skipped; a member only
    /// partly covered is finished with bytes.
    fn place(&mut self, offset: usize, layout: TypeLayout, ty: FfiType) {
        let end = self.end();
        let member_end = offset + layout.size;
        if member_end <= end {
            return;
        }
        if offset < end {
            self.fill(end, member_end);
            return;
        }
        // padding libffi would not insert by itself
        if round_up(end, layout.alignment) != Some(offset) {
            self.fill(end, offset);
        }
        self.items.push((offset, member_end, ty));
    }

    /// Storage unit at `offset`, replacing whatever already overlaps it.
    fn place_unit(&mut self, offset: usize, unit: TypeLayout) {
        if offset + unit.size <= self.end() {
            return;
        }
        let mut shared = false;
        while self.items.last().is_some_and(|(_, end, _)| *end > offset) {
            self.items.pop();
            shared = true;
        }
        if shared {
            // keep the bytes of a member cut off by the unit described
            let end = self.end();
            self.fill(end, offset);
        }
        let ty = match unit.size {
            8 => FfiType::u64(),
            _ => FfiType::u32(),
        };
        self.place(offset, unit, ty);
    }
}

fn struct_type(ty: &Type, fields: &[crate::types::Field]) -> Result<FfiType, FfiError> {
    let unsupported = || FfiError::UnsupportedType(ty.clone());
    let mut elements = Elements::default();

    for field in fields {
        let field_ty = field.ty().unqualified();
        let offset = field.offset().ok_or_else(unsupported)?;
        match field_ty.kind() {
            TypeKind::Bitfield(0) => {}
            TypeKind::Bitfield(_) => {
                let unit = field_ty.layout().ok_or_else(unsupported)?;
                elements.place_unit(offset, unit);
            }
            TypeKind::Array(array) => {
                if array.count() == 0 {
                    continue;
                }
                let element = element_type(array.element())?;
                let layout = array.element().layout().ok_or_else(unsupported)?;
                for index in 0..array.count() {
                    elements.place(offset + index * layout.size, layout, element.clone());
                }
            }
            _ => {
                let layout = field.ty().layout().ok_or_else(unsupported)?;
                elements.place(offset, layout, element_type(field.ty())?);
            }
        }
    }

    if elements.items.is_empty() {
        return Err(FfiError::EmptyAggregate(ty.clone()));
    }
    let types: Vec<FfiType> = elements.items.into_iter().map(|(_, _, ty)| ty).collect();
    Ok(FfiType::structure(types))
}

fn union_type(ty: &Type, fields: &[crate::types::Field]) -> Result<FfiType, FfiError> {
    let layout = ty
        .layout()
        .ok_or_else(|| FfiError::UnsupportedType(ty.clone()))?;
    if fields.is_empty() || layout.size == 0 {
        return Err(FfiError::EmptyAggregate(ty.clone()));
    }

    let floating = |kind: PrimitiveKind| {
        fields
            .iter()
            .all(|f| f.ty().unqualified().as_primitive() == Some(kind))
    };
    let (unit, unit_size) = if floating(PrimitiveKind::Float) {
        (FfiType::f32(), 4)
    } else if floating(PrimitiveKind::Double) {
        (FfiType::f64(), 8)
    } else {
        match layout.alignment {
            1 => (FfiType::u8(), 1),
            2 => (FfiType::u16(), 2),
            4 => (FfiType::u32(), 4),
            8 => (FfiType::u64(), 8),
            _ => return Err(FfiError::UnsupportedType(ty.clone())),
        }
    };

    let count = layout.size / unit_size;
    log::trace!("[invoke] union {} passed as {} x {} bytes", ty, count, unit_size);
    Ok(FfiType::structure(vec![unit; count]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding;

    fn descriptor(encoding: &str) -> Result<CallDescriptor, FfiError> {
        CallDescriptor::new(&MethodSignature::parse(encoding).unwrap())
    }

    #[test]
    fn test_scalar_signature() {
        let desc = descriptor("d16d0i8").unwrap();
        assert_eq!(desc.argument_count(), 2);
        assert_eq!(desc.return_layout(), TypeLayout::new(8, 8));
        assert!(!desc.returns_indirectly());
    }

    #[test]
    fn test_void_return() {
        let desc = descriptor("v8^v0").unwrap();
        assert_eq!(desc.return_layout(), TypeLayout::new(0, 1));
    }

    #[test]
    fn test_struct_layouts_verified() {
        assert!(descriptor("{Rect={Point=dd}{Size=dd}}8^v0").is_ok());
        assert!(descriptor("v40{Mixed=c[3s]iq}0").is_ok());
        assert!(descriptor("v8{Bits=b3b5b20i}0").is_ok());
        assert!(descriptor("v8{Gap=cb0c}0").is_ok());
    }

    #[test]
    fn test_bitfields_sharing_bytes_verified() {
        for encoding in [
            "{S=cb3}",
            "{S=b3c}",
            "{S=sb9c}",
            "{S=b3[5c]}",
            "{S=c{T=ccccc}b3}",
            "{S=b3b40}",
            "{S=b40c}",
            "{S=b1b2b29b1c}",
            "{S=fb3d}",
        ] {
            let ty = encoding::parse(encoding).unwrap();
            let sig = MethodSignature::new(ty.clone(), [ty]);
            let desc = CallDescriptor::new(&sig).unwrap_or_else(|e| panic!("{}: {}", encoding, e));
            assert_eq!(desc.return_layout(), sig.return_type().layout().unwrap());
        }
        assert!(descriptor("v8{Tail=i[0c]}0").is_ok());
        assert!(descriptor("v8{Wrapped=r{Inner=if}}0").is_ok());
    }

    #[test]
    fn test_large_struct_returns_indirectly() {
        let desc = descriptor("{Big=qqqqq}0").unwrap();
        assert!(desc.returns_indirectly());
        assert_eq!(desc.return_layout().size, 40);
    }

    #[test]
    fn test_union_argument() {
        assert!(descriptor("v8(Value=iq)0").is_ok());
        assert!(descriptor("v8(Floats=ff)0").is_ok());
        assert!(descriptor("v8(Bytes=c[3c])0").is_ok());
    }

    #[test]
    fn test_unsupported_types() {
        assert!(matches!(
            descriptor("v8t0"),
            Err(FfiError::UnsupportedType(_))
        ));
        assert!(matches!(
            descriptor("v8?0"),
            Err(FfiError::UnsupportedType(_))
        ));
        assert!(matches!(
            descriptor("v8{Opaque}0"),
            Err(FfiError::UnsupportedType(_))
        ));
        assert!(matches!(
            descriptor("v8[4i]0"),
            Err(FfiError::UnsupportedType(_))
        ));
        assert!(matches!(
            descriptor("v8vi0"),
            Err(FfiError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_empty_struct_rejected() {
        let ty = encoding::parse("{Empty=}").unwrap();
        let sig = MethodSignature::new(Type::void(), [ty]);
        assert!(matches!(
            CallDescriptor::new(&sig),
            Err(FfiError::EmptyAggregate(_))
        ));
    }

    #[test]
    fn test_complex_maps_to_pair() {
        assert!(descriptor("jd16jd0").is_ok());
    }
}
