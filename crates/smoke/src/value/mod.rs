// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed byte containers.
//!
//! A [`Value`] pairs a [`Type`] with an owned, aligned buffer holding exactly
//! `type.size()` bytes laid out as the platform lays out a variable of that
//! type. Elements of arrays and fields of aggregates are addressed by index or
//! by name; [`MutableValue`] adds in-place writes.
//!
//! Owned object references inside the buffer (see
//! [`Retention`](crate::runtime::Retention)) are retained through the
//! installed [`ObjectRuntime`](crate::runtime::ObjectRuntime) when a value is
//! built or copied, and released when it drops or the slot is overwritten.
//!
//! # Example
//!
//! ```rust
//! use smoke::encoding;
//! use smoke::value::{MutableValue, Value};
//!
//! let answer = Value::boxed(42i32);
//! assert_eq!(answer.get::<i32>().unwrap(), 42);
//!
//! let point = encoding::parse(r#"{Point="x"i"y"i}"#).unwrap();
//! let mut value = MutableValue::zeroed(&point).unwrap();
//! value.set_field("y", 7i32).unwrap();
//! assert_eq!(value.get_field::<i32>("y").unwrap(), 7);
//! assert_eq!(value.get_at::<i32>(0).unwrap(), 0);
//! ```

mod buffer;
mod encode;
mod tuple;

pub use encode::{ClassRef, Encode, Object};
pub use tuple::TupleBuilder;

pub(crate) use buffer::AlignedBuf;

use crate::config::POINTER_SIZE;
use crate::error::ValueError;
use crate::runtime;
use crate::types::{AggregateKind, Type, TypeKind};
use std::ffi::c_void;
use std::fmt;
use std::mem::MaybeUninit;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum Key<'a> {
    Index(usize),
    Name(&'a str),
}

/// Resolved location of an element or field inside a value.
struct Slot {
    offset: usize,
    ty: Type,
    owned: Arc<[usize]>,
    /// `(bit offset, width)` for bitfield members.
    bits: Option<(u32, u32)>,
}

/// Immutable typed value.
pub struct Value {
    ty: Type,
    buf: AlignedBuf,
}

impl Value {
    /// Copy `bytes` (exactly `ty.size()` of them) into a new value.
    pub fn new(ty: &Type, bytes: &[u8]) -> Result<Self, ValueError> {
        Self::with_ownership(ty, bytes, true)
    }

    /// Copy `ty.size()` bytes from `bytes`.
    ///
    /// # Safety
    ///
    /// `bytes` must be valid for reads of `ty.size()` bytes.
    pub unsafe fn from_raw(ty: &Type, bytes: *const u8) -> Result<Self, ValueError> {
        let size = ty
            .layout()
            .ok_or_else(|| ValueError::UnsizedType(ty.clone()))?
            .size;
        // SAFETY: caller guarantees `size` readable bytes.
        let slice = unsafe { std::slice::from_raw_parts(bytes, size) };
        Self::new(ty, slice)
    }

    /// All-zero value of `ty`.
    pub fn zeroed(ty: &Type) -> Result<Self, ValueError> {
        let layout = ty
            .layout()
            .ok_or_else(|| ValueError::UnsizedType(ty.clone()))?;
        let buf = AlignedBuf::zeroed(layout.size, layout.alignment)
            .ok_or_else(|| ValueError::AllocationFailed(ty.clone()))?;
        Ok(Self {
            ty: ty.clone(),
            buf,
        })
    }

    /// Value of a Rust scalar, pointer or array.
    pub fn boxed<T: Encode>(value: T) -> Self {
        #[allow(clippy::expect_used)] // Encode guarantees the type's size is size_of::<T>()
        Self::new(&T::encoding(), encode::bytes_of(&value)).expect("Encode layout matches T")
    }

    /// The empty value of type `void`.
    pub fn void() -> Self {
        #[allow(clippy::expect_used)] // void is sized (0 bytes) by construction
        Self::zeroed(&Type::void()).expect("void is sized")
    }

    /// Copy `bytes`; when `retain` is false the value adopts the references
    /// already held by `bytes` instead of taking new ones.
    pub(crate) fn with_ownership(ty: &Type, bytes: &[u8], retain: bool) -> Result<Self, ValueError> {
        let mut value = Self::zeroed(ty)?;
        if bytes.len() != value.buf.len() {
            return Err(ValueError::SizeMismatch {
                ty: ty.clone(),
                expected: value.buf.len(),
                actual: bytes.len(),
            });
        }
        if retain {
            retain_slots(bytes, &ty.owned_slots());
        }
        value.buf.as_mut_slice().copy_from_slice(bytes);
        Ok(value)
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn encoding(&self) -> String {
        self.ty.encoding()
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_slice()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.buf.as_ptr()
    }

    /// Number of addressable elements (array length or field count).
    pub fn len(&self) -> Option<usize> {
        match self.ty.unqualified().kind() {
            TypeKind::Array(array) => Some(array.count()),
            TypeKind::Aggregate(agg) => Some(agg.field_count()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Copy the whole value into `out`; `ty` must accept the value's type.
    pub fn get_into(&self, out: &mut [u8], ty: &Type) -> Result<(), ValueError> {
        self.read(&self.whole(), out, ty)
    }

    /// Copy element `index` of an array or aggregate into `out`.
    pub fn get_at_into(&self, out: &mut [u8], ty: &Type, index: usize) -> Result<(), ValueError> {
        let slot = self.slot(Key::Index(index))?;
        self.read(&slot, out, ty)
    }

    /// Copy the field called `name` into `out`.
    pub fn get_field_into(&self, out: &mut [u8], ty: &Type, name: &str) -> Result<(), ValueError> {
        let slot = self.slot(Key::Name(name))?;
        self.read(&slot, out, ty)
    }

    pub fn get<T: Encode>(&self) -> Result<T, ValueError> {
        read_typed(|out, ty| self.get_into(out, ty))
    }

    pub fn get_at<T: Encode>(&self, index: usize) -> Result<T, ValueError> {
        read_typed(|out, ty| self.get_at_into(out, ty, index))
    }

    pub fn get_field<T: Encode>(&self, name: &str) -> Result<T, ValueError> {
        read_typed(|out, ty| self.get_field_into(out, ty, name))
    }

    /// Element `index` as an independent value.
    pub fn element(&self, index: usize) -> Result<Value, ValueError> {
        let slot = self.slot(Key::Index(index))?;
        self.extract(&slot)
    }

    /// Field `name` as an independent value.
    pub fn field(&self, name: &str) -> Result<Value, ValueError> {
        let slot = self.slot(Key::Name(name))?;
        self.extract(&slot)
    }

    /// Independent copy (owned references retained again).
    ///
    /// Runs out of memory the way `Vec::clone` does; use
    /// [`Value::try_copy`] to get an error instead.
    pub fn copy(&self) -> Value {
        match self.try_copy() {
            Ok(copy) => copy,
            Err(_) => std::alloc::handle_alloc_error(self.buf.layout()),
        }
    }

    /// Independent copy, or `AllocationFailed` when the storage cannot be
    /// duplicated.
    pub fn try_copy(&self) -> Result<Value, ValueError> {
        let buf = self
            .buf
            .try_clone()
            .ok_or_else(|| ValueError::AllocationFailed(self.ty.clone()))?;
        retain_slots(buf.as_slice(), &self.ty.owned_slots());
        Ok(Self {
            ty: self.ty.clone(),
            buf,
        })
    }

    pub fn mutable_copy(&self) -> MutableValue {
        MutableValue { inner: self.copy() }
    }

    /// Pack `values` into an anonymous struct.
    pub fn tuple(values: impl IntoIterator<Item = Value>) -> Result<Value, ValueError> {
        values
            .into_iter()
            .fold(TupleBuilder::new(), TupleBuilder::push)
            .build()
    }

    fn whole(&self) -> Slot {
        Slot {
            offset: 0,
            ty: self.ty.clone(),
            owned: self.ty.owned_slots(),
            bits: None,
        }
    }

    fn slot(&self, key: Key<'_>) -> Result<Slot, ValueError> {
        match self.ty.unqualified().kind() {
            TypeKind::Array(array) => {
                let index = match key {
                    Key::Index(index) => index,
                    Key::Name(name) => return Err(ValueError::NoSuchField(name.to_owned())),
                };
                if index >= array.count() {
                    return Err(ValueError::IndexOutOfRange {
                        index,
                        count: array.count(),
                    });
                }
                let element = array.element();
                let offset = array
                    .offset_for_index(index)
                    .ok_or_else(|| ValueError::UnsizedType(element.clone()))?;
                Ok(Slot {
                    offset,
                    ty: element.clone(),
                    owned: element.owned_slots(),
                    bits: None,
                })
            }
            TypeKind::Aggregate(agg) => {
                let field = match key {
                    Key::Index(index) => agg.field_at(index).ok_or(ValueError::IndexOutOfRange {
                        index,
                        count: agg.field_count(),
                    })?,
                    Key::Name(name) => agg
                        .field_named(name)
                        .ok_or_else(|| ValueError::NoSuchField(name.to_owned()))?,
                };
                let offset = field
                    .offset()
                    .ok_or_else(|| ValueError::UnsizedType(field.ty().clone()))?;
                let owned = match agg.kind() {
                    AggregateKind::Struct => field.owned_slots(),
                    AggregateKind::Union => Vec::new().into(),
                };
                Ok(Slot {
                    offset,
                    ty: field.ty().clone(),
                    owned,
                    bits: field.bit_width().map(|w| (field.bit_offset().unwrap_or(0), w)),
                })
            }
            _ => Err(ValueError::NotIndexable(self.ty.clone())),
        }
    }

    fn region(&self, slot: &Slot) -> Result<&[u8], ValueError> {
        let size = slot
            .ty
            .layout()
            .ok_or_else(|| ValueError::UnsizedType(slot.ty.clone()))?
            .size;
        self.buf
            .as_slice()
            .get(slot.offset..slot.offset + size)
            .ok_or_else(|| ValueError::UnsizedType(slot.ty.clone()))
    }

    fn read(&self, slot: &Slot, out: &mut [u8], requested: &Type) -> Result<(), ValueError> {
        if !compatible(requested, &slot.ty) {
            return Err(ValueError::TypeMismatch {
                actual: slot.ty.clone(),
                requested: requested.clone(),
            });
        }

        let region = self.region(slot)?;
        if out.len() != region.len() {
            return Err(ValueError::SizeMismatch {
                ty: requested.clone(),
                expected: region.len(),
                actual: out.len(),
            });
        }

        match slot.bits {
            Some((bit, width)) => {
                let bits = extract_bits(load_unit(region), bit, width, region.len());
                store_unit(out, bits);
            }
            None => out.copy_from_slice(region),
        }
        Ok(())
    }

    fn extract(&self, slot: &Slot) -> Result<Value, ValueError> {
        let region = self.region(slot)?;
        match slot.bits {
            Some((bit, width)) => {
                let mut bytes = vec![0u8; region.len()];
                store_unit(&mut bytes, extract_bits(load_unit(region), bit, width, region.len()));
                Value::new(&slot.ty, &bytes)
            }
            None => Value::new(&slot.ty, region),
        }
    }

    fn write(&mut self, slot: &Slot, bytes: &[u8], incoming: &Type) -> Result<(), ValueError> {
        if !compatible(&slot.ty, incoming) {
            return Err(ValueError::TypeMismatch {
                actual: slot.ty.clone(),
                requested: incoming.clone(),
            });
        }

        let size = self.region(slot)?.len();
        if bytes.len() != size {
            return Err(ValueError::SizeMismatch {
                ty: slot.ty.clone(),
                expected: size,
                actual: bytes.len(),
            });
        }

        let region = &mut self.buf.as_mut_slice()[slot.offset..slot.offset + size];
        match slot.bits {
            Some((bit, width)) => {
                let unit = insert_bits(load_unit(region), load_unit(bytes), bit, width, size);
                store_unit(region, unit);
            }
            None => {
                // retain first: the incoming bytes may alias what the slot holds
                retain_slots(bytes, &slot.owned);
                release_slots(region, &slot.owned);
                region.copy_from_slice(bytes);
            }
        }
        log::trace!("[value] wrote {} bytes at offset {}", size, slot.offset);
        Ok(())
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        release_slots(self.buf.as_slice(), &self.ty.owned_slots());
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.as_bytes().len().min(32);
        let hex: String = self.as_bytes()[..shown]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        f.debug_struct("Value")
            .field("type", &self.ty.encoding())
            .field("size", &self.size())
            .field("bytes", &hex)
            .finish()
    }
}

/// Value with in-place writes.
#[derive(Clone, PartialEq)]
pub struct MutableValue {
    inner: Value,
}

impl MutableValue {
    pub fn new(ty: &Type, bytes: &[u8]) -> Result<Self, ValueError> {
        Value::new(ty, bytes).map(|inner| Self { inner })
    }

    pub fn zeroed(ty: &Type) -> Result<Self, ValueError> {
        Value::zeroed(ty).map(|inner| Self { inner })
    }

    pub fn boxed<T: Encode>(value: T) -> Self {
        Self {
            inner: Value::boxed(value),
        }
    }

    /// Overwrite the whole value; `ty` must be assignable to the value's type.
    pub fn set_from(&mut self, bytes: &[u8], ty: &Type) -> Result<(), ValueError> {
        let slot = self.inner.whole();
        self.inner.write(&slot, bytes, ty)
    }

    pub fn set_at_from(&mut self, bytes: &[u8], ty: &Type, index: usize) -> Result<(), ValueError> {
        let slot = self.inner.slot(Key::Index(index))?;
        self.inner.write(&slot, bytes, ty)
    }

    pub fn set_field_from(&mut self, bytes: &[u8], ty: &Type, name: &str) -> Result<(), ValueError> {
        let slot = self.inner.slot(Key::Name(name))?;
        self.inner.write(&slot, bytes, ty)
    }

    pub fn set<T: Encode>(&mut self, value: T) -> Result<(), ValueError> {
        self.set_from(encode::bytes_of(&value), &T::encoding())
    }

    pub fn set_at<T: Encode>(&mut self, index: usize, value: T) -> Result<(), ValueError> {
        self.set_at_from(encode::bytes_of(&value), &T::encoding(), index)
    }

    pub fn set_field<T: Encode>(&mut self, name: &str, value: T) -> Result<(), ValueError> {
        self.set_field_from(encode::bytes_of(&value), &T::encoding(), name)
    }

    /// Store another value's contents at element `index`.
    pub fn set_element(&mut self, index: usize, value: &Value) -> Result<(), ValueError> {
        self.set_at_from(value.as_bytes(), value.ty(), index)
    }

    /// Store another value's contents in field `name`.
    pub fn set_field_value(&mut self, name: &str, value: &Value) -> Result<(), ValueError> {
        self.set_field_from(value.as_bytes(), value.ty(), name)
    }

    /// Raw pointer for out-parameters; writes bypass retain/release.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.inner.buf.as_mut_ptr()
    }

    /// Freeze into an immutable value.
    pub fn into_value(self) -> Value {
        self.inner
    }
}

impl Deref for MutableValue {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.inner
    }
}

impl From<Value> for MutableValue {
    fn from(inner: Value) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for MutableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutableValue").field(&self.inner).finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_typed<T: Encode>(
    read: impl FnOnce(&mut [u8], &Type) -> Result<(), ValueError>,
) -> Result<T, ValueError> {
    let mut slot = MaybeUninit::<T>::zeroed();
    // SAFETY: the slot is size_of::<T>() zeroed bytes.
    let out = unsafe {
        std::slice::from_raw_parts_mut(slot.as_mut_ptr().cast::<u8>(), std::mem::size_of::<T>())
    };
    let ty = T::encoding();
    read(out, &ty)?;
    if !T::accepts(out) {
        return Err(ValueError::InvalidBitPattern(ty));
    }
    // SAFETY: fully written by `read` and accepted; Encode guarantees the
    // bit pattern is a valid T.
    Ok(unsafe { slot.assume_init() })
}

/// `target` may receive `source`; bitfields exchange with same-width integers.
fn compatible(target: &Type, source: &Type) -> bool {
    if target.is_assignable_from(source) {
        return true;
    }
    let unit_integer = |bitfield: &Type, other: &Type| {
        matches!(bitfield.kind(), TypeKind::Bitfield(_))
            && other
                .as_primitive()
                .is_some_and(|p| p.is_integer() && p.size() == bitfield.size())
    };
    unit_integer(target, source) || unit_integer(source, target)
}

fn load_unit(bytes: &[u8]) -> u64 {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).map_or(0, |b| u64::from(u32::from_ne_bytes(b))),
        8 => <[u8; 8]>::try_from(bytes).map_or(0, u64::from_ne_bytes),
        _ => 0,
    }
}

fn store_unit(out: &mut [u8], unit: u64) {
    match out.len() {
        4 => out.copy_from_slice(&(unit as u32).to_ne_bytes()),
        8 => out.copy_from_slice(&unit.to_ne_bytes()),
        _ => {}
    }
}

fn bit_shift(bit: u32, width: u32, unit_size: usize) -> u32 {
    if cfg!(target_endian = "big") {
        (unit_size as u32 * 8).saturating_sub(bit + width)
    } else {
        bit
    }
}

fn bit_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn extract_bits(unit: u64, bit: u32, width: u32, unit_size: usize) -> u64 {
    let shift = bit_shift(bit, width, unit_size);
    unit.checked_shr(shift).unwrap_or(0) & bit_mask(width)
}

fn insert_bits(unit: u64, value: u64, bit: u32, width: u32, unit_size: usize) -> u64 {
    let shift = bit_shift(bit, width, unit_size);
    let mask = bit_mask(width).checked_shl(shift).unwrap_or(0);
    (unit & !mask) | (value.checked_shl(shift).unwrap_or(0) & mask)
}

fn object_at(bytes: &[u8], offset: usize) -> Option<*mut c_void> {
    let raw = bytes.get(offset..offset + POINTER_SIZE)?;
    let raw = <[u8; POINTER_SIZE]>::try_from(raw).ok()?;
    let object = usize::from_ne_bytes(raw) as *mut c_void;
    (!object.is_null()).then_some(object)
}

pub(crate) fn retain_slots(bytes: &[u8], slots: &[usize]) {
    if slots.is_empty() {
        return;
    }
    let host = runtime::current();
    for &offset in slots {
        if let Some(object) = object_at(bytes, offset) {
            host.retain(object);
        }
    }
}

pub(crate) fn release_slots(bytes: &[u8], slots: &[usize]) {
    if slots.is_empty() {
        return;
    }
    let host = runtime::current();
    for &offset in slots {
        if let Some(object) = object_at(bytes, offset) {
            host.release(object);
        }
    }
}

#[cfg(test)]
mod tests;
