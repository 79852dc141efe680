// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host-ABI layout: sizes, alignments and aggregate field placement.
//!
//! Structs follow natural C layout: each field starts at the running offset
//! rounded up to its alignment, and the total is rounded up to the largest
//! field alignment. Bitfields are placed bit by bit: each takes the next free
//! bits of the `int` (or `long long` for widths above 32) storage unit that
//! holds the current position, moving to the next unit only when it would
//! cross a unit boundary. Ordinary fields may share that unit's bytes. A
//! zero-length array in last position is a flexible tail: it gets an offset
//! but no storage.
//!
//! Unions put every member at offset 0.

use super::{AggregateKind, CompositeKind, Type, TypeKind, TypeLayout};
use crate::config::{MAX_VECTOR_ALIGN, POINTER_ALIGN, POINTER_SIZE};

const POINTER_LAYOUT: TypeLayout = TypeLayout::new(POINTER_SIZE, POINTER_ALIGN);

/// Field offsets produced by [`place`]: `(byte offset, bit offset)` per member.
pub(crate) struct Placement {
    pub slots: Vec<(Option<usize>, Option<u32>)>,
    pub layout: Option<TypeLayout>,
}

pub(crate) fn round_up(value: usize, align: usize) -> Option<usize> {
    value.checked_next_multiple_of(align.max(1))
}

/// Storage unit of a bitfield of `width` bits.
pub(crate) fn storage_unit(width: u32) -> Option<TypeLayout> {
    match width {
        0..=32 => Some(TypeLayout::new(4, 4)),
        33..=64 => Some(TypeLayout::new(8, 8)),
        _ => None,
    }
}

/// Layout of a non-aggregate kind, or of an aggregate from its fields.
pub(crate) fn compute(kind: &TypeKind) -> Option<TypeLayout> {
    match kind {
        TypeKind::Unknown => None,
        TypeKind::Void => Some(TypeLayout::new(0, 1)),
        TypeKind::Primitive(p) => Some(p.layout()),
        TypeKind::Object(_) => Some(POINTER_LAYOUT),
        TypeKind::Composite(kind, inner) => match kind {
            CompositeKind::Pointer => Some(POINTER_LAYOUT),
            CompositeKind::Const | CompositeKind::Atomic => inner.layout(),
            CompositeKind::Complex => {
                let l = inner.layout()?;
                Some(TypeLayout::new(l.size.checked_mul(2)?, l.alignment))
            }
            CompositeKind::Vector => {
                let size = inner.layout()?.size.max(1).checked_next_power_of_two()?;
                Some(TypeLayout::new(size, size.min(MAX_VECTOR_ALIGN)))
            }
        },
        TypeKind::Bitfield(width) => storage_unit(*width),
        TypeKind::Array(array) => {
            let l = array.element().layout()?;
            Some(TypeLayout::new(l.size.checked_mul(array.count())?, l.alignment))
        }
        TypeKind::Aggregate(agg) => {
            let fields = agg.fields()?;
            let types: Vec<&Type> = fields.iter().map(|f| f.ty()).collect();
            place(agg.kind(), &types).layout
        }
    }
}

/// Place aggregate members.
pub(crate) fn place(kind: AggregateKind, members: &[&Type]) -> Placement {
    match kind {
        AggregateKind::Struct => place_struct(members),
        AggregateKind::Union => place_union(members),
    }
}

/// Running position inside a struct: `bytes` whole bytes plus `bits` (< 8)
/// of the next one.
#[derive(Default)]
struct Cursor {
    bytes: usize,
    bits: u32,
}

impl Cursor {
    /// First byte not touched by anything placed so far.
    fn byte_end(&self) -> Option<usize> {
        self.bytes.checked_add(usize::from(self.bits > 0))
    }

    /// Place a `width`-bit field in a `unit`-sized storage unit; returns the
    /// unit's byte offset and the field's bit offset inside it.
    fn place_bits(&mut self, width: u32, unit: usize) -> Option<(usize, u32)> {
        let unit_bits = u32::try_from(unit * 8).ok()?;
        let mut start = self.bytes - self.bytes % unit;
        let mut used = u32::try_from(self.bytes - start).ok()? * 8 + self.bits;
        if used + width > unit_bits {
            start = start.checked_add(unit)?;
            used = 0;
        }
        let end = used + width;
        self.bytes = start.checked_add((end / 8) as usize)?;
        self.bits = end % 8;
        Some((start, used))
    }

    /// Skip to the next `unit` boundary, unless already on one.
    fn close_unit(&mut self, unit: usize) -> Option<usize> {
        let next = round_up(self.byte_end()?, unit)?;
        self.bytes = next;
        self.bits = 0;
        Some(next)
    }
}

fn place_struct(members: &[&Type]) -> Placement {
    let mut slots = Vec::with_capacity(members.len());
    let mut cursor = Cursor::default();
    let mut align = 1usize;
    let mut known = true;
    let last = members.len().saturating_sub(1);

    for (index, ty) in members.iter().enumerate() {
        if !known {
            slots.push((None, None));
            continue;
        }

        if let TypeKind::Bitfield(width) = ty.kind() {
            let placed = storage_unit(*width).and_then(|unit| {
                if *width == 0 {
                    // no storage; the next field starts on a fresh unit
                    return cursor.close_unit(unit.size).map(|offset| (offset, 0));
                }
                align = align.max(unit.alignment);
                cursor.place_bits(*width, unit.size)
            });
            match placed {
                Some((offset, bit)) => slots.push((Some(offset), Some(bit))),
                None => {
                    known = false;
                    slots.push((None, None));
                }
            }
            continue;
        }

        let Some(l) = ty.layout() else {
            log::trace!("[layout] field {} has unknown layout", index);
            known = false;
            slots.push((None, None));
            continue;
        };

        let Some(start) = cursor.byte_end().and_then(|end| round_up(end, l.alignment)) else {
            known = false;
            slots.push((None, None));
            continue;
        };
        slots.push((Some(start), None));
        cursor = Cursor {
            bytes: start,
            bits: 0,
        };

        let flexible = index == last && matches!(ty.kind(), TypeKind::Array(a) if a.count() == 0);
        if flexible {
            continue;
        }

        match start.checked_add(l.size) {
            Some(end) => cursor.bytes = end,
            None => known = false,
        }
        align = align.max(l.alignment);
    }

    let layout = if known {
        cursor
            .byte_end()
            .and_then(|end| round_up(end, align))
            .map(|size| TypeLayout::new(size, align))
    } else {
        None
    };

    Placement { slots, layout }
}

fn place_union(members: &[&Type]) -> Placement {
    let mut size = 0usize;
    let mut align = 1usize;
    let mut known = true;

    let slots = members
        .iter()
        .map(|ty| {
            match ty.layout() {
                Some(l) => {
                    size = size.max(l.size);
                    align = align.max(l.alignment);
                }
                None => known = false,
            }
            let bit_offset = matches!(ty.kind(), TypeKind::Bitfield(_)).then_some(0);
            (Some(0), bit_offset)
        })
        .collect();

    let layout = if known {
        round_up(size, align).map(|size| TypeLayout::new(size, align))
    } else {
        None
    };

    Placement { slots, layout }
}

/// Offsets of the owned references inside a value of `ty`.
pub(crate) fn owned_slots(ty: &Type) -> Vec<usize> {
    let mut out = Vec::new();
    collect_owned(ty, 0, &mut out);
    out
}

fn collect_owned(ty: &Type, base: usize, out: &mut Vec<usize>) {
    match ty.kind() {
        TypeKind::Object(_) => {
            if ty.default_retention().is_owned() {
                out.push(base);
            }
        }
        TypeKind::Composite(kind, inner) if kind.is_transparent() => {
            collect_owned(inner, base, out);
        }
        TypeKind::Array(array) => {
            let Some(stride) = array.element().layout().map(|l| l.size) else {
                return;
            };
            let inner = array.element().owned_slots();
            if inner.is_empty() {
                return;
            }
            for i in 0..array.count() {
                let start = base + i * stride;
                out.extend(inner.iter().map(|slot| start + slot));
            }
        }
        TypeKind::Aggregate(agg) if agg.kind() == AggregateKind::Struct => {
            for field in agg.fields().unwrap_or_default() {
                let Some(offset) = field.offset() else {
                    continue;
                };
                out.extend(field.owned_slots().iter().map(|slot| base + offset + slot));
            }
        }
        // unions never own: the active member is unknown
        _ => {}
    }
}
