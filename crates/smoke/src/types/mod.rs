// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type model for runtime type encodings.
//!
//! A [`Type`] is an immutable, shared node describing one C-level type:
//! primitives, object references, pointers and other single-inner wrappers,
//! bitfields, fixed arrays, structs and unions. Every node knows its size and
//! alignment under the host ABI; aggregates additionally know the byte (and
//! bit) offset of each field.
//!
//! # Features
//!
//! - **Interning**: `void`, unknown and every primitive kind are process-wide
//!   singletons, so pointer equality short-circuits most comparisons
//! - **Memoized layout**: computed once per node, on first use
//! - **Builder API**: [`AggregateBuilder`] for programmatic aggregates
//!
//! # Example
//!
//! ```rust
//! use smoke::types::{AggregateBuilder, PrimitiveKind, Type};
//!
//! let point = AggregateBuilder::structure("Point")
//!     .primitive("x", PrimitiveKind::Int)
//!     .primitive("y", PrimitiveKind::Int)
//!     .build();
//!
//! assert_eq!(point.size(), 8);
//! assert_eq!(point.alignment(), 4);
//! assert_eq!(point.encoding(), r#"{Point="x"i"y"i}"#);
//!
//! let y = point.as_aggregate().and_then(|a| a.field_named("y")).unwrap();
//! assert_eq!(y.offset(), Some(4));
//! ```

mod builder;
mod format;
mod kinds;
pub(crate) mod layout;

pub use builder::AggregateBuilder;
pub use kinds::{AggregateKind, CompositeKind, ObjectKind, PrimitiveKind};

use crate::runtime::{self, Retention};
use crate::signature::MethodSignature;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Size reported by types whose layout cannot be computed.
pub const SIZE_UNKNOWN: usize = usize::MAX;

/// Alignment reported by types whose layout cannot be computed.
pub const ALIGN_UNKNOWN: usize = usize::MAX;

/// Size and alignment of a type under the host ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeLayout {
    pub size: usize,
    pub alignment: usize,
}

impl TypeLayout {
    pub const fn new(size: usize, alignment: usize) -> Self {
        Self { size, alignment }
    }
}

/// Type kind enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// `?`, or a subtree that failed to parse.
    Unknown,
    /// `v`
    Void,
    /// Scalar with a single-character code.
    Primitive(PrimitiveKind),
    /// `@`, `@?`, `#` with optional class and protocol names.
    Object(ObjectType),
    /// Pointer, vector, complex, atomic or const wrapper.
    Composite(CompositeKind, Type),
    /// `b<width>`; only meaningful as an aggregate field.
    Bitfield(u32),
    /// `[count type]`
    Array(ArrayType),
    /// `{...}` or `(...)`
    Aggregate(AggregateType),
}

/// Object reference description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectType {
    kind: ObjectKind,
    class_name: Option<Arc<str>>,
    protocols: Vec<Arc<str>>,
    block_signature: Option<Arc<MethodSignature>>,
}

impl ObjectType {
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn protocols(&self) -> impl Iterator<Item = &str> {
        self.protocols.iter().map(|p| &**p)
    }

    /// Signature of a block, when the encoding carried one.
    pub fn block_signature(&self) -> Option<&MethodSignature> {
        self.block_signature.as_deref()
    }

    fn accepts(&self, source: &ObjectType) -> bool {
        if !self.kind.accepts(source.kind) {
            return false;
        }

        if let (Some(expected), Some(actual)) = (&self.block_signature, &source.block_signature) {
            if expected != actual {
                return false;
            }
        }

        if self.class_name.is_none() && self.protocols.is_empty() {
            return true;
        }

        let host = runtime::current();
        if let Some(expected) = self.class_name.as_deref() {
            match source.class_name.as_deref() {
                Some(actual) if actual == expected || host.is_subclass(actual, expected) => {}
                _ => return false,
            }
        }

        self.protocols.iter().all(|protocol| {
            source.protocols.contains(protocol)
                || source
                    .class_name
                    .as_deref()
                    .is_some_and(|class| host.conforms_to(class, protocol))
        })
    }
}

/// Fixed-length array description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayType {
    count: usize,
    element: Type,
}

impl ArrayType {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn element(&self) -> &Type {
        &self.element
    }

    /// Byte offset of element `index` (not bounds-checked).
    pub fn offset_for_index(&self, index: usize) -> Option<usize> {
        self.element.layout()?.size.checked_mul(index)
    }
}

/// Placed aggregate field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: Option<Arc<str>>,
    ty: Type,
    offset: Option<usize>,
    bit_offset: Option<u32>,
    retention: Retention,
}

impl Field {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Byte offset; `None` when an earlier field has unknown layout.
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Position of a bitfield member inside its storage unit.
    pub fn bit_offset(&self) -> Option<u32> {
        self.bit_offset
    }

    pub fn bit_width(&self) -> Option<u32> {
        match self.ty.kind() {
            TypeKind::Bitfield(width) => Some(*width),
            _ => None,
        }
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Owned-reference offsets relative to this field's offset.
    pub(crate) fn owned_slots(&self) -> Arc<[usize]> {
        if matches!(self.ty.unqualified().kind(), TypeKind::Object(_)) {
            if self.retention.is_owned() {
                vec![0].into()
            } else {
                Vec::new().into()
            }
        } else {
            self.ty.owned_slots()
        }
    }
}

/// Struct or union description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateType {
    kind: AggregateKind,
    name: Option<Arc<str>>,
    fields: Option<Arc<[Field]>>,
}

impl AggregateType {
    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `None` for a forward declaration (`{Name}`).
    pub fn fields(&self) -> Option<&[Field]> {
        self.fields.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.fields.is_some()
    }

    pub fn field_count(&self) -> usize {
        self.fields().map_or(0, <[Field]>::len)
    }

    pub fn has_field_names(&self) -> bool {
        self.fields()
            .is_some_and(|fields| fields.iter().any(|f| f.name.is_some()))
    }

    pub fn field_at(&self, index: usize) -> Option<&Field> {
        self.fields()?.get(index)
    }

    /// Field occupying byte `offset` (the first one, for unions).
    pub fn field_at_offset(&self, offset: usize) -> Option<&Field> {
        self.fields()?.iter().find(|field| {
            let Some(start) = field.offset else {
                return false;
            };
            let width = field.ty.layout().map_or(0, |l| l.size);
            offset == start || (offset > start && offset - start < width)
        })
    }

    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields()?.iter().find(|f| f.name() == Some(name))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields()?.iter().position(|f| f.name() == Some(name))
    }
}

/// Aggregate member before placement.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: Option<String>,
    pub ty: Type,
    /// Overrides the type's default retention.
    pub retention: Option<Retention>,
}

impl Member {
    pub fn new(ty: Type) -> Self {
        Self {
            name: None,
            ty,
            retention: None,
        }
    }

    pub fn named(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            retention: None,
        }
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = Some(retention);
        self
    }
}

struct TypeNode {
    kind: TypeKind,
    layout: OnceLock<Option<TypeLayout>>,
    owned: OnceLock<Arc<[usize]>>,
}

/// Shared, immutable type node.
#[derive(Clone)]
pub struct Type(Arc<TypeNode>);

impl Type {
    /// Wrap `kind`, returning the interned node for void, unknown and primitives.
    pub fn new(kind: TypeKind) -> Self {
        match kind {
            TypeKind::Void => Self::void(),
            TypeKind::Unknown => Self::unknown(),
            TypeKind::Primitive(p) => Self::primitive(p),
            TypeKind::Aggregate(agg) => match agg.fields {
                Some(fields) => {
                    let members = fields
                        .iter()
                        .map(|f| Member {
                            name: f.name.as_deref().map(str::to_owned),
                            ty: f.ty.clone(),
                            retention: Some(f.retention),
                        })
                        .collect();
                    Self::aggregate(agg.kind, agg.name.as_deref(), members)
                }
                None => Self::forward(agg.kind, agg.name.as_deref()),
            },
            other => Self::from_kind(other),
        }
    }

    fn from_kind(kind: TypeKind) -> Self {
        Self(Arc::new(TypeNode {
            kind,
            layout: OnceLock::new(),
            owned: OnceLock::new(),
        }))
    }

    pub fn void() -> Self {
        static VOID: OnceLock<Type> = OnceLock::new();
        VOID.get_or_init(|| Self::from_kind(TypeKind::Void)).clone()
    }

    pub fn unknown() -> Self {
        static UNKNOWN: OnceLock<Type> = OnceLock::new();
        UNKNOWN
            .get_or_init(|| Self::from_kind(TypeKind::Unknown))
            .clone()
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        static PRIMITIVES: OnceLock<Vec<Type>> = OnceLock::new();
        let table = PRIMITIVES.get_or_init(|| {
            PrimitiveKind::ALL
                .iter()
                .map(|&p| Self::from_kind(TypeKind::Primitive(p)))
                .collect()
        });
        table[kind.index()].clone()
    }

    /// Generic `id`.
    pub fn object() -> Self {
        static ID: OnceLock<Type> = OnceLock::new();
        ID.get_or_init(|| Self::object_with(ObjectKind::Generic, None, Vec::new(), None))
            .clone()
    }

    /// `Class`.
    pub fn class() -> Self {
        static CLASS: OnceLock<Type> = OnceLock::new();
        CLASS
            .get_or_init(|| Self::object_with(ObjectKind::Class, None, Vec::new(), None))
            .clone()
    }

    /// `id` restricted to a class and/or protocol list.
    pub fn object_of<'a>(
        class_name: Option<&str>,
        protocols: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let protocols: Vec<Arc<str>> = protocols.into_iter().map(Arc::from).collect();
        if class_name.is_none() && protocols.is_empty() {
            return Self::object();
        }
        Self::object_with(ObjectKind::Generic, class_name.map(Arc::from), protocols, None)
    }

    /// Block reference, optionally carrying its call signature.
    pub fn block(signature: Option<MethodSignature>) -> Self {
        Self::object_with(ObjectKind::Block, None, Vec::new(), signature.map(Arc::new))
    }

    pub(crate) fn object_with(
        kind: ObjectKind,
        class_name: Option<Arc<str>>,
        protocols: Vec<Arc<str>>,
        block_signature: Option<Arc<MethodSignature>>,
    ) -> Self {
        Self::from_kind(TypeKind::Object(ObjectType {
            kind,
            class_name,
            protocols,
            block_signature,
        }))
    }

    pub fn pointer(pointee: Type) -> Self {
        Self::composite(CompositeKind::Pointer, pointee)
    }

    pub fn composite(kind: CompositeKind, inner: Type) -> Self {
        Self::from_kind(TypeKind::Composite(kind, inner))
    }

    pub fn array(count: usize, element: Type) -> Self {
        Self::from_kind(TypeKind::Array(ArrayType { count, element }))
    }

    pub fn bitfield(width: u32) -> Self {
        Self::from_kind(TypeKind::Bitfield(width))
    }

    /// Place `members` and build a complete aggregate.
    ///
    /// A name of `?` or an empty name denotes an anonymous aggregate.
    pub fn aggregate(kind: AggregateKind, name: Option<&str>, members: Vec<Member>) -> Self {
        let types: Vec<&Type> = members.iter().map(|m| &m.ty).collect();
        let placement = layout::place(kind, &types);

        let fields: Arc<[Field]> = members
            .into_iter()
            .zip(placement.slots)
            .map(|(member, (offset, bit_offset))| Field {
                retention: member
                    .retention
                    .unwrap_or_else(|| member.ty.default_retention()),
                name: member.name.map(Arc::from),
                ty: member.ty,
                offset,
                bit_offset,
            })
            .collect();

        Self(Arc::new(TypeNode {
            kind: TypeKind::Aggregate(AggregateType {
                kind,
                name: normalize_name(name),
                fields: Some(fields),
            }),
            layout: OnceLock::from(placement.layout),
            owned: OnceLock::new(),
        }))
    }

    /// Incomplete aggregate (`{Name}`); its layout is unknown.
    pub fn forward(kind: AggregateKind, name: Option<&str>) -> Self {
        Self::from_kind(TypeKind::Aggregate(AggregateType {
            kind,
            name: normalize_name(name),
            fields: None,
        }))
    }

    pub fn structure(name: Option<&str>, members: Vec<Member>) -> Self {
        Self::aggregate(AggregateKind::Struct, name, members)
    }

    pub fn union(name: Option<&str>, members: Vec<Member>) -> Self {
        Self::aggregate(AggregateKind::Union, name, members)
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    /// Size and alignment, or `None` for unknown/incomplete types.
    pub fn layout(&self) -> Option<TypeLayout> {
        *self.0.layout.get_or_init(|| layout::compute(&self.0.kind))
    }

    /// Size in bytes, or [`SIZE_UNKNOWN`].
    pub fn size(&self) -> usize {
        self.layout().map_or(SIZE_UNKNOWN, |l| l.size)
    }

    /// Alignment in bytes, or [`ALIGN_UNKNOWN`].
    pub fn alignment(&self) -> usize {
        self.layout().map_or(ALIGN_UNKNOWN, |l| l.alignment)
    }

    pub fn is_sized(&self) -> bool {
        self.layout().is_some()
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind(), TypeKind::Void)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind(), TypeKind::Unknown)
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind(), TypeKind::Object(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind(), TypeKind::Composite(CompositeKind::Pointer, _))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self.kind() {
            TypeKind::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self.kind() {
            TypeKind::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match self.kind() {
            TypeKind::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&AggregateType> {
        match self.kind() {
            TypeKind::Aggregate(a) => Some(a),
            _ => None,
        }
    }

    pub fn pointee(&self) -> Option<&Type> {
        match self.kind() {
            TypeKind::Composite(CompositeKind::Pointer, inner) => Some(inner),
            _ => None,
        }
    }

    /// Strip `const` and `_Atomic` qualifiers.
    pub fn unqualified(&self) -> &Type {
        let mut ty = self;
        loop {
            match ty.kind() {
                TypeKind::Composite(kind, inner) if kind.is_transparent() => ty = inner,
                _ => return ty,
            }
        }
    }

    /// Retention a field of this type gets unless told otherwise.
    pub fn default_retention(&self) -> Retention {
        match self.unqualified().kind() {
            TypeKind::Object(o) if o.kind != ObjectKind::Class => Retention::Strong,
            _ => Retention::Unretained,
        }
    }

    /// Byte offsets of the owned references a value of this type holds.
    pub(crate) fn owned_slots(&self) -> Arc<[usize]> {
        Arc::clone(
            self.0
                .owned
                .get_or_init(|| layout::owned_slots(self).into()),
        )
    }

    pub fn ptr_eq(&self, other: &Type) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether a slot of this type may receive a value of type `source`.
    pub fn is_assignable_from(&self, source: &Type) -> bool {
        if self.ptr_eq(source) {
            return true;
        }

        match (self.kind(), source.kind()) {
            (TypeKind::Object(target), TypeKind::Object(actual)) => target.accepts(actual),
            (
                TypeKind::Composite(CompositeKind::Pointer, target),
                TypeKind::Composite(CompositeKind::Pointer, actual),
            ) => target.unqualified().is_void() || target.is_assignable_from(actual),
            (
                TypeKind::Composite(CompositeKind::Const, target),
                TypeKind::Composite(CompositeKind::Const, actual),
            ) => target.is_assignable_from(actual),
            (TypeKind::Composite(CompositeKind::Const, target), _) => {
                target.is_assignable_from(source)
            }
            (_, TypeKind::Composite(CompositeKind::Const, actual)) => {
                self.is_assignable_from(actual)
            }
            _ => self == source,
        }
    }
}

fn normalize_name(name: Option<&str>) -> Option<Arc<str>> {
    name.filter(|n| !n.is_empty() && *n != "?").map(Arc::from)
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.kind == other.0.kind
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.kind.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Type").field(&self.encoding()).finish()
    }
}

impl From<PrimitiveKind> for Type {
    fn from(kind: PrimitiveKind) -> Self {
        Self::primitive(kind)
    }
}
