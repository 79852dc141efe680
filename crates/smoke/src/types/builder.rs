// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder API for aggregate types.

use super::{AggregateKind, Member, PrimitiveKind, Type};
use crate::runtime::Retention;

/// Builder for struct and union types.
#[derive(Debug)]
pub struct AggregateBuilder {
    kind: AggregateKind,
    name: Option<String>,
    members: Vec<Member>,
}

impl AggregateBuilder {
    /// Create a new builder for a named struct.
    pub fn structure(name: impl Into<String>) -> Self {
        Self::with_kind(AggregateKind::Struct, Some(name.into()))
    }

    /// Create a new builder for a named union.
    pub fn union(name: impl Into<String>) -> Self {
        Self::with_kind(AggregateKind::Union, Some(name.into()))
    }

    /// Create a new builder for an anonymous struct.
    pub fn anonymous() -> Self {
        Self::with_kind(AggregateKind::Struct, None)
    }

    fn with_kind(kind: AggregateKind, name: Option<String>) -> Self {
        Self {
            kind,
            name,
            members: Vec::new(),
        }
    }

    /// Add a field with an arbitrary type.
    pub fn field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.members.push(Member::named(name, ty));
        self
    }

    /// Add a primitive field.
    pub fn primitive(self, name: impl Into<String>, kind: PrimitiveKind) -> Self {
        self.field(name, Type::primitive(kind))
    }

    /// Add a field without a name.
    pub fn unnamed(mut self, ty: Type) -> Self {
        self.members.push(Member::new(ty));
        self
    }

    /// Add an `id` field with an explicit retention.
    pub fn object(mut self, name: impl Into<String>, retention: Retention) -> Self {
        self.members
            .push(Member::named(name, Type::object()).with_retention(retention));
        self
    }

    /// Add a bitfield member.
    pub fn bitfield(self, name: impl Into<String>, width: u32) -> Self {
        self.field(name, Type::bitfield(width))
    }

    /// Add a fixed-length array field.
    pub fn array(self, name: impl Into<String>, count: usize, element: Type) -> Self {
        self.field(name, Type::array(count, element))
    }

    /// Add a fully specified member.
    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    /// Place the members and build the aggregate type.
    pub fn build(self) -> Type {
        Type::aggregate(self.kind, self.name.as_deref(), self.members)
    }
}
