// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rendering: canonical encodings and C-like declarations.

use super::{AggregateType, CompositeKind, ObjectKind, ObjectType, Type, TypeKind};
use std::fmt::{self, Write};

impl Type {
    /// Canonical encoding; parsing it yields an equal type.
    pub fn encoding(&self) -> String {
        let mut out = String::new();
        write_encoding(self, &mut out);
        out
    }

    /// C-like spelling (`int`, `struct Point`, `NSString<NSCopying> *`).
    pub fn format(&self) -> String {
        self.to_string()
    }
}

pub(crate) fn write_encoding(ty: &Type, out: &mut String) {
    match ty.kind() {
        TypeKind::Unknown => out.push('?'),
        TypeKind::Void => out.push('v'),
        TypeKind::Primitive(p) => out.push(p.code()),
        TypeKind::Object(object) => write_object_encoding(object, out),
        TypeKind::Composite(kind, inner) => {
            out.push(kind.code());
            write_encoding(inner, out);
        }
        TypeKind::Bitfield(width) => {
            let _ = write!(out, "b{}", width);
        }
        TypeKind::Array(array) => {
            let _ = write!(out, "[{}", array.count());
            write_encoding(array.element(), out);
            out.push(']');
        }
        TypeKind::Aggregate(agg) => write_aggregate_encoding(agg, out),
    }
}

fn write_object_encoding(object: &ObjectType, out: &mut String) {
    match object.kind() {
        ObjectKind::Class => {
            out.push('#');
            return;
        }
        ObjectKind::Block => {
            out.push_str("@?");
            if let Some(signature) = object.block_signature() {
                out.push('<');
                out.push_str(&signature.compact_encoding());
                out.push('>');
            }
        }
        ObjectKind::Generic => out.push('@'),
    }

    if object.class_name().is_some() || object.protocols().next().is_some() {
        out.push('"');
        out.push_str(object.class_name().unwrap_or_default());
        for protocol in object.protocols() {
            let _ = write!(out, "<{}>", protocol);
        }
        out.push('"');
    }
}

fn write_aggregate_encoding(agg: &AggregateType, out: &mut String) {
    out.push(agg.kind().open());
    out.push_str(agg.name().unwrap_or("?"));
    if let Some(fields) = agg.fields() {
        out.push('=');
        let named = agg.has_field_names();
        for field in fields {
            if named {
                let _ = write!(out, "\"{}\"", field.name().unwrap_or_default());
            }
            write_encoding(field.ty(), out);
        }
    }
    out.push(agg.kind().close());
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TypeKind::Unknown => f.write_str("?"),
            TypeKind::Void => f.write_str("void"),
            TypeKind::Primitive(p) => f.write_str(p.c_name()),
            TypeKind::Object(object) => format_object(object, f),
            TypeKind::Composite(kind, inner) => match kind {
                CompositeKind::Pointer => write!(f, "{} *", inner),
                CompositeKind::Const => write!(f, "const {}", inner),
                CompositeKind::Atomic => write!(f, "_Atomic({})", inner),
                CompositeKind::Complex => write!(f, "_Complex {}", inner),
                CompositeKind::Vector => write!(f, "__vector({})", inner),
            },
            TypeKind::Bitfield(width) => write!(f, "unsigned int : {}", width),
            TypeKind::Array(array) => write!(f, "{}[{}]", array.element(), array.count()),
            TypeKind::Aggregate(agg) => format_aggregate(agg, f),
        }
    }
}

fn format_object(object: &ObjectType, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match object.kind() {
        ObjectKind::Class => f.write_str("Class"),
        ObjectKind::Block => match object.block_signature() {
            Some(signature) => {
                write!(f, "{} (^)(", signature.return_value().ty())?;
                let arguments = signature.arguments().iter().skip(1);
                for (i, argument) in arguments.enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", argument.ty())?;
                }
                f.write_str(")")
            }
            None => f.write_str("id /* block */"),
        },
        ObjectKind::Generic => {
            f.write_str(object.class_name().unwrap_or("id"))?;
            let protocols: Vec<&str> = object.protocols().collect();
            if !protocols.is_empty() {
                write!(f, "<{}>", protocols.join(", "))?;
            }
            if object.class_name().is_some() {
                f.write_str(" *")?;
            }
            Ok(())
        }
    }
}

fn format_aggregate(agg: &AggregateType, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let keyword = agg.kind().keyword();
    if let Some(name) = agg.name() {
        return write!(f, "{} {}", keyword, name);
    }

    write!(f, "{} {{", keyword)?;
    for (i, field) in agg.fields().unwrap_or_default().iter().enumerate() {
        match field.bit_width() {
            Some(width) => write!(f, " unsigned int {} : {};", field_label(field.name(), i), width)?,
            None => write!(f, " {} {};", field.ty(), field_label(field.name(), i))?,
        }
    }
    f.write_str(" }")
}

fn field_label(name: Option<&str>, index: usize) -> String {
    name.map_or_else(|| format!("_{}", index), str::to_owned)
}
