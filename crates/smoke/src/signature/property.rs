// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Property attribute strings (`T@"NSString",C,N,V_name`).

use crate::encoding;
use crate::error::EncodingError;
use crate::runtime::Retention;
use crate::types::Type;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const TYPE_CODE: u8 = b'T';
const SEPARATOR: u8 = b',';

/// Property attribute kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyAttributeKind {
    /// `R`
    ReadOnly,
    /// `C`
    Copy,
    /// `&`
    Retain,
    /// `N`
    Nonatomic,
    /// `G<name>`
    Getter,
    /// `S<name>`
    Setter,
    /// `D`
    Dynamic,
    /// `W`
    Weak,
    /// `P`
    GarbageCollected,
    /// `t<encoding>`
    LegacyEncoding,
    /// `V<name>`
    Ivar,
}

impl PropertyAttributeKind {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'R' => Self::ReadOnly,
            b'C' => Self::Copy,
            b'&' => Self::Retain,
            b'N' => Self::Nonatomic,
            b'G' => Self::Getter,
            b'S' => Self::Setter,
            b'D' => Self::Dynamic,
            b'W' => Self::Weak,
            b'P' => Self::GarbageCollected,
            b't' => Self::LegacyEncoding,
            b'V' => Self::Ivar,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        match self {
            Self::ReadOnly => 'R',
            Self::Copy => 'C',
            Self::Retain => '&',
            Self::Nonatomic => 'N',
            Self::Getter => 'G',
            Self::Setter => 'S',
            Self::Dynamic => 'D',
            Self::Weak => 'W',
            Self::GarbageCollected => 'P',
            Self::LegacyEncoding => 't',
            Self::Ivar => 'V',
        }
    }

    /// Whether the attribute carries a payload.
    pub fn has_value(self) -> bool {
        matches!(
            self,
            Self::Getter | Self::Setter | Self::LegacyEncoding | Self::Ivar
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyAttribute {
    kind: PropertyAttributeKind,
    value: Option<Arc<str>>,
}

impl PropertyAttribute {
    pub fn kind(&self) -> PropertyAttributeKind {
        self.kind
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Parsed property description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PropertySignature {
    ty: Option<Type>,
    attributes: Vec<PropertyAttribute>,
}

impl PropertySignature {
    /// Parse a property attribute string.
    ///
    /// The `T` attribute is parsed with the type parser so encodings
    /// containing commas (C++ template names) survive.
    pub fn parse(encoding: &str) -> Result<Self, EncodingError> {
        if encoding.is_empty() {
            return Err(EncodingError::Empty);
        }

        let bytes = encoding.as_bytes();
        let mut signature = Self::default();
        let mut pos = 0usize;

        while pos < bytes.len() {
            let code = bytes[pos];
            let body = pos + 1;

            if code == TYPE_CODE {
                if signature.ty.is_some() {
                    return Err(EncodingError::DuplicateAttribute('T'));
                }
                let (ty, rest) = encoding::parse_prefix(&encoding[body..]).map_err(|err| {
                    shift_position(err, body)
                })?;
                signature.ty = Some(ty);
                pos = encoding.len() - rest.len();
            } else {
                let kind = PropertyAttributeKind::from_code(code)
                    .ok_or(EncodingError::UnknownAttribute(code as char))?;
                let end = bytes[body..]
                    .iter()
                    .position(|&b| b == SEPARATOR)
                    .map_or(bytes.len(), |i| body + i);
                let payload = encoding.get(body..end).unwrap_or_default();

                let value = if kind.has_value() {
                    Some(payload)
                } else if payload.is_empty() {
                    None
                } else {
                    return Err(EncodingError::malformed(
                        body,
                        format!("attribute '{}' takes no value", kind.code()),
                    ));
                };
                signature.insert(kind, value)?;
                pos = end;
            }

            match bytes.get(pos) {
                None => break,
                Some(&SEPARATOR) if pos + 1 < bytes.len() => pos += 1,
                Some(_) => {
                    return Err(EncodingError::malformed(pos, "expected ',' between attributes"))
                }
            }
        }

        log::trace!("[encoding] parsed property {:?}", encoding);
        Ok(signature)
    }

    /// Start a signature for a property of type `ty`.
    pub fn new(ty: Type) -> Self {
        Self {
            ty: Some(ty),
            attributes: Vec::new(),
        }
    }

    /// Add a bare flag (`R`, `C`, `&`, `N`, `D`, `W`, `P`).
    pub fn with_flag(mut self, kind: PropertyAttributeKind) -> Result<Self, EncodingError> {
        if kind.has_value() {
            return Err(EncodingError::malformed(
                0,
                format!("attribute '{}' requires a value", kind.code()),
            ));
        }
        self.insert(kind, None)?;
        Ok(self)
    }

    /// Add a payload attribute (`G`, `S`, `t`, `V`).
    pub fn with_value(
        mut self,
        kind: PropertyAttributeKind,
        value: &str,
    ) -> Result<Self, EncodingError> {
        if !kind.has_value() {
            return Err(EncodingError::malformed(
                0,
                format!("attribute '{}' takes no value", kind.code()),
            ));
        }
        self.insert(kind, Some(value))?;
        Ok(self)
    }

    fn insert(&mut self, kind: PropertyAttributeKind, value: Option<&str>) -> Result<(), EncodingError> {
        if self.attribute(kind).is_some() {
            return Err(EncodingError::DuplicateAttribute(kind.code()));
        }
        self.attributes.push(PropertyAttribute {
            kind,
            value: value.map(Arc::from),
        });
        Ok(())
    }

    pub fn ty(&self) -> Option<&Type> {
        self.ty.as_ref()
    }

    pub fn attributes(&self) -> &[PropertyAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, kind: PropertyAttributeKind) -> Option<&PropertyAttribute> {
        self.attributes.iter().find(|a| a.kind == kind)
    }

    pub fn has(&self, kind: PropertyAttributeKind) -> bool {
        self.attribute(kind).is_some()
    }

    /// Backing instance variable, from the `V` attribute.
    pub fn ivar_name(&self) -> Option<&str> {
        self.attribute(PropertyAttributeKind::Ivar)?.value()
    }

    pub fn getter(&self) -> Option<&str> {
        self.attribute(PropertyAttributeKind::Getter)?.value()
    }

    pub fn setter(&self) -> Option<&str> {
        self.attribute(PropertyAttributeKind::Setter)?.value()
    }

    pub fn is_read_only(&self) -> bool {
        self.has(PropertyAttributeKind::ReadOnly)
    }

    /// Ownership of the backing storage.
    pub fn retention(&self) -> Retention {
        if self.has(PropertyAttributeKind::Weak) {
            Retention::Weak
        } else if self.has(PropertyAttributeKind::Copy) || self.has(PropertyAttributeKind::Retain) {
            Retention::Strong
        } else if let Some(ty) = &self.ty {
            match ty.default_retention() {
                // object properties without an ownership flag are `assign`
                Retention::Strong => Retention::Unretained,
                other => other,
            }
        } else {
            Retention::Unretained
        }
    }

    /// Canonical attribute string: type first, then attributes in insertion order.
    pub fn encoding(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.attributes.len() + 1);
        if let Some(ty) = &self.ty {
            parts.push(format!("T{}", ty.encoding()));
        }
        for attribute in &self.attributes {
            let mut part = attribute.kind.code().to_string();
            part.push_str(attribute.value().unwrap_or_default());
            parts.push(part);
        }
        parts.join(",")
    }
}

fn shift_position(err: EncodingError, by: usize) -> EncodingError {
    match err {
        EncodingError::Malformed { position, reason } => EncodingError::Malformed {
            position: position + by,
            reason,
        },
        EncodingError::Empty => EncodingError::malformed(by, "missing property type"),
        other => other,
    }
}

impl FromStr for PropertySignature {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PropertySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoding())
    }
}
