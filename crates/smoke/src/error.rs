// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy.
//!
//! One enum per concern; [`Error`] wraps them all for callers that do not
//! care which layer failed.

use crate::types::Type;
use thiserror::Error;

/// Failure to parse a type, method or property encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("empty encoding")]
    Empty,

    #[error("malformed encoding at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },

    #[error("duplicate property attribute '{0}'")]
    DuplicateAttribute(char),

    #[error("unknown property attribute '{0}'")]
    UnknownAttribute(char),
}

impl EncodingError {
    pub(crate) fn malformed(position: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            position,
            reason: reason.into(),
        }
    }
}

/// Failure to construct, read or write a [`Value`](crate::value::Value).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("size mismatch for {ty}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        ty: Type,
        expected: usize,
        actual: usize,
    },

    #[error("type mismatch: slot holds {actual}, caller used {requested}")]
    TypeMismatch { actual: Type, requested: Type },

    #[error("index {index} out of range ({count} elements)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("no field named '{0}'")]
    NoSuchField(String),

    #[error("{0} is neither an array nor an aggregate")]
    NotIndexable(Type),

    #[error("{0} has no known or representable size")]
    UnsizedType(Type),

    #[error("stored bytes are not a valid {0}")]
    InvalidBitPattern(Type),

    #[error("could not allocate storage for {0}")]
    AllocationFailed(Type),
}

/// Failure to describe a signature to libffi.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FfiError {
    #[error("{0} cannot be passed through the C calling convention")]
    UnsupportedType(Type),

    #[error("empty aggregate {0} has no libffi representation")]
    EmptyAggregate(Type),

    #[error(
        "layout mismatch for {ty}: type model says {expected_size}/{expected_align}, \
         libffi computed {actual_size}/{actual_align}"
    )]
    LayoutMismatch {
        ty: Type,
        expected_size: usize,
        expected_align: usize,
        actual_size: usize,
        actual_align: usize,
    },
}

/// Argument list rejected before any call was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeSafetyError {
    #[error("arguments must be packed in a struct aggregate, got {0}")]
    NotAnArgumentList(Type),

    #[error("'{0}' is not a method signature (expected @ and : as first arguments)")]
    NotAMethodSignature(String),

    #[error("signature takes {expected} arguments, {actual} supplied")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("argument {index}: signature expects {expected}, got {actual}")]
    ArgumentType {
        index: usize,
        expected: Type,
        actual: Type,
    },
}

/// Failure of a dynamic invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("foreign call setup failed: {0}")]
    Ffi(#[from] FfiError),

    #[error("no entry point for {}", selector.as_deref().unwrap_or("function call"))]
    Resolution { selector: Option<String> },

    #[error("type safety violation: {0}")]
    TypeSafety(#[from] TypeSafetyError),

    #[error("return value: {0}")]
    Value(#[from] ValueError),
}

/// Any error produced by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

pub type Result<T> = std::result::Result<T, Error>;
