// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Method, block and property signatures.
//!
//! A [`MethodSignature`] is the return type plus the ordered argument types
//! of a callable, each argument tagged with its frame offset and qualifiers.
//! A [`PropertySignature`] is the parsed form of a property attribute string.

mod method;
mod property;

pub use method::{Argument, ArgumentAttributes, MethodSignature, ReturnValue};
pub use property::{PropertyAttribute, PropertyAttributeKind, PropertySignature};
