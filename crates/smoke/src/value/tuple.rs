// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Packing heterogeneous values into one anonymous struct.
//!
//! The packed value is what an argument list looks like in memory, so this
//! is how call arguments are assembled.

use super::{MutableValue, Value};
use crate::error::ValueError;
use crate::types::{Member, Type};
use crate::value::Encode;

/// Builder for a tuple value (`{?=...}`).
///
/// # Example
///
/// ```rust
/// use smoke::value::TupleBuilder;
///
/// let args = TupleBuilder::new()
///     .with(2i32)
///     .named("scale", 1.5f64)
///     .build()
///     .unwrap();
///
/// assert_eq!(args.len(), Some(2));
/// assert_eq!(args.get_field::<f64>("scale").unwrap(), 1.5);
/// ```
#[derive(Debug, Default, Clone)]
pub struct TupleBuilder {
    entries: Vec<(Option<String>, Value)>,
}

impl TupleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, value: Value) -> Self {
        self.entries.push((None, value));
        self
    }

    pub fn push_named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.entries.push((Some(name.into()), value));
        self
    }

    pub fn with<T: Encode>(self, value: T) -> Self {
        self.push(Value::boxed(value))
    }

    pub fn named<T: Encode>(self, name: impl Into<String>, value: T) -> Self {
        self.push_named(name, Value::boxed(value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lay the entries out as struct fields and copy each one in.
    pub fn build(self) -> Result<Value, ValueError> {
        let members = self
            .entries
            .iter()
            .map(|(name, value)| Member {
                name: name.clone(),
                ty: value.ty().clone(),
                retention: None,
            })
            .collect();
        let ty = Type::structure(None, members);

        let mut tuple = MutableValue::zeroed(&ty)?;
        for (index, (_, value)) in self.entries.iter().enumerate() {
            tuple.set_element(index, value)?;
        }
        log::trace!("[value] packed {} entries as {}", self.entries.len(), ty.encoding());
        Ok(tuple.into_value())
    }
}
