// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic invocation of C functions and object methods.
//!
//! An [`Invocation`] holds the arguments packed as one struct [`Value`]. It
//! is checked against a [`MethodSignature`] before anything is called, the
//! entry point is resolved (an explicit address or the installed
//! [`ObjectRuntime`](crate::runtime::ObjectRuntime)), and the call goes
//! through a libffi interface fetched from the [`DescriptorCache`]. Argument
//! pointers point straight into the argument value's buffer.
//!
//! # Example
//!
//! ```rust
//! use smoke::invoke::Invocation;
//! use smoke::signature::MethodSignature;
//! use smoke::value::TupleBuilder;
//!
//! extern "C" fn add(a: i32, b: i32) -> i32 {
//!     a + b
//! }
//!
//! let signature = MethodSignature::parse("i8i0i4").unwrap();
//! let arguments = TupleBuilder::new().with(2i32).with(3i32).build().unwrap();
//! let result = Invocation::new(arguments)
//!     .invoke_function(&signature, add as *const std::ffi::c_void)
//!     .unwrap();
//! assert_eq!(result.get::<i32>().unwrap(), 5);
//! ```

mod cache;
mod ffi;

pub use cache::{global as descriptor_cache, DescriptorCache, LookupStats};
pub use ffi::CallDescriptor;

use crate::config::FFI_ARG_SIZE;
use crate::error::{FfiError, InvocationError, TypeSafetyError};
use crate::runtime::{self, Selector};
use crate::signature::MethodSignature;
use crate::types::{AggregateKind, Field, Type, TypeKind};
use crate::value::{AlignedBuf, Value};
use libffi::middle::CodePtr;
use std::ffi::c_void;
use std::sync::Arc;

/// What is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Plain C function; every argument comes from the argument value.
    Function,
    /// Method: `receiver` and `selector` are passed ahead of the arguments.
    Method {
        receiver: *mut c_void,
        selector: Selector,
    },
}

impl Target {
    pub fn method(receiver: *mut c_void, selector: Selector) -> Self {
        Self::Method { receiver, selector }
    }

    fn selector(&self) -> Option<Selector> {
        match self {
            Self::Function => None,
            Self::Method { selector, .. } => Some(*selector),
        }
    }

    fn implicit_arguments(&self) -> usize {
        match self {
            Self::Function => 0,
            Self::Method { .. } => 2,
        }
    }
}

/// Where the code lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Address(*const c_void),
    /// Ask the installed runtime for the receiver's implementation.
    Resolve,
}

/// Whether a returned object reference already belongs to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOwnership {
    /// The callee handed over a reference; the result adopts it.
    Retained,
    /// The callee kept ownership; the result retains once.
    Unretained,
}

const RETAINED_FAMILIES: [&str; 5] = ["alloc", "new", "copy", "mutableCopy", "init"];

impl ReturnOwnership {
    /// Convention implied by a method name's family.
    ///
    /// `alloc`, `new`, `copy`, `mutableCopy` and `init` methods return
    /// retained; leading underscores are ignored and the family word must not
    /// run on into a lowercase letter (`copying` is not a `copy` method).
    pub fn for_name(name: &str) -> Self {
        let name = name.trim_start_matches('_');
        let retained = RETAINED_FAMILIES.iter().any(|family| {
            name.strip_prefix(family)
                .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_lowercase()))
        });
        if retained {
            Self::Retained
        } else {
            Self::Unretained
        }
    }

    pub fn for_selector(selector: Selector) -> Self {
        Self::for_name(selector.name())
    }
}

/// A packed argument list ready to be called.
#[derive(Debug, Clone)]
pub struct Invocation {
    arguments: Value,
    returns: Option<ReturnOwnership>,
    cache: Option<Arc<DescriptorCache>>,
}

impl Invocation {
    /// `arguments` must be a struct value (see [`TupleBuilder`](crate::value::TupleBuilder)).
    pub fn new(arguments: Value) -> Self {
        Self {
            arguments,
            returns: None,
            cache: None,
        }
    }

    /// Override the inferred return ownership convention.
    pub fn returning(mut self, ownership: ReturnOwnership) -> Self {
        self.returns = Some(ownership);
        self
    }

    /// Use `cache` instead of the process-wide descriptor cache.
    pub fn using_cache(mut self, cache: Arc<DescriptorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    /// Call a C function at `address`.
    pub fn invoke_function(
        &self,
        signature: &MethodSignature,
        address: *const c_void,
    ) -> Result<Value, InvocationError> {
        self.invoke(signature, Target::Function, EntryPoint::Address(address))
    }

    /// Send `selector` to `receiver`, resolving the implementation through
    /// the installed runtime.
    pub fn invoke_method(
        &self,
        signature: &MethodSignature,
        receiver: *mut c_void,
        selector: Selector,
    ) -> Result<Value, InvocationError> {
        self.invoke(
            signature,
            Target::method(receiver, selector),
            EntryPoint::Resolve,
        )
    }

    /// Validate, resolve, call and wrap the result.
    pub fn invoke(
        &self,
        signature: &MethodSignature,
        target: Target,
        entry: EntryPoint,
    ) -> Result<Value, InvocationError> {
        let fields = self.validate(signature, &target)?;
        let address = resolve(&target, entry)?;

        let descriptor = match &self.cache {
            Some(cache) => cache.get_or_build(signature)?,
            None => cache::global().get_or_build(signature)?,
        };

        // implicit receiver/selector slots must outlive the call
        let (mut receiver, mut selector) = match target {
            Target::Method { receiver, selector } => (receiver, selector.as_ptr()),
            Target::Function => (std::ptr::null_mut(), std::ptr::null()),
        };

        let base = self.arguments.as_ptr().cast_mut();
        let mut argv: Vec<*mut c_void> = Vec::with_capacity(descriptor.argument_count());
        if let Target::Method { .. } = target {
            argv.push(std::ptr::addr_of_mut!(receiver).cast());
            argv.push(std::ptr::addr_of_mut!(selector).cast());
        }
        for field in fields {
            let offset = field.offset().unwrap_or(0);
            // SAFETY: validated fields lie inside the sized argument buffer.
            argv.push(unsafe { base.add(offset) }.cast());
        }

        let layout = descriptor.return_layout();
        let mut result = AlignedBuf::zeroed(
            layout.size.max(FFI_ARG_SIZE),
            layout.alignment.max(FFI_ARG_SIZE),
        )
        .ok_or_else(|| FfiError::UnsupportedType(signature.return_type().clone()))?;

        log::debug!(
            "[invoke] calling {:p} as {} ({} arguments)",
            address,
            signature,
            argv.len()
        );
        // SAFETY: the signature was checked against the argument value, argv
        // holds one pointer per declared argument, and the result buffer
        // covers at least one ffi_arg at the return alignment. The caller
        // vouches that `address` has the declared signature.
        unsafe {
            descriptor.call(
                CodePtr::from_ptr(address),
                &mut argv,
                result.as_mut_ptr().cast(),
            );
        }

        self.wrap_result(signature, &target, &result)
    }

    fn validate<'a>(
        &'a self,
        signature: &MethodSignature,
        target: &Target,
    ) -> Result<&'a [Field], TypeSafetyError> {
        let ty = self.arguments.ty();
        let fields = match ty.kind() {
            TypeKind::Aggregate(agg) if agg.kind() == AggregateKind::Struct => agg.fields(),
            _ => None,
        }
        .ok_or_else(|| TypeSafetyError::NotAnArgumentList(ty.clone()))?;

        let implicit = target.implicit_arguments();
        if implicit > 0 && !signature.is_method_signature() {
            return Err(TypeSafetyError::NotAMethodSignature(signature.encoding()));
        }

        let expected = signature.arguments().len();
        let actual = fields.len() + implicit;
        if expected != actual {
            return Err(TypeSafetyError::ArgumentCount { expected, actual });
        }

        for (position, field) in fields.iter().enumerate() {
            let index = position + implicit;
            let declared = signature.arguments()[index].ty();
            if !declared.is_assignable_from(field.ty()) {
                log::debug!(
                    "[invoke] argument {} rejected: {} is not assignable to {}",
                    index,
                    field.ty(),
                    declared
                );
                return Err(TypeSafetyError::ArgumentType {
                    index,
                    expected: declared.clone(),
                    actual: field.ty().clone(),
                });
            }
        }
        Ok(fields)
    }

    fn wrap_result(
        &self,
        signature: &MethodSignature,
        target: &Target,
        result: &AlignedBuf,
    ) -> Result<Value, InvocationError> {
        let ty = signature.return_type();
        if ty.unqualified().is_void() {
            return Ok(Value::void());
        }

        let size = ty.size();
        let offset = if promoted_integer(ty) && cfg!(target_endian = "big") {
            FFI_ARG_SIZE - size
        } else {
            0
        };
        let bytes = &result.as_slice()[offset..offset + size];

        let ownership = self.returns.unwrap_or_else(|| {
            target
                .selector()
                .map_or(ReturnOwnership::Unretained, ReturnOwnership::for_selector)
        });
        let value = Value::with_ownership(ty, bytes, ownership == ReturnOwnership::Unretained)?;
        Ok(value)
    }
}

/// Integral returns narrower than `ffi_arg` are widened by libffi.
fn promoted_integer(ty: &Type) -> bool {
    ty.unqualified()
        .as_primitive()
        .is_some_and(|p| p.is_integer() && p.size() < FFI_ARG_SIZE)
}

fn resolve(target: &Target, entry: EntryPoint) -> Result<*const c_void, InvocationError> {
    let address = match (entry, target) {
        (EntryPoint::Address(address), _) => Some(address),
        (EntryPoint::Resolve, Target::Method { receiver, selector }) if !receiver.is_null() => {
            runtime::current().resolve_method(*receiver, *selector)
        }
        (EntryPoint::Resolve, _) => None,
    };

    match address {
        Some(address) if !address.is_null() => Ok(address),
        _ => {
            let selector = target.selector().map(|s| s.name().to_owned());
            log::debug!("[invoke] no entry point for {:?}", selector);
            Err(InvocationError::Resolution { selector })
        }
    }
}
