// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # smoke - runtime type encodings and dynamic invocation
//!
//! Bridges a dynamic object runtime and C code: describe C-level types with
//! compact encoding strings, compute their exact layout under the host ABI,
//! hold typed values in owned buffers, and call C functions or object methods
//! whose signatures are only known at run time.
//!
//! ## Quick Start
//!
//! ```rust
//! use smoke::{encoding, Invocation, MethodSignature, TupleBuilder};
//!
//! extern "C" fn scale(point: Point, factor: f64) -> Point {
//!     Point { x: point.x * factor, y: point.y * factor }
//! }
//! #[repr(C)]
//! #[derive(Clone, Copy)]
//! struct Point { x: f64, y: f64 }
//!
//! # fn main() -> smoke::Result<()> {
//! let point_ty = encoding::parse(r#"{Point="x"d"y"d}"#)?;
//! assert_eq!(point_ty.size(), 16);
//!
//! let mut point = smoke::MutableValue::zeroed(&point_ty)?;
//! point.set_field("x", 1.5f64)?;
//! point.set_field("y", -2.0f64)?;
//!
//! let signature = MethodSignature::parse(r#"{Point="x"d"y"d}24{Point="x"d"y"d}0d16"#)?;
//! let arguments = TupleBuilder::new()
//!     .push(point.into_value())
//!     .with(2.0f64)
//!     .build()?;
//!
//! let scaled = Invocation::new(arguments)
//!     .invoke_function(&signature, scale as *const std::ffi::c_void)?;
//! assert_eq!(scaled.get_field::<f64>("x")?, 3.0);
//! assert_eq!(scaled.get_field::<f64>("y")?, -4.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |  encoding   "{Point=dd}"  ->  Type tree        (parser)       |
//! +---------------------------------------------------------------+
//! |  types      size / alignment / field offsets   (host ABI)     |
//! +---------------------------------------------------------------+
//! |  value      Type + aligned bytes, retain/release of objects   |
//! +---------------------------------------------------------------+
//! |  invoke     type check -> resolve -> libffi cif -> ffi_call   |
//! +---------------------------------------------------------------+
//! |  runtime    ObjectRuntime seam (retain, release, lookup)      |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`encoding`] - Encoding parser
//! - [`types`] - Type model and layout computation
//! - [`signature`] - Method, block and property signatures
//! - [`value`] - Typed value containers
//! - [`invoke`] - libffi-backed invocation engine
//! - [`runtime`] - Host object runtime seam and selectors
//! - [`config`] - Platform constants and engine configuration

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

/// Platform constants and runtime engine configuration.
pub mod config;
/// Encoding parser (`"{Point=ii}"` -> [`Type`]).
pub mod encoding;
/// Error types for every layer.
pub mod error;
/// Dynamic invocation through libffi.
pub mod invoke;
/// Host object runtime seam (retain/release, method lookup, selectors).
pub mod runtime;
/// Method, block and property signatures.
pub mod signature;
/// Type model and ABI layout.
pub mod types;
/// Typed values over owned, aligned buffers.
pub mod value;

pub use error::{
    EncodingError, Error, FfiError, InvocationError, Result, TypeSafetyError, ValueError,
};
pub use invoke::{EntryPoint, Invocation, ReturnOwnership, Target};
pub use runtime::{ObjectRuntime, Retention, Selector, SelectorRef};
pub use signature::{MethodSignature, PropertySignature};
pub use types::{AggregateBuilder, PrimitiveKind, Type, TypeKind, TypeLayout};
pub use value::{Encode, MutableValue, TupleBuilder, Value};

/// Crate version, as recorded in Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
