// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Dynamic invocation of real `extern "C"` functions through libffi.
//
// Every test calls functions defined in this file, so the expected results
// are computed by the same compiler that laid out the structs.

#![allow(clippy::float_cmp)]
#![allow(clippy::missing_panics_doc)]

use smoke::error::{FfiError, InvocationError, TypeSafetyError};
use smoke::invoke::{DescriptorCache, EntryPoint, Invocation, Target};
use smoke::runtime::Selector;
use smoke::signature::MethodSignature;
use smoke::value::{MutableValue, TupleBuilder, Value};
use smoke::{encoding, Type};
use std::ffi::{c_char, c_void, CStr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn addr(f: *const ()) -> *const c_void {
    f.cast()
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
struct Big {
    a: i64,
    b: i64,
    c: i64,
    d: i64,
    e: i64,
}

extern "C" fn add(a: i32, b: i32) -> i32 {
    a + b
}

extern "C" fn mix(a: f32, b: f64, c: i8) -> f64 {
    f64::from(a) * b + f64::from(c)
}

extern "C" fn negate(c: i8) -> i8 {
    -c
}

extern "C" fn is_even(v: u32) -> bool {
    v % 2 == 0
}

extern "C" fn sum_point(p: Point) -> i32 {
    p.x + p.y
}

extern "C" fn mirror(p: Point) -> Point {
    Point { x: p.y, y: p.x }
}

extern "C" fn make_big(seed: i64) -> Big {
    Big {
        a: seed,
        b: seed * 2,
        c: seed * 3,
        d: seed * 4,
        e: seed * 5,
    }
}

extern "C" fn bump(counter: *mut c_void) {
    // SAFETY: tests pass a pointer to a live i32.
    unsafe { *counter.cast::<i32>() += 1 };
}

extern "C" fn length(s: *const c_char) -> u64 {
    // SAFETY: tests pass a NUL-terminated string.
    unsafe { CStr::from_ptr(s) }.to_bytes().len() as u64
}

extern "C" fn scale_method(receiver: *mut c_void, selector: *const c_char, x: i32) -> i32 {
    // SAFETY: the engine passes the registered selector string.
    let name = unsafe { CStr::from_ptr(selector) };
    if name.to_bytes() == b"scaleBy:" && receiver as usize == 0xABC0 {
        x * 2
    } else {
        -1
    }
}

static COUNTED_CALLS: AtomicUsize = AtomicUsize::new(0);

extern "C" fn counted(a: i32) -> i32 {
    COUNTED_CALLS.fetch_add(1, Ordering::SeqCst);
    a
}

#[test]
fn test_add_returns_five() {
    init_logging();
    let signature = MethodSignature::parse("i8i0i4").unwrap();
    let arguments = TupleBuilder::new().with(2i32).with(3i32).build().unwrap();
    let result = Invocation::new(arguments)
        .invoke_function(&signature, addr(add as *const ()))
        .unwrap();
    assert_eq!(result.encoding(), "i");
    assert_eq!(result.get::<i32>().unwrap(), 5);
}

#[test]
fn test_mixed_floating_arguments() {
    let signature = MethodSignature::parse("d16f0d4c12").unwrap();
    let arguments = TupleBuilder::new()
        .with(1.5f32)
        .with(4.0f64)
        .with(-3i8)
        .build()
        .unwrap();
    let result = Invocation::new(arguments)
        .invoke_function(&signature, addr(mix as *const ()))
        .unwrap();
    assert_eq!(result.get::<f64>().unwrap(), 3.0);
}

#[test]
fn test_narrow_integer_returns() {
    let signature = MethodSignature::parse("c4c0").unwrap();
    let arguments = TupleBuilder::new().with(42i8).build().unwrap();
    let result = Invocation::new(arguments)
        .invoke_function(&signature, addr(negate as *const ()))
        .unwrap();
    assert_eq!(result.get::<i8>().unwrap(), -42);

    let signature = MethodSignature::parse("B4I0").unwrap();
    for (input, expected) in [(4u32, true), (7u32, false)] {
        let arguments = TupleBuilder::new().with(input).build().unwrap();
        let result = Invocation::new(arguments)
            .invoke_function(&signature, addr(is_even as *const ()))
            .unwrap();
        assert_eq!(result.get::<bool>().unwrap(), expected);
    }
}

#[test]
fn test_struct_argument_and_return() {
    let point_ty = encoding::parse(r#"{Point="x"i"y"i}"#).unwrap();
    let mut point = MutableValue::zeroed(&point_ty).unwrap();
    point.set_field("x", 10i32).unwrap();
    point.set_field("y", 32i32).unwrap();
    let point = point.into_value();

    let sum = MethodSignature::new(Type::primitive(smoke::PrimitiveKind::Int), [point_ty.clone()]);
    let arguments = TupleBuilder::new().push(point.clone()).build().unwrap();
    let result = Invocation::new(arguments)
        .invoke_function(&sum, addr(sum_point as *const ()))
        .unwrap();
    assert_eq!(result.get::<i32>().unwrap(), 42);

    let swap = MethodSignature::new(point_ty.clone(), [point_ty]);
    let arguments = TupleBuilder::new().push(point).build().unwrap();
    let result = Invocation::new(arguments)
        .invoke_function(&swap, addr(mirror as *const ()))
        .unwrap();
    assert_eq!(result.get_field::<i32>("x").unwrap(), 32);
    assert_eq!(result.get_field::<i32>("y").unwrap(), 10);
}

#[test]
fn test_large_struct_return() {
    let signature = MethodSignature::parse(r#"{Big="a"q"b"q"c"q"d"q"e"q}8q0"#).unwrap();
    let arguments = TupleBuilder::new().with(7i64).build().unwrap();
    let result = Invocation::new(arguments)
        .invoke_function(&signature, addr(make_big as *const ()))
        .unwrap();

    assert_eq!(result.size(), std::mem::size_of::<Big>());
    let expected = make_big(7);
    assert_eq!(result.get_field::<i64>("a").unwrap(), expected.a);
    assert_eq!(result.get_field::<i64>("c").unwrap(), expected.c);
    assert_eq!(result.get_at::<i64>(4).unwrap(), expected.e);
}

#[test]
fn test_pointer_argument_writes_through() {
    let mut counter = 41i32;
    let signature = MethodSignature::parse("v8^v0").unwrap();
    let arguments = TupleBuilder::new()
        .with(std::ptr::addr_of_mut!(counter).cast::<c_void>())
        .build()
        .unwrap();
    let result = Invocation::new(arguments)
        .invoke_function(&signature, addr(bump as *const ()))
        .unwrap();
    assert!(result.ty().is_void());
    assert_eq!(counter, 42);
}

#[test]
fn test_c_string_argument() {
    let text = b"encodings\0";
    let signature = MethodSignature::parse("Q8*0").unwrap();
    let arguments = TupleBuilder::new()
        .with(text.as_ptr().cast::<c_char>())
        .build()
        .unwrap();
    let result = Invocation::new(arguments)
        .invoke_function(&signature, addr(length as *const ()))
        .unwrap();
    assert_eq!(result.get::<u64>().unwrap(), 9);
}

#[test]
fn test_method_with_explicit_entry_point() {
    let signature = MethodSignature::parse("i20@0:8i16").unwrap();
    let arguments = TupleBuilder::new().with(21i32).build().unwrap();
    let target = Target::method(0xABC0 as *mut c_void, Selector::register("scaleBy:"));
    let result = Invocation::new(arguments)
        .invoke(
            &signature,
            target,
            EntryPoint::Address(addr(scale_method as *const ())),
        )
        .unwrap();
    assert_eq!(result.get::<i32>().unwrap(), 42);
}

#[test]
fn test_type_safety_checked_before_call() {
    let signature = MethodSignature::parse("i4i0").unwrap();
    let entry = addr(counted as *const ());

    let wrong_type = TupleBuilder::new().with(1.0f64).build().unwrap();
    let err = Invocation::new(wrong_type)
        .invoke_function(&signature, entry)
        .unwrap_err();
    assert!(matches!(
        err,
        InvocationError::TypeSafety(TypeSafetyError::ArgumentType { index: 0, .. })
    ));

    let too_many = TupleBuilder::new().with(1i32).with(2i32).build().unwrap();
    let err = Invocation::new(too_many)
        .invoke_function(&signature, entry)
        .unwrap_err();
    assert_eq!(
        err,
        InvocationError::TypeSafety(TypeSafetyError::ArgumentCount {
            expected: 1,
            actual: 2
        })
    );

    let not_a_struct = Value::boxed(1i32);
    assert!(Invocation::new(not_a_struct)
        .invoke_function(&signature, entry)
        .is_err());

    assert_eq!(COUNTED_CALLS.load(Ordering::SeqCst), 0);

    let good = TupleBuilder::new().with(9i32).build().unwrap();
    let result = Invocation::new(good).invoke_function(&signature, entry).unwrap();
    assert_eq!(result.get::<i32>().unwrap(), 9);
    assert_eq!(COUNTED_CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unsupported_signature_is_ffi_error() {
    let signature = MethodSignature::parse("v16t0").unwrap();
    let arguments = TupleBuilder::new().with(1i128).build().unwrap();
    let err = Invocation::new(arguments)
        .invoke_function(&signature, addr(add as *const ()))
        .unwrap_err();
    assert!(matches!(
        err,
        InvocationError::Ffi(FfiError::UnsupportedType(_))
    ));
}

#[test]
fn test_null_entry_point() {
    let signature = MethodSignature::parse("i8i0i4").unwrap();
    let arguments = TupleBuilder::new().with(1i32).with(1i32).build().unwrap();
    let err = Invocation::new(arguments)
        .invoke_function(&signature, std::ptr::null())
        .unwrap_err();
    assert_eq!(err, InvocationError::Resolution { selector: None });
}

#[test]
fn test_descriptor_cache_reuse() {
    let cache = Arc::new(DescriptorCache::new(4));
    let signature = MethodSignature::parse("i8i0i4").unwrap();

    for (a, b) in [(1, 2), (3, 4), (5, 6)] {
        let arguments = TupleBuilder::new().with(a).with(b).build().unwrap();
        let result = Invocation::new(arguments)
            .using_cache(Arc::clone(&cache))
            .invoke_function(&signature, addr(add as *const ()))
            .unwrap();
        assert_eq!(result.get::<i32>().unwrap(), a + b);
    }

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_pinned_signature_stays_cached() {
    let cache = Arc::new(DescriptorCache::new(1));
    let hot = MethodSignature::parse("i8i0i4").unwrap();
    cache.pin(&hot);

    let arguments = TupleBuilder::new().with(1i32).with(1i32).build().unwrap();
    Invocation::new(arguments)
        .using_cache(Arc::clone(&cache))
        .invoke_function(&hot, addr(add as *const ()))
        .unwrap();

    let cold = MethodSignature::parse("c4c0").unwrap();
    let arguments = TupleBuilder::new().with(1i8).build().unwrap();
    Invocation::new(arguments)
        .using_cache(Arc::clone(&cache))
        .invoke_function(&cold, addr(negate as *const ()))
        .unwrap();

    assert!(cache.contains(&hot));
    assert!(!cache.contains(&cold));
}
