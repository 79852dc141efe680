// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic Invocation Benchmark
//!
//! Measures the end-to-end cost of a dynamic call against the direct call:
//! - descriptor preparation (cache miss path)
//! - scalar call through the warm descriptor cache
//! - struct-by-value call and return
//! - argument tuple packing on its own

#![allow(clippy::uninlined_format_args)] // Bench code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Benches panic on failure

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use smoke::invoke::{CallDescriptor, DescriptorCache};
use smoke::{encoding, Invocation, MethodSignature, MutableValue, TupleBuilder};
use std::ffi::c_void;
use std::sync::Arc;

#[repr(C)]
#[derive(Clone, Copy)]
struct Vec3 {
    x: f64,
    y: f64,
    z: f64,
}

extern "C" fn add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

extern "C" fn scale(v: Vec3, factor: f64) -> Vec3 {
    Vec3 {
        x: v.x * factor,
        y: v.y * factor,
        z: v.z * factor,
    }
}

/// Baseline: direct Rust call of the same function
fn bench_direct_call(c: &mut Criterion) {
    c.bench_function("invoke_direct_add", |b| {
        b.iter(|| add(black_box(2), black_box(3)))
    });
}

/// Benchmark: prepare a call descriptor from scratch
fn bench_prepare_descriptor(c: &mut Criterion) {
    let signature = MethodSignature::parse(r#"{Vec3="x"d"y"d"z"d}32{Vec3="x"d"y"d"z"d}0d24"#).unwrap();
    c.bench_function("invoke_prepare_descriptor", |b| {
        b.iter(|| CallDescriptor::new(black_box(&signature)).unwrap())
    });
}

/// Benchmark: scalar dynamic call, descriptor served from cache
fn bench_scalar_call(c: &mut Criterion) {
    let signature = MethodSignature::parse("i8i0i4").unwrap();
    let cache = Arc::new(DescriptorCache::new(16));
    let address = add as *const c_void;

    c.bench_function("invoke_cached_add", |b| {
        b.iter_batched(
            || TupleBuilder::new().with(2i32).with(3i32).build().unwrap(),
            |arguments| {
                Invocation::new(arguments)
                    .using_cache(Arc::clone(&cache))
                    .invoke_function(&signature, address)
                    .unwrap()
            },
            BatchSize::SmallInput,
        )
    });
}

/// Benchmark: struct passed and returned by value
fn bench_struct_call(c: &mut Criterion) {
    let vec3 = encoding::parse(r#"{Vec3="x"d"y"d"z"d}"#).unwrap();
    let signature = MethodSignature::new(vec3.clone(), [vec3.clone(), encoding::parse("d").unwrap()]);
    let mut v = MutableValue::zeroed(&vec3).unwrap();
    v.set_field("x", 1.0f64).unwrap();
    v.set_field("y", 2.0f64).unwrap();
    v.set_field("z", 3.0f64).unwrap();
    let v = v.into_value();
    let address = scale as *const c_void;

    c.bench_function("invoke_struct_by_value", |b| {
        b.iter_batched(
            || TupleBuilder::new().push(v.clone()).with(0.5f64).build().unwrap(),
            |arguments| {
                Invocation::new(arguments)
                    .invoke_function(&signature, address)
                    .unwrap()
            },
            BatchSize::SmallInput,
        )
    });
}

/// Benchmark: pack three scalars into an argument tuple
fn bench_tuple_packing(c: &mut Criterion) {
    c.bench_function("invoke_pack_tuple", |b| {
        b.iter(|| {
            TupleBuilder::new()
                .with(black_box(1i32))
                .with(black_box(2.5f64))
                .with(black_box(7u8))
                .build()
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_direct_call,
    bench_prepare_descriptor,
    bench_scalar_call,
    bench_struct_call,
    bench_tuple_packing
);
criterion_main!(benches);
