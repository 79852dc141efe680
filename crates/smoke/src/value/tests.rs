// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tests for typed values.

use super::*;
use crate::encoding;
use crate::runtime::{Selector, SelectorRef};
use crate::types::{AggregateBuilder, PrimitiveKind};

fn point() -> Type {
    encoding::parse(r#"{Point="x"i"y"i}"#).unwrap()
}

#[test]
fn test_boxed_scalar() {
    let value = Value::boxed(42i32);
    assert_eq!(value.encoding(), "i");
    assert_eq!(value.size(), 4);
    assert_eq!(value.get::<i32>().unwrap(), 42);
    assert_eq!(value.as_bytes(), &42i32.to_ne_bytes());
    assert_eq!(value.as_ptr() as usize % 4, 0);
}

#[test]
fn test_new_checks_size() {
    let ty = Type::primitive(PrimitiveKind::Double);
    let err = Value::new(&ty, &[0u8; 4]).unwrap_err();
    assert_eq!(
        err,
        ValueError::SizeMismatch {
            ty,
            expected: 8,
            actual: 4
        }
    );
}

#[test]
fn test_unsized_type_rejected() {
    let forward = encoding::parse("{Opaque}").unwrap();
    assert!(matches!(
        Value::zeroed(&forward),
        Err(ValueError::UnsizedType(_))
    ));
    assert!(matches!(
        Value::new(&Type::unknown(), &[]),
        Err(ValueError::UnsizedType(_))
    ));
}

#[test]
fn test_unallocatable_value_is_an_error() {
    let huge = encoding::parse("[1152921504606846975q]").unwrap();
    assert!(huge.layout().is_some());
    assert_eq!(
        Value::zeroed(&huge).unwrap_err(),
        ValueError::AllocationFailed(huge.clone())
    );
    assert!(MutableValue::zeroed(&huge).is_err());
}

#[test]
fn test_try_copy() {
    let value = Value::boxed(7u16);
    let copy = value.try_copy().unwrap();
    assert_eq!(copy, value);
    assert_ne!(copy.as_ptr(), value.as_ptr());
}

#[test]
fn test_void_value() {
    let value = Value::void();
    assert_eq!(value.size(), 0);
    assert!(value.as_bytes().is_empty());
    assert!(value.ty().is_void());
}

#[test]
fn test_from_raw() {
    let raw = [1.5f64, -2.0f64];
    let ty = encoding::parse("[2d]").unwrap();
    let value = unsafe { Value::from_raw(&ty, raw.as_ptr().cast()) }.unwrap();
    assert_eq!(value.get_at::<f64>(0).unwrap(), 1.5);
    assert_eq!(value.get_at::<f64>(1).unwrap(), -2.0);
    assert_eq!(value.get::<[f64; 2]>().unwrap(), raw);
}

#[test]
fn test_struct_fields_by_name_and_index() {
    let mut value = MutableValue::zeroed(&point()).unwrap();
    value.set_field("x", 3i32).unwrap();
    value.set_at(1, 4i32).unwrap();

    assert_eq!(value.get_at::<i32>(0).unwrap(), 3);
    assert_eq!(value.get_field::<i32>("y").unwrap(), 4);
    assert_eq!(value.len(), Some(2));

    let y = value.field("y").unwrap();
    assert_eq!(y.encoding(), "i");
    assert_eq!(y.get::<i32>().unwrap(), 4);
}

#[test]
fn test_index_out_of_range() {
    let value = Value::zeroed(&point()).unwrap();
    assert_eq!(
        value.get_at::<i32>(2),
        Err(ValueError::IndexOutOfRange { index: 2, count: 2 })
    );

    let array = Value::boxed([1u16, 2, 3]);
    assert_eq!(
        array.element(3),
        Err(ValueError::IndexOutOfRange { index: 3, count: 3 })
    );
}

#[test]
fn test_no_such_field() {
    let value = Value::zeroed(&point()).unwrap();
    assert_eq!(
        value.get_field::<i32>("z"),
        Err(ValueError::NoSuchField("z".into()))
    );

    let array = Value::boxed([0i32; 2]);
    assert!(matches!(
        array.field("x"),
        Err(ValueError::NoSuchField(_))
    ));
}

#[test]
fn test_scalar_not_indexable() {
    let value = Value::boxed(1.0f32);
    assert!(matches!(
        value.element(0),
        Err(ValueError::NotIndexable(_))
    ));
}

#[test]
fn test_type_mismatch() {
    let value = Value::boxed(7i32);
    let err = value.get::<f32>().unwrap_err();
    assert!(matches!(err, ValueError::TypeMismatch { .. }));

    let mut value = MutableValue::zeroed(&point()).unwrap();
    assert!(matches!(
        value.set_field("x", 1i64),
        Err(ValueError::TypeMismatch { .. })
    ));
    assert_eq!(value.get_field::<i32>("x").unwrap(), 0);
}

#[test]
fn test_get_into_size_mismatch() {
    let value = Value::boxed(9u64);
    let mut out = [0u8; 4];
    let err = value
        .get_into(&mut out, &Type::primitive(PrimitiveKind::UnsignedLongLong))
        .unwrap_err();
    assert!(matches!(
        err,
        ValueError::SizeMismatch {
            expected: 8,
            actual: 4,
            ..
        }
    ));
}

#[test]
fn test_const_field_is_readable() {
    let ty = encoding::parse("{S=rii}").unwrap();
    let mut value = MutableValue::zeroed(&ty).unwrap();
    value.set_at(0, 11i32).unwrap();
    assert_eq!(value.get_at::<i32>(0).unwrap(), 11);
}

#[test]
fn test_nested_aggregate() {
    let rect = encoding::parse(
        r#"{Rect="origin"{Point="x"d"y"d}"size"{Size="width"d"height"d}}"#,
    )
    .unwrap();
    let mut value = MutableValue::zeroed(&rect).unwrap();

    let mut size = value.field("size").unwrap().mutable_copy();
    size.set_field("width", 10.0f64).unwrap();
    size.set_field("height", 20.0f64).unwrap();
    value.set_field_value("size", &size).unwrap();

    let read = value.field("size").unwrap();
    assert_eq!(read.get_field::<f64>("width").unwrap(), 10.0);
    assert_eq!(read.get_field::<f64>("height").unwrap(), 20.0);
    assert_eq!(&value.as_bytes()[16..24], &10.0f64.to_ne_bytes());
}

#[test]
fn test_array_elements() {
    let mut value = MutableValue::boxed([0i16; 4]);
    for i in 0..4 {
        value.set_at(i, (i as i16) * 10).unwrap();
    }
    assert_eq!(value.get::<[i16; 4]>().unwrap(), [0, 10, 20, 30]);
    assert_eq!(value.element(2).unwrap().get::<i16>().unwrap(), 20);

    value.set_element(3, &Value::boxed(-1i16)).unwrap();
    assert_eq!(value.get_at::<i16>(3).unwrap(), -1);
}

#[test]
fn test_bitfields() {
    let ty = encoding::parse(r#"{Flags="a"b3"b"b5"c"i}"#).unwrap();
    let mut value = MutableValue::zeroed(&ty).unwrap();

    value.set_field("a", 5u32).unwrap();
    value.set_field("b", 0x1Fu32).unwrap();
    value.set_field("c", -1i32).unwrap();

    assert_eq!(value.get_field::<u32>("a").unwrap(), 5);
    assert_eq!(value.get_field::<u32>("b").unwrap(), 0x1F);
    assert_eq!(value.get_field::<i32>("c").unwrap(), -1);

    // out-of-range bits are masked off
    value.set_field("a", 0xFFu32).unwrap();
    assert_eq!(value.get_field::<u32>("a").unwrap(), 0b111);
    assert_eq!(value.get_field::<u32>("b").unwrap(), 0x1F);

    let unit = u32::from_ne_bytes(value.as_bytes()[0..4].try_into().unwrap());
    if cfg!(target_endian = "little") {
        assert_eq!(unit, 0b1111_1111);
    }

    let b = value.field("b").unwrap();
    assert_eq!(b.get::<u32>().unwrap(), 0x1F);
}

#[test]
fn test_bitfield_rejects_wrong_width_integer() {
    let ty = encoding::parse(r#"{F="a"b4}"#).unwrap();
    let mut value = MutableValue::zeroed(&ty).unwrap();
    assert!(matches!(
        value.set_field("a", 1u8),
        Err(ValueError::TypeMismatch { .. })
    ));
}

#[test]
fn test_zeroed_selector_slot_reads_as_null() {
    let ty = encoding::parse("{S=:}").unwrap();
    let mut value = MutableValue::zeroed(&ty).unwrap();

    let raw = value.get_at::<SelectorRef>(0).unwrap();
    assert!(raw.is_null());
    assert!(raw.selector().is_none());

    let sel = Selector::register("layoutSubviews");
    value.set_at(0, SelectorRef::from(sel)).unwrap();
    assert_eq!(value.get_at::<SelectorRef>(0).unwrap().selector(), Some(sel));

    // a pointer nobody registered never becomes a Selector
    let stray = SelectorRef(0x40 as *const std::ffi::c_char);
    value.set_at(0, stray).unwrap();
    assert_eq!(value.get_at::<SelectorRef>(0).unwrap(), stray);
    assert!(stray.selector().is_none());
}

#[test]
fn test_bool_rejects_other_bytes() {
    let ty = encoding::parse("B").unwrap();
    assert!(Value::new(&ty, &[1]).unwrap().get::<bool>().unwrap());
    assert!(!Value::new(&ty, &[0]).unwrap().get::<bool>().unwrap());

    let value = Value::new(&ty, &[2]).unwrap();
    assert_eq!(value.get::<bool>().unwrap_err(), ValueError::InvalidBitPattern(ty));
    assert_eq!(value.as_bytes(), &[2]);
}

#[test]
fn test_union_members_share_storage() {
    let ty = AggregateBuilder::union("Bits")
        .primitive("f", PrimitiveKind::Float)
        .primitive("u", PrimitiveKind::UnsignedInt)
        .build();
    let mut value = MutableValue::zeroed(&ty).unwrap();
    value.set_field("f", 1.0f32).unwrap();
    assert_eq!(value.get_field::<u32>("u").unwrap(), 1.0f32.to_bits());
}

#[test]
fn test_whole_value_set() {
    let mut value = MutableValue::zeroed(&point()).unwrap();
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1i32.to_ne_bytes());
    bytes.extend_from_slice(&2i32.to_ne_bytes());
    value.set_from(&bytes, &point()).unwrap();
    assert_eq!(value.get_at::<i32>(1).unwrap(), 2);

    let other = encoding::parse("{Other=ii}").unwrap();
    assert!(matches!(
        value.set_from(&bytes, &other),
        Err(ValueError::TypeMismatch { .. })
    ));
}

#[test]
fn test_copies_are_independent() {
    let original = MutableValue::boxed(5i32);
    let mut copy = original.mutable_copy();
    copy.set(6i32).unwrap();
    assert_eq!(original.get::<i32>().unwrap(), 5);
    assert_eq!(copy.get::<i32>().unwrap(), 6);

    let frozen = copy.clone().into_value();
    assert_eq!(frozen, Value::boxed(6i32));
    assert_ne!(frozen.as_ptr(), copy.as_ptr());
}

#[test]
fn test_tuple_packing() {
    let tuple = Value::tuple([Value::boxed(1u8), Value::boxed(2.5f64), Value::boxed(3i32)]).unwrap();
    assert_eq!(tuple.encoding(), "{?=Cdi}");
    assert_eq!(tuple.size(), 24);
    assert_eq!(tuple.get_at::<u8>(0).unwrap(), 1);
    assert_eq!(tuple.get_at::<f64>(1).unwrap(), 2.5);
    assert_eq!(tuple.get_at::<i32>(2).unwrap(), 3);
}

#[test]
fn test_tuple_builder_names() {
    let tuple = TupleBuilder::new()
        .named("count", 4u32)
        .with(Object::NULL)
        .build()
        .unwrap();
    assert_eq!(tuple.encoding(), r#"{?="count"I""@}"#);
    assert_eq!(tuple.get_field::<u32>("count").unwrap(), 4);
    assert!(tuple.get_at::<Object>(1).unwrap().is_null());
}

#[test]
fn test_object_slot_accepts_subtype_encoding() {
    let ty = AggregateBuilder::structure("Holder")
        .field("item", Type::object())
        .build();
    let mut value = MutableValue::zeroed(&ty).unwrap();
    let typed = Type::object_of(Some("NSString"), []);
    let fake = 0x4000usize.to_ne_bytes();
    value.set_field_from(&fake, &typed, "item").unwrap();
    assert_eq!(value.get_field::<Object>("item").unwrap().as_ptr() as usize, 0x4000);
}

#[test]
fn test_debug_output() {
    let value = Value::boxed(1u16);
    let text = format!("{:?}", value);
    assert!(text.contains("\"S\""));
    assert!(text.contains("size: 2"));
}
