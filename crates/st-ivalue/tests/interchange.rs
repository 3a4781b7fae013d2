// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::collections::{BTreeMap, HashMap};

use st_ivalue::{
    call_operator, decode, encode, CIValue, Decoder, Encoder, GenericDict, IValue, IValueError,
    InterchangeConfig, Tag, Tensor,
};
use st_ivalue_sys as sys;

fn round_trip(value: &IValue) -> IValue {
    let handle = encode(value).expect("encode");
    decode(handle).expect("decode")
}

fn live() -> i64 {
    sys::st_ivalue_live_handles()
}

fn adopt(raw: sys::IValueHandle) -> CIValue {
    unsafe { CIValue::from_raw(raw) }.expect("non-null handle")
}

#[test]
fn tuple_round_trip_preserves_order() {
    let value = IValue::tuple(1_i64, "one");
    let decoded = round_trip(&value);
    assert_eq!(decoded.tag(), Tag::Tuple);
    let (first, second) = decoded.as_tuple().expect("pair");
    assert_eq!(first.as_int(), Some(1));
    assert_eq!(second.as_str(), Some("one"));
}

#[test]
fn three_element_tuples_are_rejected_without_leaks() {
    let before = live();
    let triple = IValue::Tuple(vec![IValue::Int(1), IValue::Int(2), IValue::Int(3)]);
    let err = encode(&triple).unwrap_err();
    assert!(matches!(err, IValueError::UnsupportedShape { tag: Tag::Tuple, .. }));
    assert_eq!(live(), before);
}

#[test]
fn string_lists_round_trip() {
    let value = IValue::from(vec!["a", "b", "c"]);
    let decoded = round_trip(&value);
    assert_eq!(decoded.as_string_list(), Some(vec!["a", "b", "c"]));
}

#[test]
fn empty_collections_round_trip() {
    for value in [
        IValue::IntList(Vec::new()),
        IValue::DoubleList(Vec::new()),
        IValue::BoolList(Vec::new()),
        IValue::TensorList(Vec::new()),
        IValue::GenericList(Vec::new()),
        IValue::GenericDict(GenericDict::new()),
        IValue::from(""),
    ] {
        assert_eq!(round_trip(&value), value);
    }
}

#[test]
fn scalar_lists_round_trip() {
    let ints = IValue::from(vec![i64::MIN, -1, 0, 1, i64::MAX]);
    assert_eq!(round_trip(&ints), ints);
    let doubles = IValue::from(vec![f64::MIN_POSITIVE, -0.5, 1e300]);
    assert_eq!(round_trip(&doubles), doubles);
}

#[test]
fn int_dict_round_trip_ignores_order() {
    let value = IValue::from(HashMap::from([(1_i64, 10_i64), (2, 20)]));
    let decoded = round_trip(&value);
    let dict = decoded.as_dict().expect("dict");
    assert_eq!(dict.len(), 2);
    assert_eq!(dict.get(&IValue::Int(2)), Some(&IValue::Int(20)));
    assert_eq!(decoded, value);
}

#[test]
fn double_dict_round_trip() {
    let value: IValue = [(0.5_f64, 1.5_f64), (2.5, 3.5)]
        .into_iter()
        .collect::<GenericDict>()
        .into();
    assert_eq!(round_trip(&value), value);
}

#[test]
fn unsupported_dict_pairings() {
    let before = live();
    let narrow: GenericDict = [(1.0_f32, 2.0_f32)].into_iter().collect();
    let err = encode(&IValue::GenericDict(narrow)).unwrap_err();
    assert!(err.is_unsupported_shape());
    assert!(err.to_string().contains("f32/f32"), "{err}");

    let strings = IValue::from(BTreeMap::from([("k", 1_i64)]));
    assert!(encode(&strings).unwrap_err().is_unsupported_shape());

    let mixed: GenericDict = [(IValue::Int(1), IValue::Int(2)), (IValue::Int(3), IValue::Double(4.0))]
        .into_iter()
        .collect();
    let err = encode(&IValue::GenericDict(mixed)).unwrap_err();
    assert_eq!(err.path(), vec![(Tag::GenericDict, 3)]);
    assert_eq!(live(), before);
}

#[test]
fn bool_lists_travel_as_int_slots() {
    let value = IValue::from(vec![true, false, true]);
    let handle = encode(&value).expect("encode");
    assert_eq!(sys::st_ivalue_length(handle.as_ptr()), 3);
    let mut slots = [-1 as sys::BoolSlot; 3];
    assert!(unsafe { sys::st_ivalue_to_bool_list(handle.as_ptr(), slots.as_mut_ptr(), 3) });
    assert_eq!(slots, [1, 0, 1]);
    assert_eq!(decode(handle).expect("decode"), value);
}

#[test]
fn nonzero_bool_slots_decode_as_true() {
    let slots: [sys::BoolSlot; 3] = [7, 0, -1];
    let handle = adopt(unsafe { sys::st_ivalue_bool_list(slots.as_ptr(), 3) });
    assert_eq!(
        decode(handle).expect("decode"),
        IValue::BoolList(vec![true, false, true])
    );
}

#[test]
fn narrow_float_lists_fail_at_encode() {
    let before = live();
    let value = IValue::from(vec![1.0_f32, 2.0, 3.0]);
    assert_eq!(value.tag(), Tag::GenericList);
    let err = encode(&value).unwrap_err();
    assert!(matches!(err, IValueError::UnsupportedShape { tag: Tag::GenericList, .. }));
    assert_eq!(live(), before);
}

#[test]
fn tensor_lists_share_storage_through_identity() {
    let tensors: Vec<Tensor> = (0..5)
        .map(|i| Tensor::from_slice(1, 2, &[i as f32, -(i as f32)]).expect("tensor"))
        .collect();
    let originals: Vec<Tensor> = tensors
        .iter()
        .map(|t| t.shallow_clone().expect("clone"))
        .collect();
    let out = call_operator("identity", &[IValue::TensorList(tensors)]).expect("identity");
    let decoded = out.as_tensor_list().expect("tensor list");
    assert_eq!(decoded.len(), 5);
    for (got, want) in decoded.iter().zip(&originals) {
        assert!(got.same_storage(want));
        assert_eq!(got.to_vec().expect("data"), want.to_vec().expect("data"));
    }
}

#[test]
fn encoded_tensor_survives_its_source() {
    let tensor = Tensor::from_slice(2, 1, &[4.0, 5.0]).expect("tensor");
    let handle = encode(&IValue::Tensor(tensor)).expect("encode");
    match decode(handle).expect("decode") {
        IValue::Tensor(t) => {
            assert_eq!(t.shape().expect("shape"), (2, 1));
            assert_eq!(t.to_vec().expect("data"), vec![4.0, 5.0]);
        }
        other => panic!("expected tensor, got {other:?}"),
    }
}

#[test]
fn handles_are_released_exactly_once() {
    let before = live();
    let value = IValue::tuple(IValue::from(vec!["x", "y", "z"]), IValue::from(vec![1_i64, 2]));
    let handle = encode(&value).expect("encode");
    assert_eq!(live(), before + 1);
    drop(handle);
    assert_eq!(live(), before);

    let handle = encode(&value).expect("encode");
    decode(handle).expect("decode");
    assert_eq!(live(), before);
}

#[test]
fn engine_objects_are_unknown_tags() {
    let before = live();
    let err = call_operator("object", &[IValue::from("custom.Module")]).unwrap_err();
    assert!(matches!(err.root_cause(), IValueError::UnknownTag(code) if *code == sys::TAG_OBJECT));
    assert_eq!(live(), before);
}

#[test]
fn decode_is_all_or_nothing() {
    let before = live();
    let children = [
        sys::st_ivalue_int(1),
        unsafe { sys::st_ivalue_object(c"opaque".as_ptr()) },
        sys::st_ivalue_int(3),
    ];
    let list = adopt(unsafe { sys::st_ivalue_generic_list(children.as_ptr(), 3) });
    let err = decode(list).unwrap_err();
    assert_eq!(err.path(), vec![(Tag::GenericList, 1)]);
    assert!(matches!(err.root_cause(), IValueError::UnknownTag(14)));
    assert_eq!(live(), before);
}

#[test]
fn native_tuples_of_other_arity_are_malformed() {
    let before = live();
    let out = call_operator("tuple", &[IValue::Int(1), IValue::Int(2), IValue::Int(3)]);
    let err = out.unwrap_err();
    assert!(matches!(err, IValueError::MalformedCollection { tag: Tag::Tuple, .. }));
    assert_eq!(live(), before);
}

#[test]
fn string_keyed_dicts_decode() {
    let flat = [
        unsafe { sys::st_ivalue_string(b"alpha".as_ptr(), 5) },
        sys::st_ivalue_double(0.5),
        unsafe { sys::st_ivalue_string(b"beta".as_ptr(), 4) },
        sys::st_ivalue_double(1.5),
    ];
    let dict = adopt(unsafe { sys::st_ivalue_generic_dict(flat.as_ptr(), 2) });
    let decoded = decode(dict).expect("decode");
    let dict = decoded.as_dict().expect("dict");
    assert_eq!(dict.pairing(), Some((Tag::String, Tag::Double)));
    assert_eq!(dict.get(&IValue::from("alpha")), Some(&IValue::Double(0.5)));
    assert_eq!(dict.get(&IValue::from("beta")), Some(&IValue::Double(1.5)));
}

#[test]
fn dict_keys_come_back_as_a_list() {
    let value = IValue::from(BTreeMap::from([(3_i64, 30_i64), (4, 40)]));
    let keys = call_operator("dict_keys", &[value]).expect("dict_keys");
    let mut keys: Vec<i64> = keys
        .as_generic_list()
        .expect("list")
        .iter()
        .filter_map(IValue::as_int)
        .collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![3, 4]);
}

#[test]
fn len_operator_counts_elements() {
    let out = call_operator("len", &[IValue::from(vec![1.0_f64, 2.0, 3.0, 4.0])]).expect("len");
    assert_eq!(out, IValue::Int(4));
}

#[test]
fn nesting_beyond_the_limit_is_rejected() {
    let mut value = IValue::Int(0);
    for depth in 0..80_i64 {
        value = IValue::tuple(value, depth);
    }
    let err = Encoder::default().encode(&value).unwrap_err();
    assert!(matches!(err.root_cause(), IValueError::DepthExceeded { max_depth: 64, .. }));

    let shallow = Encoder::new(&InterchangeConfig {
        max_depth: 128,
        strict_collections: false,
    });
    let handle = shallow.encode(&value).expect("encode");
    let err = Decoder::default().decode(handle).unwrap_err();
    assert!(matches!(err.root_cause(), IValueError::DepthExceeded { .. }));
}

#[test]
fn stale_errors_are_not_misattributed() {
    assert_eq!(sys::st_ivalue_tag(std::ptr::null()), -1);
    assert!(sys::st_last_error_length() > 0);
    assert_eq!(round_trip(&IValue::Int(9)), IValue::Int(9));
    assert_eq!(sys::st_last_error_length(), 0);
}

#[test]
fn handles_move_between_threads() {
    let workers: Vec<_> = (0..4_i64)
        .map(|id| {
            std::thread::spawn(move || {
                let value = IValue::tuple(id, format!("worker-{id}"));
                let handle = encode(&value).expect("encode");
                (value, handle)
            })
        })
        .collect();
    for worker in workers {
        let (value, handle) = worker.join().expect("worker");
        let decoded = std::thread::spawn(move || decode(handle).expect("decode"))
            .join()
            .expect("decoder");
        assert_eq!(decoded, value);
    }
}
