// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::cell::Cell;
use std::ffi::c_int;

use crate::tensor::NativeTensor;
use crate::{
    TAG_BOOL, TAG_BOOL_LIST, TAG_DOUBLE, TAG_DOUBLE_LIST, TAG_GENERIC_DICT, TAG_GENERIC_LIST,
    TAG_INT, TAG_INT_LIST, TAG_NONE, TAG_OBJECT, TAG_STRING, TAG_TENSOR, TAG_TENSOR_LIST,
    TAG_TUPLE,
};

/// Engine-side representation of a boundary value.
#[derive(Clone, Debug)]
pub(crate) enum Value {
    None,
    Tensor(NativeTensor),
    Double(f64),
    Int(i64),
    Bool(bool),
    Tuple(Vec<Value>),
    IntList(Vec<i64>),
    DoubleList(Vec<f64>),
    BoolList(Vec<bool>),
    String(Vec<u8>),
    TensorList(Vec<NativeTensor>),
    GenericList(Vec<Value>),
    GenericDict(Vec<(Value, Value)>),
    Object(String),
}

impl Value {
    pub(crate) fn tag(&self) -> c_int {
        match self {
            Value::None => TAG_NONE,
            Value::Tensor(_) => TAG_TENSOR,
            Value::Double(_) => TAG_DOUBLE,
            Value::Int(_) => TAG_INT,
            Value::Bool(_) => TAG_BOOL,
            Value::Tuple(_) => TAG_TUPLE,
            Value::IntList(_) => TAG_INT_LIST,
            Value::DoubleList(_) => TAG_DOUBLE_LIST,
            Value::BoolList(_) => TAG_BOOL_LIST,
            Value::String(_) => TAG_STRING,
            Value::TensorList(_) => TAG_TENSOR_LIST,
            Value::GenericList(_) => TAG_GENERIC_LIST,
            Value::GenericDict(_) => TAG_GENERIC_DICT,
            Value::Object(_) => TAG_OBJECT,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Tensor(_) => "Tensor",
            Value::Double(_) => "Double",
            Value::Int(_) => "Int",
            Value::Bool(_) => "Bool",
            Value::Tuple(_) => "Tuple",
            Value::IntList(_) => "IntList",
            Value::DoubleList(_) => "DoubleList",
            Value::BoolList(_) => "BoolList",
            Value::String(_) => "String",
            Value::TensorList(_) => "TensorList",
            Value::GenericList(_) => "GenericList",
            Value::GenericDict(_) => "GenericDict",
            Value::Object(_) => "Object",
        }
    }
}

thread_local! {
    static LIVE_HANDLES: Cell<i64> = const { Cell::new(0) };
}

/// Opaque storage behind an ivalue handle.
#[derive(Debug)]
pub struct NativeIValue {
    value: Value,
}

impl NativeIValue {
    pub(crate) fn into_handle(value: Value) -> *mut NativeIValue {
        LIVE_HANDLES.with(|count| count.set(count.get() + 1));
        Box::into_raw(Box::new(NativeIValue { value }))
    }

    /// Reclaims ownership of a handle's value.
    ///
    /// # Safety
    /// `handle` must be non-null, come from [`NativeIValue::into_handle`] and
    /// not have been reclaimed before.
    pub(crate) unsafe fn take(handle: *mut NativeIValue) -> Value {
        LIVE_HANDLES.with(|count| count.set(count.get() - 1));
        Box::from_raw(handle).value
    }

    pub(crate) fn value(&self) -> &Value {
        &self.value
    }
}

/// Handles allocated minus handles released on the calling thread.
pub(crate) fn live_handles() -> i64 {
    LIVE_HANDLES.with(Cell::get)
}
