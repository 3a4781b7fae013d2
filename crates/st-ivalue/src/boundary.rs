// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Thin safe wrappers over the engine's constructors and extractors.
//!
//! Every wrapper takes ownership of whatever the native call produced before
//! checking the error channel, so a failing call never leaks a handle.

use std::ffi::c_int;

use st_ivalue_sys as sys;

use crate::channel;
use crate::error::{IValueError, Result};
use crate::handle::CIValue;
use crate::raw_array::{c_len, collect_slots, native_count};
use crate::tag::Tag;
use crate::tensor::Tensor;

pub(crate) fn owned(raw: sys::IValueHandle, call: &'static str) -> Result<CIValue> {
    // SAFETY: every handle returned by the engine is fresh and unowned.
    let handle = unsafe { CIValue::from_raw(raw) };
    channel::check(call)?;
    handle.ok_or_else(|| channel::null_handle(call))
}

/// Moves `items` into a native call that consumes them.
fn consume(
    items: Vec<CIValue>,
    len: c_int,
    call: &'static str,
    native: impl FnOnce(*const sys::IValueHandle, c_int) -> sys::IValueHandle,
) -> Result<CIValue> {
    let raw: Vec<sys::IValueHandle> = items.into_iter().map(CIValue::into_raw).collect();
    owned(native(raw.as_ptr(), len), call)
}

/// Adopts handles written by the engine, failing on any null slot.
fn adopt(raw: Vec<sys::IValueHandle>, tag: Tag) -> Result<Vec<CIValue>> {
    let mut handles = Vec::with_capacity(raw.len());
    let mut missing = None;
    for (index, slot) in raw.into_iter().enumerate() {
        // SAFETY: slots written by a successful `to_*` call are owned by us.
        match unsafe { CIValue::from_raw(slot) } {
            Some(handle) => handles.push(handle),
            None => {
                missing.get_or_insert(index);
            }
        }
    }
    match missing {
        Some(index) => Err(IValueError::malformed(
            tag,
            format!("native side wrote a null handle at index {index}"),
        )),
        None => Ok(handles),
    }
}

pub(crate) fn none() -> Result<CIValue> {
    owned(sys::st_ivalue_none(), "st_ivalue_none")
}

pub(crate) fn tensor(tensor: &Tensor) -> Result<CIValue> {
    owned(sys::st_ivalue_tensor(tensor.as_ptr()), "st_ivalue_tensor")
}

pub(crate) fn int(value: i64) -> Result<CIValue> {
    owned(sys::st_ivalue_int(value), "st_ivalue_int")
}

pub(crate) fn double(value: f64) -> Result<CIValue> {
    owned(sys::st_ivalue_double(value), "st_ivalue_double")
}

pub(crate) fn boolean(value: bool) -> Result<CIValue> {
    owned(sys::st_ivalue_bool(c_int::from(value)), "st_ivalue_bool")
}

pub(crate) fn string(bytes: &[u8]) -> Result<CIValue> {
    let len = c_len(bytes.len(), Tag::String)?;
    owned(
        unsafe { sys::st_ivalue_string(bytes.as_ptr(), len) },
        "st_ivalue_string",
    )
}

pub(crate) fn tuple(items: Vec<CIValue>) -> Result<CIValue> {
    let len = c_len(items.len(), Tag::Tuple)?;
    consume(items, len, "st_ivalue_tuple", |ptr, len| unsafe {
        sys::st_ivalue_tuple(ptr, len)
    })
}

pub(crate) fn int_list(values: &[i64]) -> Result<CIValue> {
    let len = c_len(values.len(), Tag::IntList)?;
    owned(
        unsafe { sys::st_ivalue_int_list(values.as_ptr(), len) },
        "st_ivalue_int_list",
    )
}

pub(crate) fn double_list(values: &[f64]) -> Result<CIValue> {
    let len = c_len(values.len(), Tag::DoubleList)?;
    owned(
        unsafe { sys::st_ivalue_double_list(values.as_ptr(), len) },
        "st_ivalue_double_list",
    )
}

pub(crate) fn bool_list(values: &[bool]) -> Result<CIValue> {
    let len = c_len(values.len(), Tag::BoolList)?;
    let slots: Vec<sys::BoolSlot> = values.iter().map(|&flag| sys::BoolSlot::from(flag)).collect();
    owned(
        unsafe { sys::st_ivalue_bool_list(slots.as_ptr(), len) },
        "st_ivalue_bool_list",
    )
}

pub(crate) fn tensor_list(tensors: &[Tensor]) -> Result<CIValue> {
    let len = c_len(tensors.len(), Tag::TensorList)?;
    let raw: Vec<sys::TensorHandle> = tensors.iter().map(|t| t.as_ptr().cast_mut()).collect();
    owned(
        unsafe { sys::st_ivalue_tensor_list(raw.as_ptr(), len) },
        "st_ivalue_tensor_list",
    )
}

pub(crate) fn generic_list(items: Vec<CIValue>) -> Result<CIValue> {
    let len = c_len(items.len(), Tag::GenericList)?;
    consume(items, len, "st_ivalue_generic_list", |ptr, len| unsafe {
        sys::st_ivalue_generic_list(ptr, len)
    })
}

/// `items` holds keys and values interleaved; `pairs` is half its length.
pub(crate) fn generic_dict(items: Vec<CIValue>, pairs: usize) -> Result<CIValue> {
    if items.len() != pairs.saturating_mul(2) {
        return Err(IValueError::malformed(
            Tag::GenericDict,
            format!("{} handles do not form {pairs} pairs", items.len()),
        ));
    }
    let pairs = c_len(pairs, Tag::GenericDict)?;
    consume(items, pairs, "st_ivalue_generic_dict", |ptr, pairs| unsafe {
        sys::st_ivalue_generic_dict(ptr, pairs)
    })
}

pub(crate) fn tag(handle: &CIValue) -> Result<c_int> {
    let code = sys::st_ivalue_tag(handle.as_ptr());
    channel::check("st_ivalue_tag")?;
    Ok(code)
}

pub(crate) fn to_tensor(handle: &CIValue) -> Result<Tensor> {
    let tensor = Tensor::from_raw(sys::st_ivalue_to_tensor(handle.as_ptr()));
    channel::check("st_ivalue_to_tensor")?;
    tensor.ok_or_else(|| channel::null_handle("st_ivalue_to_tensor"))
}

pub(crate) fn to_int(handle: &CIValue) -> Result<i64> {
    let value = sys::st_ivalue_to_int(handle.as_ptr());
    channel::check("st_ivalue_to_int")?;
    Ok(value)
}

pub(crate) fn to_double(handle: &CIValue) -> Result<f64> {
    let value = sys::st_ivalue_to_double(handle.as_ptr());
    channel::check("st_ivalue_to_double")?;
    Ok(value)
}

pub(crate) fn to_bool(handle: &CIValue) -> Result<bool> {
    let value = sys::st_ivalue_to_bool(handle.as_ptr());
    channel::check("st_ivalue_to_bool")?;
    Ok(value != 0)
}

pub(crate) fn to_string(handle: &CIValue) -> Result<Vec<u8>> {
    let raw = sys::st_ivalue_string_length(handle.as_ptr());
    channel::check("st_ivalue_string_length")?;
    let len = native_count(raw, Tag::String)?;
    collect_slots(Tag::String, "st_ivalue_to_string", len, |out, len| unsafe {
        sys::st_ivalue_to_string(handle.as_ptr(), out, len)
    })
}

/// Element count of a list, or pair count of a dictionary.
pub(crate) fn length(handle: &CIValue, tag: Tag) -> Result<usize> {
    let raw = sys::st_ivalue_length(handle.as_ptr());
    channel::check("st_ivalue_length")?;
    native_count(raw, tag)
}

pub(crate) fn tuple_length(handle: &CIValue) -> Result<usize> {
    let raw = sys::st_ivalue_tuple_length(handle.as_ptr());
    channel::check("st_ivalue_tuple_length")?;
    native_count(raw, Tag::Tuple)
}

pub(crate) fn to_tuple(handle: &CIValue, count: usize) -> Result<Vec<CIValue>> {
    let raw = collect_slots(Tag::Tuple, "st_ivalue_to_tuple", count, |out, len| unsafe {
        sys::st_ivalue_to_tuple(handle.as_ptr(), out, len)
    })?;
    adopt(raw, Tag::Tuple)
}

pub(crate) fn to_int_list(handle: &CIValue, count: usize) -> Result<Vec<i64>> {
    collect_slots(Tag::IntList, "st_ivalue_to_int_list", count, |out, len| unsafe {
        sys::st_ivalue_to_int_list(handle.as_ptr(), out, len)
    })
}

pub(crate) fn to_double_list(handle: &CIValue, count: usize) -> Result<Vec<f64>> {
    collect_slots(Tag::DoubleList, "st_ivalue_to_double_list", count, |out, len| unsafe {
        sys::st_ivalue_to_double_list(handle.as_ptr(), out, len)
    })
}

pub(crate) fn to_bool_list(handle: &CIValue, count: usize) -> Result<Vec<bool>> {
    let slots: Vec<sys::BoolSlot> =
        collect_slots(Tag::BoolList, "st_ivalue_to_bool_list", count, |out, len| unsafe {
            sys::st_ivalue_to_bool_list(handle.as_ptr(), out, len)
        })?;
    Ok(slots.into_iter().map(|slot| slot != 0).collect())
}

pub(crate) fn to_tensor_list(handle: &CIValue, count: usize) -> Result<Vec<Tensor>> {
    let raw: Vec<sys::TensorHandle> =
        collect_slots(Tag::TensorList, "st_ivalue_to_tensor_list", count, |out, len| unsafe {
            sys::st_ivalue_to_tensor_list(handle.as_ptr(), out, len)
        })?;
    let tensors: Vec<Option<Tensor>> = raw.into_iter().map(Tensor::from_raw).collect();
    match tensors.iter().position(Option::is_none) {
        Some(index) => Err(IValueError::malformed(
            Tag::TensorList,
            format!("native side wrote a null tensor at index {index}"),
        )),
        None => Ok(tensors.into_iter().flatten().collect()),
    }
}

pub(crate) fn to_generic_list(handle: &CIValue, count: usize) -> Result<Vec<CIValue>> {
    let raw = collect_slots(Tag::GenericList, "st_ivalue_to_generic_list", count, |out, len| unsafe {
        sys::st_ivalue_to_generic_list(handle.as_ptr(), out, len)
    })?;
    adopt(raw, Tag::GenericList)
}

/// Interleaved key and value handles for `pairs` entries.
pub(crate) fn to_generic_dict(handle: &CIValue, pairs: usize) -> Result<Vec<CIValue>> {
    let count = pairs.checked_mul(2).ok_or_else(|| {
        IValueError::malformed(Tag::GenericDict, format!("pair count {pairs} overflows"))
    })?;
    let pairs = c_len(pairs, Tag::GenericDict)?;
    let raw = collect_slots(Tag::GenericDict, "st_ivalue_to_generic_dict", count, |out, _| unsafe {
        sys::st_ivalue_to_generic_dict(handle.as_ptr(), out, pairs)
    })?;
    adopt(raw, Tag::GenericDict)
}
