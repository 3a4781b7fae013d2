// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::ffi::{c_char, c_int, CStr};
use std::ptr;
use std::slice;

use crate::error::{err, require_len, require_non_null, require_non_null_mut, FfiResult};
use crate::tensor::{tensor_ref, NativeTensor};
use crate::value::{self, NativeIValue, Value};
use crate::BoolSlot;

fn value_handle(result: FfiResult<Value>) -> *mut NativeIValue {
    match result {
        Ok(value) => NativeIValue::into_handle(value),
        Err(()) => ptr::null_mut(),
    }
}

fn with_value<'a, T>(
    handle: *const NativeIValue,
    f: impl FnOnce(&'a Value) -> FfiResult<T>,
) -> FfiResult<T> {
    let handle = require_non_null(handle, "ivalue handle")?;
    // SAFETY: pointer validated above; callers guarantee it came from this library.
    let native = unsafe { &*handle };
    f(native.value())
}

fn mismatch<T>(context: &str, expected: &str, found: &Value) -> FfiResult<T> {
    match found {
        Value::Object(type_name) => err(format!(
            "{context} expected {expected} but handle holds Object<{type_name}>"
        )),
        other => err(format!(
            "{context} expected {expected} but handle holds {}",
            other.kind()
        )),
    }
}

/// Copies `len` plain values out of a caller buffer.
unsafe fn read_buffer<T: Copy>(data: *const T, len: c_int, context: &str) -> FfiResult<Vec<T>> {
    let len = require_len(len, context)?;
    if len == 0 {
        return Ok(Vec::new());
    }
    let data = require_non_null(data, context)?;
    Ok(slice::from_raw_parts(data, len).to_vec())
}

/// Takes ownership of `len` handles. Every non-null handle is reclaimed even
/// when the call fails so that nothing passed in leaks.
unsafe fn take_handles(
    items: *const *mut NativeIValue,
    len: c_int,
    context: &str,
) -> FfiResult<Vec<Value>> {
    let len = require_len(len, context)?;
    if len == 0 {
        return Ok(Vec::new());
    }
    let items = require_non_null(items, context)?;
    let raw = slice::from_raw_parts(items, len);
    let mut values = Vec::with_capacity(len);
    let mut missing = None;
    for (index, handle) in raw.iter().enumerate() {
        if handle.is_null() {
            missing.get_or_insert(index);
        } else {
            values.push(NativeIValue::take(*handle));
        }
    }
    match missing {
        Some(index) => err(format!("{context} received null handle at index {index}")),
        None => Ok(values),
    }
}

/// Writes `items` into a caller-provided buffer of exactly `len` slots.
/// Nothing is produced unless the lengths agree.
unsafe fn write_buffer<T, I>(out: *mut T, len: c_int, items: I, context: &str) -> FfiResult<()>
where
    I: ExactSizeIterator<Item = T>,
{
    let len = require_len(len, context)?;
    if len != items.len() {
        return err(format!(
            "{context} expected buffer for {} elements but received {len}",
            items.len()
        ));
    }
    if len == 0 {
        return Ok(());
    }
    let out = require_non_null_mut(out, context)?;
    for (index, item) in items.enumerate() {
        out.add(index).write(item);
    }
    Ok(())
}

fn collection_len(len: usize, context: &str) -> c_int {
    match c_int::try_from(len) {
        Ok(len) => len,
        Err(_) => {
            let _ = err::<()>(format!("{context} length {len} does not fit a C int"));
            -1
        }
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn st_ivalue_none() -> *mut NativeIValue {
    value_handle(Ok(Value::None))
}

/// Wraps a shallow clone of `tensor`. The caller keeps ownership of `tensor`.
#[no_mangle]
pub extern "C" fn st_ivalue_tensor(tensor: *const NativeTensor) -> *mut NativeIValue {
    value_handle(tensor_ref(tensor, "ivalue_tensor tensor").map(|t| Value::Tensor(t.clone())))
}

#[no_mangle]
pub extern "C" fn st_ivalue_int(value: i64) -> *mut NativeIValue {
    value_handle(Ok(Value::Int(value)))
}

#[no_mangle]
pub extern "C" fn st_ivalue_double(value: f64) -> *mut NativeIValue {
    value_handle(Ok(Value::Double(value)))
}

#[no_mangle]
pub extern "C" fn st_ivalue_bool(value: c_int) -> *mut NativeIValue {
    value_handle(Ok(Value::Bool(value != 0)))
}

/// Copies `len` bytes into a string value. Interior null bytes are preserved.
///
/// # Safety
/// `data` must point to `len` readable bytes (it may be null when `len == 0`).
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_string(data: *const u8, len: c_int) -> *mut NativeIValue {
    value_handle(read_buffer(data, len, "ivalue_string").map(Value::String))
}

/// Builds a tuple from `len` handles. Ownership of every handle moves to the
/// engine, also on failure.
///
/// # Safety
/// `items` must point to `len` handles obtained from this library.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_tuple(
    items: *const *mut NativeIValue,
    len: c_int,
) -> *mut NativeIValue {
    value_handle(take_handles(items, len, "ivalue_tuple").map(Value::Tuple))
}

/// # Safety
/// `data` must point to `len` readable values.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_int_list(data: *const i64, len: c_int) -> *mut NativeIValue {
    value_handle(read_buffer(data, len, "ivalue_int_list").map(Value::IntList))
}

/// # Safety
/// `data` must point to `len` readable values.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_double_list(data: *const f64, len: c_int) -> *mut NativeIValue {
    value_handle(read_buffer(data, len, "ivalue_double_list").map(Value::DoubleList))
}

/// Booleans travel as 32-bit slots; any nonzero slot is `true`.
///
/// # Safety
/// `data` must point to `len` readable slots.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_bool_list(data: *const BoolSlot, len: c_int) -> *mut NativeIValue {
    value_handle(
        read_buffer(data, len, "ivalue_bool_list")
            .map(|slots| Value::BoolList(slots.into_iter().map(|slot| slot != 0).collect())),
    )
}

/// Wraps shallow clones of `len` tensors. The caller keeps ownership of the
/// tensor handles.
///
/// # Safety
/// `data` must point to `len` tensor handles.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_tensor_list(
    data: *const *mut NativeTensor,
    len: c_int,
) -> *mut NativeIValue {
    let result = read_buffer(data, len, "ivalue_tensor_list").and_then(|handles| {
        handles
            .into_iter()
            .enumerate()
            .map(|(index, handle)| {
                tensor_ref(handle, &format!("ivalue_tensor_list tensor {index}")).cloned()
            })
            .collect::<FfiResult<Vec<_>>>()
    });
    value_handle(result.map(Value::TensorList))
}

/// Builds a generic list from `len` handles, taking ownership of all of them.
///
/// # Safety
/// `items` must point to `len` handles obtained from this library.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_generic_list(
    items: *const *mut NativeIValue,
    len: c_int,
) -> *mut NativeIValue {
    value_handle(take_handles(items, len, "ivalue_generic_list").map(Value::GenericList))
}

/// Builds a dictionary from `2 * pairs` interleaved key/value handles,
/// taking ownership of all of them.
///
/// # Safety
/// `items` must point to `2 * pairs` handles obtained from this library.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_generic_dict(
    items: *const *mut NativeIValue,
    pairs: c_int,
) -> *mut NativeIValue {
    let flat_len = match pairs.checked_mul(2) {
        Some(len) => len,
        None => {
            let _ = err::<()>(format!("ivalue_generic_dict pair count {pairs} overflows"));
            return ptr::null_mut();
        }
    };
    let result = take_handles(items, flat_len, "ivalue_generic_dict").map(|flat| {
        let mut entries = Vec::with_capacity(flat.len() / 2);
        let mut iter = flat.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            entries.push((key, value));
        }
        Value::GenericDict(entries)
    });
    value_handle(result)
}

/// Creates an engine-private object value named after `type_name`.
///
/// # Safety
/// `type_name` must be a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_object(type_name: *const c_char) -> *mut NativeIValue {
    let result = require_non_null(type_name, "ivalue_object type_name")
        .map(|name| Value::Object(CStr::from_ptr(name).to_string_lossy().into_owned()));
    value_handle(result)
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Returns the discriminator tag of the value, or `-1` on failure.
#[no_mangle]
pub extern "C" fn st_ivalue_tag(handle: *const NativeIValue) -> c_int {
    with_value(handle, |value| Ok(value.tag())).unwrap_or(-1)
}

/// Returns a new tensor handle sharing storage with the wrapped tensor.
#[no_mangle]
pub extern "C" fn st_ivalue_to_tensor(handle: *const NativeIValue) -> *mut NativeTensor {
    let result = with_value(handle, |value| match value {
        Value::Tensor(tensor) => Ok(tensor.clone().into_handle()),
        other => mismatch("ivalue_to_tensor", "Tensor", other),
    });
    result.unwrap_or(ptr::null_mut())
}

#[no_mangle]
pub extern "C" fn st_ivalue_to_int(handle: *const NativeIValue) -> i64 {
    let result = with_value(handle, |value| match value {
        Value::Int(v) => Ok(*v),
        other => mismatch("ivalue_to_int", "Int", other),
    });
    result.unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn st_ivalue_to_double(handle: *const NativeIValue) -> f64 {
    let result = with_value(handle, |value| match value {
        Value::Double(v) => Ok(*v),
        other => mismatch("ivalue_to_double", "Double", other),
    });
    result.unwrap_or(0.0)
}

#[no_mangle]
pub extern "C" fn st_ivalue_to_bool(handle: *const NativeIValue) -> c_int {
    let result = with_value(handle, |value| match value {
        Value::Bool(v) => Ok(c_int::from(*v)),
        other => mismatch("ivalue_to_bool", "Bool", other),
    });
    result.unwrap_or(-1)
}

/// Returns the byte length of a string value, or `-1` on failure.
#[no_mangle]
pub extern "C" fn st_ivalue_string_length(handle: *const NativeIValue) -> c_int {
    let result = with_value(handle, |value| match value {
        Value::String(bytes) => Ok(collection_len(bytes.len(), "ivalue_string_length")),
        other => mismatch("ivalue_string_length", "String", other),
    });
    result.unwrap_or(-1)
}

/// Copies the string bytes into `out`, which must hold exactly `len` bytes.
///
/// # Safety
/// `out` must point to `len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_to_string(
    handle: *const NativeIValue,
    out: *mut u8,
    len: c_int,
) -> bool {
    with_value(handle, |value| match value {
        Value::String(bytes) => write_buffer(out, len, bytes.iter().copied(), "ivalue_to_string"),
        other => mismatch("ivalue_to_string", "String", other),
    })
    .is_ok()
}

/// Element count of a list value, pair count of a dictionary, `-1` otherwise.
#[no_mangle]
pub extern "C" fn st_ivalue_length(handle: *const NativeIValue) -> c_int {
    let result = with_value(handle, |value| {
        let len = match value {
            Value::IntList(items) => items.len(),
            Value::DoubleList(items) => items.len(),
            Value::BoolList(items) => items.len(),
            Value::TensorList(items) => items.len(),
            Value::GenericList(items) => items.len(),
            Value::GenericDict(entries) => entries.len(),
            other => return mismatch("ivalue_length", "a list or dictionary", other),
        };
        Ok(collection_len(len, "ivalue_length"))
    });
    result.unwrap_or(-1)
}

/// Element count of a tuple value, `-1` otherwise.
#[no_mangle]
pub extern "C" fn st_ivalue_tuple_length(handle: *const NativeIValue) -> c_int {
    let result = with_value(handle, |value| match value {
        Value::Tuple(items) => Ok(collection_len(items.len(), "ivalue_tuple_length")),
        other => mismatch("ivalue_tuple_length", "Tuple", other),
    });
    result.unwrap_or(-1)
}

/// Writes `len` freshly allocated element handles into `out`. The caller owns
/// the written handles.
///
/// # Safety
/// `out` must point to `len` writable handle slots.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_to_tuple(
    handle: *const NativeIValue,
    out: *mut *mut NativeIValue,
    len: c_int,
) -> bool {
    with_value(handle, |value| match value {
        Value::Tuple(items) => write_buffer(
            out,
            len,
            items.iter().cloned().map(NativeIValue::into_handle),
            "ivalue_to_tuple",
        ),
        other => mismatch("ivalue_to_tuple", "Tuple", other),
    })
    .is_ok()
}

/// # Safety
/// `out` must point to `len` writable slots.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_to_int_list(
    handle: *const NativeIValue,
    out: *mut i64,
    len: c_int,
) -> bool {
    with_value(handle, |value| match value {
        Value::IntList(items) => write_buffer(out, len, items.iter().copied(), "ivalue_to_int_list"),
        other => mismatch("ivalue_to_int_list", "IntList", other),
    })
    .is_ok()
}

/// # Safety
/// `out` must point to `len` writable slots.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_to_double_list(
    handle: *const NativeIValue,
    out: *mut f64,
    len: c_int,
) -> bool {
    with_value(handle, |value| match value {
        Value::DoubleList(items) => {
            write_buffer(out, len, items.iter().copied(), "ivalue_to_double_list")
        }
        other => mismatch("ivalue_to_double_list", "DoubleList", other),
    })
    .is_ok()
}

/// Writes `len` 32-bit slots holding `0` or `1`.
///
/// # Safety
/// `out` must point to `len` writable slots.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_to_bool_list(
    handle: *const NativeIValue,
    out: *mut BoolSlot,
    len: c_int,
) -> bool {
    with_value(handle, |value| match value {
        Value::BoolList(items) => write_buffer(
            out,
            len,
            items.iter().map(|flag| BoolSlot::from(*flag)),
            "ivalue_to_bool_list",
        ),
        other => mismatch("ivalue_to_bool_list", "BoolList", other),
    })
    .is_ok()
}

/// Writes `len` new tensor handles (shallow clones) into `out`. The caller
/// owns the written handles.
///
/// # Safety
/// `out` must point to `len` writable handle slots.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_to_tensor_list(
    handle: *const NativeIValue,
    out: *mut *mut NativeTensor,
    len: c_int,
) -> bool {
    with_value(handle, |value| match value {
        Value::TensorList(items) => write_buffer(
            out,
            len,
            items.iter().cloned().map(NativeTensor::into_handle),
            "ivalue_to_tensor_list",
        ),
        other => mismatch("ivalue_to_tensor_list", "TensorList", other),
    })
    .is_ok()
}

/// # Safety
/// `out` must point to `len` writable handle slots.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_to_generic_list(
    handle: *const NativeIValue,
    out: *mut *mut NativeIValue,
    len: c_int,
) -> bool {
    with_value(handle, |value| match value {
        Value::GenericList(items) => write_buffer(
            out,
            len,
            items.iter().cloned().map(NativeIValue::into_handle),
            "ivalue_to_generic_list",
        ),
        other => mismatch("ivalue_to_generic_list", "GenericList", other),
    })
    .is_ok()
}

/// Writes `2 * pairs` interleaved key/value handles into `out`.
///
/// # Safety
/// `out` must point to `2 * pairs` writable handle slots.
#[no_mangle]
pub unsafe extern "C" fn st_ivalue_to_generic_dict(
    handle: *const NativeIValue,
    out: *mut *mut NativeIValue,
    pairs: c_int,
) -> bool {
    with_value(handle, |value| match value {
        Value::GenericDict(entries) => {
            let flat_len = pairs.checked_mul(2).unwrap_or(-1);
            let flat: Vec<Value> = entries
                .iter()
                .flat_map(|(key, value)| [key.clone(), value.clone()])
                .collect();
            write_buffer(
                out,
                flat_len,
                flat.into_iter().map(NativeIValue::into_handle),
                "ivalue_to_generic_dict",
            )
        }
        other => mismatch("ivalue_to_generic_dict", "GenericDict", other),
    })
    .is_ok()
}

/// Releases a value handle. Null handles are ignored.
#[no_mangle]
pub extern "C" fn st_ivalue_free(handle: *mut NativeIValue) {
    if handle.is_null() {
        return;
    }
    unsafe {
        drop(NativeIValue::take(handle));
    }
}

/// Number of value handles allocated and not yet released on this thread.
#[no_mangle]
pub extern "C" fn st_ivalue_live_handles() -> i64 {
    value::live_handles()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        st_clear_last_error, st_last_error_length, st_last_error_message, TAG_GENERIC_DICT, TAG_INT,
        TAG_TUPLE,
    };

    #[test]
    fn scalar_lifecycle() {
        let before = st_ivalue_live_handles();
        let handle = st_ivalue_int(42);
        assert_eq!(st_ivalue_tag(handle), TAG_INT);
        assert_eq!(st_ivalue_to_int(handle), 42);
        assert_eq!(st_ivalue_live_handles(), before + 1);
        st_ivalue_free(handle);
        assert_eq!(st_ivalue_live_handles(), before);
    }

    #[test]
    fn tag_mismatch_sets_error() {
        st_clear_last_error();
        let handle = st_ivalue_double(1.5);
        assert_eq!(st_ivalue_to_int(handle), 0);
        assert!(st_last_error_length() > 0);
        st_clear_last_error();
        st_ivalue_free(handle);
    }

    #[test]
    fn object_mismatches_name_the_object_type() {
        st_clear_last_error();
        let handle = unsafe { st_ivalue_object(c"custom.Module".as_ptr()) };
        assert_eq!(st_ivalue_to_int(handle), 0);
        let len = st_last_error_length();
        let mut buffer = vec![0 as c_char; len + 1];
        st_last_error_message(buffer.as_mut_ptr(), buffer.len());
        let message = unsafe { CStr::from_ptr(buffer.as_ptr()) }.to_string_lossy();
        assert!(message.ends_with("Object<custom.Module>"), "{message}");
        st_clear_last_error();
        st_ivalue_free(handle);
    }

    #[test]
    fn tuple_takes_ownership_and_copies_out() {
        let before = st_ivalue_live_handles();
        let items = [st_ivalue_int(1), st_ivalue_bool(1)];
        let tuple = unsafe { st_ivalue_tuple(items.as_ptr(), 2) };
        assert_eq!(st_ivalue_tag(tuple), TAG_TUPLE);
        assert_eq!(st_ivalue_live_handles(), before + 1);

        let mut out = [ptr::null_mut(); 2];
        assert!(unsafe { st_ivalue_to_tuple(tuple, out.as_mut_ptr(), 2) });
        assert_eq!(st_ivalue_to_int(out[0]), 1);
        assert_eq!(st_ivalue_to_bool(out[1]), 1);
        for handle in out {
            st_ivalue_free(handle);
        }
        st_ivalue_free(tuple);
        assert_eq!(st_ivalue_live_handles(), before);
    }

    #[test]
    fn null_children_are_rejected_without_leaking() {
        st_clear_last_error();
        let before = st_ivalue_live_handles();
        let items = [st_ivalue_int(1), ptr::null_mut(), st_ivalue_int(3)];
        let list = unsafe { st_ivalue_generic_list(items.as_ptr(), 3) };
        assert!(list.is_null());
        assert!(st_last_error_length() > 0);
        assert_eq!(st_ivalue_live_handles(), before);
        st_clear_last_error();
    }

    #[test]
    fn mismatched_output_length_writes_nothing() {
        st_clear_last_error();
        let data = [1_i64, 2, 3];
        let list = unsafe { st_ivalue_int_list(data.as_ptr(), 3) };
        let mut out = [0_i64; 2];
        assert!(!unsafe { st_ivalue_to_int_list(list, out.as_mut_ptr(), 2) });
        assert_eq!(out, [0, 0]);
        assert!(st_last_error_length() > 0);
        st_clear_last_error();
        st_ivalue_free(list);
    }

    #[test]
    fn dict_reports_pair_count() {
        let before = st_ivalue_live_handles();
        let items = [
            st_ivalue_int(1),
            st_ivalue_int(10),
            st_ivalue_int(2),
            st_ivalue_int(20),
        ];
        let dict = unsafe { st_ivalue_generic_dict(items.as_ptr(), 2) };
        assert_eq!(st_ivalue_tag(dict), TAG_GENERIC_DICT);
        assert_eq!(st_ivalue_length(dict), 2);

        let mut out = [ptr::null_mut(); 4];
        assert!(unsafe { st_ivalue_to_generic_dict(dict, out.as_mut_ptr(), 2) });
        let flat: Vec<i64> = out.iter().map(|h| st_ivalue_to_int(*h)).collect();
        assert_eq!(flat, vec![1, 10, 2, 20]);
        for handle in out {
            st_ivalue_free(handle);
        }
        st_ivalue_free(dict);
        assert_eq!(st_ivalue_live_handles(), before);
    }

    #[test]
    fn bool_lists_use_int_slots() {
        let slots: [BoolSlot; 3] = [1, 0, 7];
        let list = unsafe { st_ivalue_bool_list(slots.as_ptr(), 3) };
        let mut out = [-1 as BoolSlot; 3];
        assert!(unsafe { st_ivalue_to_bool_list(list, out.as_mut_ptr(), 3) });
        assert_eq!(out, [1, 0, 1]);
        st_ivalue_free(list);
    }
}
