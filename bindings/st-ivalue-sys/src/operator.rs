// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Structural operators that rearrange boundary values without touching
//! tensor contents.

use std::ffi::{c_char, c_int, CStr};
use std::ptr;
use std::slice;

use crate::error::{err, require_len, require_non_null, FfiResult};
use crate::value::{NativeIValue, Value};

type Operator = fn(Vec<Value>) -> FfiResult<Value>;

const OPERATORS: &[(&str, Operator)] = &[
    ("identity", op_identity),
    ("tuple", op_tuple),
    ("swap", op_swap),
    ("list", op_list),
    ("len", op_len),
    ("dict_keys", op_dict_keys),
    ("object", op_object),
];

fn single(name: &str, mut args: Vec<Value>) -> FfiResult<Value> {
    if args.len() != 1 {
        return err(format!("{name} expects 1 argument but received {}", args.len()));
    }
    Ok(args.remove(0))
}

fn op_identity(args: Vec<Value>) -> FfiResult<Value> {
    single("identity", args)
}

fn op_tuple(args: Vec<Value>) -> FfiResult<Value> {
    Ok(Value::Tuple(args))
}

fn op_swap(args: Vec<Value>) -> FfiResult<Value> {
    match single("swap", args)? {
        Value::Tuple(mut items) if items.len() == 2 => {
            items.swap(0, 1);
            Ok(Value::Tuple(items))
        }
        other => err(format!("swap expects a 2-tuple but received {}", other.kind())),
    }
}

fn op_list(args: Vec<Value>) -> FfiResult<Value> {
    Ok(Value::GenericList(args))
}

fn op_len(args: Vec<Value>) -> FfiResult<Value> {
    let len = match single("len", args)? {
        Value::Tuple(items) | Value::GenericList(items) => items.len(),
        Value::IntList(items) => items.len(),
        Value::DoubleList(items) => items.len(),
        Value::BoolList(items) => items.len(),
        Value::TensorList(items) => items.len(),
        Value::GenericDict(entries) => entries.len(),
        Value::String(bytes) => bytes.len(),
        other => return err(format!("len is undefined for {}", other.kind())),
    };
    i64::try_from(len)
        .map(Value::Int)
        .or_else(|_| err(format!("len {len} does not fit an Int")))
}

fn op_dict_keys(args: Vec<Value>) -> FfiResult<Value> {
    match single("dict_keys", args)? {
        Value::GenericDict(entries) => Ok(Value::GenericList(
            entries.into_iter().map(|(key, _)| key).collect(),
        )),
        other => err(format!("dict_keys expects a GenericDict but received {}", other.kind())),
    }
}

fn op_object(args: Vec<Value>) -> FfiResult<Value> {
    match single("object", args)? {
        Value::String(name) => Ok(Value::Object(String::from_utf8_lossy(&name).into_owned())),
        other => err(format!("object expects a String but received {}", other.kind())),
    }
}

/// Invokes the operator called `name` on `nargs` argument handles and returns
/// a new handle for the result, or `NULL` on failure.
///
/// Ownership of every argument handle moves to the engine, also on failure.
///
/// # Safety
/// `name` must be a valid null-terminated string and `args` must point to
/// `nargs` handles obtained from this library.
#[no_mangle]
pub unsafe extern "C" fn st_operator_call(
    name: *const c_char,
    args: *const *mut NativeIValue,
    nargs: c_int,
) -> *mut NativeIValue {
    let result = (|| {
        let len = require_len(nargs, "operator_call")?;
        let handles: &[*mut NativeIValue] = if len == 0 {
            &[]
        } else {
            slice::from_raw_parts(require_non_null(args, "operator_call args")?, len)
        };
        let mut values = Vec::with_capacity(len);
        let mut missing = None;
        for (index, handle) in handles.iter().enumerate() {
            if handle.is_null() {
                missing.get_or_insert(index);
            } else {
                values.push(NativeIValue::take(*handle));
            }
        }
        let name = CStr::from_ptr(require_non_null(name, "operator_call name")?).to_string_lossy();
        if let Some(index) = missing {
            return err(format!("operator {name} received null argument at index {index}"));
        }
        let operator = OPERATORS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, op)| *op);
        match operator {
            Some(op) => op(values),
            None => err(format!("unknown operator {name}")),
        }
    })();
    match result {
        Ok(value) => NativeIValue::into_handle(value),
        Err(()) => ptr::null_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        st_clear_last_error, st_ivalue_free, st_ivalue_int, st_ivalue_live_handles,
        st_ivalue_tag, st_ivalue_to_int, st_last_error_length, TAG_INT,
    };

    #[test]
    fn len_counts_tuple_elements() {
        let before = st_ivalue_live_handles();
        let args = [st_ivalue_int(4), st_ivalue_int(5), st_ivalue_int(6)];
        let tuple = unsafe { st_operator_call(c"tuple".as_ptr(), args.as_ptr(), 3) };
        let len = unsafe { st_operator_call(c"len".as_ptr(), &tuple, 1) };
        assert_eq!(st_ivalue_tag(len), TAG_INT);
        assert_eq!(st_ivalue_to_int(len), 3);
        st_ivalue_free(len);
        assert_eq!(st_ivalue_live_handles(), before);
    }

    #[test]
    fn unknown_operator_consumes_arguments() {
        st_clear_last_error();
        let before = st_ivalue_live_handles();
        let args = [st_ivalue_int(1)];
        let out = unsafe { st_operator_call(c"transmogrify".as_ptr(), args.as_ptr(), 1) };
        assert!(out.is_null());
        assert!(st_last_error_length() > 0);
        assert_eq!(st_ivalue_live_handles(), before);
        st_clear_last_error();
    }
}
