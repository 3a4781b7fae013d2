// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! C-ABI reference engine for the SpiralTorch IValue interchange layer.
//!
//! Every value crossing the boundary lives behind an opaque
//! [`NativeIValue`] handle owned by this library. Callers construct handles
//! with the `st_ivalue_*` constructors, inspect them with the tag and
//! extraction functions and release them with [`st_ivalue_free`]. Tensors are
//! transported as [`NativeTensor`] handles and are never computed on here.
//!
//! Failures never unwind across the boundary. They are recorded in a
//! thread-local error slot that stays set until the caller reads and clears
//! it through [`st_last_error_length`], [`st_last_error_message`] and
//! [`st_clear_last_error`].

#![allow(clippy::not_unsafe_ptr_arg_deref)]

mod error;
mod ivalue;
mod operator;
mod tensor;
mod value;

use std::ffi::c_int;

pub use error::{st_clear_last_error, st_last_error_length, st_last_error_message};
pub use ivalue::*;
pub use operator::st_operator_call;
pub use tensor::*;
pub use value::NativeIValue;

/// Slot type used when boolean lists cross the boundary.
pub type BoolSlot = c_int;

/// Opaque pointer to a native value.
pub type IValueHandle = *mut NativeIValue;

/// Opaque pointer to a native tensor.
pub type TensorHandle = *mut NativeTensor;

pub const TAG_NONE: c_int = 0;
pub const TAG_TENSOR: c_int = 1;
pub const TAG_DOUBLE: c_int = 2;
pub const TAG_INT: c_int = 3;
pub const TAG_BOOL: c_int = 4;
pub const TAG_TUPLE: c_int = 5;
pub const TAG_INT_LIST: c_int = 6;
pub const TAG_DOUBLE_LIST: c_int = 7;
pub const TAG_BOOL_LIST: c_int = 8;
pub const TAG_STRING: c_int = 9;
pub const TAG_TENSOR_LIST: c_int = 10;
pub const TAG_GENERIC_LIST: c_int = 12;
pub const TAG_GENERIC_DICT: c_int = 13;
/// Engine-private objects. The interchange layer has no representation for them.
pub const TAG_OBJECT: c_int = 14;
