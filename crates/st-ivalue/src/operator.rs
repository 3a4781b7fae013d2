// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Invocation of operators exposed by the native engine.

use std::ffi::CString;

use st_ivalue_sys as sys;
use tracing::debug;

use crate::boundary;
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::error::{IValueError, Result};
use crate::handle::CIValue;
use crate::raw_array::c_len;
use crate::tag::Tag;
use crate::value::IValue;

/// Calls the native operator `name` with `args` and decodes its result,
/// using the process-wide configuration.
pub fn call_operator(name: &str, args: &[IValue]) -> Result<IValue> {
    call_operator_with(&Encoder::from_env(), &Decoder::from_env(), name, args)
}

/// Same as [`call_operator`] with explicit encoder and decoder settings.
pub fn call_operator_with(
    encoder: &Encoder,
    decoder: &Decoder,
    name: &str,
    args: &[IValue],
) -> Result<IValue> {
    let operator = CString::new(name).map_err(|_| IValueError::BoundaryFailure {
        call: "st_operator_call",
        message: format!("operator name {name:?} contains a null byte"),
    })?;
    let mut handles = Vec::with_capacity(args.len());
    for (index, arg) in args.iter().enumerate() {
        let handle = encoder.encode(arg).map_err(|err| IValueError::Argument {
            operator: name.to_string(),
            index,
            source: Box::new(err),
        })?;
        handles.push(handle);
    }
    let nargs = c_len(handles.len(), Tag::GenericList)?;
    let raw: Vec<sys::IValueHandle> = handles.into_iter().map(CIValue::into_raw).collect();
    // SAFETY: the engine takes ownership of every argument handle.
    let result = boundary::owned(
        unsafe { sys::st_operator_call(operator.as_ptr(), raw.as_ptr(), nargs) },
        "st_operator_call",
    )?;
    debug!(operator = name, nargs, "native operator returned");
    decoder.decode(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_reorders_tuple() {
        let out = call_operator("swap", &[IValue::tuple(1_i64, "one")]).expect("swap");
        assert_eq!(out, IValue::tuple("one", 1_i64));
    }

    #[test]
    fn unknown_operator_is_a_boundary_failure() {
        let before = sys::st_ivalue_live_handles();
        let err = call_operator("transmogrify", &[IValue::Int(1)]).unwrap_err();
        assert!(err.is_boundary_failure(), "{err}");
        assert_eq!(sys::st_ivalue_live_handles(), before);
    }

    #[test]
    fn argument_failures_name_the_position() {
        let err = call_operator("identity", &[IValue::from(1.5_f32)]).unwrap_err();
        match &err {
            IValueError::Argument { operator, index, .. } => {
                assert_eq!(operator, "identity");
                assert_eq!(*index, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_unsupported_shape());
    }
}
