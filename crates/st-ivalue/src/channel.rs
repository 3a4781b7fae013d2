// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Typed access to the engine's sticky error slot.
//!
//! The engine records failures in a per-thread slot and leaves it set until
//! someone reads it. Every boundary wrapper in this crate calls [`check`]
//! right after its native call, which turns a pending message into a
//! [`IValueError::BoundaryFailure`] and clears the slot before the next call.

use std::ffi::c_char;

use st_ivalue_sys as sys;
use tracing::warn;

use crate::error::{IValueError, Result};

fn take_message() -> Option<String> {
    let len = sys::st_last_error_length();
    if len == 0 {
        return None;
    }
    let mut buffer = vec![0 as c_char; len + 1];
    let written = sys::st_last_error_message(buffer.as_mut_ptr(), buffer.len());
    sys::st_clear_last_error();
    let bytes: Vec<u8> = buffer[..written].iter().map(|&c| c as u8).collect();
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Surfaces and clears the error left by the call named `call`, if any.
pub(crate) fn check(call: &'static str) -> Result<()> {
    match take_message() {
        Some(message) => Err(IValueError::BoundaryFailure { call, message }),
        None => Ok(()),
    }
}

/// Failure for a call that reported success but produced no handle.
pub(crate) fn null_handle(call: &'static str) -> IValueError {
    IValueError::BoundaryFailure {
        call,
        message: "native call returned a null handle".to_string(),
    }
}

/// Discards an error left behind by raw calls made outside this crate so it
/// cannot be attributed to the next conversion.
pub(crate) fn drain_stale() {
    if let Some(message) = take_message() {
        warn!(%message, "discarding stale native error");
    }
}
