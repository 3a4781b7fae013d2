// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::fmt;
use std::ptr::NonNull;

use st_ivalue_sys as sys;

use crate::decode::Decoder;
use crate::error::Result;
use crate::value::IValue;

/// Owned boundary handle for one encoded value.
///
/// A `CIValue` is consumed exactly once: by [`CIValue::decode`], by being
/// passed into a native call that takes ownership, or by being dropped, which
/// releases it on the native side.
pub struct CIValue {
    civalue: NonNull<sys::NativeIValue>,
}

// SAFETY: a handle is exclusively owned; it may move between threads but is
// never shared.
unsafe impl Send for CIValue {}

impl CIValue {
    /// Takes ownership of a raw handle returned by the engine.
    ///
    /// # Safety
    /// `raw` must be null or a live handle from `st-ivalue-sys` that nothing
    /// else owns.
    pub unsafe fn from_raw(raw: sys::IValueHandle) -> Option<CIValue> {
        NonNull::new(raw).map(|civalue| CIValue { civalue })
    }

    /// Releases ownership for a native call that consumes the handle.
    pub fn into_raw(self) -> sys::IValueHandle {
        let raw = self.civalue.as_ptr();
        std::mem::forget(self);
        raw
    }

    pub fn as_ptr(&self) -> *const sys::NativeIValue {
        self.civalue.as_ptr()
    }

    /// Decodes and releases the handle.
    pub fn decode(self) -> Result<IValue> {
        Decoder::from_env().decode(self)
    }
}

impl Drop for CIValue {
    fn drop(&mut self) {
        sys::st_ivalue_free(self.civalue.as_ptr());
    }
}

impl fmt::Debug for CIValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CIValue({:p})", self.civalue)
    }
}
