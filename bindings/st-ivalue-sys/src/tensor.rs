// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::ptr;
use std::slice;
use std::sync::Arc;

use crate::error::{err, require_non_null, require_non_null_mut, FfiResult};

/// Dense row-major tensor transported through the boundary.
///
/// Clones are shallow: they share the underlying storage, which is how the
/// engine hands the same tensor to several owners.
#[derive(Clone, Debug)]
pub struct NativeTensor {
    rows: usize,
    cols: usize,
    data: Arc<[f32]>,
}

impl NativeTensor {
    pub(crate) fn from_dense(rows: usize, cols: usize, data: &[f32]) -> FfiResult<Self> {
        if rows == 0 || cols == 0 {
            return err(format!("invalid tensor dimensions ({rows} x {cols})"));
        }
        let required = rows.saturating_mul(cols);
        if required != data.len() {
            return err(format!(
                "tensor_from_dense expected {required} elements but received {}",
                data.len()
            ));
        }
        Ok(Self {
            rows,
            cols,
            data: Arc::from(data),
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn into_handle(self) -> *mut NativeTensor {
        Box::into_raw(Box::new(self))
    }
}

pub(crate) fn tensor_ref<'a>(handle: *const NativeTensor, label: &str) -> FfiResult<&'a NativeTensor> {
    let handle = require_non_null(handle, label)?;
    // SAFETY: pointer validated above; callers guarantee it came from this library.
    Ok(unsafe { &*handle })
}

/// Constructs a tensor from a dense row-major buffer. Returns `NULL` on failure.
///
/// # Safety
/// `data` must point to `len` readable `f32` values.
#[no_mangle]
pub unsafe extern "C" fn st_tensor_from_dense(
    rows: usize,
    cols: usize,
    data: *const f32,
    len: usize,
) -> *mut NativeTensor {
    if data.is_null() {
        let _ = err::<()>("tensor_from_dense received null data pointer");
        return ptr::null_mut();
    }
    let values = slice::from_raw_parts(data, len);
    match NativeTensor::from_dense(rows, cols, values) {
        Ok(tensor) => tensor.into_handle(),
        Err(()) => ptr::null_mut(),
    }
}

/// Returns a new handle sharing storage with `handle`. Returns `NULL` on failure.
#[no_mangle]
pub extern "C" fn st_tensor_shallow_clone(handle: *const NativeTensor) -> *mut NativeTensor {
    match tensor_ref(handle, "tensor handle") {
        Ok(tensor) => tensor.clone().into_handle(),
        Err(()) => ptr::null_mut(),
    }
}

/// Writes the tensor shape into the output pointers. Returns `true` on success.
#[no_mangle]
pub extern "C" fn st_tensor_shape(
    handle: *const NativeTensor,
    rows_out: *mut usize,
    cols_out: *mut usize,
) -> bool {
    let result = (|| {
        let tensor = tensor_ref(handle, "tensor handle")?;
        let rows_ptr = require_non_null_mut(rows_out, "rows_out")?;
        let cols_ptr = require_non_null_mut(cols_out, "cols_out")?;
        let (rows, cols) = tensor.shape();
        unsafe {
            *rows_ptr = rows;
            *cols_ptr = cols;
        }
        Ok::<(), ()>(())
    })();
    result.is_ok()
}

/// Copies the tensor data into `out`. Returns `true` on success.
///
/// # Safety
/// `out` must point to `len` writable `f32` slots.
#[no_mangle]
pub unsafe extern "C" fn st_tensor_copy_data(
    handle: *const NativeTensor,
    out: *mut f32,
    len: usize,
) -> bool {
    let result = (|| {
        let tensor = tensor_ref(handle, "tensor handle")?;
        let data = tensor.data();
        if data.len() != len {
            return err(format!(
                "tensor_copy_data expected {len} elements but tensor stores {}",
                data.len()
            ));
        }
        let out_ptr = require_non_null_mut(out, "out")?;
        ptr::copy_nonoverlapping(data.as_ptr(), out_ptr, len);
        Ok(())
    })();
    result.is_ok()
}

/// Returns the address of the tensor storage. Handles that share storage
/// report the same address. Returns `NULL` on failure.
#[no_mangle]
pub extern "C" fn st_tensor_data_ptr(handle: *const NativeTensor) -> *const f32 {
    match tensor_ref(handle, "tensor handle") {
        Ok(tensor) => tensor.data().as_ptr(),
        Err(()) => ptr::null(),
    }
}

/// Releases a tensor handle previously returned by this library.
#[no_mangle]
pub extern "C" fn st_tensor_free(handle: *mut NativeTensor) {
    if handle.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(handle));
    }
}
