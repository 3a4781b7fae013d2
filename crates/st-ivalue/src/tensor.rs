// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::fmt;
use std::ptr::NonNull;

use st_ivalue_sys as sys;

use crate::channel;
use crate::error::Result;

/// Owned handle to a tensor living in the native engine.
///
/// The interchange layer only transports tensors. Two `Tensor`s compare equal
/// when they share native storage, which is what a shallow clone or a decoded
/// copy of an encoded tensor produces.
pub struct Tensor {
    ctensor: NonNull<sys::NativeTensor>,
}

// SAFETY: the native tensor storage is immutable and reference counted; a
// handle may move between threads as long as it is not shared.
unsafe impl Send for Tensor {}

impl Tensor {
    /// Takes ownership of a raw handle returned by the engine.
    pub(crate) fn from_raw(raw: sys::TensorHandle) -> Option<Tensor> {
        NonNull::new(raw).map(|ctensor| Tensor { ctensor })
    }

    pub(crate) fn as_ptr(&self) -> *const sys::NativeTensor {
        self.ctensor.as_ptr()
    }

    /// Creates a `rows x cols` tensor from row-major data.
    pub fn from_slice(rows: usize, cols: usize, data: &[f32]) -> Result<Tensor> {
        let raw = unsafe { sys::st_tensor_from_dense(rows, cols, data.as_ptr(), data.len()) };
        let tensor = Tensor::from_raw(raw);
        channel::check("st_tensor_from_dense")?;
        tensor.ok_or_else(|| channel::null_handle("st_tensor_from_dense"))
    }

    /// Returns a new handle sharing storage with `self`.
    pub fn shallow_clone(&self) -> Result<Tensor> {
        let tensor = Tensor::from_raw(sys::st_tensor_shallow_clone(self.as_ptr()));
        channel::check("st_tensor_shallow_clone")?;
        tensor.ok_or_else(|| channel::null_handle("st_tensor_shallow_clone"))
    }

    pub fn shape(&self) -> Result<(usize, usize)> {
        let mut rows = 0usize;
        let mut cols = 0usize;
        sys::st_tensor_shape(self.as_ptr(), &mut rows, &mut cols);
        channel::check("st_tensor_shape")?;
        Ok((rows, cols))
    }

    pub fn to_vec(&self) -> Result<Vec<f32>> {
        let (rows, cols) = self.shape()?;
        let mut data = vec![0.0_f32; rows * cols];
        unsafe { sys::st_tensor_copy_data(self.as_ptr(), data.as_mut_ptr(), data.len()) };
        channel::check("st_tensor_copy_data")?;
        Ok(data)
    }

    /// Whether both handles point at the same native storage.
    pub fn same_storage(&self, other: &Tensor) -> bool {
        let lhs = sys::st_tensor_data_ptr(self.as_ptr());
        let rhs = sys::st_tensor_data_ptr(other.as_ptr());
        !lhs.is_null() && lhs == rhs
    }
}

impl Drop for Tensor {
    fn drop(&mut self) {
        sys::st_tensor_free(self.ctensor.as_ptr());
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Tensor) -> bool {
        self.same_storage(other)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape() {
            Ok((rows, cols)) => write!(f, "Tensor({rows}x{cols} @ {:p})", self.ctensor),
            Err(_) => write!(f, "Tensor(@ {:p})", self.ctensor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_clone_shares_storage() {
        let tensor = Tensor::from_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]).expect("tensor");
        let clone = tensor.shallow_clone().expect("clone");
        assert_eq!(tensor, clone);
        drop(tensor);
        assert_eq!(clone.to_vec().expect("data"), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(clone.shape().expect("shape"), (2, 2));
    }

    #[test]
    fn distinct_tensors_are_not_equal() {
        let a = Tensor::from_slice(1, 1, &[1.0]).expect("a");
        let b = Tensor::from_slice(1, 1, &[1.0]).expect("b");
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_shapes_surface_as_boundary_failures() {
        let err = Tensor::from_slice(3, 3, &[1.0, 2.0]).unwrap_err();
        assert!(err.is_boundary_failure(), "{err}");
        assert!(err.to_string().contains("st_tensor_from_dense"));
    }
}
