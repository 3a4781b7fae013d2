// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Reconstructs collections the engine writes as "base pointer + count".
//!
//! This is the only place in the crate that performs pointer-stride
//! arithmetic. Every collection decode goes through [`collect_slots`].

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ffi::c_int;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use crate::channel;
use crate::error::{IValueError, Result};
use crate::tag::Tag;

/// Destination region handed to a native writer. Released exactly once on drop.
pub(crate) struct ScratchBuffer<T> {
    ptr: NonNull<u8>,
    layout: Layout,
    count: usize,
    _slot: PhantomData<T>,
}

impl<T: Copy> ScratchBuffer<T> {
    /// Allocates room for `count` slots of `T`. `count` must be nonzero.
    pub(crate) fn new(count: usize, tag: Tag) -> Result<Self> {
        let layout = Layout::array::<T>(count)
            .ok()
            .filter(|layout| layout.size() > 0)
            .ok_or_else(|| {
                IValueError::malformed(tag, format!("cannot allocate {count} slots"))
            })?;
        // SAFETY: layout has a nonzero size.
        let raw = unsafe { alloc(layout) };
        let ptr = match NonNull::new(raw) {
            Some(ptr) => ptr,
            None => handle_alloc_error(layout),
        };
        Ok(Self {
            ptr,
            layout,
            count,
            _slot: PhantomData,
        })
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr().cast()
    }

    /// Reads every slot back in order.
    ///
    /// # Safety
    /// All `count` slots must have been initialised by the native writer.
    pub(crate) unsafe fn read(&self) -> Vec<T> {
        read_array(self.ptr.as_ptr(), mem::size_of::<T>(), self.count)
    }
}

impl<T> Drop for ScratchBuffer<T> {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the same layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// Reads `count` values starting at `base`, advancing exactly `stride` bytes
/// between consecutive elements.
///
/// # Safety
/// `base + i * stride` must point to an initialised `T` for every `i < count`.
pub(crate) unsafe fn read_array<T: Copy>(base: *const u8, stride: usize, count: usize) -> Vec<T> {
    debug_assert!(stride >= mem::size_of::<T>());
    let mut out = Vec::with_capacity(count);
    if count == 0 {
        return out;
    }
    let mut cursor = base;
    out.push(cursor.cast::<T>().read_unaligned());
    for _ in 1..count {
        cursor = cursor.add(stride);
        out.push(cursor.cast::<T>().read_unaligned());
    }
    out
}

/// Lets the native side fill `count` slots through `write`, checks the error
/// channel for `call`, and returns the slots in order.
///
/// A zero count issues no native call.
pub(crate) fn collect_slots<T: Copy>(
    tag: Tag,
    call: &'static str,
    count: usize,
    write: impl FnOnce(*mut T, c_int) -> bool,
) -> Result<Vec<T>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let len = c_len(count, tag)?;
    let mut scratch = ScratchBuffer::<T>::new(count, tag)?;
    let written = write(scratch.as_mut_ptr(), len);
    channel::check(call)?;
    if !written {
        return Err(IValueError::BoundaryFailure {
            call,
            message: "native writer reported failure without an error".to_string(),
        });
    }
    // SAFETY: the writer succeeded and filled all `count` slots.
    Ok(unsafe { scratch.read() })
}

pub(crate) fn c_len(count: usize, tag: Tag) -> Result<c_int> {
    c_int::try_from(count)
        .map_err(|_| IValueError::malformed(tag, format!("length {count} does not fit a C int")))
}

/// Converts a native count, rejecting the negative values the engine uses
/// for failure.
pub(crate) fn native_count(raw: c_int, tag: Tag) -> Result<usize> {
    usize::try_from(raw)
        .map_err(|_| IValueError::malformed(tag, format!("native side reported length {raw}")))
}
