// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::cell::RefCell;
use std::ffi::{c_char, c_int, CString};
use std::ptr;

pub(crate) type FfiResult<T> = Result<T, ()>;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Records a failure. The slot is sticky: successful calls leave it alone.
pub(crate) fn set_last_error(message: impl Into<String>) {
    let owned = message.into().replace('\0', "\\0");
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = Some(CString::new(owned).unwrap_or_default());
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = None;
    });
}

pub(crate) fn err<T>(message: impl Into<String>) -> FfiResult<T> {
    set_last_error(message);
    Err(())
}

pub(crate) fn require_non_null<T>(ptr: *const T, label: &str) -> FfiResult<*const T> {
    if ptr.is_null() {
        return err(format!("{label} pointer was null"));
    }
    Ok(ptr)
}

pub(crate) fn require_non_null_mut<T>(ptr: *mut T, label: &str) -> FfiResult<*mut T> {
    if ptr.is_null() {
        return err(format!("{label} pointer was null"));
    }
    Ok(ptr)
}

pub(crate) fn require_len(len: c_int, context: &str) -> FfiResult<usize> {
    usize::try_from(len).or_else(|_| err(format!("{context} received negative length {len}")))
}

/// Returns the length of the pending error message in bytes, or `0` when no
/// error is pending.
#[no_mangle]
pub extern "C" fn st_last_error_length() -> usize {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|msg| msg.as_bytes().len())
            .unwrap_or(0)
    })
}

/// Copies the pending error message into `buffer` and returns the number of
/// bytes copied (excluding the null terminator). The message stays pending
/// until [`st_clear_last_error`] is called.
#[no_mangle]
pub extern "C" fn st_last_error_message(buffer: *mut c_char, capacity: usize) -> usize {
    if buffer.is_null() || capacity == 0 {
        return 0;
    }
    LAST_ERROR.with(|slot| {
        if let Some(message) = slot.borrow().as_ref() {
            let bytes = message.as_bytes();
            let to_copy = bytes.len().min(capacity.saturating_sub(1));
            unsafe {
                ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buffer, to_copy);
                *buffer.add(to_copy) = 0;
            }
            to_copy
        } else {
            0
        }
    })
}

/// Clears the pending error so subsequent checks observe an empty slot.
#[no_mangle]
pub extern "C" fn st_clear_last_error() {
    clear_last_error();
}
