// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Value interchange between Rust callers and the SpiralTorch native engine.
//!
//! An [`IValue`] is the caller-side form of a value: scalars, strings, owned
//! [`Tensor`] handles and a fixed set of collections. [`encode`] turns it into
//! an owned [`CIValue`] handle the engine understands, and [`decode`] turns a
//! handle produced by the engine back into an `IValue`, consuming it.
//!
//! ```no_run
//! use st_ivalue::{decode, encode, IValue};
//!
//! let value = IValue::tuple(3_i64, "spiral");
//! let handle = encode(&value)?;
//! assert_eq!(decode(handle)?, value);
//! # Ok::<(), st_ivalue::IValueError>(())
//! ```
//!
//! Native failures are surfaced as [`IValueError::BoundaryFailure`] right
//! after the call that caused them. Encode and decode are bounded by the
//! nesting limit in [`spiral_config::InterchangeConfig`].

mod boundary;
mod channel;
mod decode;
mod dict;
mod encode;
mod error;
mod handle;
mod operator;
mod raw_array;
mod tag;
mod tensor;
mod value;

use std::sync::OnceLock;

use spiral_config::InitError;

pub use decode::{decode, Decoder};
pub use dict::GenericDict;
pub use encode::{encode, Encoder};
pub use error::{IValueError, Result};
pub use handle::CIValue;
pub use operator::{call_operator, call_operator_with};
pub use spiral_config::InterchangeConfig;
pub use tag::Tag;
pub use tensor::Tensor;
pub use value::{IValue, NarrowScalar};

/// Ensures tracing has been initialised for the current process.
pub fn init_tracing() {
    static INIT_GUARD: OnceLock<std::result::Result<(), InitError>> = OnceLock::new();

    let result = INIT_GUARD.get_or_init(|| match spiral_config::init_tracing() {
        Ok(()) | Err(InitError::AlreadyInitialised) => Ok(()),
        Err(err) => Err(err),
    });

    if let Err(err) = result {
        tracing::warn!("failed to initialise tracing subscriber: {err}");
    }
}
