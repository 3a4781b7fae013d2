// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::ffi::c_int;
use std::fmt;

use st_ivalue_sys as sys;

/// Discriminator identifying the payload shape of an [`IValue`](crate::IValue).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    None,
    Tensor,
    Double,
    Int,
    Bool,
    Tuple,
    IntList,
    DoubleList,
    BoolList,
    String,
    TensorList,
    GenericList,
    GenericDict,
    /// Narrow numerics kept on the caller side only. Never crosses the boundary.
    Generic,
}

impl Tag {
    pub const ALL: [Tag; 14] = [
        Tag::None,
        Tag::Tensor,
        Tag::Double,
        Tag::Int,
        Tag::Bool,
        Tag::Tuple,
        Tag::IntList,
        Tag::DoubleList,
        Tag::BoolList,
        Tag::String,
        Tag::TensorList,
        Tag::GenericList,
        Tag::GenericDict,
        Tag::Generic,
    ];

    /// Wire code shared with the native side. `Generic` has none.
    pub fn code(self) -> Option<c_int> {
        let code = match self {
            Tag::None => sys::TAG_NONE,
            Tag::Tensor => sys::TAG_TENSOR,
            Tag::Double => sys::TAG_DOUBLE,
            Tag::Int => sys::TAG_INT,
            Tag::Bool => sys::TAG_BOOL,
            Tag::Tuple => sys::TAG_TUPLE,
            Tag::IntList => sys::TAG_INT_LIST,
            Tag::DoubleList => sys::TAG_DOUBLE_LIST,
            Tag::BoolList => sys::TAG_BOOL_LIST,
            Tag::String => sys::TAG_STRING,
            Tag::TensorList => sys::TAG_TENSOR_LIST,
            Tag::GenericList => sys::TAG_GENERIC_LIST,
            Tag::GenericDict => sys::TAG_GENERIC_DICT,
            Tag::Generic => return None,
        };
        Some(code)
    }

    pub fn from_code(code: c_int) -> Option<Tag> {
        match code {
            sys::TAG_NONE => Some(Tag::None),
            sys::TAG_TENSOR => Some(Tag::Tensor),
            sys::TAG_DOUBLE => Some(Tag::Double),
            sys::TAG_INT => Some(Tag::Int),
            sys::TAG_BOOL => Some(Tag::Bool),
            sys::TAG_TUPLE => Some(Tag::Tuple),
            sys::TAG_INT_LIST => Some(Tag::IntList),
            sys::TAG_DOUBLE_LIST => Some(Tag::DoubleList),
            sys::TAG_BOOL_LIST => Some(Tag::BoolList),
            sys::TAG_STRING => Some(Tag::String),
            sys::TAG_TENSOR_LIST => Some(Tag::TensorList),
            sys::TAG_GENERIC_LIST => Some(Tag::GenericList),
            sys::TAG_GENERIC_DICT => Some(Tag::GenericDict),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tag::None => "None",
            Tag::Tensor => "Tensor",
            Tag::Double => "Double",
            Tag::Int => "Int",
            Tag::Bool => "Bool",
            Tag::Tuple => "Tuple",
            Tag::IntList => "IntList",
            Tag::DoubleList => "DoubleList",
            Tag::BoolList => "BoolList",
            Tag::String => "String",
            Tag::TensorList => "TensorList",
            Tag::GenericList => "GenericList",
            Tag::GenericDict => "GenericDict",
            Tag::Generic => "Generic",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
