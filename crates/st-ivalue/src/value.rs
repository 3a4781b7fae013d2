// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::collections::{BTreeMap, HashMap};

use crate::dict::GenericDict;
use crate::encode::Encoder;
use crate::error::{IValueError, Result};
use crate::handle::CIValue;
use crate::tag::Tag;
use crate::tensor::Tensor;

/// Numeric widths the boundary has no slot for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NarrowScalar {
    I32(i32),
    F32(f32),
    Isize(isize),
}

impl NarrowScalar {
    pub fn type_name(self) -> &'static str {
        match self {
            NarrowScalar::I32(_) => "i32",
            NarrowScalar::F32(_) => "f32",
            NarrowScalar::Isize(_) => "isize",
        }
    }
}

/// Interchange value exchanged with the native engine.
///
/// The variant is the tag: [`IValue::tag`] never inspects payload contents
/// beyond the variant itself. Values are immutable once built; encoding
/// borrows them and decoding produces fresh ones.
#[derive(Debug, PartialEq)]
pub enum IValue {
    None,
    Tensor(Tensor),
    Double(f64),
    Int(i64),
    Bool(bool),
    /// Exactly two elements. Other arities are rejected when encoding.
    Tuple(Vec<IValue>),
    IntList(Vec<i64>),
    DoubleList(Vec<f64>),
    BoolList(Vec<bool>),
    String(String),
    TensorList(Vec<Tensor>),
    /// Homogeneous list of interchange values.
    GenericList(Vec<IValue>),
    GenericDict(GenericDict),
    /// Placeholder for narrow numerics. Classifies, but never encodes.
    Generic(NarrowScalar),
}

impl IValue {
    pub fn tag(&self) -> Tag {
        match self {
            IValue::None => Tag::None,
            IValue::Tensor(_) => Tag::Tensor,
            IValue::Double(_) => Tag::Double,
            IValue::Int(_) => Tag::Int,
            IValue::Bool(_) => Tag::Bool,
            IValue::Tuple(_) => Tag::Tuple,
            IValue::IntList(_) => Tag::IntList,
            IValue::DoubleList(_) => Tag::DoubleList,
            IValue::BoolList(_) => Tag::BoolList,
            IValue::String(_) => Tag::String,
            IValue::TensorList(_) => Tag::TensorList,
            IValue::GenericList(_) => Tag::GenericList,
            IValue::GenericDict(_) => Tag::GenericDict,
            IValue::Generic(_) => Tag::Generic,
        }
    }

    /// Builds a two-element tuple.
    pub fn tuple(first: impl Into<IValue>, second: impl Into<IValue>) -> IValue {
        IValue::Tuple(vec![first.into(), second.into()])
    }

    /// Encodes the value into a fresh boundary handle.
    pub fn encode(&self) -> Result<CIValue> {
        Encoder::from_env().encode(self)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, IValue::None)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            IValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            IValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            IValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            IValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            IValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<(&IValue, &IValue)> {
        match self {
            IValue::Tuple(items) if items.len() == 2 => Some((&items[0], &items[1])),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            IValue::IntList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double_list(&self) -> Option<&[f64]> {
        match self {
            IValue::DoubleList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool_list(&self) -> Option<&[bool]> {
        match self {
            IValue::BoolList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tensor_list(&self) -> Option<&[Tensor]> {
        match self {
            IValue::TensorList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_generic_list(&self) -> Option<&[IValue]> {
        match self {
            IValue::GenericList(v) => Some(v),
            _ => None,
        }
    }

    /// Elements of a generic list whose members are all strings.
    pub fn as_string_list(&self) -> Option<Vec<&str>> {
        self.as_generic_list()?.iter().map(IValue::as_str).collect()
    }

    pub fn as_dict(&self) -> Option<&GenericDict> {
        match self {
            IValue::GenericDict(d) => Some(d),
            _ => None,
        }
    }
}

impl From<()> for IValue {
    fn from(_: ()) -> Self {
        IValue::None
    }
}

impl<T: Into<IValue>> From<Option<T>> for IValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(IValue::None, Into::into)
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for IValue {
                fn from(value: $ty) -> Self {
                    IValue::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    Tensor => Tensor,
    f64 => Double,
    i64 => Int,
    bool => Bool,
    String => String,
    Vec<i64> => IntList,
    Vec<f64> => DoubleList,
    Vec<bool> => BoolList,
    Vec<Tensor> => TensorList,
    GenericDict => GenericDict,
}

impl From<&str> for IValue {
    fn from(value: &str) -> Self {
        IValue::String(value.to_owned())
    }
}

impl From<i32> for IValue {
    fn from(value: i32) -> Self {
        IValue::Generic(NarrowScalar::I32(value))
    }
}

impl From<f32> for IValue {
    fn from(value: f32) -> Self {
        IValue::Generic(NarrowScalar::F32(value))
    }
}

impl From<isize> for IValue {
    fn from(value: isize) -> Self {
        IValue::Generic(NarrowScalar::Isize(value))
    }
}

/// Two elements form a tuple; any other length is a generic list.
impl From<Vec<IValue>> for IValue {
    fn from(items: Vec<IValue>) -> Self {
        if items.len() == 2 {
            IValue::Tuple(items)
        } else {
            IValue::GenericList(items)
        }
    }
}

macro_rules! impl_from_generic_list {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for IValue {
                fn from(items: Vec<$ty>) -> Self {
                    IValue::GenericList(items.into_iter().map(IValue::from).collect())
                }
            }
        )*
    };
}

impl_from_generic_list!(String, &str, i32, f32, isize);

impl<K: Into<IValue>, V: Into<IValue>> From<HashMap<K, V>> for IValue {
    fn from(map: HashMap<K, V>) -> Self {
        IValue::GenericDict(map.into_iter().collect())
    }
}

impl<K: Into<IValue>, V: Into<IValue>> From<BTreeMap<K, V>> for IValue {
    fn from(map: BTreeMap<K, V>) -> Self {
        IValue::GenericDict(map.into_iter().collect())
    }
}

fn expected(found: &IValue, wanted: Tag) -> IValueError {
    IValueError::unsupported(found.tag(), format!("expected {wanted}"))
}

macro_rules! impl_try_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl TryFrom<IValue> for $ty {
                type Error = IValueError;

                fn try_from(value: IValue) -> Result<$ty> {
                    match value {
                        IValue::$variant(inner) => Ok(inner),
                        other => Err(expected(&other, Tag::$variant)),
                    }
                }
            }
        )*
    };
}

impl_try_from! {
    Tensor => Tensor,
    f64 => Double,
    i64 => Int,
    bool => Bool,
    String => String,
    Vec<i64> => IntList,
    Vec<f64> => DoubleList,
    Vec<bool> => BoolList,
    Vec<Tensor> => TensorList,
    GenericDict => GenericDict,
}

impl TryFrom<IValue> for (IValue, IValue) {
    type Error = IValueError;

    fn try_from(value: IValue) -> Result<(IValue, IValue)> {
        match value {
            IValue::Tuple(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(first), Some(second)) => Ok((first, second)),
                    _ => Err(IValueError::unsupported(Tag::Tuple, "expected 2 elements")),
                }
            }
            other => Err(expected(&other, Tag::Tuple)),
        }
    }
}

impl TryFrom<IValue> for Vec<String> {
    type Error = IValueError;

    fn try_from(value: IValue) -> Result<Vec<String>> {
        match value {
            IValue::GenericList(items) => items.into_iter().map(String::try_from).collect(),
            other => Err(expected(&other, Tag::GenericList)),
        }
    }
}
