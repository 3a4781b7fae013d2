// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Rebuilds [`IValue`]s from native handles.
//!
//! Decoding consumes the handle. It is all-or-nothing: the first failure
//! aborts the whole value and every handle not yet decoded is released.

use spiral_config::interchange::{self, InterchangeConfig};
use tracing::{debug, trace};

use crate::boundary;
use crate::channel;
use crate::dict::GenericDict;
use crate::error::{IValueError, Result};
use crate::handle::CIValue;
use crate::tag::Tag;
use crate::value::IValue;

#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    max_depth: usize,
    strict_collections: bool,
}

impl Decoder {
    pub fn new(config: &InterchangeConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            strict_collections: config.strict_collections,
        }
    }

    /// Decoder using the process-wide configuration.
    pub fn from_env() -> Self {
        Self::new(interchange::config())
    }

    pub fn decode(&self, handle: CIValue) -> Result<IValue> {
        channel::drain_stale();
        let value = self.decode_at(handle, 0)?;
        debug!(tag = %value.tag(), "decoded ivalue");
        Ok(value)
    }

    fn decode_at(&self, handle: CIValue, depth: usize) -> Result<IValue> {
        if depth > self.max_depth {
            return Err(IValueError::DepthExceeded {
                depth,
                max_depth: self.max_depth,
            });
        }
        let code = boundary::tag(&handle)?;
        let tag = match Tag::from_code(code) {
            Some(tag) => tag,
            None => return Err(IValueError::UnknownTag(code)),
        };
        trace!(%tag, depth, "decoding ivalue");
        let value = match tag {
            Tag::None => IValue::None,
            Tag::Tensor => IValue::Tensor(boundary::to_tensor(&handle)?),
            Tag::Double => IValue::Double(boundary::to_double(&handle)?),
            Tag::Int => IValue::Int(boundary::to_int(&handle)?),
            Tag::Bool => IValue::Bool(boundary::to_bool(&handle)?),
            Tag::String => IValue::String(String::from_utf8(boundary::to_string(&handle)?)?),
            Tag::Tuple => {
                let count = boundary::tuple_length(&handle)?;
                if count != 2 {
                    return Err(IValueError::malformed(
                        Tag::Tuple,
                        format!("native tuple holds {count} elements, expected 2"),
                    ));
                }
                let children = boundary::to_tuple(&handle, count)?;
                IValue::Tuple(self.decode_children(Tag::Tuple, children, depth)?)
            }
            Tag::IntList => {
                let count = boundary::length(&handle, tag)?;
                IValue::IntList(boundary::to_int_list(&handle, count)?)
            }
            Tag::DoubleList => {
                let count = boundary::length(&handle, tag)?;
                IValue::DoubleList(boundary::to_double_list(&handle, count)?)
            }
            Tag::BoolList => {
                let count = boundary::length(&handle, tag)?;
                IValue::BoolList(boundary::to_bool_list(&handle, count)?)
            }
            Tag::TensorList => {
                let count = boundary::length(&handle, tag)?;
                IValue::TensorList(boundary::to_tensor_list(&handle, count)?)
            }
            Tag::GenericList => {
                let count = boundary::length(&handle, tag)?;
                let children = boundary::to_generic_list(&handle, count)?;
                let items = self.decode_children(Tag::GenericList, children, depth)?;
                self.check_elements(Tag::GenericList, &items, &[Tag::String, Tag::Int])?;
                IValue::GenericList(items)
            }
            Tag::GenericDict => {
                let pairs = boundary::length(&handle, tag)?;
                let children = boundary::to_generic_dict(&handle, pairs)?;
                let flat = self.decode_children(Tag::GenericDict, children, depth)?;
                self.check_elements(Tag::GenericDict, &flat, &[Tag::String, Tag::Int, Tag::Double])?;
                IValue::GenericDict(split_pairs(flat))
            }
            // Never produced by `from_code`.
            Tag::Generic => return Err(IValueError::UnknownTag(code)),
        };
        Ok(value)
    }

    fn decode_children(&self, tag: Tag, children: Vec<CIValue>, depth: usize) -> Result<Vec<IValue>> {
        let mut items = Vec::with_capacity(children.len());
        for (index, child) in children.into_iter().enumerate() {
            let item = self
                .decode_at(child, depth + 1)
                .map_err(|err| err.at(tag, index))?;
            items.push(item);
        }
        Ok(items)
    }

    /// The first element selects the element type. Later elements are only
    /// compared against it in strict mode. Dictionaries arrive flattened, so
    /// keys and values form two lanes, each checked against its own first
    /// element.
    fn check_elements(&self, collection: Tag, items: &[IValue], supported: &[Tag]) -> Result<()> {
        let Some(first) = items.first() else {
            return Ok(());
        };
        let element = first.tag();
        if !supported.contains(&element) {
            return Err(IValueError::unsupported(
                collection,
                format!("cannot decode {element} elements"),
            ));
        }
        if self.strict_collections {
            let lanes = if collection == Tag::GenericDict { 2 } else { 1 };
            let mismatch = items
                .iter()
                .enumerate()
                .find(|(index, item)| item.tag() != items[index % lanes].tag());
            if let Some((index, item)) = mismatch {
                let expected = items[index % lanes].tag();
                return Err(IValueError::unsupported(
                    collection,
                    format!("expected {expected} element, found {}", item.tag()),
                )
                .at(collection, index));
            }
        }
        Ok(())
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(&InterchangeConfig::default())
    }
}

/// Decodes and releases `handle` with the process-wide configuration.
pub fn decode(handle: CIValue) -> Result<IValue> {
    Decoder::from_env().decode(handle)
}

fn split_pairs(flat: Vec<IValue>) -> GenericDict {
    let mut entries = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        entries.push((key, value));
    }
    GenericDict::from_pairs(entries)
}
