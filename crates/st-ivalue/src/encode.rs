// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Turns caller-side [`IValue`]s into native handles.

use spiral_config::interchange::{self, InterchangeConfig};
use tracing::{debug, trace};

use crate::boundary;
use crate::channel;
use crate::dict::GenericDict;
use crate::error::{IValueError, Result};
use crate::handle::CIValue;
use crate::tag::Tag;
use crate::value::IValue;

/// Recursive encoder bounded by a nesting limit.
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    max_depth: usize,
}

impl Encoder {
    pub fn new(config: &InterchangeConfig) -> Self {
        Self {
            max_depth: config.max_depth,
        }
    }

    /// Encoder using the process-wide configuration.
    pub fn from_env() -> Self {
        Self::new(interchange::config())
    }

    /// Encodes `value` into a fresh handle owned by the caller.
    ///
    /// On failure every handle created along the way has already been
    /// released.
    pub fn encode(&self, value: &IValue) -> Result<CIValue> {
        channel::drain_stale();
        let handle = self.encode_at(value, 0)?;
        debug!(tag = %value.tag(), "encoded ivalue");
        Ok(handle)
    }

    fn encode_at(&self, value: &IValue, depth: usize) -> Result<CIValue> {
        if depth > self.max_depth {
            return Err(IValueError::DepthExceeded {
                depth,
                max_depth: self.max_depth,
            });
        }
        trace!(tag = %value.tag(), depth, "encoding ivalue");
        match value {
            IValue::None => boundary::none(),
            IValue::Tensor(tensor) => boundary::tensor(tensor),
            IValue::Double(v) => boundary::double(*v),
            IValue::Int(v) => boundary::int(*v),
            IValue::Bool(v) => boundary::boolean(*v),
            IValue::String(s) => boundary::string(s.as_bytes()),
            IValue::Tuple(items) => {
                if items.len() != 2 {
                    return Err(IValueError::unsupported(
                        Tag::Tuple,
                        format!("tuples carry exactly 2 elements, found {}", items.len()),
                    ));
                }
                let handles = self.encode_children(Tag::Tuple, items.iter(), depth)?;
                boundary::tuple(handles)
            }
            IValue::IntList(v) => boundary::int_list(v),
            IValue::DoubleList(v) => boundary::double_list(v),
            IValue::BoolList(v) => boundary::bool_list(v),
            IValue::TensorList(v) => boundary::tensor_list(v),
            IValue::GenericList(items) => {
                if let Some(first) = items.first() {
                    check_list_element(first.tag())?;
                }
                for (index, item) in items.iter().enumerate() {
                    if item.tag() != Tag::String {
                        return Err(mixed(Tag::GenericList, Tag::String, item.tag())
                            .at(Tag::GenericList, index));
                    }
                }
                let handles = self.encode_children(Tag::GenericList, items.iter(), depth)?;
                boundary::generic_list(handles)
            }
            IValue::GenericDict(dict) => self.encode_dict(dict, depth),
            IValue::Generic(narrow) => Err(IValueError::unsupported(
                Tag::Generic,
                format!("{} values have no native representation", narrow.type_name()),
            )),
        }
    }

    fn encode_dict(&self, dict: &GenericDict, depth: usize) -> Result<CIValue> {
        let Some(pairing) = dict.pairing() else {
            return boundary::generic_dict(Vec::new(), 0);
        };
        check_dict_pairing(pairing, dict)?;
        for (index, (key, value)) in dict.iter().enumerate() {
            for (offset, item, expected) in [(0, key, pairing.0), (1, value, pairing.1)] {
                if item.tag() != expected {
                    return Err(mixed(Tag::GenericDict, expected, item.tag())
                        .at(Tag::GenericDict, 2 * index + offset));
                }
            }
        }
        let flat = dict.iter().flat_map(|(key, value)| [key, value]);
        let handles = self.encode_children(Tag::GenericDict, flat, depth)?;
        boundary::generic_dict(handles, dict.len())
    }

    fn encode_children<'a>(
        &self,
        tag: Tag,
        items: impl Iterator<Item = &'a IValue>,
        depth: usize,
    ) -> Result<Vec<CIValue>> {
        let mut handles = Vec::with_capacity(items.size_hint().0);
        for (index, item) in items.enumerate() {
            let handle = self
                .encode_at(item, depth + 1)
                .map_err(|err| err.at(tag, index))?;
            handles.push(handle);
        }
        Ok(handles)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(&InterchangeConfig::default())
    }
}

/// Encodes `value` with the process-wide configuration.
pub fn encode(value: &IValue) -> Result<CIValue> {
    Encoder::from_env().encode(value)
}

fn check_list_element(element: Tag) -> Result<()> {
    match element {
        Tag::String => Ok(()),
        Tag::Generic => Err(IValueError::unsupported(
            Tag::GenericList,
            "narrow numeric elements have no native representation",
        )),
        other => Err(IValueError::unsupported(
            Tag::GenericList,
            format!("{other} elements are not supported"),
        )),
    }
}

fn check_dict_pairing(pairing: (Tag, Tag), dict: &GenericDict) -> Result<()> {
    match pairing {
        (Tag::Int, Tag::Int) | (Tag::Double, Tag::Double) => Ok(()),
        (Tag::Generic, Tag::Generic) => {
            let name = dict
                .iter()
                .next()
                .and_then(|(key, _)| match key {
                    IValue::Generic(narrow) => Some(narrow.type_name()),
                    _ => None,
                })
                .unwrap_or("narrow");
            Err(IValueError::unsupported(
                Tag::GenericDict,
                format!("{name}/{name} dictionaries are not supported"),
            ))
        }
        (key, value) => Err(IValueError::unsupported(
            Tag::GenericDict,
            format!("{key}/{value} dictionaries are not supported"),
        )),
    }
}

fn mixed(collection: Tag, expected: Tag, found: Tag) -> IValueError {
    IValueError::unsupported(
        collection,
        format!("expected {expected} element, found {found}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NarrowScalar;

    #[test]
    fn generic_values_never_encode() {
        let err = Encoder::default()
            .encode(&IValue::Generic(NarrowScalar::I32(3)))
            .unwrap_err();
        assert!(matches!(err, IValueError::UnsupportedShape { tag: Tag::Generic, .. }));
    }

    #[test]
    fn tuple_arity_is_checked_before_any_native_call() {
        let before = st_ivalue_sys::st_ivalue_live_handles();
        let triple = IValue::Tuple(vec![IValue::Int(1), IValue::Int(2), IValue::Int(3)]);
        let err = Encoder::default().encode(&triple).unwrap_err();
        assert!(err.is_unsupported_shape());
        assert_eq!(st_ivalue_sys::st_ivalue_live_handles(), before);
    }

    #[test]
    fn mixed_lists_report_the_offending_index() {
        let list = IValue::GenericList(vec![IValue::from("a"), IValue::from("b"), IValue::Int(3)]);
        let err = Encoder::default().encode(&list).unwrap_err();
        assert_eq!(err.path(), vec![(Tag::GenericList, 2)]);
        assert!(err.is_unsupported_shape());
    }

    #[test]
    fn depth_limit_applies() {
        let encoder = Encoder::new(&InterchangeConfig {
            max_depth: 1,
            strict_collections: false,
        });
        let nested = IValue::tuple(IValue::tuple(1_i64, 2_i64), 3_i64);
        let err = encoder.encode(&nested).unwrap_err();
        assert!(matches!(err.root_cause(), IValueError::DepthExceeded { depth: 2, max_depth: 1 }));
        assert!(encoder.encode(&IValue::tuple(1_i64, 2_i64)).is_ok());
    }
}
