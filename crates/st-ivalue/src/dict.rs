// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use crate::tag::Tag;
use crate::value::IValue;

/// Key/value mapping carried by [`IValue::GenericDict`].
///
/// Entries keep insertion order, but equality ignores it: the native side
/// makes no ordering promise for dictionaries.
#[derive(Debug, Default)]
pub struct GenericDict {
    entries: Vec<(IValue, IValue)>,
}

impl GenericDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `entries` as given, without checking for duplicate keys.
    pub fn from_pairs(entries: Vec<(IValue, IValue)>) -> Self {
        Self { entries }
    }

    /// Inserts or replaces the value stored under `key`.
    pub fn insert(&mut self, key: impl Into<IValue>, value: impl Into<IValue>) -> Option<IValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &IValue) -> Option<&IValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (IValue, IValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &IValue> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &IValue> {
        self.entries.iter().map(|(_, value)| value)
    }

    /// Tags of the first entry, which determine how the dictionary encodes.
    pub fn pairing(&self) -> Option<(Tag, Tag)> {
        self.entries
            .first()
            .map(|(key, value)| (key.tag(), value.tag()))
    }

    pub fn into_pairs(self) -> Vec<(IValue, IValue)> {
        self.entries
    }
}

impl PartialEq for GenericDict {
    fn eq(&self, other: &GenericDict) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        let mut matched = vec![false; other.entries.len()];
        self.entries.iter().all(|entry| {
            let found = other
                .entries
                .iter()
                .enumerate()
                .position(|(index, candidate)| !matched[index] && candidate == entry);
            match found {
                Some(index) => {
                    matched[index] = true;
                    true
                }
                None => false,
            }
        })
    }
}

impl<K: Into<IValue>, V: Into<IValue>> FromIterator<(K, V)> for GenericDict {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a GenericDict {
    type Item = &'a (IValue, IValue);
    type IntoIter = std::slice::Iter<'a, (IValue, IValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_order() {
        let a: GenericDict = [(1_i64, 10_i64), (2, 20)].into_iter().collect();
        let b: GenericDict = [(2_i64, 20_i64), (1, 10)].into_iter().collect();
        assert_eq!(a, b);
        let c: GenericDict = [(1_i64, 10_i64), (2, 21)].into_iter().collect();
        assert_ne!(a, c);
    }

    #[test]
    fn insert_replaces_existing_key() {
        let mut dict = GenericDict::new();
        assert!(dict.insert("k", 1_i64).is_none());
        assert_eq!(dict.insert("k", 2_i64), Some(IValue::Int(1)));
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(&IValue::from("k")), Some(&IValue::Int(2)));
    }

    #[test]
    fn pairing_reads_first_entry() {
        let dict: GenericDict = [(1.5_f64, 2.5_f64)].into_iter().collect();
        assert_eq!(dict.pairing(), Some((Tag::Double, Tag::Double)));
        assert_eq!(GenericDict::new().pairing(), None);
    }
}
